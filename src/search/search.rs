//! Retrieval over the Store: semantic similarity, metadata filtering, and
//! reference resolution (spec §4.8). Grounded on the teacher's
//! `search::results::{ScoredDocument, TopKCollector}` ranking shape,
//! generalized from inverted-index postings to cosine-ranked embedding
//! hits, and on `query::cache`'s single-snapshot-per-call discipline.

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Utc};

use crate::core::error::{Candidate, Error, Result};
use crate::core::id::{NodeId, MIN_PREFIX_LEN};
use crate::core::types::{Node, NodeFilter};
use crate::embedding::service::EmbeddingService;
use crate::store::Store;

#[derive(Debug, Clone)]
pub struct ScoredNode {
    pub node: Node,
    pub score: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortBy {
    Score,
    Recency,
    Degree,
}

/// Criteria for `metadata_search`. All fields are conjunctive (AND'd
/// together); tags_any is disjunctive within itself.
#[derive(Debug, Clone, Default)]
pub struct MetadataCriteria {
    pub id_prefix: Option<String>,
    pub title_exact: Option<String>,
    pub substring: Option<String>,
    pub tags_all: Option<BTreeSet<String>>,
    pub tags_any: Option<BTreeSet<String>>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub origin: Option<String>,
    pub creator: Option<String>,
    pub sort_by: SortBy,
}

impl Default for SortBy {
    fn default() -> Self {
        SortBy::Recency
    }
}

pub struct SearchService<'a> {
    store: &'a Store,
    embeddings: &'a EmbeddingService,
}

impl<'a> SearchService<'a> {
    pub fn new(store: &'a Store, embeddings: &'a EmbeddingService) -> Self {
        SearchService { store, embeddings }
    }

    /// Embeds `query`, ranks every embedded node by cosine similarity,
    /// drops anything below `min_score`, applies `limit`, then collapses
    /// chunk hits onto their parent document's root node (spec §4.8).
    pub fn semantic_search(
        &self,
        query: &str,
        limit: usize,
        min_score: f32,
        tag_filter: Option<&BTreeSet<String>>,
    ) -> Result<Vec<ScoredNode>> {
        let query_embedding = match self.embeddings.embed_text(query)? {
            Some(v) => v,
            None => return Ok(Vec::new()),
        };

        let filter = NodeFilter {
            tags: tag_filter.cloned(),
            include_chunks: true,
            ..Default::default()
        };

        let mut scored: Vec<ScoredNode> = self
            .store
            .list_nodes(&filter)
            .into_iter()
            .filter_map(|node| {
                let embedding = node.embedding.as_ref()?;
                let score = cosine_similarity(&query_embedding, embedding);
                Some(ScoredNode { node, score })
            })
            .filter(|hit| hit.score >= min_score)
            .collect();

        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(limit);

        Ok(self.dedupe_chunks(scored))
    }

    /// Replaces each chunk hit with its parent document's root node,
    /// collapsing multiple chunks from the same document into one entry
    /// and keeping the best chunk's score.
    fn dedupe_chunks(&self, hits: Vec<ScoredNode>) -> Vec<ScoredNode> {
        let mut result: Vec<ScoredNode> = Vec::with_capacity(hits.len());
        let mut index_of: HashMap<NodeId, usize> = HashMap::new();

        for hit in hits {
            let representative = if hit.node.is_chunk {
                hit.node
                    .parent_document_id
                    .and_then(|doc_id| self.store.get_document(doc_id))
                    .and_then(|doc| doc.root_node_id)
            } else {
                None
            };

            let key = representative.unwrap_or(hit.node.id);
            if let Some(&idx) = index_of.get(&key) {
                if hit.score > result[idx].score {
                    result[idx].score = hit.score;
                }
                continue;
            }

            let node = match representative {
                Some(root_id) if root_id != hit.node.id => {
                    self.store.get_node(root_id).unwrap_or(hit.node)
                }
                _ => hit.node,
            };
            index_of.insert(key, result.len());
            result.push(ScoredNode { node, score: hit.score });
        }

        result
    }

    /// Id-prefix, title, substring, tag, date and origin/creator
    /// filtering with a choice of sort order (spec §4.8).
    pub fn metadata_search(&self, criteria: &MetadataCriteria) -> Vec<ScoredNode> {
        let filter = NodeFilter {
            tags: criteria.tags_all.clone(),
            since: criteria.since,
            until: criteria.until,
            include_chunks: false,
        };

        let mut hits: Vec<ScoredNode> = self
            .store
            .list_nodes(&filter)
            .into_iter()
            .filter(|node| match &criteria.id_prefix {
                Some(prefix) => node.id.matches_prefix(prefix),
                None => true,
            })
            .filter(|node| match &criteria.title_exact {
                Some(title) => node.title == *title,
                None => true,
            })
            .filter(|node| match &criteria.tags_any {
                Some(wanted) => wanted.is_empty() || node.tags.iter().any(|t| wanted.contains(t)),
                None => true,
            })
            .filter(|node| match &criteria.origin {
                Some(origin) => node.metadata.get("origin").and_then(|v| v.as_str()) == Some(origin.as_str()),
                None => true,
            })
            .filter(|node| match &criteria.creator {
                Some(creator) => node.metadata.get("creator").and_then(|v| v.as_str()) == Some(creator.as_str()),
                None => true,
            })
            .filter_map(|node| match &criteria.substring {
                Some(needle) => {
                    let needle_lower = needle.to_lowercase();
                    let title_hit = node.title.to_lowercase().contains(&needle_lower);
                    let body_hit = node.body.to_lowercase().contains(&needle_lower);
                    if title_hit || body_hit {
                        let score = if title_hit { 1.0 } else { 0.5 };
                        Some(ScoredNode { node, score })
                    } else {
                        None
                    }
                }
                None => Some(ScoredNode { node, score: 1.0 }),
            })
            .collect();

        match criteria.sort_by {
            SortBy::Score => hits.sort_by(|a, b| b.score.total_cmp(&a.score)),
            SortBy::Recency => hits.sort_by(|a, b| b.node.updated_at.cmp(&a.node.updated_at)),
            SortBy::Degree => hits.sort_by(|a, b| b.node.accepted_degree.cmp(&a.node.accepted_degree)),
        }
        hits
    }

    /// Resolves a reference string to exactly one node: `@N` (N-th most
    /// recently updated), `#tag` (unique tag owner), `"substring"`
    /// (unique title substring), else a UUID prefix (spec §4.8).
    pub fn resolve_reference(&self, reference: &str) -> Result<Node> {
        if let Some(rank) = reference.strip_prefix('@') {
            return self.resolve_recency_rank(rank);
        }
        if let Some(tag) = reference.strip_prefix('#') {
            return self.resolve_unique_tag(tag);
        }
        if reference.len() >= 2 && reference.starts_with('"') && reference.ends_with('"') {
            let needle = &reference[1..reference.len() - 1];
            return self.resolve_unique_title_substring(needle);
        }
        self.resolve_uuid_prefix(reference)
    }

    fn resolve_recency_rank(&self, rank: &str) -> Result<Node> {
        let n: usize = rank
            .parse()
            .map_err(|_| Error::validation(format!("invalid recency reference @{}", rank)))?;
        if n == 0 {
            return Err(Error::validation("recency reference @0 is out of range"));
        }
        let nodes = self.store.list_nodes(&NodeFilter::default());
        nodes
            .into_iter()
            .nth(n - 1)
            .ok_or_else(|| Error::not_found(format!("no node at recency rank {}", n)))
    }

    fn resolve_unique_tag(&self, tag: &str) -> Result<Node> {
        let filter = NodeFilter { tags: Some(BTreeSet::from([tag.to_string()])), ..Default::default() };
        let matches = self.store.list_nodes(&filter);
        self.require_unique(matches, format!("tag #{}", tag))
    }

    fn resolve_unique_title_substring(&self, needle: &str) -> Result<Node> {
        let needle_lower = needle.to_lowercase();
        let matches: Vec<Node> = self
            .store
            .list_nodes(&NodeFilter::default())
            .into_iter()
            .filter(|n| n.title.to_lowercase().contains(&needle_lower))
            .collect();
        self.require_unique(matches, format!("title substring {:?}", needle))
    }

    fn resolve_uuid_prefix(&self, prefix: &str) -> Result<Node> {
        if prefix.chars().filter(|c| *c != '-').count() < MIN_PREFIX_LEN {
            return Err(Error::validation(format!(
                "id prefix {:?} is shorter than the minimum of {} characters",
                prefix, MIN_PREFIX_LEN
            )));
        }
        let matches: Vec<Node> = self
            .store
            .list_nodes(&NodeFilter::default())
            .into_iter()
            .filter(|n| n.id.matches_prefix(prefix))
            .collect();
        self.require_unique(matches, format!("id prefix {:?}", prefix))
    }

    fn require_unique(&self, mut matches: Vec<Node>, description: String) -> Result<Node> {
        match matches.len() {
            0 => Err(Error::not_found(format!("no node matches {}", description))),
            1 => Ok(matches.remove(0)),
            _ => {
                let candidates = matches
                    .iter()
                    .take(5)
                    .map(|n| Candidate { id: n.id.to_hex(), title: n.title.clone() })
                    .collect();
                Err(Error::ambiguous(format!("{} matches {} nodes", description, matches.len()), candidates))
            }
        }
    }
}

/// Plain dot product: embeddings are L2-normalized at capture time
/// (`embedding::provider::l2_normalize`), so dot product equals cosine
/// similarity without a second normalization pass.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::{Config, EmbedProvider};

    fn open_store() -> (tempfile::TempDir, Store) {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.db_path = dir.path().to_path_buf();
        let store = Store::open(&config).unwrap();
        (dir, store)
    }

    fn mock_embeddings() -> EmbeddingService {
        let mut config = Config::default();
        config.embed_provider = EmbedProvider::Mock;
        EmbeddingService::from_config(&config).unwrap()
    }

    #[test]
    fn semantic_search_returns_empty_when_provider_has_no_embedding() {
        let (_dir, store) = open_store();
        let mut config = Config::default();
        config.embed_provider = EmbedProvider::None;
        let embeddings = EmbeddingService::from_config(&config).unwrap();
        let search = SearchService::new(&store, &embeddings);

        let hits = search.semantic_search("anything", 10, 0.0, None).unwrap();
        assert!(hits.is_empty());
    }

    #[test]
    fn semantic_search_ranks_by_similarity_and_respects_limit() {
        let (_dir, store) = open_store();
        let embeddings = mock_embeddings();
        for title in ["rust programming", "cooking recipes", "gardening tips"] {
            let mut node = Node::new(title.into(), title.into());
            node.embedding = embeddings.embed_node(&node.title, &node.body).unwrap();
            store.insert_node(node).unwrap();
        }

        let search = SearchService::new(&store, &embeddings);
        let hits = search.semantic_search("rust programming", 2, 0.0, None).unwrap();
        assert!(hits.len() <= 2);
        assert!(!hits.is_empty());
    }

    #[test]
    fn metadata_search_filters_by_title_substring() {
        let (_dir, store) = open_store();
        let embeddings = mock_embeddings();
        store.insert_node(Node::new("Alpha Notes".into(), "body one".into())).unwrap();
        store.insert_node(Node::new("Beta Notes".into(), "body two".into())).unwrap();

        let search = SearchService::new(&store, &embeddings);
        let criteria = MetadataCriteria { substring: Some("alpha".into()), ..Default::default() };
        let hits = search.metadata_search(&criteria);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].node.title, "Alpha Notes");
    }

    #[test]
    fn resolve_reference_by_recency_rank() {
        let (_dir, store) = open_store();
        let embeddings = mock_embeddings();
        store.insert_node(Node::new("First".into(), "a".into())).unwrap();
        store.insert_node(Node::new("Second".into(), "b".into())).unwrap();

        let search = SearchService::new(&store, &embeddings);
        let node = search.resolve_reference("@1").unwrap();
        assert_eq!(node.title, "Second");
    }

    #[test]
    fn resolve_reference_by_tag_is_ambiguous_with_two_owners() {
        let (_dir, store) = open_store();
        let embeddings = mock_embeddings();
        let mut a = Node::new("A".into(), "a".into());
        a.tags.insert("shared".into());
        let mut b = Node::new("B".into(), "b".into());
        b.tags.insert("shared".into());
        store.insert_node(a).unwrap();
        store.insert_node(b).unwrap();

        let search = SearchService::new(&store, &embeddings);
        let err = search.resolve_reference("#shared").unwrap_err();
        assert_eq!(err.kind, crate::core::error::ErrorKind::Ambiguous);
        assert_eq!(err.detail.candidates.len(), 2);
    }

    #[test]
    fn resolve_reference_rejects_short_id_prefix() {
        let (_dir, store) = open_store();
        let embeddings = mock_embeddings();
        let search = SearchService::new(&store, &embeddings);
        assert!(search.resolve_reference("ab").is_err());
    }
}
