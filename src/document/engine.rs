//! Canonical document storage and segment-aware editing (spec §4.6). No
//! direct teacher analogue; the edit-buffer parser follows the line-
//! tracking discipline of the teacher's query parser (`ParseError` carries
//! a line number, the offending input is preserved rather than discarded).

use std::collections::{BTreeSet, HashSet};
use std::sync::LazyLock;

use chrono::Utc;
use regex::Regex;
use sha2::{Digest, Sha256};

use crate::core::error::{Error, Result};
use crate::core::id::NodeId;
use crate::core::types::{Document, DocumentChunk, DocumentMetadata, Edge, EdgeType, Node, NodeFilter};
use crate::document::chunking::{chunk_body, ChunkStrategy};
use crate::embedding::EmbeddingService;
use crate::linker::Linker;
use crate::scoring::scorer::EdgeScorer;
use crate::store::{NodePatch, Store};
use crate::text::tags::extract_tags;
use crate::text::title::{compose_chunk_title, pick_title};
use crate::text::TextProcessor;

static SEGMENT_START: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^<!-- forest:segment start segment_id=(\S+) node_id=(\S+) order=(\d+) title="([^"]*)" -->$"#)
        .expect("valid regex")
});
static SEGMENT_END: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^<!-- forest:segment end segment_id=(\S+) -->$").expect("valid regex"));

pub struct DocumentEngine<'a> {
    store: &'a Store,
    text: &'a TextProcessor,
    embeddings: &'a EmbeddingService,
    scorer: EdgeScorer,
    max_tags: usize,
}

pub struct ImportOutcome {
    pub document: Document,
    pub root_node: Node,
    pub chunk_nodes: Vec<Node>,
}

#[derive(Debug)]
pub struct EditOutcome {
    pub document: Document,
    pub touched_node_ids: Vec<NodeId>,
}

impl<'a> DocumentEngine<'a> {
    pub fn new(
        store: &'a Store,
        text: &'a TextProcessor,
        embeddings: &'a EmbeddingService,
        scorer: EdgeScorer,
        max_tags: usize,
    ) -> Self {
        DocumentEngine { store, text, embeddings, scorer, max_tags }
    }

    /// Imports a long-form document, chunking it per `strategy`, creating
    /// one node per chunk plus a root node, wiring parent-child and
    /// sequential structural edges, and persisting the canonical
    /// `Document` row (spec §4.6).
    pub fn import(&self, title: Option<&str>, body: &str, strategy: ChunkStrategy, source: &str) -> Result<ImportOutcome> {
        if body.trim().is_empty() {
            return Err(Error::validation("document body must not be empty"));
        }

        let doc_title = pick_title(body, title);
        let specs = chunk_body(body, &strategy);
        let total = specs.len() as u32;

        let root_node = self.build_node(doc_title.clone(), body.to_string())?;
        self.store.insert_node(root_node.clone())?;

        let mut chunk_nodes = Vec::with_capacity(specs.len());
        for (order, spec) in specs.into_iter().enumerate() {
            let order = order as u32;
            let section_title = spec.title.unwrap_or_else(|| format!("Section {}", order + 1));
            let chunk_title = compose_chunk_title(&doc_title, order, total, &section_title);
            let mut node = self.build_node(chunk_title, spec.body)?;
            node.is_chunk = true;
            node.parent_document_id = Some(root_node.id);
            node.chunk_order = Some(order);
            self.store.insert_node(node.clone())?;
            chunk_nodes.push(node);
        }

        self.store.begin_batch();
        for chunk in &chunk_nodes {
            let edge = Edge::normalized(
                root_node.id,
                chunk.id,
                1.0,
                None,
                None,
                vec![],
                EdgeType::ParentChild,
                serde_json::Value::Null,
            );
            self.store.upsert_edge(edge)?;
        }
        for pair in chunk_nodes.windows(2) {
            let edge = Edge::normalized(
                pair[0].id,
                pair[1].id,
                1.0,
                None,
                None,
                vec![],
                EdgeType::Sequential,
                serde_json::Value::Null,
            );
            self.store.upsert_edge(edge)?;
        }

        let (rows, canonical_body) = chunk_rows(root_node.id, &chunk_nodes);
        for row in &rows {
            self.store.upsert_chunk(row.clone())?;
        }
        self.store.end_batch()?;

        let document = Document {
            id: root_node.id,
            title: doc_title,
            body: canonical_body,
            metadata: DocumentMetadata {
                chunk_strategy: strategy.name().to_string(),
                max_tokens: strategy.max_tokens(),
                overlap: strategy.overlap(),
                chunk_count: total,
                source: source.to_string(),
                last_edited_at: None,
                last_edited_node_id: None,
            },
            version: 1,
            root_node_id: Some(root_node.id),
            created_at: root_node.created_at,
            updated_at: root_node.created_at,
        };
        self.store.upsert_document(document.clone())?;

        Ok(ImportOutcome { document, root_node, chunk_nodes })
    }

    /// Renders the whole document as a segment-marker-delimited plain-text
    /// buffer for editing (spec §4.6).
    pub fn render_edit_buffer(&self, document_id: NodeId) -> Result<String> {
        let chunks = self.store.list_chunks(document_id);
        if chunks.is_empty() {
            return Err(Error::not_found(format!("document {} has no chunks", document_id)));
        }

        let mut buffer = String::new();
        for chunk in &chunks {
            let node = self
                .store
                .get_node(chunk.node_id)
                .ok_or_else(|| Error::not_found(format!("chunk node {} not found", chunk.node_id)))?;
            buffer.push_str(&format!(
                "<!-- forest:segment start segment_id={} node_id={} order={} title=\"{}\" -->\n",
                chunk.segment_id,
                chunk.node_id,
                chunk.chunk_order,
                node.title.replace('"', "'")
            ));
            buffer.push_str(&node.body);
            if !node.body.ends_with('\n') {
                buffer.push('\n');
            }
            buffer.push_str(&format!("<!-- forest:segment end segment_id={} -->\n\n", chunk.segment_id));
        }
        Ok(buffer)
    }

    /// Parses an edited buffer, validates the segment markers, applies
    /// selective re-embedding to touched segments only, and bumps the
    /// document version (spec §4.6). Parse failures never mutate any node
    /// or edge; the offending buffer is preserved at a scratch path.
    pub fn apply_edit_buffer(&self, document_id: NodeId, buffer: &str) -> Result<EditOutcome> {
        let mut document = self
            .store
            .get_document(document_id)
            .ok_or_else(|| Error::not_found(format!("document {} not found", document_id)))?;
        let original_chunks = self.store.list_chunks(document_id);
        let original_ids: BTreeSet<String> = original_chunks.iter().map(|c| c.segment_id.clone()).collect();

        let segments = match parse_segments(buffer) {
            Ok(segments) => segments,
            Err(err) => return Err(self.with_scratch(err, buffer)),
        };

        let parsed_ids: BTreeSet<String> = segments.iter().map(|s| s.segment_id.clone()).collect();
        if parsed_ids != original_ids {
            let err = Error::parse_error("segment set does not match the original document", None);
            return Err(self.with_scratch(err, buffer));
        }

        let mut touched_node_ids = Vec::new();
        let mut new_nodes: Vec<Node> = Vec::with_capacity(segments.len());

        for parsed in &segments {
            let original = original_chunks
                .iter()
                .find(|c| c.segment_id == parsed.segment_id)
                .expect("validated above: segment ids match exactly");
            let mut node = self
                .store
                .get_node(original.node_id)
                .ok_or_else(|| Error::not_found(format!("chunk node {} not found", original.node_id)))?;

            let new_checksum = checksum_of(&parsed.body);
            if new_checksum != original.checksum {
                node.body = parsed.body.clone();
                let tokens = self.text.tokenize(&node.body);
                node.tags = extract_tags(&node.body, &tokens, self.max_tags);
                node.token_counts = tokens;
                node.embedding = self.embeddings.embed_node(&node.title, &node.body)?;
                node = self.store.update_node(
                    node.id,
                    NodePatch {
                        body: Some(node.body.clone()),
                        tags: Some(node.tags.clone()),
                        token_counts: Some(node.token_counts.clone()),
                        embedding: Some(node.embedding.clone()),
                        ..Default::default()
                    },
                )?;
                touched_node_ids.push(node.id);
            }
            new_nodes.push(node);
        }

        self.store.begin_batch();

        for (order, node) in new_nodes.iter().enumerate() {
            let order = order as u32;
            if node.chunk_order != Some(order) {
                self.store.update_node(node.id, NodePatch { chunk_order: Some(Some(order)), ..Default::default() })?;
            }
        }

        let (rows, canonical_body) = chunk_rows(document_id, &new_nodes);
        for row in &rows {
            self.store.upsert_chunk(row.clone())?;
        }

        document.body = canonical_body;
        document.metadata.chunk_count = new_nodes.len() as u32;
        if !touched_node_ids.is_empty() {
            document.version += 1;
            document.metadata.last_edited_at = Some(Utc::now());
            document.metadata.last_edited_node_id = touched_node_ids.last().copied();
            document.updated_at = Utc::now();
        }
        self.store.upsert_document(document.clone())?;

        self.store.end_batch()?;

        let linker = Linker::new(self.store, EdgeScorer::new(self.scorer.semantic_threshold, self.scorer.tag_threshold));
        for node_id in &touched_node_ids {
            linker.rescore_node(*node_id)?;
        }

        Ok(EditOutcome { document, touched_node_ids })
    }

    /// Reconstructs canonical `Document` rows for chunk nodes that predate
    /// canonical storage. Idempotent: documents that already exist are
    /// left untouched.
    pub fn backfill(&self) -> Result<usize> {
        let nodes = self.store.list_nodes(&NodeFilter { include_chunks: true, ..Default::default() });

        let mut by_document: std::collections::BTreeMap<NodeId, Vec<Node>> = std::collections::BTreeMap::new();
        for node in nodes.into_iter().filter(|n| n.is_chunk) {
            if let Some(document_id) = node.parent_document_id {
                if self.store.get_document(document_id).is_none() {
                    by_document.entry(document_id).or_default().push(node);
                }
            }
        }

        let mut backfilled = 0;
        for (document_id, mut chunk_nodes) in by_document {
            chunk_nodes.sort_by_key(|n| n.chunk_order.unwrap_or(0));
            let title = self
                .store
                .get_node(document_id)
                .map(|root| root.title)
                .unwrap_or_else(|| "Untitled Document".to_string());

            let (rows, canonical_body) = chunk_rows(document_id, &chunk_nodes);
            let chunk_count = chunk_nodes.len() as u32;

            self.store.begin_batch();
            for row in &rows {
                self.store.upsert_chunk(row.clone())?;
            }
            let document = Document {
                id: document_id,
                title,
                body: canonical_body,
                metadata: DocumentMetadata {
                    chunk_strategy: "unknown".to_string(),
                    max_tokens: None,
                    overlap: None,
                    chunk_count,
                    source: "backfill".to_string(),
                    last_edited_at: None,
                    last_edited_node_id: None,
                },
                version: 1,
                root_node_id: Some(document_id),
                created_at: Utc::now(),
                updated_at: Utc::now(),
            };
            self.store.upsert_document(document)?;
            self.store.end_batch()?;

            backfilled += 1;
        }

        Ok(backfilled)
    }

    fn build_node(&self, title: String, body: String) -> Result<Node> {
        let mut node = Node::new(title, body.clone());
        let tokens = self.text.tokenize(&body);
        node.tags = extract_tags(&body, &tokens, self.max_tags);
        node.token_counts = tokens;
        node.embedding = self.embeddings.embed_node(&node.title, &body)?;
        Ok(node)
    }

    fn with_scratch(&self, err: Error, buffer: &str) -> Error {
        match write_scratch(buffer) {
            Ok(path) => err.with_scratch_path(path),
            Err(_) => err,
        }
    }
}

struct ParsedSegment {
    segment_id: String,
    body: String,
}

fn parse_segments(buffer: &str) -> Result<Vec<ParsedSegment>> {
    let mut segments = Vec::new();
    let mut current: Option<(String, Vec<&str>, u32)> = None;
    let mut seen = HashSet::new();

    for (index, line) in buffer.lines().enumerate() {
        let line_no = (index + 1) as u32;

        if let Some(caps) = SEGMENT_START.captures(line) {
            if current.is_some() {
                return Err(Error::parse_error("nested segment start marker", Some(line_no)));
            }
            let segment_id = caps[1].to_string();
            if !seen.insert(segment_id.clone()) {
                return Err(Error::parse_error(format!("duplicate segment {}", segment_id), Some(line_no)));
            }
            current = Some((segment_id, Vec::new(), line_no));
        } else if let Some(caps) = SEGMENT_END.captures(line) {
            let segment_id = caps[1].to_string();
            match current.take() {
                Some((open_id, lines, _)) if open_id == segment_id => {
                    segments.push(ParsedSegment { segment_id: open_id, body: lines.join("\n") });
                }
                _ => {
                    return Err(Error::parse_error(format!("unmatched segment end {}", segment_id), Some(line_no)));
                }
            }
        } else if let Some((_, lines, _)) = current.as_mut() {
            lines.push(line);
        }
    }

    if let Some((segment_id, _, start_line)) = current {
        return Err(Error::parse_error(format!("segment {} missing end marker", segment_id), Some(start_line)));
    }

    Ok(segments)
}

fn write_scratch(buffer: &str) -> Result<std::path::PathBuf> {
    let path = std::env::temp_dir().join(format!("forest-edit-scratch-{}.txt", uuid::Uuid::new_v4()));
    std::fs::write(&path, buffer)?;
    Ok(path)
}

fn checksum_of(body: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(body.trim().as_bytes());
    let digest = hasher.finalize();
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest);
    out
}

/// Builds per-chunk offset/length/checksum rows plus the canonical body
/// (chunk bodies joined by a blank line), per spec §4.6.
fn chunk_rows(document_id: NodeId, chunk_nodes: &[Node]) -> (Vec<DocumentChunk>, String) {
    let mut canonical = String::new();
    let mut rows = Vec::with_capacity(chunk_nodes.len());

    for (order, node) in chunk_nodes.iter().enumerate() {
        if order > 0 {
            canonical.push_str("\n\n");
        }
        let offset = canonical.len() as u64;
        canonical.push_str(&node.body);
        let length = node.body.len() as u64;

        rows.push(DocumentChunk {
            document_id,
            segment_id: format!("seg-{}", order),
            node_id: node.id,
            offset,
            length,
            chunk_order: order as u32,
            checksum: checksum_of(&node.body),
        });
    }

    (rows, canonical)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::Config;
    use crate::core::config::EmbedProvider;

    fn setup() -> (tempfile::TempDir, Store, TextProcessor, EmbeddingService) {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.db_path = dir.path().to_path_buf();
        config.embed_provider = EmbedProvider::Mock;
        let store = Store::open(&config).unwrap();
        let text = TextProcessor::standard();
        let embeddings = EmbeddingService::from_config(&config).unwrap();
        (dir, store, text, embeddings)
    }

    #[test]
    fn import_creates_root_and_chunk_nodes_with_structural_edges() {
        let (_dir, store, text, embeddings) = setup();
        let engine = DocumentEngine::new(&store, &text, &embeddings, EdgeScorer::new(0.5, 0.3), 8);

        let body = "# Intro\nfirst section\n# Usage\nsecond section\n";
        let outcome = engine.import(Some("Guide"), body, ChunkStrategy::Headers, "import").unwrap();

        assert_eq!(outcome.chunk_nodes.len(), 2);
        assert_eq!(outcome.document.version, 1);
        let edges = store.list_edges(&crate::core::types::EdgeFilter { node_id: Some(outcome.root_node.id), edge_type: None });
        assert_eq!(edges.len(), 2);
    }

    #[test]
    fn edit_buffer_only_touches_changed_segment() {
        let (_dir, store, text, embeddings) = setup();
        let engine = DocumentEngine::new(&store, &text, &embeddings, EdgeScorer::new(0.5, 0.3), 8);

        let body = "# One\nfirst\n# Two\nsecond\n# Three\nthird\n";
        let outcome = engine.import(Some("Doc"), body, ChunkStrategy::Headers, "import").unwrap();
        let document_id = outcome.document.id;

        let buffer = engine.render_edit_buffer(document_id).unwrap();
        let edited = buffer.replace("second", "second, edited");

        let result = engine.apply_edit_buffer(document_id, &edited).unwrap();
        assert_eq!(result.document.version, 2);
        assert_eq!(result.touched_node_ids.len(), 1);
    }

    #[test]
    fn edit_buffer_rejects_missing_segment() {
        let (_dir, store, text, embeddings) = setup();
        let engine = DocumentEngine::new(&store, &text, &embeddings, EdgeScorer::new(0.5, 0.3), 8);

        let body = "# One\nfirst\n# Two\nsecond\n";
        let outcome = engine.import(Some("Doc"), body, ChunkStrategy::Headers, "import").unwrap();
        let buffer = engine.render_edit_buffer(outcome.document.id).unwrap();

        let truncated: String = buffer.lines().take(3).collect::<Vec<_>>().join("\n");
        let err = engine.apply_edit_buffer(outcome.document.id, &truncated).unwrap_err();
        assert_eq!(err.kind, crate::core::error::ErrorKind::ParseError);
        assert!(err.detail.scratch_path.is_some());
    }

    #[test]
    fn backfill_is_idempotent() {
        let (_dir, store, text, embeddings) = setup();
        let engine = DocumentEngine::new(&store, &text, &embeddings, EdgeScorer::new(0.5, 0.3), 8);

        let mut chunk = Node::new("Orphan chunk".into(), "orphan body".into());
        chunk.is_chunk = true;
        let document_id = NodeId::new();
        chunk.parent_document_id = Some(document_id);
        chunk.chunk_order = Some(0);
        store.insert_node(chunk).unwrap();

        let first = engine.backfill().unwrap();
        assert_eq!(first, 1);
        let second = engine.backfill().unwrap();
        assert_eq!(second, 0);
    }
}
