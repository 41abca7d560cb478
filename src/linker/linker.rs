//! Edge rescoring, playing the role of the teacher's
//! `parallel::indexer::ParallelIndexer` (parallel batch fan-out over
//! `rayon`) and `writer::index_writer::IndexWriter::add_document`
//! (single-writer apply-then-persist). Forest scores node *pairs* instead
//! of indexing documents, and a "commit" is an edge upsert/delete through
//! `Store` rather than a segment flush.

use rayon::prelude::*;

use crate::core::config::DegreeCapPolicy;
use crate::core::error::Result;
use crate::core::id::NodeId;
use crate::core::types::{Edge, EdgeEvent, EdgeFilter, EdgeStatus, EdgeType, Node, NodeFilter};
use crate::scoring::scorer::EdgeScorer;
use crate::scoring::tag_idf::TagIdfContext;
use crate::store::Store;

pub struct Linker<'a> {
    store: &'a Store,
    scorer: EdgeScorer,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GraphRescoreReport {
    pub candidates: usize,
    pub accepted: usize,
    pub dropped_by_degree_cap: usize,
}

impl<'a> Linker<'a> {
    pub fn new(store: &'a Store, scorer: EdgeScorer) -> Self {
        Linker { store, scorer }
    }

    /// Rescores one node against every other node, replacing its semantic
    /// edge set. Structural edge types (parent/child, sequential, manual,
    /// bridge) are left untouched; only `EdgeType::Semantic` is derived
    /// here (spec §4.5).
    pub fn rescore_node(&self, node_id: NodeId) -> Result<Vec<Edge>> {
        let all_nodes = self.all_nodes();
        let node = all_nodes
            .iter()
            .find(|n| n.id == node_id)
            .cloned()
            .ok_or_else(|| crate::core::error::Error::not_found(format!("node {} not found", node_id)))?;

        let ctx = TagIdfContext::build(&all_nodes);

        let mut candidates: Vec<Edge> = all_nodes
            .iter()
            .filter(|other| other.id != node_id)
            .filter_map(|other| self.score_pair(&node, other, &ctx))
            .collect();

        candidates.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.other(node_id).cmp(&b.other(node_id))));

        let config = self.store.config().clone();
        let accepted = match config.degree_cap_policy {
            DegreeCapPolicy::Unlimited => candidates,
            DegreeCapPolicy::DropLowestScore => {
                candidates.truncate(config.max_accepted_degree as usize);
                candidates
            }
        };

        self.replace_semantic_edges_for(node_id, accepted)
    }

    /// Rescores every node pair in the graph and replaces the full
    /// semantic edge set. `O(n^2)` pair scoring runs in parallel over
    /// `rayon`, as the teacher's `ParallelIndexer::index_batch` does for
    /// document indexing.
    pub fn rescore_graph(&self) -> Result<GraphRescoreReport> {
        let nodes = self.all_nodes();
        log::info!("rescoring {} nodes", nodes.len());
        let ctx = TagIdfContext::build(&nodes);

        let mut pairs = Vec::with_capacity(nodes.len() * nodes.len() / 2);
        for i in 0..nodes.len() {
            for j in (i + 1)..nodes.len() {
                pairs.push((i, j));
            }
        }

        let mut scored: Vec<Edge> = pairs
            .par_iter()
            .filter_map(|&(i, j)| self.score_pair(&nodes[i], &nodes[j], &ctx))
            .collect();

        let candidates = scored.len();

        scored.sort_by(|a, b| {
            b.score.total_cmp(&a.score).then_with(|| (a.source_id, a.target_id).cmp(&(b.source_id, b.target_id)))
        });

        let config = self.store.config().clone();
        let (accepted, dropped_by_degree_cap) = match config.degree_cap_policy {
            DegreeCapPolicy::Unlimited => (scored, 0),
            DegreeCapPolicy::DropLowestScore => self.cap_degrees(scored, config.max_accepted_degree),
        };

        let accepted_count = accepted.len();
        self.replace_all_semantic_edges(accepted)?;
        log::info!(
            "rescore done: {} candidates, {} accepted, {} dropped by degree cap",
            candidates, accepted_count, dropped_by_degree_cap
        );

        Ok(GraphRescoreReport { candidates, accepted: accepted_count, dropped_by_degree_cap })
    }

    fn all_nodes(&self) -> Vec<Node> {
        self.store.list_nodes(&NodeFilter { include_chunks: true, ..Default::default() })
    }

    fn score_pair(&self, a: &Node, b: &Node, ctx: &TagIdfContext) -> Option<Edge> {
        let pair = self.scorer.score(a, b, ctx);
        if !self.scorer.passes_threshold(&pair) {
            return None;
        }
        Some(Edge::normalized(
            a.id,
            b.id,
            pair.score,
            pair.semantic_score,
            pair.tag_score,
            pair.shared_tags,
            EdgeType::Semantic,
            serde_json::Value::Null,
        ))
    }

    /// Greedily keeps edges in score order (ties broken by the source/target
    /// node id pair) as long as neither endpoint has already reached `cap`,
    /// so no node's accepted degree exceeds it once every edge has been
    /// considered.
    fn cap_degrees(&self, sorted_desc: Vec<Edge>, cap: u32) -> (Vec<Edge>, usize) {
        use std::collections::HashMap;
        let mut degree: HashMap<NodeId, u32> = HashMap::new();
        let mut kept = Vec::new();
        let mut dropped = 0;

        for edge in sorted_desc {
            let source_degree = *degree.get(&edge.source_id).unwrap_or(&0);
            let target_degree = *degree.get(&edge.target_id).unwrap_or(&0);
            if source_degree < cap && target_degree < cap {
                *degree.entry(edge.source_id).or_insert(0) += 1;
                *degree.entry(edge.target_id).or_insert(0) += 1;
                kept.push(edge);
            } else {
                dropped += 1;
            }
        }

        (kept, dropped)
    }

    fn replace_semantic_edges_for(&self, node_id: NodeId, accepted: Vec<Edge>) -> Result<Vec<Edge>> {
        self.store.begin_batch();

        let existing = self.store.list_edges(&EdgeFilter {
            node_id: Some(node_id),
            edge_type: Some(EdgeType::Semantic),
        });
        let accepted_ids: std::collections::HashSet<_> = accepted.iter().map(|e| e.id).collect();

        for edge in &existing {
            if !accepted_ids.contains(&edge.id) {
                self.store.delete_edge_between(edge.source_id, edge.target_id)?;
                self.log_transition(edge, Some(EdgeStatus::Accepted), None)?;
            }
        }
        for edge in &accepted {
            let prev = existing.iter().find(|e| e.id == edge.id).map(|_| EdgeStatus::Accepted);
            self.store.upsert_edge(edge.clone())?;
            if prev.is_none() {
                self.log_transition(edge, None, Some(EdgeStatus::Accepted))?;
            }
        }

        self.store.end_batch()?;
        Ok(accepted)
    }

    fn replace_all_semantic_edges(&self, accepted: Vec<Edge>) -> Result<()> {
        self.store.begin_batch();

        let existing = self.store.list_edges(&EdgeFilter { node_id: None, edge_type: Some(EdgeType::Semantic) });
        let accepted_ids: std::collections::HashSet<_> = accepted.iter().map(|e| e.id).collect();

        for edge in &existing {
            if !accepted_ids.contains(&edge.id) {
                self.store.delete_edge_between(edge.source_id, edge.target_id)?;
                self.log_transition(edge, Some(EdgeStatus::Accepted), None)?;
            }
        }
        for edge in &accepted {
            let prev = existing.iter().find(|e| e.id == edge.id).map(|_| EdgeStatus::Accepted);
            self.store.upsert_edge(edge.clone())?;
            if prev.is_none() {
                self.log_transition(edge, None, Some(EdgeStatus::Accepted))?;
            }
        }

        self.store.end_batch()
    }

    /// Records an edge status transition, per spec §4.5 "append EdgeEvents
    /// for each transition"; undo (§5) replays these strictly LIFO. The
    /// payload carries the edge's state at the moment of transition so an
    /// undo can restore a deleted edge's prior score.
    fn log_transition(&self, edge: &Edge, prev: Option<EdgeStatus>, next: Option<EdgeStatus>) -> Result<()> {
        self.store.log_edge_event(EdgeEvent {
            id: 0,
            edge_id: edge.id,
            source_id: edge.source_id,
            target_id: edge.target_id,
            prev_status: prev,
            next_status: next,
            payload: serde_json::to_value(edge).unwrap_or(serde_json::Value::Null),
            created_at: self.store.now(),
            undone: false,
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::{Config, DegreeCapPolicy};
    use crate::embedding::provider::l2_normalize;

    fn open_store(max_accepted_degree: u32) -> (tempfile::TempDir, Store) {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.db_path = dir.path().to_path_buf();
        config.semantic_threshold = 0.1;
        config.max_accepted_degree = max_accepted_degree;
        config.degree_cap_policy = if max_accepted_degree == 0 {
            DegreeCapPolicy::Unlimited
        } else {
            DegreeCapPolicy::DropLowestScore
        };
        let store = Store::open(&config).unwrap();
        (dir, store)
    }

    fn node_with_embedding(title: &str, mut embedding: Vec<f32>) -> Node {
        l2_normalize(&mut embedding);
        let mut node = Node::new(title.into(), "body".into());
        node.embedding = Some(embedding);
        node
    }

    #[test]
    fn rescore_node_links_similar_nodes_above_threshold() {
        let (_dir, store) = open_store(0);
        let a = node_with_embedding("A", vec![1.0, 0.0, 0.0]);
        let b = node_with_embedding("B", vec![0.9, 0.1, 0.0]);
        let c = node_with_embedding("C", vec![0.0, 0.0, 1.0]);
        let (a_id, b_id, c_id) = (a.id, b.id, c.id);
        store.insert_node(a).unwrap();
        store.insert_node(b).unwrap();
        store.insert_node(c).unwrap();

        let linker = Linker::new(&store, EdgeScorer::new(0.5, 0.3));
        let edges = linker.rescore_node(a_id).unwrap();

        assert_eq!(edges.len(), 1);
        assert!(edges[0].touches(b_id));
        assert!(!edges[0].touches(c_id));
    }

    #[test]
    fn rescore_graph_respects_degree_cap() {
        let (_dir, store) = open_store(1);
        let hub = node_with_embedding("Hub", vec![1.0, 0.0]);
        let near = node_with_embedding("Near", vec![0.99, 0.01]);
        let far = node_with_embedding("Far", vec![0.9, 0.1]);
        let hub_id = hub.id;
        store.insert_node(hub).unwrap();
        store.insert_node(near).unwrap();
        store.insert_node(far).unwrap();

        let linker = Linker::new(&store, EdgeScorer::new(0.5, 0.3));
        let report = linker.rescore_graph().unwrap();

        assert_eq!(store.get_node(hub_id).unwrap().accepted_degree, 1);
        assert!(report.dropped_by_degree_cap >= 1);
    }
}
