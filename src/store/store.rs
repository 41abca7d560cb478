//! The single-writer, many-reader table store (spec §4.1), wiring together
//! `storage::{Wal, Segment, RecoveryManager, FileLock}` and
//! `mvcc::MvccController` the way the teacher's `core::database::Database`
//! wires together its writer, WAL and reader pool. Forest has exactly one
//! writer per open store, so the teacher's optimistic-concurrency
//! `Transaction`/`TransactionManager` pair collapses to a depth counter:
//! nested `beginBatch` calls are no-ops, and only the outermost `endBatch`
//! appends the WAL commit marker and publishes a new snapshot.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use crate::core::config::Config;
use crate::core::error::{Error, Result};
use crate::core::id::{edge_id_for_pair, EdgeId, NodeId};
use crate::core::types::{
    Document, DocumentChunk, Edge, EdgeEvent, EdgeFilter, EdgeStatus, KvEntry, Node, NodeFilter,
    TagIdf,
};
use crate::mvcc::controller::{MvccController, Snapshot};
use crate::scoring::tag_idf::TagIdfContext;
use crate::storage::checkpoint::RecoveryManager;
use crate::storage::file_lock::FileLock;
use crate::storage::layout::StorageLayout;
use crate::storage::segment::{Segment, SegmentData};
use crate::storage::wal::{Operation, Wal};

/// In-memory working tables, kept in sync with the WAL on every write and
/// rebuilt from the latest segment plus replay on open.
#[derive(Debug, Clone, Default)]
struct Live {
    nodes: HashMap<NodeId, Node>,
    edges: HashMap<EdgeId, Edge>,
    documents: HashMap<NodeId, Document>,
    chunks: HashMap<(NodeId, String), DocumentChunk>,
    edge_events: Vec<EdgeEvent>,
    kv: HashMap<String, serde_json::Value>,
    next_edge_event_id: u64,
}

impl Live {
    fn from_segment_data(data: SegmentData) -> Self {
        Live {
            nodes: data.nodes.into_iter().map(|n| (n.id, n)).collect(),
            edges: data.edges.into_iter().map(|e| (e.id, e)).collect(),
            documents: data.documents.into_iter().map(|d| (d.id, d)).collect(),
            chunks: data
                .chunks
                .into_iter()
                .map(|c| ((c.document_id, c.segment_id.clone()), c))
                .collect(),
            edge_events: data.edge_events,
            kv: data.kv.into_iter().map(|e| (e.key, e.value)).collect(),
            next_edge_event_id: data.next_edge_event_id,
        }
    }

    fn to_segment_data(&self) -> SegmentData {
        SegmentData {
            nodes: self.nodes.values().cloned().collect(),
            edges: self.edges.values().cloned().collect(),
            documents: self.documents.values().cloned().collect(),
            chunks: self.chunks.values().cloned().collect(),
            edge_events: self.edge_events.clone(),
            kv: self
                .kv
                .iter()
                .map(|(key, value)| KvEntry { key: key.clone(), value: value.clone() })
                .collect(),
            next_edge_event_id: self.next_edge_event_id,
        }
    }
}

struct WriterState {
    live: Live,
    wal: Wal,
    batch_depth: u32,
    segment_id: u64,
}

pub struct Store {
    storage: StorageLayout,
    _lock: FileLock,
    mvcc: MvccController,
    writer: Mutex<WriterState>,
    config: Config,
}

#[derive(Debug, Clone, Default)]
pub struct NodePatch {
    pub title: Option<String>,
    pub body: Option<String>,
    pub tags: Option<BTreeSet<String>>,
    pub token_counts: Option<BTreeMap<String, u32>>,
    pub embedding: Option<Option<Vec<f32>>>,
    pub metadata: Option<serde_json::Value>,
    pub approximate_scored: Option<bool>,
    pub chunk_order: Option<Option<u32>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DegreeRepairReport {
    pub nodes_checked: usize,
    pub nodes_repaired: usize,
}

impl Store {
    /// Opens (and, on first use, creates) the store rooted at
    /// `config.db_path`, recovering from the latest segment plus any WAL
    /// tail, per spec §4.1's open/recover contract.
    pub fn open(config: &Config) -> Result<Self> {
        let storage = StorageLayout::new(config.db_path.clone())?;
        let lock = FileLock::acquire(&storage)?;

        let latest_segment = Segment::latest_id(&storage)?;
        let wal_sequence = latest_segment.map(|id| id + 1).unwrap_or(0);
        let segment_id = latest_segment.unwrap_or(0);

        let data = RecoveryManager::recover(&storage, wal_sequence)?;
        let wal = Wal::open(&storage, wal_sequence)?;

        let mvcc = MvccController::new();
        mvcc.publish(Arc::new(data.clone()));

        let writer = Mutex::new(WriterState {
            live: Live::from_segment_data(data),
            wal,
            batch_depth: 0,
            segment_id,
        });

        Ok(Store { storage, _lock: lock, mvcc, writer, config: config.clone() })
    }

    /// A consistent, point-in-time view of every table. Never blocks on an
    /// in-progress write (spec §4.1, §5).
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.mvcc.current_snapshot()
    }

    fn finish(&self, writer: &mut WriterState) -> Result<()> {
        if writer.batch_depth == 0 {
            writer.wal.append(Operation::Commit)?;
            writer.wal.sync()?;
            self.mvcc.publish(Arc::new(writer.live.to_segment_data()));
        }
        Ok(())
    }

    // -- nodes ---------------------------------------------------------

    pub fn insert_node(&self, node: Node) -> Result<Node> {
        let mut writer = self.writer.lock();
        writer.wal.append(Operation::UpsertNode(Box::new(node.clone())))?;
        writer.live.nodes.insert(node.id, node.clone());
        self.finish(&mut writer)?;
        Ok(node)
    }

    pub fn update_node(&self, id: NodeId, patch: NodePatch) -> Result<Node> {
        let mut writer = self.writer.lock();
        let mut node = writer
            .live
            .nodes
            .get(&id)
            .cloned()
            .ok_or_else(|| Error::not_found(format!("node {} not found", id)))?;

        if let Some(title) = patch.title {
            node.title = title;
        }
        if let Some(body) = patch.body {
            node.body = body;
        }
        if let Some(tags) = patch.tags {
            node.tags = tags;
        }
        if let Some(token_counts) = patch.token_counts {
            node.token_counts = token_counts;
        }
        if let Some(embedding) = patch.embedding {
            node.embedding = embedding;
        }
        if let Some(metadata) = patch.metadata {
            node.metadata = metadata;
        }
        if let Some(approximate_scored) = patch.approximate_scored {
            node.approximate_scored = approximate_scored;
        }
        if let Some(chunk_order) = patch.chunk_order {
            node.chunk_order = chunk_order;
        }
        node.updated_at = Utc::now();

        writer.wal.append(Operation::UpsertNode(Box::new(node.clone())))?;
        writer.live.nodes.insert(id, node.clone());
        self.finish(&mut writer)?;
        Ok(node)
    }

    /// Deletes a node and cascades to every edge touching it, decrementing
    /// `accepted_degree` on the surviving peers, per spec §4.1.
    pub fn delete_node(&self, id: NodeId) -> Result<()> {
        let mut writer = self.writer.lock();
        if !writer.live.nodes.contains_key(&id) {
            return Err(Error::not_found(format!("node {} not found", id)));
        }

        let touching: Vec<Edge> =
            writer.live.edges.values().filter(|e| e.touches(id)).cloned().collect();

        for edge in &touching {
            writer.wal.append(Operation::DeleteEdge(edge.id))?;
            writer.live.edges.remove(&edge.id);

            if edge.status == EdgeStatus::Accepted {
                if let Some(peer_id) = edge.other(id) {
                    if let Some(peer) = writer.live.nodes.get_mut(&peer_id) {
                        peer.accepted_degree = peer.accepted_degree.saturating_sub(1);
                        peer.updated_at = Utc::now();
                        let peer_clone = peer.clone();
                        writer.wal.append(Operation::UpsertNode(Box::new(peer_clone)))?;
                    }
                }
            }
        }

        writer.wal.append(Operation::DeleteNode(id))?;
        writer.live.nodes.remove(&id);
        self.finish(&mut writer)?;
        Ok(())
    }

    pub fn list_nodes(&self, filter: &NodeFilter) -> Vec<Node> {
        let writer = self.writer.lock();
        let mut nodes: Vec<Node> = writer
            .live
            .nodes
            .values()
            .filter(|n| filter.include_chunks || !n.is_chunk)
            .filter(|n| match &filter.tags {
                Some(wanted) => wanted.is_subset(&n.tags),
                None => true,
            })
            .filter(|n| filter.since.is_none_or(|since| n.updated_at >= since))
            .filter(|n| filter.until.is_none_or(|until| n.updated_at <= until))
            .cloned()
            .collect();

        nodes.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        nodes
    }

    pub fn get_nodes_by_ids(&self, ids: &[NodeId]) -> Vec<Node> {
        let writer = self.writer.lock();
        ids.iter().filter_map(|id| writer.live.nodes.get(id).cloned()).collect()
    }

    pub fn get_node(&self, id: NodeId) -> Option<Node> {
        self.writer.lock().live.nodes.get(&id).cloned()
    }

    pub fn bulk_sync_node_tags(&self, pairs: Vec<(NodeId, Vec<String>)>) -> Result<()> {
        let mut writer = self.writer.lock();
        for (id, tags) in pairs {
            if !writer.live.nodes.contains_key(&id) {
                continue; // stale reference: skip rather than fail the whole batch
            }
            writer.wal.append(Operation::SyncNodeTags(id, tags.clone()))?;
            if let Some(node) = writer.live.nodes.get_mut(&id) {
                node.tags = tags.into_iter().collect();
                node.updated_at = Utc::now();
            }
        }
        self.finish(&mut writer)?;
        Ok(())
    }

    /// Recomputes tag document frequencies and inverse document
    /// frequencies over the live node set. A read-only derivation: it
    /// does not persist anything, since `TagIdf` is recomputed on demand
    /// by the linker rather than stored.
    pub fn rebuild_tag_idf(&self) -> Vec<TagIdf> {
        let writer = self.writer.lock();
        let nodes: Vec<Node> = writer.live.nodes.values().cloned().collect();
        drop(writer);

        let ctx = TagIdfContext::build(&nodes);
        let mut doc_frequency: BTreeMap<String, u32> = BTreeMap::new();
        for node in &nodes {
            for tag in &node.tags {
                *doc_frequency.entry(tag.clone()).or_insert(0) += 1;
            }
        }

        doc_frequency
            .into_iter()
            .map(|(tag, frequency)| {
                let idf = ctx.idf_of(&tag);
                TagIdf { tag, doc_frequency: frequency, idf }
            })
            .collect()
    }

    // -- edges -----------------------------------------------------------

    /// Inserts or replaces an edge. Endpoints are normalized so `source_id
    /// < target_id`; self-loops are rejected outright (spec §4.1, §4.4).
    pub fn upsert_edge(&self, edge: Edge) -> Result<Edge> {
        if edge.source_id == edge.target_id {
            return Err(Error::conflict("edge endpoints must differ"));
        }

        let mut writer = self.writer.lock();
        let (source_id, target_id) =
            if edge.source_id < edge.target_id { (edge.source_id, edge.target_id) } else { (edge.target_id, edge.source_id) };
        let id = edge_id_for_pair(source_id, target_id);

        let mut edge = edge;
        edge.id = id;
        edge.source_id = source_id;
        edge.target_id = target_id;
        edge.updated_at = Utc::now();

        let previous_status = writer.live.edges.get(&id).map(|e| e.status);
        apply_degree_delta(&mut writer, source_id, target_id, previous_status, Some(edge.status))?;

        writer.wal.append(Operation::UpsertEdge(Box::new(edge.clone())))?;
        writer.live.edges.insert(id, edge.clone());
        self.finish(&mut writer)?;
        Ok(edge)
    }

    pub fn delete_edge_between(&self, a: NodeId, b: NodeId) -> Result<()> {
        let (source_id, target_id) = if a < b { (a, b) } else { (b, a) };
        let id = edge_id_for_pair(source_id, target_id);

        let mut writer = self.writer.lock();
        let edge = writer
            .live
            .edges
            .get(&id)
            .cloned()
            .ok_or_else(|| Error::not_found(format!("no edge between {} and {}", a, b)))?;

        apply_degree_delta(&mut writer, source_id, target_id, Some(edge.status), None)?;
        writer.wal.append(Operation::DeleteEdge(id))?;
        writer.live.edges.remove(&id);
        self.finish(&mut writer)?;
        Ok(())
    }

    pub fn list_edges(&self, filter: &EdgeFilter) -> Vec<Edge> {
        let writer = self.writer.lock();
        writer
            .live
            .edges
            .values()
            .filter(|e| filter.node_id.is_none_or(|id| e.touches(id)))
            .filter(|e| filter.edge_type.is_none_or(|t| e.edge_type == t))
            .cloned()
            .collect()
    }

    pub fn get_edge(&self, id: EdgeId) -> Option<Edge> {
        self.writer.lock().live.edges.get(&id).cloned()
    }

    /// Drops every edge whose endpoints are equal. These should never be
    /// created by `upsert_edge`, but can arise from bulk imports; this is
    /// the repair path, not the write path.
    pub fn delete_self_loop_edges(&self) -> Result<usize> {
        let mut writer = self.writer.lock();
        let loops: Vec<EdgeId> = writer
            .live
            .edges
            .values()
            .filter(|e| e.source_id == e.target_id)
            .map(|e| e.id)
            .collect();

        for id in &loops {
            writer.wal.append(Operation::DeleteEdge(*id))?;
            writer.live.edges.remove(id);
        }
        if !loops.is_empty() {
            self.finish(&mut writer)?;
        }
        Ok(loops.len())
    }

    /// Recounts `accepted_degree` from the accepted edge set and corrects
    /// any node whose stored counter had drifted.
    pub fn rebuild_accepted_degree_counters(&self) -> Result<DegreeRepairReport> {
        let mut writer = self.writer.lock();

        let mut actual: HashMap<NodeId, u32> = HashMap::new();
        for edge in writer.live.edges.values() {
            if edge.status == EdgeStatus::Accepted {
                *actual.entry(edge.source_id).or_insert(0) += 1;
                *actual.entry(edge.target_id).or_insert(0) += 1;
            }
        }

        let node_ids: Vec<NodeId> = writer.live.nodes.keys().cloned().collect();
        let nodes_checked = node_ids.len();
        let mut nodes_repaired = 0;

        for id in node_ids {
            let correct = actual.get(&id).copied().unwrap_or(0);
            let node = writer.live.nodes.get(&id).expect("id came from this map");
            if node.accepted_degree != correct {
                let mut updated = node.clone();
                updated.accepted_degree = correct;
                updated.updated_at = Utc::now();
                writer.wal.append(Operation::UpsertNode(Box::new(updated.clone())))?;
                writer.live.nodes.insert(id, updated);
                nodes_repaired += 1;
            }
        }

        if nodes_repaired > 0 {
            self.finish(&mut writer)?;
        }

        Ok(DegreeRepairReport { nodes_checked, nodes_repaired })
    }

    // -- edge events -------------------------------------------------------

    pub fn log_edge_event(&self, mut event: EdgeEvent) -> Result<EdgeEvent> {
        let mut writer = self.writer.lock();
        event.id = writer.live.next_edge_event_id;
        writer.live.next_edge_event_id += 1;

        writer.wal.append(Operation::LogEdgeEvent(Box::new(event.clone())))?;
        writer.live.edge_events.push(event.clone());
        self.finish(&mut writer)?;
        Ok(event)
    }

    pub fn get_last_edge_event_for_pair(&self, a: NodeId, b: NodeId) -> Option<EdgeEvent> {
        let (source_id, target_id) = if a < b { (a, b) } else { (b, a) };
        let edge_id = edge_id_for_pair(source_id, target_id);
        let writer = self.writer.lock();
        writer
            .live
            .edge_events
            .iter()
            .filter(|e| e.edge_id == edge_id)
            .max_by_key(|e| e.id)
            .cloned()
    }

    pub fn mark_edge_event_undone(&self, id: u64) -> Result<()> {
        let mut writer = self.writer.lock();
        if !writer.live.edge_events.iter().any(|e| e.id == id) {
            return Err(Error::not_found(format!("edge event {} not found", id)));
        }
        writer.wal.append(Operation::MarkEdgeEventUndone(id))?;
        if let Some(event) = writer.live.edge_events.iter_mut().find(|e| e.id == id) {
            event.undone = true;
        }
        self.finish(&mut writer)?;
        Ok(())
    }

    // -- documents and chunks ----------------------------------------------

    pub fn upsert_document(&self, document: Document) -> Result<Document> {
        let mut writer = self.writer.lock();
        writer.wal.append(Operation::UpsertDocument(Box::new(document.clone())))?;
        writer.live.documents.insert(document.id, document.clone());
        self.finish(&mut writer)?;
        Ok(document)
    }

    pub fn get_document(&self, id: NodeId) -> Option<Document> {
        self.writer.lock().live.documents.get(&id).cloned()
    }

    pub fn delete_document(&self, id: NodeId) -> Result<()> {
        let mut writer = self.writer.lock();
        writer.wal.append(Operation::DeleteDocument(id))?;
        writer.live.documents.remove(&id);
        writer.live.chunks.retain(|(doc_id, _), _| *doc_id != id);
        self.finish(&mut writer)?;
        Ok(())
    }

    pub fn upsert_chunk(&self, chunk: DocumentChunk) -> Result<DocumentChunk> {
        let mut writer = self.writer.lock();
        let key = (chunk.document_id, chunk.segment_id.clone());
        writer.wal.append(Operation::UpsertChunk(Box::new(chunk.clone())))?;
        writer.live.chunks.insert(key, chunk.clone());
        self.finish(&mut writer)?;
        Ok(chunk)
    }

    pub fn list_chunks(&self, document_id: NodeId) -> Vec<DocumentChunk> {
        let mut chunks: Vec<DocumentChunk> = self
            .writer
            .lock()
            .live
            .chunks
            .values()
            .filter(|c| c.document_id == document_id)
            .cloned()
            .collect();
        chunks.sort_by_key(|c| c.chunk_order);
        chunks
    }

    // -- key-value metadata --------------------------------------------

    pub fn put_kv(&self, key: impl Into<String>, value: serde_json::Value) -> Result<()> {
        let mut writer = self.writer.lock();
        let key = key.into();
        writer
            .wal
            .append(Operation::PutKv(KvEntry { key: key.clone(), value: value.clone() }))?;
        writer.live.kv.insert(key, value);
        self.finish(&mut writer)?;
        Ok(())
    }

    pub fn get_kv(&self, key: &str) -> Option<serde_json::Value> {
        self.writer.lock().live.kv.get(key).cloned()
    }

    // -- batches -----------------------------------------------------------

    /// Starts (or joins, if already inside one) a batch. Writes made while
    /// a batch is open only become visible to readers, and only persist
    /// their commit marker, when the outermost `end_batch` returns.
    pub fn begin_batch(&self) {
        self.writer.lock().batch_depth += 1;
    }

    pub fn end_batch(&self) -> Result<()> {
        let mut writer = self.writer.lock();
        if writer.batch_depth == 0 {
            return Err(Error::conflict("end_batch called without a matching begin_batch"));
        }
        writer.batch_depth -= 1;
        self.finish(&mut writer)
    }

    // -- maintenance ---------------------------------------------------

    /// Writes the current table state as a new segment and rotates onto a
    /// fresh WAL file, following the teacher's checkpoint-then-rotate
    /// pattern in `storage::checkpoint::RecoveryManager::checkpoint`.
    pub fn checkpoint(&self) -> Result<()> {
        let mut writer = self.writer.lock();
        let next_segment_id = writer.segment_id + 1;
        let data = writer.live.to_segment_data();
        let new_wal = RecoveryManager::checkpoint(&self.storage, next_segment_id, &data)?;
        writer.wal = new_wal;
        writer.segment_id = next_segment_id;
        Ok(())
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn node_count(&self) -> usize {
        self.writer.lock().live.nodes.len()
    }

    pub fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Adjusts `accepted_degree` on both endpoints when an edge's status
/// transitions in or out of `Accepted` (insert, update, or delete).
fn apply_degree_delta(
    writer: &mut WriterState,
    source_id: NodeId,
    target_id: NodeId,
    previous: Option<EdgeStatus>,
    next: Option<EdgeStatus>,
) -> Result<()> {
    let was_accepted = previous == Some(EdgeStatus::Accepted);
    let now_accepted = next == Some(EdgeStatus::Accepted);

    if was_accepted == now_accepted {
        return Ok(());
    }

    let delta: i64 = if now_accepted { 1 } else { -1 };
    for id in [source_id, target_id] {
        if let Some(node) = writer.live.nodes.get_mut(&id) {
            node.accepted_degree = (node.accepted_degree as i64 + delta).max(0) as u32;
            node.updated_at = Utc::now();
            let clone = node.clone();
            writer.wal.append(Operation::UpsertNode(Box::new(clone)))?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::EdgeType;

    fn open_store() -> (tempfile::TempDir, Store) {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.db_path = dir.path().to_path_buf();
        let store = Store::open(&config).unwrap();
        (dir, store)
    }

    #[test]
    fn insert_and_fetch_node_roundtrips() {
        let (_dir, store) = open_store();
        let node = Node::new("Title".into(), "Body".into());
        let id = node.id;
        store.insert_node(node).unwrap();

        let fetched = store.get_node(id).unwrap();
        assert_eq!(fetched.title, "Title");
    }

    #[test]
    fn upsert_edge_increments_accepted_degree_on_both_endpoints() {
        let (_dir, store) = open_store();
        let a = Node::new("A".into(), "a".into());
        let b = Node::new("B".into(), "b".into());
        let (a_id, b_id) = (a.id, b.id);
        store.insert_node(a).unwrap();
        store.insert_node(b).unwrap();

        let edge = Edge::normalized(
            a_id,
            b_id,
            0.9,
            Some(0.9),
            None,
            vec![],
            EdgeType::Semantic,
            serde_json::Value::Null,
        );
        store.upsert_edge(edge).unwrap();

        assert_eq!(store.get_node(a_id).unwrap().accepted_degree, 1);
        assert_eq!(store.get_node(b_id).unwrap().accepted_degree, 1);
    }

    #[test]
    fn upsert_edge_rejects_self_loop() {
        let (_dir, store) = open_store();
        let node = Node::new("A".into(), "a".into());
        let id = node.id;
        store.insert_node(node).unwrap();

        let edge = Edge::normalized(
            id,
            id,
            0.9,
            Some(0.9),
            None,
            vec![],
            EdgeType::Semantic,
            serde_json::Value::Null,
        );
        assert!(store.upsert_edge(edge).is_err());
    }

    #[test]
    fn delete_node_cascades_edges_and_decrements_peer_degree() {
        let (_dir, store) = open_store();
        let a = Node::new("A".into(), "a".into());
        let b = Node::new("B".into(), "b".into());
        let (a_id, b_id) = (a.id, b.id);
        store.insert_node(a).unwrap();
        store.insert_node(b).unwrap();
        let edge = Edge::normalized(
            a_id,
            b_id,
            0.9,
            Some(0.9),
            None,
            vec![],
            EdgeType::Semantic,
            serde_json::Value::Null,
        );
        store.upsert_edge(edge).unwrap();

        store.delete_node(a_id).unwrap();
        assert!(store.get_node(a_id).is_none());
        assert_eq!(store.get_node(b_id).unwrap().accepted_degree, 0);
        assert!(store.list_edges(&EdgeFilter::default()).is_empty());
    }

    #[test]
    fn nested_batches_defer_commit_to_outermost_end() {
        let (_dir, store) = open_store();
        store.begin_batch();
        store.begin_batch();
        let node = Node::new("A".into(), "a".into());
        store.insert_node(node).unwrap();
        assert_eq!(store.writer.lock().batch_depth, 2);

        store.end_batch().unwrap();
        assert_eq!(store.writer.lock().batch_depth, 1);
        store.end_batch().unwrap();
        assert_eq!(store.writer.lock().batch_depth, 0);
    }

    #[test]
    fn end_batch_without_begin_is_an_error() {
        let (_dir, store) = open_store();
        assert!(store.end_batch().is_err());
    }

    #[test]
    fn rebuild_accepted_degree_counters_repairs_drift() {
        let (_dir, store) = open_store();
        let node = Node::new("A".into(), "a".into());
        let id = node.id;
        store.insert_node(node).unwrap();
        store
            .update_node(id, NodePatch { approximate_scored: Some(true), ..Default::default() })
            .unwrap();
        {
            let mut writer = store.writer.lock();
            writer.live.nodes.get_mut(&id).unwrap().accepted_degree = 7;
        }

        let report = store.rebuild_accepted_degree_counters().unwrap();
        assert_eq!(report.nodes_repaired, 1);
        assert_eq!(store.get_node(id).unwrap().accepted_degree, 0);
    }

    #[test]
    fn recovers_state_after_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.db_path = dir.path().to_path_buf();

        let id;
        {
            let store = Store::open(&config).unwrap();
            let node = Node::new("Persisted".into(), "Body".into());
            id = node.id;
            store.insert_node(node).unwrap();
        }

        let reopened = Store::open(&config).unwrap();
        assert_eq!(reopened.get_node(id).unwrap().title, "Persisted");
    }
}
