//! Entity types for the seven persisted tables (spec §3), following the
//! teacher's plain-serde-struct convention in `core::types`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::core::id::{EdgeId, NodeId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EdgeType {
    Semantic,
    ParentChild,
    Sequential,
    Manual,
    Bridge,
}

impl EdgeType {
    /// Structural edges are never subject to the semantic/tag thresholds.
    pub fn is_structural(self) -> bool {
        !matches!(self, EdgeType::Semantic)
    }
}

/// Kept tri-valued for backward-compatible schema (spec §9, Open Question
/// 2); the engine's own write paths only ever produce `Accepted`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EdgeStatus {
    Accepted,
    Suggested,
    Discarded,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub title: String,
    pub body: String,
    /// Sorted, deduplicated, lowercased.
    pub tags: BTreeSet<String>,
    pub token_counts: BTreeMap<String, u32>,
    pub embedding: Option<Vec<f32>>,
    pub parent_document_id: Option<NodeId>,
    pub is_chunk: bool,
    pub chunk_order: Option<u32>,
    pub accepted_degree: u32,
    pub approximate_scored: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub metadata: serde_json::Value,
}

impl Node {
    pub fn new(title: String, body: String) -> Self {
        let now = Utc::now();
        Node {
            id: NodeId::new(),
            title,
            body,
            tags: BTreeSet::new(),
            token_counts: BTreeMap::new(),
            embedding: None,
            parent_document_id: None,
            is_chunk: false,
            chunk_order: None,
            accepted_degree: 0,
            approximate_scored: false,
            created_at: now,
            updated_at: now,
            metadata: serde_json::Value::Null,
        }
    }

    pub fn has_embedding(&self) -> bool {
        self.embedding.is_some()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Edge {
    pub id: EdgeId,
    pub source_id: NodeId,
    pub target_id: NodeId,
    pub score: f32,
    pub semantic_score: Option<f32>,
    pub tag_score: Option<f32>,
    pub shared_tags: Vec<String>,
    pub edge_type: EdgeType,
    pub status: EdgeStatus,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Edge {
    /// Normalizes endpoint order (`source_id < target_id`) and derives the
    /// stable id, per spec §4.4 `normalizeEdgePair`.
    pub fn normalized(
        a: NodeId,
        b: NodeId,
        score: f32,
        semantic_score: Option<f32>,
        tag_score: Option<f32>,
        shared_tags: Vec<String>,
        edge_type: EdgeType,
        metadata: serde_json::Value,
    ) -> Self {
        let (source_id, target_id) = if a < b { (a, b) } else { (b, a) };
        let id = crate::core::id::edge_id_for_pair(source_id, target_id);
        let now = Utc::now();
        Edge {
            id,
            source_id,
            target_id,
            score,
            semantic_score,
            tag_score,
            shared_tags,
            edge_type,
            status: EdgeStatus::Accepted,
            metadata,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn touches(&self, node: NodeId) -> bool {
        self.source_id == node || self.target_id == node
    }

    pub fn other(&self, node: NodeId) -> Option<NodeId> {
        if self.source_id == node {
            Some(self.target_id)
        } else if self.target_id == node {
            Some(self.source_id)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeTag {
    pub node_id: NodeId,
    pub tag: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TagIdf {
    pub tag: String,
    pub doc_frequency: u32,
    pub idf: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub chunk_strategy: String,
    pub max_tokens: Option<u32>,
    pub overlap: Option<u32>,
    pub chunk_count: u32,
    pub source: String,
    pub last_edited_at: Option<DateTime<Utc>>,
    pub last_edited_node_id: Option<NodeId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: NodeId,
    pub title: String,
    pub body: String,
    pub metadata: DocumentMetadata,
    pub version: u64,
    pub root_node_id: Option<NodeId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentChunk {
    pub document_id: NodeId,
    pub segment_id: String,
    pub node_id: NodeId,
    pub offset: u64,
    pub length: u64,
    pub chunk_order: u32,
    /// SHA-256 of the normalized segment body.
    pub checksum: [u8; 32],
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgeEvent {
    pub id: u64,
    pub edge_id: EdgeId,
    pub source_id: NodeId,
    pub target_id: NodeId,
    pub prev_status: Option<EdgeStatus>,
    pub next_status: Option<EdgeStatus>,
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub undone: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KvEntry {
    pub key: String,
    pub value: serde_json::Value,
}

/// Optional filter applied by `Store::list_nodes`.
#[derive(Debug, Clone, Default)]
pub struct NodeFilter {
    pub tags: Option<BTreeSet<String>>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub include_chunks: bool,
}

#[derive(Debug, Clone, Default)]
pub struct EdgeFilter {
    pub node_id: Option<NodeId>,
    pub edge_type: Option<EdgeType>,
}
