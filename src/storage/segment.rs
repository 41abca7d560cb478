//! Full-snapshot segment persistence, simplified from the teacher's
//! LSM-style `storage::segment::Segment` (Forest has no segment merging:
//! a segment is a single point-in-time dump of every table, written at
//! checkpoint time).

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::error::Result;
use crate::core::types::{Document, DocumentChunk, Edge, EdgeEvent, KvEntry, Node};
use crate::storage::layout::StorageLayout;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentMetadata {
    pub id: u64,
    pub created_at: DateTime<Utc>,
    pub node_count: usize,
    pub edge_count: usize,
}

/// Everything a snapshot needs to reconstruct `Store`'s in-memory tables.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SegmentData {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
    pub documents: Vec<Document>,
    pub chunks: Vec<DocumentChunk>,
    pub edge_events: Vec<EdgeEvent>,
    pub kv: Vec<KvEntry>,
    pub next_edge_event_id: u64,
}

pub struct Segment;

impl Segment {
    pub fn write(storage: &StorageLayout, id: u64, data: &SegmentData) -> Result<SegmentMetadata> {
        let path = storage.segment_path(id);
        let file = File::create(&path)?;
        let mut writer = BufWriter::new(file);
        bincode::serialize_into(&mut writer, data)?;
        writer.flush()?;

        Ok(SegmentMetadata {
            id,
            created_at: Utc::now(),
            node_count: data.nodes.len(),
            edge_count: data.edges.len(),
        })
    }

    pub fn read(storage: &StorageLayout, id: u64) -> Result<Option<SegmentData>> {
        let path = storage.segment_path(id);
        if !path.exists() {
            return Ok(None);
        }
        let file = File::open(&path)?;
        let reader = BufReader::new(file);
        let data: SegmentData = bincode::deserialize_from(reader)?;
        Ok(Some(data))
    }

    /// Highest segment id present on disk, if any.
    pub fn latest_id(storage: &StorageLayout) -> Result<Option<u64>> {
        let mut latest = None;
        for entry in std::fs::read_dir(&storage.segments_dir)? {
            let entry = entry?;
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if let Some(stem) = name.strip_suffix(".seg") {
                if let Ok(id) = stem.parse::<u64>() {
                    latest = Some(latest.map_or(id, |l: u64| l.max(id)));
                }
            }
        }
        Ok(latest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_then_read_roundtrips() {
        let dir = tempfile::tempdir().unwrap();
        let storage = StorageLayout::new(dir.path().to_path_buf()).unwrap();
        let mut data = SegmentData::default();
        data.nodes.push(Node::new("Title".into(), "Body".into()));

        Segment::write(&storage, 0, &data).unwrap();
        let read_back = Segment::read(&storage, 0).unwrap().unwrap();
        assert_eq!(read_back.nodes.len(), 1);
        assert_eq!(Segment::latest_id(&storage).unwrap(), Some(0));
    }

    #[test]
    fn missing_segment_reads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let storage = StorageLayout::new(dir.path().to_path_buf()).unwrap();
        assert!(Segment::read(&storage, 7).unwrap().is_none());
    }
}
