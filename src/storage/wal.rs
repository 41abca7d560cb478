//! Write-ahead log for durability, generalized from the teacher's
//! single-document `Operation` enum to the seven Forest entities.
//!
//! Every top-level `Store` mutation is appended here before the in-memory
//! tables are updated (spec §4.1: "each top-level operation persists
//! before returning").

use std::fs::{File, OpenOptions};
use std::io::{Read, Write};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::error::Result;
use crate::core::id::{EdgeId, NodeId};
use crate::core::types::{Document, DocumentChunk, Edge, EdgeEvent, KvEntry, Node};
use crate::storage::layout::StorageLayout;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Operation {
    UpsertNode(Box<Node>),
    DeleteNode(NodeId),
    UpsertEdge(Box<Edge>),
    DeleteEdge(EdgeId),
    SyncNodeTags(NodeId, Vec<String>),
    LogEdgeEvent(Box<EdgeEvent>),
    MarkEdgeEventUndone(u64),
    PutKv(KvEntry),
    UpsertDocument(Box<Document>),
    UpsertChunk(Box<DocumentChunk>),
    DeleteDocument(NodeId),
    Commit,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalEntry {
    pub sequence: u64,
    pub operation: Operation,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy)]
pub enum SyncMode {
    Immediate,
    Batch,
}

pub struct Wal {
    pub file: File,
    pub position: u64,
    pub sync_mode: SyncMode,
    pub sequence: u64,
}

impl Wal {
    pub fn open(storage: &StorageLayout, sequence: u64) -> Result<Self> {
        let path = storage.wal_path(sequence);
        let file = OpenOptions::new().create(true).append(true).open(path)?;

        Ok(Wal {
            file,
            position: 0,
            sync_mode: SyncMode::Batch,
            sequence,
        })
    }

    pub fn append(&mut self, operation: Operation) -> Result<()> {
        let entry = WalEntry {
            sequence: self.sequence,
            operation,
            timestamp: Utc::now(),
        };

        let data = bincode::serialize(&entry)?;
        let len = data.len() as u32;
        let mut frame = Vec::with_capacity(4 + 4 + data.len());
        frame.extend_from_slice(&len.to_le_bytes());
        let checksum = crc32fast::hash(&data);
        frame.extend_from_slice(&checksum.to_le_bytes());
        frame.extend_from_slice(&data);

        self.file.write_all(&frame)?;
        self.sequence += 1;
        self.position += frame.len() as u64;

        match self.sync_mode {
            SyncMode::Immediate => self.file.sync_all()?,
            SyncMode::Batch if self.position % (256 * 1024) == 0 => self.file.sync_all()?,
            _ => {}
        }

        Ok(())
    }

    pub fn sync(&mut self) -> Result<()> {
        self.file.sync_all()?;
        Ok(())
    }

    /// Reads every entry currently in this WAL file from the start.
    pub fn read_all(storage: &StorageLayout, sequence: u64) -> Result<Vec<WalEntry>> {
        let path = storage.wal_path(sequence);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let mut file = File::open(path)?;
        let mut entries = Vec::new();

        loop {
            let mut len_buf = [0u8; 4];
            if file.read_exact(&mut len_buf).is_err() {
                break;
            }
            let len = u32::from_le_bytes(len_buf) as usize;

            let mut checksum_buf = [0u8; 4];
            if file.read_exact(&mut checksum_buf).is_err() {
                break;
            }
            let expected_checksum = u32::from_le_bytes(checksum_buf);

            let mut data = vec![0u8; len];
            if file.read_exact(&mut data).is_err() {
                break; // truncated tail write, stop replay here
            }
            if crc32fast::hash(&data) != expected_checksum {
                break; // corrupt tail frame, stop replay here
            }

            let entry: WalEntry = bincode::deserialize(&data)?;
            entries.push(entry);
        }

        Ok(entries)
    }
}
