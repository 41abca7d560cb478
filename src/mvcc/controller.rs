//! Snapshot isolation for readers, adapted from the teacher's
//! `mvcc::controller::MVCCController`. Forest has a single writer and an
//! arbitrary number of concurrent readers (spec §4.1: "reads never block
//! on a write in progress"); each write publishes a fresh immutable
//! snapshot of the full table set instead of per-segment diffs.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use crate::storage::segment::SegmentData;

#[derive(Debug, Clone)]
pub struct Snapshot {
    pub version: u64,
    pub data: Arc<SegmentData>,
    pub timestamp: DateTime<Utc>,
}

impl Default for Snapshot {
    fn default() -> Self {
        Snapshot {
            version: 0,
            data: Arc::new(SegmentData::default()),
            timestamp: Utc::now(),
        }
    }
}

/// Keeps a short history of recent snapshots so a reader that started
/// before a write completed still sees a consistent view, per spec
/// §4.1's snapshot-isolated read guarantee.
pub struct MvccController {
    versions: RwLock<BTreeMap<u64, Arc<Snapshot>>>,
    current_version: AtomicU64,
    max_versions: usize,
}

impl MvccController {
    pub fn new() -> Self {
        MvccController {
            versions: RwLock::new(BTreeMap::new()),
            current_version: AtomicU64::new(0),
            max_versions: 32,
        }
    }

    /// Publishes a new table snapshot after a write commits. Readers that
    /// already hold an older snapshot keep seeing it until they re-fetch.
    pub fn publish(&self, data: Arc<SegmentData>) -> Arc<Snapshot> {
        let version = self.current_version.fetch_add(1, Ordering::SeqCst);
        let snapshot = Arc::new(Snapshot {
            version,
            data,
            timestamp: Utc::now(),
        });

        let mut versions = self.versions.write();
        versions.insert(version, snapshot.clone());
        self.gc_old_versions(&mut versions);

        snapshot
    }

    pub fn current_snapshot(&self) -> Arc<Snapshot> {
        let versions = self.versions.read();
        versions
            .iter()
            .next_back()
            .map(|(_, snapshot)| snapshot.clone())
            .unwrap_or_else(|| Arc::new(Snapshot::default()))
    }

    fn gc_old_versions(&self, versions: &mut BTreeMap<u64, Arc<Snapshot>>) {
        while versions.len() > self.max_versions {
            let oldest = *versions.keys().next().expect("checked len above");
            versions.remove(&oldest);
        }
    }
}

impl Default for MvccController {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publish_advances_current_snapshot() {
        let controller = MvccController::new();
        assert_eq!(controller.current_snapshot().version, 0);

        controller.publish(Arc::new(SegmentData::default()));
        let snapshot = controller.current_snapshot();
        assert_eq!(snapshot.version, 0);

        controller.publish(Arc::new(SegmentData::default()));
        assert_eq!(controller.current_snapshot().version, 1);
    }

    #[test]
    fn old_snapshots_are_garbage_collected_past_the_cap() {
        let controller = MvccController::new();
        for _ in 0..64 {
            controller.publish(Arc::new(SegmentData::default()));
        }
        assert!(controller.versions.read().len() <= controller.max_versions);
    }
}
