//! 128-bit identifiers rendered as lowercase dashed hex.
//!
//! Mirrors the teacher's `DocId(pub u64)` newtype pattern, widened to the
//! 128 bits the spec requires for node and edge ids.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::core::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub u128);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EdgeId(pub u128);

macro_rules! id_impl {
    ($ty:ident) => {
        impl $ty {
            pub fn new() -> Self {
                $ty(Uuid::new_v4().as_u128())
            }

            pub fn from_uuid(uuid: Uuid) -> Self {
                $ty(uuid.as_u128())
            }

            pub fn to_uuid(self) -> Uuid {
                Uuid::from_u128(self.0)
            }

            pub fn to_hex(self) -> String {
                self.to_uuid().as_hyphenated().to_string()
            }

            /// Parses a full dashed-hex id, or the shortest unambiguous
            /// prefix, returning the matching value if the text parses as
            /// a full UUID outright.
            pub fn parse_full(text: &str) -> Result<Self> {
                let uuid = Uuid::parse_str(text)
                    .map_err(|e| Error::validation(format!("invalid id {:?}: {}", text, e)))?;
                Ok($ty::from_uuid(uuid))
            }

            /// True if this id's dashed-hex rendering starts with `prefix`
            /// (case-insensitive, dashes ignored in the prefix).
            pub fn matches_prefix(self, prefix: &str) -> bool {
                let rendered = self.to_hex().replace('-', "");
                let needle: String = prefix.chars().filter(|c| *c != '-').collect();
                rendered.starts_with(&needle.to_lowercase())
            }
        }

        impl Default for $ty {
            fn default() -> Self {
                $ty::new()
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.to_hex())
            }
        }
    };
}

id_impl!(NodeId);
id_impl!(EdgeId);

/// Minimum hex-prefix length accepted when resolving a reference (spec
/// §8: "for any UUID prefix p... minimum 4").
pub const MIN_PREFIX_LEN: usize = 4;

/// Stable 128-bit edge id derived from a pair of (already ordered) node ids.
/// Truncates a 256-bit digest of the ordered pair, per spec §4.4.
pub fn edge_id_for_pair(a: NodeId, b: NodeId) -> EdgeId {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(a.0.to_le_bytes());
    hasher.update(b.0.to_le_bytes());
    let digest = hasher.finalize();
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&digest[0..16]);
    EdgeId(u128::from_le_bytes(bytes))
}
