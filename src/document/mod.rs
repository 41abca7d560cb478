pub mod chunking;
pub mod engine;

pub use chunking::{chunk_body, ChunkSpec, ChunkStrategy};
pub use engine::{DocumentEngine, EditOutcome, ImportOutcome};
