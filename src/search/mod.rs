pub mod search;

pub use search::{MetadataCriteria, ScoredNode, SearchService, SortBy};
