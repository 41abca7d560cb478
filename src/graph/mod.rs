pub mod graph;

pub use graph::{DegreeOffender, DegreeReport, GraphService, NeighborhoodResult, PathResult, PathStep};
