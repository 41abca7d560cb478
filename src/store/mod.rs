pub mod store;

pub use store::{DegreeRepairReport, NodePatch, Store};
