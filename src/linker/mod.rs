pub mod linker;

pub use linker::{GraphRescoreReport, Linker};
