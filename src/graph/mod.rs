/// Production graph
///
/// Snapshot types handed to the solver, the write-back trait the solver
/// reports through, and an owned in-memory graph implementing it.

pub mod memory;
pub mod snapshot;

pub use memory::{ConnectionEntry, NodeEntry, ProductionGraph};
pub use snapshot::{ConnectionSpec, GraphSink, GraphSnapshot, NodeSpec};
