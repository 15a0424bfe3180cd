/// Solver model
///
/// Value types describing nodes and connections, the translation of a graph
/// snapshot into solver variables and constraints, and the deadlock walk
/// run over the translated model.

pub mod builder;
pub mod deadlock;
pub mod error;
pub mod primitives;

pub use builder::{ConstraintRecord, DeadlockMark, SolverModel, VariableRecord};
pub use deadlock::mark_possible_deadlocks;
pub use error::ModelError;
pub use primitives::{ConnectionId, ConnectionParams, NodeId, NodeParams, Penalty, Port};
