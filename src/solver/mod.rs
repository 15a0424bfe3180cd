//! Solver service
//!
//! The orchestrator only talks to [`SolverBackend`]; the good_lp backend is
//! the default engine when the `optimization` feature is enabled.

pub mod backend;
#[cfg(feature = "optimization")]
pub mod good_lp_backend;

pub use backend::{
    BackendError, BackendFactory, ConstraintHandle, ObjectiveSense, SolveStatus, SolverBackend,
    VariableHandle,
};
#[cfg(feature = "optimization")]
pub use good_lp_backend::GoodLpBackend;

#[cfg(test)]
pub(crate) use backend::{permissive_mock, MockSolverBackend};
