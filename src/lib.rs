//! Flow Balancer
//!
//! Computes steady-state node rates for a production network as a linear
//! program, detects self-sustaining loops that can never start, and retries
//! with slack on those loops when the direct solve is infeasible.

pub mod config;
pub mod graph;
pub mod model;
pub mod orchestrator;
pub mod solver;
pub mod telemetry;

pub use graph::{GraphSink, GraphSnapshot, ProductionGraph};
pub use orchestrator::{Classification, ConnectionState, FlowSolver, SolveHandle, SolveOutcome};
