use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use uuid::Uuid;

use crate::graph::GraphSink;
use crate::model::{ConnectionId, NodeId, SolverModel};

use super::{Classification, ConnectionState, SolvePhase};

/// Correlation id of one solve invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct SolveId(pub Uuid);

impl SolveId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SolveId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SolveId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct NodeRate {
    pub node: NodeId,
    pub rate: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ConnectionReport {
    pub connection: ConnectionId,
    pub state: ConnectionState,
    /// Net flow produced by the nodes alone
    pub flow: f64,
    /// Supply injected by the relaxation pass (0 when not relaxed)
    pub slack: f64,
}

/// Rates and connection states read back from a solved model
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SolveResult {
    pub rates: Vec<NodeRate>,
    pub connections: Vec<ConnectionReport>,
}

impl SolveResult {
    /// Read every variable and constraint of a solved model.
    ///
    /// Rates are clamped into the node bounds to absorb solver round-off.
    pub fn extract(model: &SolverModel, tolerance: f64) -> Self {
        let backend = model.backend();
        let values: Vec<f64> = model
            .variables()
            .iter()
            .map(|var| backend.variable_value(var.variable))
            .collect();

        let rates = model
            .variables()
            .iter()
            .zip(&values)
            .map(|(var, &value)| NodeRate {
                node: var.node,
                rate: var.params.clamp_rate(value),
            })
            .collect();

        let connections = model
            .constraints()
            .iter()
            .map(|record| {
                let flow: f64 = record
                    .terms
                    .iter()
                    .map(|&(tag, coeff)| coeff * values[tag])
                    .sum();
                let slack = record
                    .slack
                    .map(|slack| backend.variable_value(slack))
                    .unwrap_or(0.0);

                let state = if slack > tolerance {
                    ConnectionState::Starving
                } else if backend.at_lower_bound(record.constraint) {
                    ConnectionState::Optimal
                } else {
                    ConnectionState::Overproduction
                };

                ConnectionReport {
                    connection: record.connection,
                    state,
                    flow,
                    slack,
                }
            })
            .collect();

        Self { rates, connections }
    }

    pub fn rate(&self, node: NodeId) -> Option<f64> {
        self.rates.iter().find(|r| r.node == node).map(|r| r.rate)
    }

    pub fn connection(&self, connection: ConnectionId) -> Option<&ConnectionReport> {
        self.connections.iter().find(|c| c.connection == connection)
    }

    pub fn state(&self, connection: ConnectionId) -> Option<ConnectionState> {
        self.connection(connection).map(|c| c.state)
    }
}

/// Everything the worker hands back to the caller for one solve
#[derive(Debug, Clone, Serialize)]
pub struct SolveOutcome {
    pub id: SolveId,
    pub classification: Classification,
    pub phase: SolvePhase,
    /// Number of solver invocations (1, or 2 when relaxed)
    pub passes: u32,
    /// Present unless the classification is fatal
    pub result: Option<SolveResult>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl SolveOutcome {
    pub(crate) fn failed(
        id: SolveId,
        started_at: DateTime<Utc>,
        passes: u32,
        classification: Classification,
    ) -> Self {
        Self {
            id,
            classification,
            phase: SolvePhase::Failed,
            passes,
            result: None,
            started_at,
            finished_at: Utc::now(),
        }
    }

    pub fn is_fatal(&self) -> bool {
        self.classification.is_fatal()
    }

    pub fn elapsed_ms(&self) -> i64 {
        (self.finished_at - self.started_at).num_milliseconds()
    }

    /// Write rates and states back onto the graph, then report completion.
    ///
    /// Fatal outcomes only report completion; prior graph state is kept.
    pub fn apply_to<S: GraphSink + ?Sized>(&self, sink: &mut S) {
        if let Some(result) = &self.result {
            for rate in &result.rates {
                sink.set_rate(rate.node, rate.rate);
            }
            for report in &result.connections {
                sink.set_state(report.connection, report.state);
            }
        }
        sink.notify_solve_complete(&self.classification);
    }
}
