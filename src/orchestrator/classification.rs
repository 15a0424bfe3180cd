use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display};

use crate::model::ConnectionId;

/// Flow state of a connection after a solve
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ConnectionState {
    /// Net flow sits at the lower bound
    Optimal,
    /// Net flow exceeds the lower bound
    Overproduction,
    /// Slack had to cover missing supply
    Starving,
}

/// Outcome label of a completed solve attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Display, AsRefStr)]
#[serde(tag = "kind", rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Classification {
    /// Optimal solution of the unrelaxed model
    Normal,
    /// Feasible solution, optimality not proven
    Suboptimal,
    /// Unrelaxed model infeasible; solved after adding slack to these connections
    Deadlock { connections: Vec<ConnectionId> },
    /// Infeasible even after relaxation
    DoubleDeadlock,
    /// The solver failed or returned an unusable status
    SolverFault { message: String },
}

impl Classification {
    /// Fatal classifications carry no result and leave the graph untouched
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Classification::DoubleDeadlock | Classification::SolverFault { .. }
        )
    }

    /// Non-fatal but degraded
    pub fn is_warning(&self) -> bool {
        matches!(
            self,
            Classification::Suboptimal | Classification::Deadlock { .. }
        )
    }

    pub fn fault(message: impl Into<String>) -> Self {
        Classification::SolverFault {
            message: message.into(),
        }
    }
}
