use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable identifier of a node in the owning graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub u32);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node#{}", self.0)
    }
}

/// Stable identifier of a connection in the owning graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(pub u32);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "connection#{}", self.0)
    }
}

/// Cost charged per unit of throughput a node pushes through its ports
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Penalty {
    /// Finite cost per unit
    Cost(f64),
    /// The node is pinned to its minimum rate and never scaled by the solver
    HardRestricted,
}

impl Penalty {
    pub fn is_hard_restricted(&self) -> bool {
        matches!(self, Penalty::HardRestricted)
    }

    /// Objective weight contributed by one port moving `amount` units.
    ///
    /// Hard-restricted nodes have a fixed variable, so they contribute nothing.
    pub fn weight(&self, amount: f64) -> f64 {
        match self {
            Penalty::Cost(cost) => cost * amount.abs(),
            Penalty::HardRestricted => 0.0,
        }
    }
}

impl Default for Penalty {
    fn default() -> Self {
        Penalty::Cost(1.0)
    }
}

/// Solver parameters of a node
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NodeParams {
    /// Minimum production rate
    pub min: f64,

    /// Maximum production rate (None = unrestricted)
    #[serde(default)]
    pub max: Option<f64>,

    /// Cost per unit of throughput
    #[serde(default)]
    pub penalty: Penalty,
}

impl NodeParams {
    pub fn new(min: f64, max: Option<f64>, penalty: Penalty) -> Self {
        Self { min, max, penalty }
    }

    /// Node with zero minimum, no maximum and unit cost
    pub fn unrestricted() -> Self {
        Self::new(0.0, None, Penalty::default())
    }

    /// Node pinned to `rate`
    pub fn pinned(rate: f64) -> Self {
        Self::new(rate, None, Penalty::HardRestricted)
    }

    /// Variable bounds handed to the solver.
    ///
    /// A hard-restricted node collapses to `[min, min]`.
    pub fn variable_bounds(&self) -> (f64, f64) {
        if self.penalty.is_hard_restricted() {
            (self.min, self.min)
        } else {
            (self.min, self.max.unwrap_or(f64::INFINITY))
        }
    }

    /// Clamp a raw solver value into the node's bounds
    pub fn clamp_rate(&self, value: f64) -> f64 {
        let (lower, upper) = self.variable_bounds();
        value.max(lower).min(upper)
    }

    pub fn has_forced_minimum(&self) -> bool {
        self.min > 0.0
    }
}

/// Solver parameters of a connection (bounds on its net flow)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConnectionParams {
    /// Minimum net flow
    pub min: f64,

    /// Maximum net flow (None = unrestricted)
    #[serde(default)]
    pub max: Option<f64>,
}

impl ConnectionParams {
    pub fn new(min: f64, max: Option<f64>) -> Self {
        Self { min, max }
    }

    /// Net flow must be exactly zero
    pub fn balanced() -> Self {
        Self::new(0.0, Some(0.0))
    }

    /// Production must cover consumption, surplus allowed
    pub fn at_least_balanced() -> Self {
        Self::new(0.0, None)
    }

    pub fn constraint_bounds(&self) -> (f64, f64) {
        (self.min, self.max.unwrap_or(f64::INFINITY))
    }
}

/// A node's signed participation in one connection
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Port {
    pub node: NodeId,

    /// Positive = production into the connection, negative = consumption from it
    pub amount: f64,
}

impl Port {
    pub fn new(node: NodeId, amount: f64) -> Self {
        Self { node, amount }
    }

    pub fn produces(node: NodeId, amount: f64) -> Self {
        Self::new(node, amount.abs())
    }

    pub fn consumes(node: NodeId, amount: f64) -> Self {
        Self::new(node, -amount.abs())
    }

    /// Zero-valued ports carry no flow and are treated as absent
    pub fn is_active(&self) -> bool {
        self.amount != 0.0
    }
}
