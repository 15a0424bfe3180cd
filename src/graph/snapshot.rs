use serde::{Deserialize, Serialize};

use crate::model::{ConnectionId, ConnectionParams, NodeId, NodeParams, Port};
use crate::orchestrator::{Classification, ConnectionState};

/// A node as seen by one solve
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSpec {
    pub id: NodeId,
    #[serde(flatten)]
    pub params: NodeParams,
}

impl NodeSpec {
    pub fn new(id: NodeId, params: NodeParams) -> Self {
        Self { id, params }
    }
}

/// A connection as seen by one solve
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionSpec {
    pub id: ConnectionId,
    #[serde(flatten)]
    pub params: ConnectionParams,
    pub ports: Vec<Port>,
}

impl ConnectionSpec {
    pub fn new(id: ConnectionId, params: ConnectionParams, ports: Vec<Port>) -> Self {
        Self { id, params, ports }
    }
}

/// Frozen view of the graph taken at solve time
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphSnapshot {
    pub nodes: Vec<NodeSpec>,
    pub connections: Vec<ConnectionSpec>,
}

impl GraphSnapshot {
    pub fn new(nodes: Vec<NodeSpec>, connections: Vec<ConnectionSpec>) -> Self {
        Self { nodes, connections }
    }

    pub fn node(&self, id: NodeId) -> Option<&NodeSpec> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn connection(&self, id: ConnectionId) -> Option<&ConnectionSpec> {
        self.connections.iter().find(|c| c.id == id)
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.connections.is_empty()
    }
}

/// Write-back surface of the graph that owns the nodes and connections.
///
/// Only called from the caller's context once a solve has completed.
pub trait GraphSink {
    fn set_rate(&mut self, node: NodeId, rate: f64);

    fn set_state(&mut self, connection: ConnectionId, state: ConnectionState);

    fn notify_solve_complete(&mut self, classification: &Classification);
}
