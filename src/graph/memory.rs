use std::collections::BTreeMap;

use serde::Serialize;
use tracing::warn;

use crate::model::{ConnectionId, ConnectionParams, ModelError, NodeId, NodeParams, Port};
use crate::orchestrator::{Classification, ConnectionState};

use super::{ConnectionSpec, GraphSink, GraphSnapshot, NodeSpec};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeEntry {
    pub id: NodeId,
    pub params: NodeParams,
    /// Last rate written back by a solve
    pub rate: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConnectionEntry {
    pub id: ConnectionId,
    pub params: ConnectionParams,
    pub ports: Vec<Port>,
    /// Last state written back by a solve
    pub state: Option<ConnectionState>,
}

/// Owned production graph that can be snapshotted and written back to
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProductionGraph {
    nodes: BTreeMap<NodeId, NodeEntry>,
    connections: BTreeMap<ConnectionId, ConnectionEntry>,
    last_classification: Option<Classification>,
}

impl ProductionGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, id: NodeId, params: NodeParams) -> Result<(), ModelError> {
        if self.nodes.contains_key(&id) {
            return Err(ModelError::DuplicateNode(id));
        }
        self.nodes.insert(
            id,
            NodeEntry {
                id,
                params,
                rate: None,
            },
        );
        Ok(())
    }

    /// Ports must reference nodes already in the graph
    pub fn add_connection(
        &mut self,
        id: ConnectionId,
        params: ConnectionParams,
        ports: Vec<Port>,
    ) -> Result<(), ModelError> {
        if self.connections.contains_key(&id) {
            return Err(ModelError::DuplicateConnection(id));
        }
        if let Some(port) = ports.iter().find(|p| !self.nodes.contains_key(&p.node)) {
            return Err(ModelError::UnknownNode {
                connection: id,
                node: port.node,
            });
        }
        self.connections.insert(
            id,
            ConnectionEntry {
                id,
                params,
                ports,
                state: None,
            },
        );
        Ok(())
    }

    pub fn from_snapshot(snapshot: &GraphSnapshot) -> Result<Self, ModelError> {
        let mut graph = Self::new();
        for node in &snapshot.nodes {
            graph.add_node(node.id, node.params)?;
        }
        for connection in &snapshot.connections {
            graph.add_connection(connection.id, connection.params, connection.ports.clone())?;
        }
        Ok(graph)
    }

    /// Freeze the current nodes and connections, ordered by id
    pub fn snapshot(&self) -> GraphSnapshot {
        GraphSnapshot::new(
            self.nodes
                .values()
                .map(|n| NodeSpec::new(n.id, n.params))
                .collect(),
            self.connections
                .values()
                .map(|c| ConnectionSpec::new(c.id, c.params, c.ports.clone()))
                .collect(),
        )
    }

    pub fn node(&self, id: NodeId) -> Option<&NodeEntry> {
        self.nodes.get(&id)
    }

    pub fn connection(&self, id: ConnectionId) -> Option<&ConnectionEntry> {
        self.connections.get(&id)
    }

    pub fn rate(&self, id: NodeId) -> Option<f64> {
        self.nodes.get(&id).and_then(|n| n.rate)
    }

    pub fn state(&self, id: ConnectionId) -> Option<ConnectionState> {
        self.connections.get(&id).and_then(|c| c.state)
    }

    pub fn last_classification(&self) -> Option<&Classification> {
        self.last_classification.as_ref()
    }
}

impl GraphSink for ProductionGraph {
    fn set_rate(&mut self, node: NodeId, rate: f64) {
        match self.nodes.get_mut(&node) {
            Some(entry) => entry.rate = Some(rate),
            None => warn!(%node, "rate for node no longer in graph"),
        }
    }

    fn set_state(&mut self, connection: ConnectionId, state: ConnectionState) {
        match self.connections.get_mut(&connection) {
            Some(entry) => entry.state = Some(state),
            None => warn!(%connection, "state for connection no longer in graph"),
        }
    }

    fn notify_solve_complete(&mut self, classification: &Classification) {
        self.last_classification = Some(classification.clone());
    }
}
