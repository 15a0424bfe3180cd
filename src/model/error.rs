use thiserror::Error;

use super::{ConnectionId, NodeId};

/// Snapshot problems detected while building the solver model
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModelError {
    #[error("{connection} references {node}, which is not part of the snapshot")]
    UnknownNode {
        connection: ConnectionId,
        node: NodeId,
    },

    #[error("{0} appears more than once in the snapshot")]
    DuplicateNode(NodeId),

    #[error("{0} appears more than once in the snapshot")]
    DuplicateConnection(ConnectionId),
}
