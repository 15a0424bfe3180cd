use std::collections::{HashMap, HashSet};

use crate::graph::GraphSnapshot;
use crate::solver::{ConstraintHandle, ObjectiveSense, SolverBackend, VariableHandle};

use super::{ConnectionId, ConnectionParams, ModelError, NodeId, NodeParams};

/// Deadlock classification of a constraint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeadlockMark {
    #[default]
    Clear,
    /// On a cycle of forced minimum flow; receives slack if the direct solve fails
    PossibleDeadlock,
}

/// Per-node solver state, indexed by the node's solver tag
#[derive(Debug, Clone)]
pub struct VariableRecord {
    pub node: NodeId,
    pub params: NodeParams,
    pub variable: VariableHandle,
    /// Accumulated objective weight over every port of the node
    pub objective: f64,
    /// Tags of the connections this node consumes from
    pub inputs: Vec<usize>,
    last_constraint: Option<usize>,
    term_slot: usize,
}

impl VariableRecord {
    fn new(node: NodeId, params: NodeParams, variable: VariableHandle) -> Self {
        Self {
            node,
            params,
            variable,
            objective: 0.0,
            inputs: Vec::new(),
            last_constraint: None,
            term_slot: 0,
        }
    }
}

/// Per-connection solver state, indexed by the connection's solver tag
#[derive(Debug, Clone)]
pub struct ConstraintRecord {
    pub connection: ConnectionId,
    pub params: ConnectionParams,
    pub constraint: ConstraintHandle,
    pub slack: Option<VariableHandle>,
    pub deadlock: DeadlockMark,
    /// Merged `(variable tag, coefficient)` pairs
    pub terms: Vec<(usize, f64)>,
    /// Tags of the nodes producing into this connection
    pub contributors: Vec<usize>,
}

impl ConstraintRecord {
    fn new(connection: ConnectionId, params: ConnectionParams, constraint: ConstraintHandle) -> Self {
        Self {
            connection,
            params,
            constraint,
            slack: None,
            deadlock: DeadlockMark::Clear,
            terms: Vec::new(),
            contributors: Vec::new(),
        }
    }

    pub fn is_possible_deadlock(&self) -> bool {
        self.deadlock == DeadlockMark::PossibleDeadlock
    }
}

/// Working set of one solve.
///
/// Node and connection solver tags are the indices into `variables` and
/// `constraints`; they mean nothing outside the model that assigned them.
pub struct SolverModel {
    pub(crate) variables: Vec<VariableRecord>,
    pub(crate) constraints: Vec<ConstraintRecord>,
    pub(crate) backend: Box<dyn SolverBackend>,
    node_tags: HashMap<NodeId, usize>,
}

impl SolverModel {
    /// Translate a snapshot into variables, constraints and a penalty objective
    pub fn build(
        snapshot: &GraphSnapshot,
        mut backend: Box<dyn SolverBackend>,
    ) -> Result<Self, ModelError> {
        let mut node_tags = HashMap::with_capacity(snapshot.nodes.len());
        let mut variables = Vec::with_capacity(snapshot.nodes.len());

        for node in &snapshot.nodes {
            if node_tags.insert(node.id, variables.len()).is_some() {
                return Err(ModelError::DuplicateNode(node.id));
            }
            let (lower, upper) = node.params.variable_bounds();
            let variable = backend.add_variable(lower, upper);
            variables.push(VariableRecord::new(node.id, node.params, variable));
        }

        let mut seen_connections = HashSet::with_capacity(snapshot.connections.len());
        let mut constraints = Vec::with_capacity(snapshot.connections.len());

        for connection in &snapshot.connections {
            if !seen_connections.insert(connection.id) {
                return Err(ModelError::DuplicateConnection(connection.id));
            }

            let tag = constraints.len();
            let (lower, upper) = connection.params.constraint_bounds();
            let handle = backend.add_constraint(lower, upper);
            let mut record = ConstraintRecord::new(connection.id, connection.params, handle);

            for port in connection.ports.iter().filter(|port| port.is_active()) {
                let var_tag = *node_tags.get(&port.node).ok_or(ModelError::UnknownNode {
                    connection: connection.id,
                    node: port.node,
                })?;
                let var = &mut variables[var_tag];

                // Same node seen earlier on this connection: merge into its term
                if var.last_constraint == Some(tag) {
                    record.terms[var.term_slot].1 += port.amount;
                } else {
                    var.last_constraint = Some(tag);
                    var.term_slot = record.terms.len();
                    record.terms.push((var_tag, port.amount));
                }

                var.objective += var.params.penalty.weight(port.amount);

                if port.amount < 0.0 {
                    if var.inputs.last() != Some(&tag) {
                        var.inputs.push(tag);
                    }
                } else if !record.contributors.contains(&var_tag) {
                    record.contributors.push(var_tag);
                }
            }

            for &(var_tag, coeff) in &record.terms {
                backend.set_coefficient(handle, variables[var_tag].variable, coeff);
            }
            constraints.push(record);
        }

        let mut model = Self {
            variables,
            constraints,
            backend,
            node_tags,
        };
        model.apply_penalty_objective();

        tracing::debug!(
            variables = model.variables.len(),
            constraints = model.constraints.len(),
            "solver model built"
        );

        Ok(model)
    }

    /// Minimize the accumulated per-node penalty weights
    pub fn apply_penalty_objective(&mut self) {
        self.backend.clear_objective();
        for var in &self.variables {
            self.backend.set_objective_coefficient(var.variable, var.objective);
        }
        self.backend.set_sense(ObjectiveSense::Minimize);
    }

    pub fn variables(&self) -> &[VariableRecord] {
        &self.variables
    }

    pub fn constraints(&self) -> &[ConstraintRecord] {
        &self.constraints
    }

    pub fn node_tag(&self, node: NodeId) -> Option<usize> {
        self.node_tags.get(&node).copied()
    }

    pub fn backend(&self) -> &dyn SolverBackend {
        self.backend.as_ref()
    }

    pub fn backend_mut(&mut self) -> &mut dyn SolverBackend {
        self.backend.as_mut()
    }

    /// Connections currently flagged as possible deadlocks
    pub fn possible_deadlocks(&self) -> impl Iterator<Item = ConnectionId> + '_ {
        self.constraints
            .iter()
            .filter(|record| record.is_possible_deadlock())
            .map(|record| record.connection)
    }
}

impl std::fmt::Debug for SolverModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SolverModel")
            .field("variables", &self.variables)
            .field("constraints", &self.constraints)
            .finish_non_exhaustive()
    }
}
