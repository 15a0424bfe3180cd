use crate::model::{ConnectionId, SolverModel};
use crate::solver::ObjectiveSense;

/// Give every possible-deadlock connection a non-negative slack column and
/// make the total slack the only objective.
///
/// Returns the relaxed connections in tag order.
pub fn relax_possible_deadlocks(model: &mut SolverModel) -> Vec<ConnectionId> {
    let backend = model.backend.as_mut();
    backend.clear_objective();

    let mut relaxed = Vec::new();
    for record in model
        .constraints
        .iter_mut()
        .filter(|record| record.is_possible_deadlock())
    {
        let slack = backend.add_variable(0.0, f64::INFINITY);
        backend.set_coefficient(record.constraint, slack, 1.0);
        backend.set_objective_coefficient(slack, 1.0);
        record.slack = Some(slack);
        relaxed.push(record.connection);
    }

    backend.set_sense(ObjectiveSense::Minimize);
    relaxed
}
