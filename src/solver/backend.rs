use strum::{AsRefStr, Display};
use thiserror::Error;

/// Opaque handle to a solver variable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VariableHandle(pub usize);

/// Opaque handle to a solver constraint row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConstraintHandle(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectiveSense {
    Minimize,
    Maximize,
}

/// Status reported by a solve call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum SolveStatus {
    /// Optimal solution found
    Optimal,
    /// Feasible solution found, optimality not proven
    Feasible,
    /// Problem is infeasible
    Infeasible,
    /// Unbounded, aborted or otherwise unusable
    Other,
}

impl SolveStatus {
    pub fn has_solution(self) -> bool {
        matches!(self, SolveStatus::Optimal | SolveStatus::Feasible)
    }
}

/// Errors raised by a solver backend
#[derive(Debug, Clone, Error)]
pub enum BackendError {
    #[error("Solver engine error: {0}")]
    Engine(String),
}

/// Linear-programming engine driven by the orchestrator.
///
/// Variables are bounded reals, constraints are ranged rows
/// `lower <= sum(coeff * var) <= upper`. Infinite bounds mean "no bound".
/// Setting a coefficient twice overwrites it.
#[cfg_attr(test, mockall::automock)]
pub trait SolverBackend: Send {
    fn add_variable(&mut self, lower: f64, upper: f64) -> VariableHandle;

    fn add_constraint(&mut self, lower: f64, upper: f64) -> ConstraintHandle;

    fn set_coefficient(&mut self, constraint: ConstraintHandle, variable: VariableHandle, value: f64);

    fn set_objective_coefficient(&mut self, variable: VariableHandle, value: f64);

    fn set_sense(&mut self, sense: ObjectiveSense);

    /// Reset every objective coefficient to zero
    fn clear_objective(&mut self);

    fn solve(&mut self) -> Result<SolveStatus, BackendError>;

    /// Value of `variable` in the last solution (0.0 before any solve)
    fn variable_value(&self, variable: VariableHandle) -> f64;

    /// Whether the row activity of `constraint` sits at its lower bound
    fn at_lower_bound(&self, constraint: ConstraintHandle) -> bool;
}

/// Produces a fresh backend for every solve
pub trait BackendFactory: Send + Sync {
    fn create(&self) -> Box<dyn SolverBackend>;
}

impl<F> BackendFactory for F
where
    F: Fn() -> Box<dyn SolverBackend> + Send + Sync,
{
    fn create(&self) -> Box<dyn SolverBackend> {
        self()
    }
}

/// Mock that hands out sequential handles and accepts every model edit.
///
/// Tests add their own `solve`, `variable_value` and `at_lower_bound`
/// expectations on top.
#[cfg(test)]
pub(crate) fn permissive_mock() -> MockSolverBackend {
    let mut mock = MockSolverBackend::new();
    let mut next_variable = 0;
    mock.expect_add_variable().returning(move |_, _| {
        next_variable += 1;
        VariableHandle(next_variable - 1)
    });
    let mut next_constraint = 0;
    mock.expect_add_constraint().returning(move |_, _| {
        next_constraint += 1;
        ConstraintHandle(next_constraint - 1)
    });
    mock.expect_set_coefficient().returning(|_, _, _| ());
    mock.expect_set_objective_coefficient().returning(|_, _| ());
    mock.expect_set_sense().returning(|_| ());
    mock.expect_clear_objective().returning(|| ());
    mock
}
