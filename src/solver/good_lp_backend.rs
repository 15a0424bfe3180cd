//! good_lp backend
//!
//! Keeps the model as plain rows and columns so it can be edited between
//! solves (the relaxation pass adds slack columns and swaps the objective),
//! and rebuilds a good_lp problem on every `solve` call using the pure-Rust
//! minilp engine.

use good_lp::solvers::minilp::minilp;
use good_lp::{
    constraint, variable, Expression, ProblemVariables, ResolutionError, Solution, SolverModel,
    Variable,
};

use super::backend::{
    BackendError, ConstraintHandle, ObjectiveSense, SolveStatus, SolverBackend, VariableHandle,
};

/// Absolute tolerance used to decide whether a row sits at its lower bound
const DEFAULT_BOUND_TOLERANCE: f64 = 1e-6;

#[derive(Debug, Clone)]
struct Column {
    lower: f64,
    upper: f64,
    objective: f64,
}

#[derive(Debug, Clone)]
struct Row {
    lower: f64,
    upper: f64,
    terms: Vec<(usize, f64)>,
}

impl Row {
    fn activity(&self, values: &[f64]) -> f64 {
        self.terms
            .iter()
            .map(|&(column, coeff)| coeff * values.get(column).copied().unwrap_or(0.0))
            .sum()
    }
}

/// Solver service backed by good_lp + minilp
#[derive(Debug, Clone)]
pub struct GoodLpBackend {
    columns: Vec<Column>,
    rows: Vec<Row>,
    sense: ObjectiveSense,
    tolerance: f64,
    values: Option<Vec<f64>>,
}

impl Default for GoodLpBackend {
    fn default() -> Self {
        Self::new(DEFAULT_BOUND_TOLERANCE)
    }
}

impl GoodLpBackend {
    pub fn new(tolerance: f64) -> Self {
        Self {
            columns: Vec::new(),
            rows: Vec::new(),
            sense: ObjectiveSense::Minimize,
            tolerance,
            values: None,
        }
    }

    pub fn num_variables(&self) -> usize {
        self.columns.len()
    }

    pub fn num_constraints(&self) -> usize {
        self.rows.len()
    }

    /// Rows without terms are checked here; minilp has no notion of an empty row
    fn empty_rows_feasible(&self) -> bool {
        self.rows
            .iter()
            .filter(|row| row.terms.is_empty())
            .all(|row| row.lower <= self.tolerance && row.upper >= -self.tolerance)
    }

    fn run_engine(&self) -> Result<Vec<f64>, ResolutionError> {
        let mut problem = ProblemVariables::new();
        let vars: Vec<Variable> = self
            .columns
            .iter()
            .map(|column| {
                let mut definition = variable();
                if column.lower.is_finite() {
                    definition = definition.min(column.lower);
                }
                if column.upper.is_finite() {
                    definition = definition.max(column.upper);
                }
                problem.add(definition)
            })
            .collect();

        let mut objective = Expression::default();
        for (var, column) in vars.iter().zip(&self.columns) {
            if column.objective != 0.0 {
                objective.add_mul(column.objective, *var);
            }
        }

        let mut model = match self.sense {
            ObjectiveSense::Minimize => problem.minimise(objective),
            ObjectiveSense::Maximize => problem.maximise(objective),
        }
        .using(minilp);

        for row in self.rows.iter().filter(|row| !row.terms.is_empty()) {
            let mut expr = Expression::default();
            for &(column, coeff) in &row.terms {
                expr.add_mul(coeff, vars[column]);
            }

            if row.lower.is_finite() && row.lower == row.upper {
                model = model.with(constraint!(expr == row.lower));
                continue;
            }
            if row.lower.is_finite() {
                model = model.with(constraint!(expr.clone() >= row.lower));
            }
            if row.upper.is_finite() {
                model = model.with(constraint!(expr <= row.upper));
            }
        }

        model
            .solve()
            .map(|solution| vars.iter().map(|var| solution.value(*var)).collect())
    }
}

impl SolverBackend for GoodLpBackend {
    fn add_variable(&mut self, lower: f64, upper: f64) -> VariableHandle {
        self.columns.push(Column {
            lower,
            upper,
            objective: 0.0,
        });
        VariableHandle(self.columns.len() - 1)
    }

    fn add_constraint(&mut self, lower: f64, upper: f64) -> ConstraintHandle {
        self.rows.push(Row {
            lower,
            upper,
            terms: Vec::new(),
        });
        ConstraintHandle(self.rows.len() - 1)
    }

    fn set_coefficient(&mut self, constraint: ConstraintHandle, variable: VariableHandle, value: f64) {
        if variable.0 >= self.columns.len() {
            tracing::warn!(variable = variable.0, "coefficient for unknown variable ignored");
            return;
        }
        let Some(row) = self.rows.get_mut(constraint.0) else {
            tracing::warn!(constraint = constraint.0, "coefficient for unknown constraint ignored");
            return;
        };

        match row.terms.iter_mut().find(|(column, _)| *column == variable.0) {
            Some(term) => term.1 = value,
            None => row.terms.push((variable.0, value)),
        }
    }

    fn set_objective_coefficient(&mut self, variable: VariableHandle, value: f64) {
        if let Some(column) = self.columns.get_mut(variable.0) {
            column.objective = value;
        }
    }

    fn set_sense(&mut self, sense: ObjectiveSense) {
        self.sense = sense;
    }

    fn clear_objective(&mut self) {
        for column in &mut self.columns {
            column.objective = 0.0;
        }
    }

    fn solve(&mut self) -> Result<SolveStatus, BackendError> {
        self.values = None;

        if !self.empty_rows_feasible() {
            return Ok(SolveStatus::Infeasible);
        }
        if self.columns.is_empty() {
            self.values = Some(Vec::new());
            return Ok(SolveStatus::Optimal);
        }

        tracing::trace!(
            variables = self.columns.len(),
            constraints = self.rows.len(),
            "running minilp"
        );

        match self.run_engine() {
            Ok(values) => {
                self.values = Some(values);
                Ok(SolveStatus::Optimal)
            }
            Err(ResolutionError::Infeasible) => Ok(SolveStatus::Infeasible),
            Err(ResolutionError::Unbounded) => Ok(SolveStatus::Other),
            Err(other) => Err(BackendError::Engine(other.to_string())),
        }
    }

    fn variable_value(&self, variable: VariableHandle) -> f64 {
        self.values
            .as_ref()
            .and_then(|values| values.get(variable.0).copied())
            .unwrap_or(0.0)
    }

    fn at_lower_bound(&self, constraint: ConstraintHandle) -> bool {
        let (Some(values), Some(row)) = (self.values.as_ref(), self.rows.get(constraint.0)) else {
            return false;
        };
        if !row.lower.is_finite() {
            return false;
        }
        (row.activity(values) - row.lower).abs() <= self.tolerance
    }
}
