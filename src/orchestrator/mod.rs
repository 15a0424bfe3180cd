/// Solve orchestration
///
/// `FlowSolver::solve` builds the model and runs the deadlock walk on the
/// calling thread, then moves the model to a blocking worker that owns it
/// until the outcome is sent back through a one-shot channel. The caller
/// applies the outcome to its graph from its own context.
///
/// Solve strategy:
/// 1. Direct solve minimizing the penalty objective
/// 2. On infeasibility, slack on every possible-deadlock connection and a
///    second solve minimizing total slack
/// 3. Anything else the solver reports becomes a `SolverFault`

pub mod classification;
pub mod phase;
pub mod relax;
pub mod result;

pub use classification::{Classification, ConnectionState};
pub use phase::SolvePhase;
pub use relax::relax_possible_deadlocks;
pub use result::{ConnectionReport, NodeRate, SolveId, SolveOutcome, SolveResult};

use chrono::{DateTime, Utc};
use std::cell::Cell;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn, Instrument};

use crate::config::SolverSettings;
use crate::graph::{GraphSink, GraphSnapshot};
use crate::model::{mark_possible_deadlocks, ModelError, SolverModel};
use crate::solver::{BackendError, BackendFactory, SolveStatus, SolverBackend};

/// Entry point for solving production graphs
#[derive(Clone)]
pub struct FlowSolver {
    settings: SolverSettings,
    factory: Arc<dyn BackendFactory>,
}

impl FlowSolver {
    pub fn new(settings: SolverSettings, factory: impl BackendFactory + 'static) -> Self {
        Self {
            settings,
            factory: Arc::new(factory),
        }
    }

    /// Solver using the good_lp/minilp backend
    #[cfg(feature = "optimization")]
    pub fn with_good_lp(settings: SolverSettings) -> Self {
        let tolerance = settings.tolerance;
        Self::new(settings, move || -> Box<dyn SolverBackend> {
            Box::new(crate::solver::GoodLpBackend::new(tolerance))
        })
    }

    pub fn settings(&self) -> &SolverSettings {
        &self.settings
    }

    /// Build the model for `snapshot` and mark possible deadlocks
    pub fn prepare(&self, snapshot: &GraphSnapshot) -> Result<SolverModel, ModelError> {
        let mut model = SolverModel::build(snapshot, self.factory.create())?;
        let flagged = mark_possible_deadlocks(&mut model);
        if flagged > 0 {
            debug!(flagged, "deadlock walk flagged connections");
        }
        Ok(model)
    }

    /// Start a solve on a blocking worker.
    ///
    /// Snapshot errors are returned here; everything after dispatch arrives
    /// through the handle. Outside a tokio runtime the passes run on the
    /// calling thread and the handle is already resolved.
    pub fn solve(&self, snapshot: &GraphSnapshot) -> Result<SolveHandle, ModelError> {
        let id = SolveId::new();
        let started_at = Utc::now();
        let model = self.prepare(snapshot)?;
        let settings = self.settings.clone();
        let span = tracing::info_span!("solve", id = %id);

        info!(
            parent: &span,
            nodes = snapshot.nodes.len(),
            connections = snapshot.connections.len(),
            "dispatching solve"
        );

        let (sender, receiver) = oneshot::channel();
        let job = move || {
            let _entered = span.enter();
            let outcome = run_to_completion(model, &settings, id, started_at);
            if sender.send(outcome).is_err() {
                debug!("solve handle dropped before completion");
            }
        };

        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn_blocking(job);
            }
            Err(e) => {
                warn!(id = %id, error = %e, "no tokio runtime, solving on the calling thread");
                job();
            }
        }

        Ok(SolveHandle {
            id,
            started_at,
            receiver,
        })
    }

    /// Run the whole pipeline on the current thread
    pub fn solve_blocking(&self, snapshot: &GraphSnapshot) -> Result<SolveOutcome, ModelError> {
        let id = SolveId::new();
        let started_at = Utc::now();
        let model = self.prepare(snapshot)?;
        let span = tracing::info_span!("solve", id = %id);
        let _entered = span.enter();
        Ok(run_to_completion(model, &self.settings, id, started_at))
    }
}

impl std::fmt::Debug for FlowSolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlowSolver")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

/// Receiving end of an in-flight solve
#[derive(Debug)]
pub struct SolveHandle {
    id: SolveId,
    started_at: DateTime<Utc>,
    receiver: oneshot::Receiver<SolveOutcome>,
}

impl SolveHandle {
    pub fn id(&self) -> SolveId {
        self.id
    }

    /// Wait for the worker. A worker that vanished reports a `SolverFault`.
    pub async fn wait(self) -> SolveOutcome {
        let id = self.id;
        let started_at = self.started_at;
        match self.receiver.instrument(tracing::debug_span!("await_solve", id = %id)).await {
            Ok(outcome) => outcome,
            Err(_) => {
                error!(id = %id, "solve worker terminated without reporting");
                SolveOutcome::failed(
                    id,
                    started_at,
                    0,
                    Classification::fault("solve worker terminated without reporting"),
                )
            }
        }
    }

    /// Wait for the worker and write the outcome back onto `sink`
    pub async fn apply_to<S: GraphSink + ?Sized>(self, sink: &mut S) -> SolveOutcome {
        let outcome = self.wait().await;
        outcome.apply_to(sink);
        outcome
    }
}

/// Worker side: run the passes, catching any panic from the backend
fn run_to_completion(
    model: SolverModel,
    settings: &SolverSettings,
    id: SolveId,
    started_at: DateTime<Utc>,
) -> SolveOutcome {
    let passes = Cell::new(0);
    let outcome = match panic::catch_unwind(AssertUnwindSafe(|| run_passes(model, settings, &passes))) {
        Ok(report) => report.into_outcome(id, started_at),
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            SolveOutcome::failed(
                id,
                started_at,
                passes.get(),
                Classification::fault(format!("solver panicked: {message}")),
            )
        }
    };

    log_outcome(&outcome);
    outcome
}

struct PassReport {
    phase: SolvePhase,
    passes: u32,
    classification: Classification,
    result: Option<SolveResult>,
}

impl PassReport {
    fn failed(passes: u32, classification: Classification) -> Self {
        Self {
            phase: SolvePhase::Failed,
            passes,
            classification,
            result: None,
        }
    }

    fn into_outcome(self, id: SolveId, started_at: DateTime<Utc>) -> SolveOutcome {
        SolveOutcome {
            id,
            classification: self.classification,
            phase: self.phase,
            passes: self.passes,
            result: self.result,
            started_at,
            finished_at: Utc::now(),
        }
    }
}

/// Count the pass before handing control to the backend
fn solve_pass(model: &mut SolverModel, passes: &Cell<u32>) -> Result<SolveStatus, BackendError> {
    passes.set(passes.get() + 1);
    model.backend_mut().solve()
}

fn run_passes(mut model: SolverModel, settings: &SolverSettings, passes: &Cell<u32>) -> PassReport {
    let mut phase = SolvePhase::Unsolved;
    phase.advance(SolvePhase::Solving);

    let classification = match solve_pass(&mut model, passes) {
        Ok(SolveStatus::Optimal) => Classification::Normal,
        Ok(SolveStatus::Feasible) => Classification::Suboptimal,
        Ok(SolveStatus::Infeasible) => {
            phase.advance(SolvePhase::Relaxing);
            match relax(&mut model, settings, passes) {
                Ok(classification) => classification,
                Err(classification) => {
                    phase.advance(SolvePhase::Failed);
                    return PassReport::failed(passes.get(), classification);
                }
            }
        }
        Ok(SolveStatus::Other) => {
            phase.advance(SolvePhase::Failed);
            return PassReport::failed(
                passes.get(),
                Classification::fault("solver returned an unusable status"),
            );
        }
        Err(e) => {
            phase.advance(SolvePhase::Failed);
            return PassReport::failed(passes.get(), Classification::fault(e.to_string()));
        }
    };

    phase.advance(SolvePhase::Solved);
    PassReport {
        phase,
        passes: passes.get(),
        result: Some(SolveResult::extract(&model, settings.tolerance)),
        classification,
    }
}

/// Second pass. `Err` carries the fatal classification.
fn relax(
    model: &mut SolverModel,
    settings: &SolverSettings,
    passes: &Cell<u32>,
) -> Result<Classification, Classification> {
    if !settings.relax_deadlocks {
        warn!("direct solve infeasible and relaxation is disabled");
        return Err(Classification::DoubleDeadlock);
    }

    let relaxed = relax_possible_deadlocks(model);
    if relaxed.is_empty() {
        warn!("direct solve infeasible but no connection was flagged as a possible deadlock");
        return Err(Classification::DoubleDeadlock);
    }
    debug!(relaxed = relaxed.len(), "re-solving with slack");

    match solve_pass(model, passes) {
        Ok(status) if status.has_solution() => Ok(Classification::Deadlock {
            connections: relaxed,
        }),
        Ok(SolveStatus::Infeasible) => Err(Classification::DoubleDeadlock),
        Ok(status) => Err(Classification::fault(format!(
            "relaxed solve returned status {status}"
        ))),
        Err(e) => Err(Classification::fault(e.to_string())),
    }
}

fn log_outcome(outcome: &SolveOutcome) {
    let elapsed_ms = outcome.elapsed_ms();
    match &outcome.classification {
        Classification::Normal => {
            info!(passes = outcome.passes, elapsed_ms, "solve completed")
        }
        Classification::Suboptimal => {
            warn!(elapsed_ms, "solve completed without proven optimality")
        }
        Classification::Deadlock { connections } => warn!(
            elapsed_ms,
            relaxed = connections.len(),
            connections = ?connections,
            "solve completed after relaxing deadlocked connections"
        ),
        Classification::DoubleDeadlock => {
            error!(elapsed_ms, "network is infeasible even after relaxation")
        }
        Classification::SolverFault { message } => {
            error!(elapsed_ms, %message, "solver fault")
        }
    }
}
