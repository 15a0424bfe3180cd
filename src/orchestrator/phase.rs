use serde::Serialize;
use strum::{AsRefStr, Display};

/// Lifecycle of one solve attempt.
///
/// `Unsolved → Solving → {Solved, Relaxing, Failed}`, `Relaxing → {Solved, Failed}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SolvePhase {
    Unsolved,
    Solving,
    Relaxing,
    Solved,
    Failed,
}

impl SolvePhase {
    pub fn can_advance_to(self, next: SolvePhase) -> bool {
        use SolvePhase::*;
        matches!(
            (self, next),
            (Unsolved, Solving)
                | (Solving, Solved)
                | (Solving, Relaxing)
                | (Solving, Failed)
                | (Relaxing, Solved)
                | (Relaxing, Failed)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, SolvePhase::Solved | SolvePhase::Failed)
    }

    pub(crate) fn advance(&mut self, next: SolvePhase) {
        debug_assert!(
            self.can_advance_to(next),
            "illegal solve transition {self} -> {next}"
        );
        tracing::debug!(from = %self, to = %next, "solve phase");
        *self = next;
    }
}
