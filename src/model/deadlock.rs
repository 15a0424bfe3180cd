//! Deadlock detection
//!
//! A direct solve is infeasible when a ring of connections has hard minimum
//! requirements that only the ring itself could supply. Starting from every
//! node with a strictly positive minimum rate, the walk follows
//! node → input connection → contributing node → input connection ...
//! Each connection carries a three-state mark; reaching a connection that is
//! still on the walk stack closes a cycle. Lowlinks carry that back up the
//! stack so every connection on the cycle is flagged, not only the one that
//! closed it. This over-approximates: every cycle is flagged, whether or not
//! it actually makes the model infeasible.

use super::builder::{DeadlockMark, SolverModel};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Visit {
    Unvisited,
    OnStack,
    Resolved,
}

/// Cursor into the children of one connection on the walk stack
#[derive(Debug, Clone, Copy)]
struct Frame {
    constraint: usize,
    contributor: usize,
    input: usize,
}

impl Frame {
    fn new(constraint: usize) -> Self {
        Self {
            constraint,
            contributor: 0,
            input: 0,
        }
    }
}

/// Scratch state of one marking pass, indexed by connection tag
struct Walk {
    visit: Vec<Visit>,
    order: Vec<usize>,
    low: Vec<usize>,
    self_edge: Vec<bool>,
    flagged: Vec<bool>,
    /// Connections opened but not yet assigned to a finished cycle group
    pending: Vec<usize>,
    stack: Vec<Frame>,
    next_order: usize,
}

impl Walk {
    fn new(count: usize) -> Self {
        Self {
            visit: vec![Visit::Unvisited; count],
            order: vec![0; count],
            low: vec![0; count],
            self_edge: vec![false; count],
            flagged: vec![false; count],
            pending: Vec::new(),
            stack: Vec::new(),
            next_order: 0,
        }
    }

    fn open(&mut self, constraint: usize) {
        self.visit[constraint] = Visit::OnStack;
        self.order[constraint] = self.next_order;
        self.low[constraint] = self.next_order;
        self.next_order += 1;
        self.pending.push(constraint);
        self.stack.push(Frame::new(constraint));
    }

    /// Called once `constraint` has been popped off the walk stack
    fn close(&mut self, constraint: usize) {
        if let Some(parent) = self.stack.last() {
            let parent = parent.constraint;
            self.low[parent] = self.low[parent].min(self.low[constraint]);
        }
        if self.low[constraint] != self.order[constraint] {
            return;
        }

        // `constraint` heads a group: everything above it on `pending` shares its cycles
        let start = self
            .pending
            .iter()
            .rposition(|&c| c == constraint)
            .unwrap_or(0);
        let group = self.pending.split_off(start);
        let cyclic = group.len() > 1 || self.self_edge[constraint];
        for member in group {
            self.visit[member] = Visit::Resolved;
            self.flagged[member] |= cyclic;
        }
    }
}

/// Flag every connection lying on a forced-minimum cycle.
///
/// Returns the number of connections flagged.
pub fn mark_possible_deadlocks(model: &mut SolverModel) -> usize {
    let mut walk = Walk::new(model.constraints.len());

    for root in model.variables.iter().filter(|var| var.params.has_forced_minimum()) {
        for &start in &root.inputs {
            if walk.visit[start] != Visit::Unvisited {
                continue;
            }
            walk.open(start);

            while let Some(frame) = walk.stack.last_mut() {
                let current = frame.constraint;
                let contributors = &model.constraints[current].contributors;
                let Some(&producer) = contributors.get(frame.contributor) else {
                    walk.stack.pop();
                    walk.close(current);
                    continue;
                };

                let inputs = &model.variables[producer].inputs;
                let Some(&next) = inputs.get(frame.input) else {
                    frame.contributor += 1;
                    frame.input = 0;
                    continue;
                };
                frame.input += 1;

                if next == current {
                    walk.self_edge[current] = true;
                }
                match walk.visit[next] {
                    Visit::Unvisited => walk.open(next),
                    Visit::OnStack => {
                        walk.low[current] = walk.low[current].min(walk.order[next]);
                    }
                    Visit::Resolved => {}
                }
            }
        }
    }

    let mut marked = 0;
    for (record, is_flagged) in model.constraints.iter_mut().zip(walk.flagged) {
        if is_flagged {
            record.deadlock = DeadlockMark::PossibleDeadlock;
            marked += 1;
            tracing::debug!(connection = %record.connection, "possible deadlock");
        } else {
            record.deadlock = DeadlockMark::Clear;
        }
    }
    marked
}
