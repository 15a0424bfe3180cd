//! End-to-end solves through the good_lp backend.

#![cfg(feature = "optimization")]

use flow_balancer::config::SolverSettings;
use flow_balancer::graph::{ConnectionSpec, NodeSpec};
use flow_balancer::model::{ConnectionId, ConnectionParams, NodeId, NodeParams, Penalty, Port};
use flow_balancer::orchestrator::{SolvePhase, SolveResult};
use flow_balancer::{Classification, ConnectionState, FlowSolver, GraphSnapshot, ProductionGraph};
use proptest::prelude::*;

const TOL: f64 = 1e-6;

fn solver() -> FlowSolver {
    FlowSolver::with_good_lp(SolverSettings::default())
}

fn node(id: u32, min: f64) -> NodeSpec {
    NodeSpec::new(NodeId(id), NodeParams::new(min, None, Penalty::default()))
}

/// Every node rate within `[min, max]`, every connection's `flow + slack`
/// within `[min, max]` and every slack non-negative
fn bound_violations(snapshot: &GraphSnapshot, result: &SolveResult) -> Vec<String> {
    let mut violations = Vec::new();
    for spec in &snapshot.nodes {
        let (lower, upper) = spec.params.variable_bounds();
        match result.rate(spec.id) {
            Some(rate) if rate >= lower - 1e-5 && rate <= upper + 1e-5 => {}
            other => violations.push(format!("{}: rate {other:?} outside [{lower}, {upper}]", spec.id)),
        }
    }
    for spec in &snapshot.connections {
        let (lower, upper) = spec.params.constraint_bounds();
        let Some(report) = result.connection(spec.id) else {
            violations.push(format!("{}: missing", spec.id));
            continue;
        };
        let supplied = report.flow + report.slack;
        if report.slack < 0.0 || supplied < lower - 1e-5 || supplied > upper + 1e-5 {
            violations.push(format!(
                "{}: flow {} + slack {} outside [{lower}, {upper}]",
                spec.id, report.flow, report.slack
            ));
        }
    }
    violations
}

/// Two nodes that each need their own output to run
fn self_sustaining_pair() -> GraphSnapshot {
    GraphSnapshot::new(
        vec![node(1, 1.0), node(2, 1.0)],
        vec![ConnectionSpec::new(
            ConnectionId(1),
            ConnectionParams::balanced(),
            vec![
                Port::produces(NodeId(1), 1.0),
                Port::consumes(NodeId(1), 2.0),
                Port::produces(NodeId(2), 1.0),
                Port::consumes(NodeId(2), 2.0),
            ],
        )],
    )
}

fn producer_consumer() -> GraphSnapshot {
    GraphSnapshot::new(
        vec![node(1, 0.0), node(2, 5.0)],
        vec![ConnectionSpec::new(
            ConnectionId(1),
            ConnectionParams::at_least_balanced(),
            vec![Port::produces(NodeId(1), 1.0), Port::consumes(NodeId(2), 1.0)],
        )],
    )
}

#[test]
fn test_self_sustaining_pair_is_relaxed_into_deadlock() {
    let outcome = solver().solve_blocking(&self_sustaining_pair()).unwrap();

    assert_eq!(
        outcome.classification,
        Classification::Deadlock {
            connections: vec![ConnectionId(1)]
        }
    );
    assert_eq!(outcome.passes, 2);
    assert_eq!(outcome.phase, SolvePhase::Solved);

    let result = outcome.result.unwrap();
    let report = result.connection(ConnectionId(1)).unwrap();
    assert_eq!(report.state, ConnectionState::Starving);
    assert!(report.slack > TOL);
    assert!((report.flow + report.slack).abs() < 1e-5);
    assert!(result.rate(NodeId(1)).unwrap() >= 1.0 - TOL);
    assert_eq!(bound_violations(&self_sustaining_pair(), &result), Vec::<String>::new());
}

/// Ring 1 -a-> 2 -b-> 3 -c-> 1 where node 1 can make at most 1 unit but
/// node 2 needs 10. Node 3 is listed first so the walk enters the ring at b
/// and closes it on b, while the shortfall sits on a.
fn starved_ring() -> GraphSnapshot {
    let link = |id, from, to| {
        ConnectionSpec::new(
            ConnectionId(id),
            ConnectionParams::at_least_balanced(),
            vec![Port::produces(NodeId(from), 1.0), Port::consumes(NodeId(to), 1.0)],
        )
    };
    GraphSnapshot::new(
        vec![
            node(3, 0.1),
            NodeSpec::new(NodeId(1), NodeParams::new(0.0, Some(1.0), Penalty::default())),
            node(2, 10.0),
        ],
        vec![link(1, 1, 2), link(2, 2, 3), link(3, 3, 1)],
    )
}

#[test]
fn test_ring_shortfall_away_from_closing_edge_is_relaxed() {
    let snapshot = starved_ring();
    let outcome = solver().solve_blocking(&snapshot).unwrap();

    assert_eq!(
        outcome.classification,
        Classification::Deadlock {
            connections: vec![ConnectionId(1), ConnectionId(2), ConnectionId(3)]
        }
    );
    assert_eq!(outcome.passes, 2);

    let result = outcome.result.unwrap();
    let starved = result.connection(ConnectionId(1)).unwrap();
    assert_eq!(starved.state, ConnectionState::Starving);
    assert!((starved.slack - 9.0).abs() < 1e-5);
    assert!(result.rate(NodeId(1)).unwrap() <= 1.0 + 1e-5);
    assert_eq!(bound_violations(&snapshot, &result), Vec::<String>::new());
}

#[test]
fn test_finite_maxima_are_respected() {
    // Producer capped at 8, link capped at 3 units of surplus, consumer needs 5
    let snapshot = GraphSnapshot::new(
        vec![
            NodeSpec::new(NodeId(1), NodeParams::new(6.0, Some(8.0), Penalty::default())),
            NodeSpec::new(NodeId(2), NodeParams::new(5.0, Some(7.0), Penalty::default())),
        ],
        vec![ConnectionSpec::new(
            ConnectionId(1),
            ConnectionParams::new(0.0, Some(3.0)),
            vec![Port::produces(NodeId(1), 1.0), Port::consumes(NodeId(2), 1.0)],
        )],
    );

    let outcome = solver().solve_blocking(&snapshot).unwrap();
    assert_eq!(outcome.classification, Classification::Normal);

    let result = outcome.result.unwrap();
    assert!((result.rate(NodeId(1)).unwrap() - 6.0).abs() < 1e-5);
    assert!((result.rate(NodeId(2)).unwrap() - 5.0).abs() < 1e-5);
    assert_eq!(
        result.state(ConnectionId(1)),
        Some(ConnectionState::Overproduction)
    );
    assert_eq!(bound_violations(&snapshot, &result), Vec::<String>::new());
}

#[test]
fn test_producer_meets_consumer_minimum() {
    let outcome = solver().solve_blocking(&producer_consumer()).unwrap();

    assert_eq!(outcome.classification, Classification::Normal);
    assert_eq!(outcome.passes, 1);

    let result = outcome.result.unwrap();
    assert!((result.rate(NodeId(1)).unwrap() - 5.0).abs() < 1e-5);
    assert!((result.rate(NodeId(2)).unwrap() - 5.0).abs() < 1e-5);
    assert_eq!(result.state(ConnectionId(1)), Some(ConnectionState::Optimal));
}

#[test]
fn test_independent_connections_solve_without_relaxation() {
    let snapshot = GraphSnapshot::new(
        vec![node(1, 0.0), node(2, 2.0), node(3, 0.0)],
        vec![
            ConnectionSpec::new(
                ConnectionId(1),
                ConnectionParams::at_least_balanced(),
                vec![Port::produces(NodeId(1), 1.0), Port::consumes(NodeId(2), 1.0)],
            ),
            ConnectionSpec::new(
                ConnectionId(2),
                ConnectionParams::at_least_balanced(),
                vec![Port::produces(NodeId(3), 1.0)],
            ),
        ],
    );

    let outcome = solver().solve_blocking(&snapshot).unwrap();
    assert_eq!(outcome.classification, Classification::Normal);
    assert_eq!(outcome.passes, 1);

    let result = outcome.result.unwrap();
    assert!((result.rate(NodeId(1)).unwrap() - 2.0).abs() < 1e-5);
    assert!(result.rate(NodeId(3)).unwrap().abs() < 1e-5);
    assert_eq!(result.state(ConnectionId(1)), Some(ConnectionState::Optimal));
    assert_eq!(result.state(ConnectionId(2)), Some(ConnectionState::Optimal));
}

#[test]
fn test_hard_restricted_node_runs_at_its_minimum() {
    let snapshot = GraphSnapshot::new(
        vec![
            NodeSpec::new(NodeId(1), NodeParams::pinned(4.0)),
            node(2, 1.0),
        ],
        vec![ConnectionSpec::new(
            ConnectionId(1),
            ConnectionParams::at_least_balanced(),
            vec![Port::produces(NodeId(1), 1.0), Port::consumes(NodeId(2), 1.0)],
        )],
    );

    let outcome = solver().solve_blocking(&snapshot).unwrap();
    assert_eq!(outcome.classification, Classification::Normal);

    let result = outcome.result.unwrap();
    assert!((result.rate(NodeId(1)).unwrap() - 4.0).abs() < 1e-5);
    assert!((result.rate(NodeId(2)).unwrap() - 1.0).abs() < 1e-5);
    assert_eq!(
        result.state(ConnectionId(1)),
        Some(ConnectionState::Overproduction)
    );
}

#[test]
fn test_unchanged_snapshot_solves_identically() {
    let solver = solver();
    let first = solver.solve_blocking(&self_sustaining_pair()).unwrap();
    let second = solver.solve_blocking(&self_sustaining_pair()).unwrap();

    assert_ne!(first.id, second.id);
    assert_eq!(first.classification, second.classification);
    assert_eq!(first.result, second.result);
}

#[test]
fn test_empty_graph_is_normal() {
    let outcome = solver().solve_blocking(&GraphSnapshot::default()).unwrap();
    assert_eq!(outcome.classification, Classification::Normal);
    assert!(outcome.result.unwrap().rates.is_empty());
}

#[tokio::test]
async fn test_async_solve_writes_back_to_graph() {
    let mut graph = ProductionGraph::from_snapshot(&producer_consumer()).unwrap();

    let outcome = solver()
        .solve(&graph.snapshot())
        .unwrap()
        .apply_to(&mut graph)
        .await;

    assert!(!outcome.is_fatal());
    assert!((graph.rate(NodeId(1)).unwrap() - 5.0).abs() < 1e-5);
    assert_eq!(graph.state(ConnectionId(1)), Some(ConnectionState::Optimal));
    assert_eq!(graph.last_classification(), Some(&Classification::Normal));
}

#[tokio::test]
async fn test_fatal_solve_leaves_graph_state_untouched() {
    let settings = SolverSettings {
        relax_deadlocks: false,
        ..SolverSettings::default()
    };
    let mut graph = ProductionGraph::from_snapshot(&self_sustaining_pair()).unwrap();

    let outcome = FlowSolver::with_good_lp(settings)
        .solve(&graph.snapshot())
        .unwrap()
        .apply_to(&mut graph)
        .await;

    assert_eq!(outcome.classification, Classification::DoubleDeadlock);
    assert_eq!(graph.rate(NodeId(1)), None);
    assert_eq!(graph.state(ConnectionId(1)), None);
    assert_eq!(
        graph.last_classification(),
        Some(&Classification::DoubleDeadlock)
    );
}

/// A linear chain `0 -> 1 -> ... -> n` where each link carries `ratio`
/// units per unit of producer rate into one unit per consumer rate.
fn chain(mins: &[f64], ratios: &[f64]) -> GraphSnapshot {
    let nodes = mins
        .iter()
        .enumerate()
        .map(|(i, &min)| node(i as u32, min))
        .collect();
    let connections = ratios
        .iter()
        .enumerate()
        .map(|(i, &ratio)| {
            ConnectionSpec::new(
                ConnectionId(i as u32),
                ConnectionParams::at_least_balanced(),
                vec![
                    Port::produces(NodeId(i as u32), ratio),
                    Port::consumes(NodeId(i as u32 + 1), 1.0),
                ],
            )
        })
        .collect();
    GraphSnapshot::new(nodes, connections)
}

/// Same chain shape with finite bounds everywhere, built around a known
/// feasible point `rates` so the model is never infeasible.
///
/// Node i gets `[rate * low, rate * high]`; link i gets its flow at that
/// point widened by `below` and `above`.
fn bounded_chain(rates: &[f64], ratios: &[f64], widen: &[(f64, f64, f64, f64)]) -> GraphSnapshot {
    let nodes = rates
        .iter()
        .zip(widen)
        .enumerate()
        .map(|(i, (&rate, &(low, high, _, _)))| {
            NodeSpec::new(
                NodeId(i as u32),
                NodeParams::new(rate * low, Some(rate * high), Penalty::default()),
            )
        })
        .collect();
    let connections = ratios
        .iter()
        .zip(widen)
        .enumerate()
        .map(|(i, (&ratio, &(_, _, below, above)))| {
            let flow = ratio * rates[i] - rates[i + 1];
            ConnectionSpec::new(
                ConnectionId(i as u32),
                ConnectionParams::new(flow - below, Some(flow + above)),
                vec![
                    Port::produces(NodeId(i as u32), ratio),
                    Port::consumes(NodeId(i as u32 + 1), 1.0),
                ],
            )
        })
        .collect();
    GraphSnapshot::new(nodes, connections)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_acyclic_chains_stay_within_bounds(
        (mins, ratios) in (2usize..8).prop_flat_map(|n| (
            prop::collection::vec(0.0f64..10.0, n),
            prop::collection::vec(0.5f64..3.0, n - 1),
        ))
    ) {
        let snapshot = chain(&mins, &ratios);
        let outcome = solver().solve_blocking(&snapshot).unwrap();
        prop_assert!(
            matches!(outcome.classification, Classification::Normal | Classification::Suboptimal)
        );

        let result = outcome.result.unwrap();
        prop_assert_eq!(bound_violations(&snapshot, &result), Vec::<String>::new());
        for report in &result.connections {
            prop_assert_eq!(report.slack, 0.0);
            prop_assert_ne!(report.state, ConnectionState::Starving);
        }
    }

    #[test]
    fn prop_bounded_chains_stay_within_finite_bounds(
        (rates, ratios, widen) in (2usize..8).prop_flat_map(|n| (
            prop::collection::vec(0.5f64..10.0, n),
            prop::collection::vec(0.5f64..3.0, n - 1),
            prop::collection::vec((0.0f64..1.0, 1.0f64..2.0, 0.0f64..2.0, 0.0f64..2.0), n),
        ))
    ) {
        let snapshot = bounded_chain(&rates, &ratios, &widen);
        let outcome = solver().solve_blocking(&snapshot).unwrap();
        prop_assert!(
            matches!(outcome.classification, Classification::Normal | Classification::Suboptimal)
        );
        prop_assert_eq!(outcome.passes, 1);

        let result = outcome.result.unwrap();
        prop_assert_eq!(bound_violations(&snapshot, &result), Vec::<String>::new());
    }
}
