use anyhow::{Context, Result};
use flow_balancer::config::Config;
use flow_balancer::telemetry::init_tracing;
use flow_balancer::{FlowSolver, GraphSnapshot, ProductionGraph};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let cfg = Config::load()?;
    init_tracing(&cfg.telemetry);

    let path = std::env::args()
        .nth(1)
        .context("usage: flow-balancer <snapshot.json>")?;
    let raw = std::fs::read_to_string(&path).with_context(|| format!("reading {path}"))?;
    let snapshot: GraphSnapshot =
        serde_json::from_str(&raw).with_context(|| format!("parsing {path}"))?;

    let mut graph = ProductionGraph::from_snapshot(&snapshot)?;
    info!(
        %path,
        nodes = snapshot.nodes.len(),
        connections = snapshot.connections.len(),
        "loaded snapshot"
    );

    let solver = FlowSolver::with_good_lp(cfg.solver.clone());
    let outcome = solver.solve(&graph.snapshot())?.apply_to(&mut graph).await;

    println!("{}", serde_json::to_string_pretty(&outcome)?);

    if outcome.is_fatal() {
        std::process::exit(1);
    }
    Ok(())
}
