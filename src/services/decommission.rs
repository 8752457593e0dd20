use crate::backends::{ClusterClient, InfraEngine, InfraVars, RegistryClient};
use crate::domain::models::{RunConfig, TeardownOutcome, TeardownStep};
use crate::error::Result;
use crate::services::infra::initialize;
use crate::services::workload::workload_name;

fn teardown_outcome(removed: Result<bool>) -> TeardownOutcome {
    match removed {
        Ok(true) => TeardownOutcome::Removed,
        Ok(false) => TeardownOutcome::AlreadyAbsent,
        Err(e) => TeardownOutcome::Failed(e.to_string()),
    }
}

fn remove_workload(cluster: &dyn ClusterClient, config: &RunConfig) -> Result<bool> {
    if !cluster.use_cluster(&config.cluster_name(), &config.region)? {
        return Ok(false);
    }
    cluster.delete_workload(&workload_name(config))
}

fn destroy_infrastructure(infra: &dyn InfraEngine, vars: &InfraVars) -> Result<bool> {
    let workspace = initialize(infra)?;
    if workspace.tracked()?.is_empty() {
        return Ok(false);
    }
    workspace.destroy(vars)?;
    Ok(true)
}

/// Reverse teardown: workload, registry repository, then infrastructure.
/// Every step runs; a failure is recorded and the next step still goes.
pub fn decommission(
    cluster: &dyn ClusterClient,
    registry: &dyn RegistryClient,
    infra: &dyn InfraEngine,
    config: &RunConfig,
    vars: &InfraVars,
) -> Vec<TeardownStep> {
    let steps: [(&str, Box<dyn FnOnce() -> Result<bool> + '_>); 3] = [
        ("workload", Box::new(|| remove_workload(cluster, config))),
        ("registry", Box::new(|| registry.delete_repository(config))),
        ("infrastructure", Box::new(|| destroy_infrastructure(infra, vars))),
    ];

    steps
        .into_iter()
        .map(|(name, step)| {
            let outcome = teardown_outcome(step());
            match &outcome {
                TeardownOutcome::Failed(reason) => {
                    tracing::warn!(step = name, %reason, "teardown step failed; continuing")
                }
                other => tracing::info!(step = name, outcome = ?other, "teardown step finished"),
            }
            TeardownStep {
                name: name.to_string(),
                outcome,
            }
        })
        .collect()
}

pub fn overall(steps: &[TeardownStep]) -> &'static str {
    if steps
        .iter()
        .any(|s| matches!(s.outcome, TeardownOutcome::Failed(_)))
    {
        "partial"
    } else {
        "ok"
    }
}
