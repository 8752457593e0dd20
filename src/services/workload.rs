use crate::backends::{ClusterClient, RolloutState};
use crate::domain::models::{RunConfig, Secret};
use crate::error::{PipelineError, Result, Stage};
use crate::services::template::render;
use std::collections::BTreeMap;
use std::time::Duration;

#[derive(Debug, Clone, Copy)]
pub struct RolloutWait {
    pub timeout: Duration,
    pub poll: Duration,
}

impl RolloutWait {
    fn polls(&self) -> u64 {
        let poll = self.poll.as_millis().max(1);
        (self.timeout.as_millis().div_ceil(poll) as u64).max(1)
    }
}

pub fn workload_name(config: &RunConfig) -> String {
    config.repository_name()
}

/// Point the cluster client at `cluster_name`, render the manifest, submit
/// it, and block until the deployment has rolled out.
pub fn deploy_workload(
    cluster: &dyn ClusterClient,
    config: &RunConfig,
    cluster_name: &str,
    template: &str,
    values: &BTreeMap<String, String>,
    wait: RolloutWait,
    sleep: &mut dyn FnMut(Duration),
) -> Result<String> {
    if !cluster.use_cluster(cluster_name, &config.region)? {
        return Err(PipelineError::external(
            Stage::Workload,
            "aws eks update-kubeconfig",
            None,
            &format!("cluster {} not found in {}", cluster_name, config.region),
        ));
    }

    let manifest = render(template, values)?;
    cluster.apply_manifest(&manifest)?;
    let name = workload_name(config);
    tracing::info!(deployment = %name, "manifest applied; waiting for rollout");

    wait_for_rollout(cluster, &name, &config.secret, wait, sleep)?;
    Ok(name)
}

/// Poll until the deployment is rolled out. Diagnostics gathered on failure
/// have `secret` masked, since `kubectl describe` prints container env.
pub fn wait_for_rollout(
    cluster: &dyn ClusterClient,
    name: &str,
    secret: &Secret,
    wait: RolloutWait,
    sleep: &mut dyn FnMut(Duration),
) -> Result<()> {
    let mut last = RolloutState::Progressing {
        available: 0,
        desired: 0,
    };
    let polls = wait.polls();
    for attempt in 1..=polls {
        last = cluster.deployment_status(name)?;
        match &last {
            RolloutState::Complete => {
                tracing::info!(deployment = name, attempt, "rollout complete");
                return Ok(());
            }
            RolloutState::Failed(reason) => {
                return Err(rollout_failed(cluster, name, secret, reason.clone()));
            }
            RolloutState::Progressing { available, desired } => {
                tracing::debug!(
                    deployment = name,
                    available,
                    desired,
                    attempt,
                    "rollout in progress"
                );
                if attempt < polls {
                    sleep(wait.poll);
                }
            }
        }
    }
    let progress = match last {
        RolloutState::Progressing { available, desired } => {
            format!(" ({}/{} replicas available)", available, desired)
        }
        _ => String::new(),
    };
    Err(rollout_failed(
        cluster,
        name,
        secret,
        format!("timed out after {}s{}", wait.timeout.as_secs(), progress),
    ))
}

fn rollout_failed(
    cluster: &dyn ClusterClient,
    name: &str,
    secret: &Secret,
    reason: String,
) -> PipelineError {
    let diagnostics = secret.redact(&cluster.diagnostics(name));
    tracing::error!(deployment = name, %reason, "rollout failed, diagnostics:\n{}", diagnostics);
    PipelineError::RolloutFailed {
        deployment: name.to_string(),
        reason,
        diagnostics,
    }
}
