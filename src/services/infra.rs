use crate::backends::{InfraEngine, InfraVars, ResourceKind, ResourceProbe};
use crate::domain::models::{Ensured, ImportOutcome, ProvisionedOutputs, ReconcileItem, RunConfig};
use crate::error::{PipelineError, Result};
use crate::services::ensure::ensure_idempotent;

/// Proof that `init` ran in this working directory. Every state-touching
/// engine call goes through it.
pub struct InitializedWorkspace<'a> {
    engine: &'a dyn InfraEngine,
}

pub fn initialize(engine: &dyn InfraEngine) -> Result<InitializedWorkspace<'_>> {
    engine.init()?;
    tracing::debug!("infrastructure workspace initialized");
    Ok(InitializedWorkspace { engine })
}

impl InitializedWorkspace<'_> {
    pub fn tracked(&self) -> Result<Vec<String>> {
        self.engine.tracked()
    }

    pub fn import(&self, vars: &InfraVars, address: &str, external_id: &str) -> Result<()> {
        self.engine.import(vars, address, external_id)
    }

    pub fn apply(&self, vars: &InfraVars) -> Result<()> {
        self.engine.apply(vars)
    }

    pub fn outputs(&self) -> Result<ProvisionedOutputs> {
        Ok(ProvisionedOutputs(self.engine.outputs()?))
    }

    pub fn destroy(&self, vars: &InfraVars) -> Result<()> {
        self.engine.destroy(vars)
    }
}

/// A resource that may exist from an earlier, interrupted run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileTarget {
    pub address: &'static str,
    pub kind: ResourceKind,
    pub external_id: String,
}

pub fn reconcile_targets(config: &RunConfig) -> Vec<ReconcileTarget> {
    let p = &config.prefix;
    vec![
        ReconcileTarget {
            address: "aws_iam_role.cluster",
            kind: ResourceKind::IamRole,
            external_id: format!("{}-cluster-role", p),
        },
        ReconcileTarget {
            address: "aws_iam_role.nodes",
            kind: ResourceKind::IamRole,
            external_id: format!("{}-node-role", p),
        },
        ReconcileTarget {
            address: "aws_s3_bucket.assets",
            kind: ResourceKind::S3Bucket,
            // bucket names must be lowercase
            external_id: format!("{}-assets-{}", p, config.account_id).to_lowercase(),
        },
        ReconcileTarget {
            address: "aws_db_subnet_group.db",
            kind: ResourceKind::DbSubnetGroup,
            // RDS stores subnet group names lowercased
            external_id: format!("{}-db-subnets", p).to_lowercase(),
        },
        ReconcileTarget {
            address: "aws_key_pair.lab",
            kind: ResourceKind::KeyPair,
            external_id: format!("{}-key", p),
        },
        ReconcileTarget {
            address: "aws_cloudwatch_log_group.cluster",
            kind: ResourceKind::LogGroup,
            external_id: format!("/aws/eks/{}-cluster/cluster", p),
        },
    ]
}

/// Bring pre-existing, untracked resources under management so `apply`
/// does not collide with them. Failures are reported per item, never raised.
pub fn reconcile(
    workspace: &InitializedWorkspace<'_>,
    probe: &dyn ResourceProbe,
    config: &RunConfig,
    vars: &InfraVars,
) -> Vec<ReconcileItem> {
    let tracked = match workspace.tracked() {
        Ok(t) => t,
        Err(e) => {
            tracing::warn!(error = %e, "could not list tracked resources; reconciling all targets");
            Vec::new()
        }
    };

    reconcile_targets(config)
        .into_iter()
        .map(|target| {
            let mut imported = false;
            let result = ensure_idempotent(
                || Ok(tracked.iter().any(|a| a == target.address)),
                || {
                    if probe.exists(target.kind, &target.external_id, &config.region)? {
                        workspace.import(vars, target.address, &target.external_id)?;
                        imported = true;
                    }
                    Ok(())
                },
            );
            let outcome = match result {
                Ok(Ensured::Existed) => ImportOutcome::AlreadyTracked,
                Ok(Ensured::Created) if imported => ImportOutcome::Imported,
                Ok(Ensured::Created) => ImportOutcome::Absent,
                Err(e) => {
                    tracing::warn!(
                        address = target.address,
                        error = %e,
                        "reconciliation step failed"
                    );
                    ImportOutcome::Failed(e.to_string())
                }
            };
            tracing::debug!(address = target.address, outcome = ?outcome, "reconciled");
            ReconcileItem {
                address: target.address.to_string(),
                external_id: target.external_id,
                outcome,
            }
        })
        .collect()
}

pub fn check_outputs(outputs: &ProvisionedOutputs, required: &[String]) -> Result<()> {
    let missing: Vec<String> = required
        .iter()
        .filter(|name| outputs.get(name).map_or(true, |v| v.trim().is_empty()))
        .cloned()
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(PipelineError::IncompleteProvisioning { missing })
    }
}

#[derive(Debug)]
pub struct ProvisionedInfra {
    pub reconciled: Vec<ReconcileItem>,
    pub outputs: ProvisionedOutputs,
}

/// init, reconcile, apply, then read and check outputs.
pub fn provision_infrastructure(
    engine: &dyn InfraEngine,
    probe: &dyn ResourceProbe,
    config: &RunConfig,
    vars: &InfraVars,
    required_outputs: &[String],
) -> Result<ProvisionedInfra> {
    let workspace = initialize(engine)?;
    let reconciled = reconcile(&workspace, probe, config, vars);
    workspace.apply(vars)?;
    let outputs = workspace.outputs()?;
    check_outputs(&outputs, required_outputs)?;
    tracing::info!(outputs = outputs.0.len(), "infrastructure applied");
    Ok(ProvisionedInfra {
        reconciled,
        outputs,
    })
}
