use crate::backends::{Backends, InfraVars};
use crate::config::Settings;
use crate::domain::models::{DecommissionReport, ImportOutcome, ProvisionReport, RunConfig};
use crate::error::{Result, Stage};
use crate::services::decommission::{decommission, overall};
use crate::services::infra::provision_infrastructure;
use crate::services::input::{collect_input, resolve_identity, Prompter};
use crate::services::keys::{ensure_keypair, KEY_NAME};
use crate::services::preflight::run_preflight;
use crate::services::registry::publish;
use crate::services::report::{report_endpoint, Backoff, EndpointProbe};
use crate::services::stager::stage_source;
use crate::services::storage::audit;
use crate::services::template::{load_template, template_values};
use crate::services::workload::{deploy_workload, RolloutWait};
use anyhow::Context;
use serde_json::json;
use std::path::Path;
use std::time::Duration;

/// Tools teardown needs; no container builds happen there.
pub const TEARDOWN_TOOLS: [&str; 3] = ["aws", "terraform", "kubectl"];

/// Run one stage, journal its start and end, and attach the stage name to
/// any failure.
fn stage<T>(journal: &Path, stage: Stage, f: impl FnOnce() -> Result<T>) -> anyhow::Result<T> {
    tracing::info!(stage = %stage, "stage started");
    audit(journal, "stage_start", json!({ "stage": stage.as_str() }));
    match f() {
        Ok(v) => {
            audit(journal, "stage_done", json!({ "stage": stage.as_str() }));
            Ok(v)
        }
        Err(e) => {
            let mut entry = json!({ "stage": stage.as_str(), "error": e.to_string() });
            if let Some(diagnostics) = e.diagnostics() {
                entry["diagnostics"] = json!(diagnostics);
            }
            audit(journal, "stage_failed", entry);
            Err(anyhow::Error::new(e).context(format!("{} stage failed", stage)))
        }
    }
}

/// Prompts, preflight, identity lookup. Shared by both directions.
fn prepare(
    backends: &Backends<'_>,
    settings: &Settings,
    prompter: &mut dyn Prompter,
    tools: &[String],
    require_container_access: bool,
) -> anyhow::Result<RunConfig> {
    let journal = settings.audit_path();
    let input = stage(&journal, Stage::Input, || {
        collect_input(prompter, &settings.default_region)
    })?;
    stage(&journal, Stage::Preflight, || {
        run_preflight(backends.runner, tools, require_container_access)
    })?;
    let config = stage(&journal, Stage::Input, || {
        resolve_identity(backends.identity, input)
    })?;
    Ok(config)
}

/// The full provisioning pipeline, top to bottom.
pub fn provision(
    backends: &Backends<'_>,
    settings: &Settings,
    prompter: &mut dyn Prompter,
    probe: Option<&dyn EndpointProbe>,
    sleep: &mut dyn FnMut(Duration),
) -> anyhow::Result<ProvisionReport> {
    let journal = settings.audit_path();
    let config = prepare(backends, settings, prompter, &settings.required_tools, true)?;
    audit(
        &journal,
        "provision_start",
        json!({
            "region": config.region,
            "prefix": config.prefix,
            "account_id": config.account_id
        }),
    );

    let staged = stage(&journal, Stage::Staging, || {
        stage_source(backends.runner, &settings.app_source, &settings.staging_dir())
    })?;
    let image = stage(&journal, Stage::Registry, || {
        publish(backends.registry, &config, &staged)
    })?;

    let infra = stage(&journal, Stage::Infrastructure, || {
        let keys = ensure_keypair(backends.runner, &settings.keys_dir())?;
        tracing::debug!(key = %keys.private.display(), "lab keypair ready");
        let vars = InfraVars::new(&config, &keys.public);
        provision_infrastructure(
            backends.infra,
            backends.probe,
            &config,
            &vars,
            &settings.required_outputs,
        )
    })?;

    let service = stage(&journal, Stage::Workload, || {
        let template = load_template(settings.manifest_template.as_deref())?;
        let values = template_values(&config, &infra.outputs, &image.tag, settings.app_port);
        let cluster_name = infra
            .outputs
            .get("cluster_name")
            .map(str::to_string)
            .unwrap_or_else(|| config.cluster_name());
        deploy_workload(
            backends.cluster,
            &config,
            &cluster_name,
            &template,
            &values,
            RolloutWait {
                timeout: settings.rollout_timeout(),
                poll: settings.rollout_poll(),
            },
            sleep,
        )
    })?;

    let endpoint = stage(&journal, Stage::Report, || {
        Ok(report_endpoint(
            backends.cluster,
            probe.filter(|_| settings.probe_endpoint),
            &service,
            Backoff {
                attempts: settings.endpoint_attempts,
                initial: Duration::from_secs(settings.endpoint_initial_backoff_secs),
                max: Duration::from_secs(settings.endpoint_max_backoff_secs),
            },
            sleep,
        ))
    })?;

    let mut warnings: Vec<String> = infra
        .reconciled
        .iter()
        .filter_map(|item| match &item.outcome {
            ImportOutcome::Failed(reason) => {
                Some(format!("reconcile {}: {}", item.address, reason))
            }
            _ => None,
        })
        .collect();
    warnings.extend(endpoint.warnings);

    audit(
        &journal,
        "provision_done",
        json!({
            "image": image.image_ref,
            "endpoint": endpoint.endpoint,
            "warnings": warnings.len()
        }),
    );

    Ok(ProvisionReport {
        region: config.region.clone(),
        prefix: config.prefix.clone(),
        account_id: config.account_id.clone(),
        image: image.image_ref,
        repository: image.repository,
        reconciled: infra.reconciled,
        outputs: infra.outputs,
        endpoint: endpoint.endpoint,
        endpoint_reachable: endpoint.reachable,
        warnings,
    })
}

/// Reverse teardown. Step failures are in the report, not raised.
pub fn decommission_range(
    backends: &Backends<'_>,
    settings: &Settings,
    prompter: &mut dyn Prompter,
) -> anyhow::Result<DecommissionReport> {
    let journal = settings.audit_path();
    let tools: Vec<String> = TEARDOWN_TOOLS.iter().map(|t| t.to_string()).collect();
    let config = prepare(backends, settings, prompter, &tools, false)?;
    audit(
        &journal,
        "decommission_start",
        json!({
            "region": config.region,
            "prefix": config.prefix,
            "account_id": config.account_id
        }),
    );

    tracing::info!(stage = %Stage::Decommission, "stage started");
    let public_key = settings.keys_dir().join(format!("{}.pub", KEY_NAME));
    let vars = InfraVars::new(&config, &public_key);
    let steps = decommission(
        backends.cluster,
        backends.registry,
        backends.infra,
        &config,
        &vars,
    );
    let status = overall(&steps).to_string();
    audit(
        &journal,
        "decommission_done",
        serde_json::to_value(&steps)
            .map(|s| json!({ "overall": status, "steps": s }))
            .context("serialize teardown steps")?,
    );

    Ok(DecommissionReport {
        region: config.region,
        prefix: config.prefix,
        overall: status,
        steps,
    })
}
