use crate::domain::models::{CheckItem, PreflightReport};
use crate::error::{PipelineError, Result};
use crate::exec::{CommandRunner, Invocation};

pub const DOCKER_REMEDIATION: &str = "sudo usermod -aG docker $USER && newgrp docker";

/// The cheapest invocation that proves a tool runs.
fn version_probe(tool: &str) -> Invocation {
    match tool {
        "terraform" => Invocation::new(tool).arg("version"),
        "kubectl" => Invocation::new(tool).args(["version", "--client"]),
        "ssh-keygen" => Invocation::new(tool).arg("-?"),
        _ => Invocation::new(tool).arg("--version"),
    }
}

/// A tool counts as present when it can be spawned; `ssh-keygen -?` exits
/// non-zero even when installed.
fn tool_present(runner: &dyn CommandRunner, tool: &str) -> bool {
    match runner.run(&version_probe(tool)) {
        Ok(out) => {
            tracing::trace!(tool, status = ?out.status, "tool probe");
            true
        }
        Err(e) => {
            tracing::debug!(tool, error = %e, "tool probe failed");
            false
        }
    }
}

pub fn missing_tools(runner: &dyn CommandRunner, tools: &[String]) -> Vec<String> {
    tools
        .iter()
        .filter(|t| !tool_present(runner, t))
        .cloned()
        .collect()
}

#[derive(Debug, PartialEq, Eq)]
pub enum ContainerAccess {
    Ok,
    Denied(String),
    Unavailable(String),
}

pub fn container_access(runner: &dyn CommandRunner) -> ContainerAccess {
    let inv = Invocation::new("docker").args(["info", "--format", "{{.ServerVersion}}"]);
    match runner.run(&inv) {
        Ok(out) if out.success() => ContainerAccess::Ok,
        Ok(out) => {
            let detail = crate::error::last_line(&out.stderr);
            if out.stderr.to_ascii_lowercase().contains("permission denied") {
                ContainerAccess::Denied(detail)
            } else {
                ContainerAccess::Unavailable(detail)
            }
        }
        Err(e) => ContainerAccess::Unavailable(e.to_string()),
    }
}

/// Fails with every missing tool at once, then optionally checks container
/// build access.
pub fn run_preflight(
    runner: &dyn CommandRunner,
    tools: &[String],
    require_container_access: bool,
) -> Result<()> {
    let missing = missing_tools(runner, tools);
    if !missing.is_empty() {
        return Err(PipelineError::MissingDependencies { tools: missing });
    }
    if !require_container_access {
        tracing::info!(tools = tools.len(), "preflight checks passed");
        return Ok(());
    }
    match container_access(runner) {
        ContainerAccess::Ok => {}
        ContainerAccess::Denied(detail) => {
            tracing::debug!(%detail, "docker daemon refused access");
            return Err(PipelineError::PermissionDenied {
                action: "docker build".to_string(),
                remediation: DOCKER_REMEDIATION.to_string(),
            });
        }
        ContainerAccess::Unavailable(detail) => {
            return Err(PipelineError::external(
                crate::error::Stage::Preflight,
                "docker info",
                None,
                &detail,
            ));
        }
    }
    tracing::info!(tools = tools.len(), "preflight checks passed");
    Ok(())
}

/// Read-only report for `rangectl doctor`.
pub fn preflight_report(runner: &dyn CommandRunner, tools: &[String]) -> PreflightReport {
    let missing = missing_tools(runner, tools);
    let tool_items: Vec<CheckItem> = tools
        .iter()
        .map(|t| CheckItem {
            name: t.clone(),
            status: if missing.contains(t) { "missing" } else { "ok" }.to_string(),
        })
        .collect();
    let container_access = CheckItem {
        name: "docker_daemon".to_string(),
        status: match container_access(runner) {
            ContainerAccess::Ok => "ok",
            ContainerAccess::Denied(_) => "permission_denied",
            ContainerAccess::Unavailable(_) => "unavailable",
        }
        .to_string(),
    };
    let overall = if missing.is_empty() && container_access.status == "ok" {
        "ok"
    } else {
        "needs_attention"
    }
    .to_string();
    PreflightReport {
        overall,
        tools: tool_items,
        container_access,
    }
}
