use super::{ClusterClient, RolloutState};
use crate::error::{PipelineError, Result, Stage};
use crate::exec::{run_step, run_tolerant, CommandRunner, Invocation};
use serde_json::Value;

/// Cluster access through `aws eks update-kubeconfig` and `kubectl`.
pub struct KubectlCluster<'a> {
    runner: &'a dyn CommandRunner,
    stage: Stage,
}

impl<'a> KubectlCluster<'a> {
    pub fn new(runner: &'a dyn CommandRunner) -> Self {
        Self {
            runner,
            stage: Stage::Workload,
        }
    }

    pub fn for_stage(mut self, stage: Stage) -> Self {
        self.stage = stage;
        self
    }

    fn get_json(&self, kind: &str, name: &str) -> Result<Value> {
        let inv = Invocation::new("kubectl").args(["get", kind, name, "-o", "json"]);
        let out = run_step(self.runner, self.stage, &inv)?;
        serde_json::from_str(&out.stdout).map_err(|e| {
            PipelineError::external(self.stage, inv.display_name(), out.status, &e.to_string())
        })
    }
}

impl ClusterClient for KubectlCluster<'_> {
    fn use_cluster(&self, cluster: &str, region: &str) -> Result<bool> {
        let inv = Invocation::new("aws").args([
            "eks",
            "update-kubeconfig",
            "--name",
            cluster,
            "--region",
            region,
        ]);
        let out = run_tolerant(self.runner, self.stage, &inv)?;
        if out.success() {
            return Ok(true);
        }
        if out.stderr.contains("ResourceNotFoundException") {
            return Ok(false);
        }
        Err(PipelineError::external(
            self.stage,
            inv.display_name(),
            out.status,
            &out.stderr,
        ))
    }

    fn apply_manifest(&self, manifest: &str) -> Result<()> {
        let inv = Invocation::new("kubectl")
            .args(["apply", "-f", "-"])
            .stdin(manifest);
        let out = run_step(self.runner, self.stage, &inv)?;
        for line in out.stdout.lines() {
            tracing::info!("{}", line.trim());
        }
        Ok(())
    }

    fn deployment_status(&self, name: &str) -> Result<RolloutState> {
        Ok(rollout_state(&self.get_json("deployment", name)?))
    }

    fn diagnostics(&self, name: &str) -> String {
        let selector = format!("app={}", name);
        let probes = [
            Invocation::new("kubectl").args(["get", "pods", "-l", selector.as_str(), "-o", "wide"]),
            Invocation::new("kubectl").args(["describe", "deployment", name]),
            Invocation::new("kubectl").args([
                "logs",
                "-l",
                selector.as_str(),
                "--tail=50",
                "--all-containers",
            ]),
        ];
        let mut report = String::new();
        for inv in probes {
            report.push_str(&format!("$ {}\n", inv.args.join(" ")));
            match self.runner.run(&inv) {
                Ok(out) => {
                    report.push_str(&out.stdout);
                    report.push_str(&out.stderr);
                }
                Err(e) => report.push_str(&format!("unavailable: {}\n", e)),
            }
        }
        report
    }

    fn service_address(&self, name: &str) -> Result<Option<String>> {
        Ok(ingress_address(&self.get_json("service", name)?))
    }

    fn delete_workload(&self, name: &str) -> Result<bool> {
        let deployment = format!("deployment/{}", name);
        let service = format!("service/{}", name);
        let inv = Invocation::new("kubectl").args([
            "delete",
            deployment.as_str(),
            service.as_str(),
            "--ignore-not-found",
        ]);
        let out = run_step(self.runner, self.stage, &inv)?;
        Ok(out.stdout.contains("deleted"))
    }
}

fn as_u64(v: &Value, path: &[&str]) -> Option<u64> {
    path.iter()
        .try_fold(v, |cur, key| cur.get(key))
        .and_then(Value::as_u64)
}

/// Same completion rule `kubectl rollout status` applies to a Deployment.
pub fn rollout_state(doc: &Value) -> RolloutState {
    let conditions = doc
        .pointer("/status/conditions")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();
    for c in &conditions {
        if c.get("type").and_then(Value::as_str) == Some("Progressing")
            && c.get("reason").and_then(Value::as_str) == Some("ProgressDeadlineExceeded")
        {
            let msg = c
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("progress deadline exceeded");
            return RolloutState::Failed(msg.to_string());
        }
    }

    let desired = as_u64(doc, &["spec", "replicas"]).unwrap_or(1);
    let generation = as_u64(doc, &["metadata", "generation"]).unwrap_or(0);
    let observed = as_u64(doc, &["status", "observedGeneration"]).unwrap_or(0);
    let updated = as_u64(doc, &["status", "updatedReplicas"]).unwrap_or(0);
    let total = as_u64(doc, &["status", "replicas"]).unwrap_or(0);
    let available = as_u64(doc, &["status", "availableReplicas"]).unwrap_or(0);

    if observed >= generation && updated >= desired && total <= updated && available >= updated {
        RolloutState::Complete
    } else {
        RolloutState::Progressing { available, desired }
    }
}

fn ingress_address(doc: &Value) -> Option<String> {
    let first = doc
        .pointer("/status/loadBalancer/ingress")?
        .as_array()?
        .first()?;
    first
        .get("hostname")
        .or_else(|| first.get("ip"))
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
