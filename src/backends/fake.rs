//! Test doubles: a scripted process runner and an in-memory cloud that
//! implements every capability trait.

use super::{
    ClusterClient, IdentityProvider, InfraEngine, InfraVars, RegistryClient, ResourceKind,
    ResourceProbe, RolloutState,
};
use crate::domain::models::RunConfig;
use crate::error::{PipelineError, Result, Stage};
use crate::exec::{CommandOutput, CommandRunner, Invocation};
use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashSet, VecDeque};
use std::path::Path;

struct Rule {
    prefix: String,
    status: i32,
    stdout: String,
    stderr: String,
}

/// Answers invocations by command-line prefix; unmatched commands succeed
/// with empty output.
#[derive(Default)]
pub struct ScriptedRunner {
    rules: Vec<Rule>,
    missing: Vec<String>,
    calls: RefCell<Vec<Invocation>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(mut self, prefix: &str, status: i32, stdout: &str, stderr: &str) -> Self {
        self.rules.push(Rule {
            prefix: prefix.to_string(),
            status,
            stdout: stdout.to_string(),
            stderr: stderr.to_string(),
        });
        self
    }

    /// Make `program` fail to spawn, as if it were not installed.
    pub fn missing(mut self, program: &str) -> Self {
        self.missing.push(program.to_string());
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().iter().map(command_line).collect()
    }

    pub fn invocations(&self) -> Vec<Invocation> {
        self.calls.borrow().clone()
    }
}

fn command_line(inv: &Invocation) -> String {
    let mut line = inv.program.clone();
    for a in &inv.args {
        line.push(' ');
        line.push_str(a);
    }
    line
}

impl CommandRunner for ScriptedRunner {
    fn run(&self, invocation: &Invocation) -> std::io::Result<CommandOutput> {
        self.calls.borrow_mut().push(invocation.clone());
        if self.missing.contains(&invocation.program) {
            return Err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("{}: not found", invocation.program),
            ));
        }
        let line = command_line(invocation);
        let out = match self.rules.iter().find(|r| line.starts_with(&r.prefix)) {
            Some(r) => CommandOutput {
                status: Some(r.status),
                stdout: r.stdout.clone(),
                stderr: r.stderr.clone(),
            },
            None => CommandOutput {
                status: Some(0),
                ..Default::default()
            },
        };
        Ok(out)
    }
}

/// In-memory stand-in for the cloud account, registry, terraform state and
/// cluster. `apply` refuses to create a resource that exists but is not
/// tracked, the way a real declarative engine does.
#[derive(Default)]
pub struct FakeCloud {
    pub account: RefCell<Option<String>>,
    /// External ids that exist in the account.
    pub existing: RefCell<HashSet<String>>,
    /// Addresses tracked in infrastructure state.
    pub tracked: RefCell<Vec<String>>,
    /// What `apply` manages: address -> external id.
    pub plan: RefCell<BTreeMap<String, String>>,
    /// Outputs produced by a successful apply.
    pub plan_outputs: RefCell<BTreeMap<String, String>>,
    pub outputs: RefCell<BTreeMap<String, String>>,
    pub initialized: Cell<bool>,
    pub repo_exists: Cell<bool>,
    pub cluster_exists: Cell<bool>,
    pub workload_present: Cell<bool>,
    pub rollout: RefCell<VecDeque<RolloutState>>,
    pub addresses: RefCell<VecDeque<Option<String>>>,
    pub import_fails: RefCell<HashSet<String>>,
    pub fail_on: RefCell<HashSet<String>>,
    pub applied_manifests: RefCell<Vec<String>>,
    pub selected_clusters: RefCell<Vec<String>>,
    pub calls: RefCell<Vec<String>>,
}

impl FakeCloud {
    pub fn new(account: &str) -> Self {
        let cloud = Self::default();
        *cloud.account.borrow_mut() = Some(account.to_string());
        cloud
    }

    pub fn fail(&self, step: &str) {
        self.fail_on.borrow_mut().insert(step.to_string());
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    fn record(&self, stage: Stage, step: &str) -> Result<()> {
        self.calls.borrow_mut().push(step.to_string());
        if self.fail_on.borrow().contains(step) {
            return Err(PipelineError::external(stage, step, Some(1), "simulated failure"));
        }
        Ok(())
    }

    fn require_init(&self) -> Result<()> {
        if !self.initialized.get() {
            return Err(PipelineError::external(
                Stage::Infrastructure,
                "terraform",
                Some(1),
                "Backend initialization required, please run \"terraform init\"",
            ));
        }
        Ok(())
    }
}

impl IdentityProvider for FakeCloud {
    fn account_id(&self, _region: &str) -> Result<String> {
        self.calls.borrow_mut().push("sts".into());
        self.account
            .borrow()
            .clone()
            .ok_or_else(|| PipelineError::CredentialsUnavailable("no credentials".into()))
    }
}

impl ResourceProbe for FakeCloud {
    fn exists(&self, _kind: ResourceKind, external_id: &str, _region: &str) -> Result<bool> {
        self.record(Stage::Infrastructure, &format!("probe {}", external_id))?;
        Ok(self.existing.borrow().contains(external_id))
    }
}

impl RegistryClient for FakeCloud {
    fn login(&self, _config: &RunConfig) -> Result<()> {
        self.record(Stage::Registry, "login")
    }

    fn repository_exists(&self, _config: &RunConfig) -> Result<bool> {
        self.record(Stage::Registry, "describe-repository")?;
        Ok(self.repo_exists.get())
    }

    fn create_repository(&self, _config: &RunConfig) -> Result<()> {
        self.record(Stage::Registry, "create-repository")?;
        if self.repo_exists.get() {
            return Err(PipelineError::external(
                Stage::Registry,
                "create-repository",
                Some(254),
                "RepositoryAlreadyExistsException",
            ));
        }
        self.repo_exists.set(true);
        Ok(())
    }

    fn build(&self, _context: &Path, _local_tag: &str) -> Result<()> {
        self.record(Stage::Registry, "build")
    }

    fn tag(&self, _local_tag: &str, _remote_ref: &str) -> Result<()> {
        self.record(Stage::Registry, "tag")
    }

    fn push(&self, _remote_ref: &str) -> Result<()> {
        self.record(Stage::Registry, "push")
    }

    fn delete_repository(&self, _config: &RunConfig) -> Result<bool> {
        self.record(Stage::Decommission, "delete-repository")?;
        Ok(self.repo_exists.replace(false))
    }
}

impl InfraEngine for FakeCloud {
    fn init(&self) -> Result<()> {
        self.record(Stage::Infrastructure, "init")?;
        self.initialized.set(true);
        Ok(())
    }

    fn tracked(&self) -> Result<Vec<String>> {
        self.require_init()?;
        Ok(self.tracked.borrow().clone())
    }

    fn import(&self, _vars: &InfraVars, address: &str, _external_id: &str) -> Result<()> {
        self.require_init()?;
        self.record(Stage::Infrastructure, &format!("import {}", address))?;
        if self.import_fails.borrow().contains(address) {
            return Err(PipelineError::external(
                Stage::Infrastructure,
                "terraform import",
                Some(1),
                "Cannot import non-existent remote object",
            ));
        }
        self.tracked.borrow_mut().push(address.to_string());
        Ok(())
    }

    fn apply(&self, _vars: &InfraVars) -> Result<()> {
        self.require_init()?;
        self.record(Stage::Infrastructure, "apply")?;
        let plan = self.plan.borrow().clone();
        for (address, id) in &plan {
            let tracked = self.tracked.borrow().contains(address);
            if !tracked && self.existing.borrow().contains(id) {
                return Err(PipelineError::external(
                    Stage::Infrastructure,
                    "terraform apply",
                    Some(1),
                    &format!("Error: creating {}: {} already exists", address, id),
                ));
            }
        }
        for (address, id) in plan {
            self.existing.borrow_mut().insert(id);
            if !self.tracked.borrow().contains(&address) {
                self.tracked.borrow_mut().push(address);
            }
        }
        *self.outputs.borrow_mut() = self.plan_outputs.borrow().clone();
        self.cluster_exists.set(true);
        Ok(())
    }

    fn outputs(&self) -> Result<BTreeMap<String, String>> {
        self.require_init()?;
        Ok(self.outputs.borrow().clone())
    }

    fn destroy(&self, _vars: &InfraVars) -> Result<()> {
        self.require_init()?;
        self.record(Stage::Decommission, "destroy")?;
        let plan = self.plan.borrow().clone();
        for (address, id) in plan {
            if self.tracked.borrow().contains(&address) {
                self.existing.borrow_mut().remove(&id);
            }
        }
        self.tracked.borrow_mut().clear();
        self.outputs.borrow_mut().clear();
        self.cluster_exists.set(false);
        Ok(())
    }
}

impl ClusterClient for FakeCloud {
    fn use_cluster(&self, cluster: &str, _region: &str) -> Result<bool> {
        self.record(Stage::Workload, "update-kubeconfig")?;
        self.selected_clusters.borrow_mut().push(cluster.to_string());
        Ok(self.cluster_exists.get())
    }

    fn apply_manifest(&self, manifest: &str) -> Result<()> {
        self.record(Stage::Workload, "kubectl apply")?;
        self.applied_manifests.borrow_mut().push(manifest.to_string());
        self.workload_present.set(true);
        Ok(())
    }

    fn deployment_status(&self, _name: &str) -> Result<RolloutState> {
        Ok(self
            .rollout
            .borrow_mut()
            .pop_front()
            .unwrap_or(RolloutState::Complete))
    }

    fn diagnostics(&self, name: &str) -> String {
        self.calls.borrow_mut().push("diagnostics".into());
        format!("pods for {}: CrashLoopBackOff", name)
    }

    fn service_address(&self, _name: &str) -> Result<Option<String>> {
        Ok(self.addresses.borrow_mut().pop_front().unwrap_or(None))
    }

    fn delete_workload(&self, _name: &str) -> Result<bool> {
        self.record(Stage::Decommission, "kubectl delete")?;
        Ok(self.workload_present.replace(false))
    }
}
