//! Capability interfaces over the external tools, plus their CLI-backed
//! implementations.
//!
//! ## Files
//! - `aws.rs`: identity lookup and resource existence probes (`aws` CLI).
//! - `ecr.rs`: container registry: ECR repository + `docker` build/tag/push.
//! - `terraform.rs`: infrastructure engine (`terraform` CLI).
//! - `kubectl.rs`: cluster control plane (`aws eks` + `kubectl`).
//!
//! Stages only see the traits below, never a concrete tool.

pub mod aws;
pub mod ecr;
pub mod kubectl;
pub mod terraform;

#[cfg(test)]
pub mod fake;

use crate::domain::models::RunConfig;
use crate::error::Result;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub trait IdentityProvider {
    /// Account id of the active credentials.
    fn account_id(&self, region: &str) -> Result<String>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    IamRole,
    S3Bucket,
    DbSubnetGroup,
    KeyPair,
    LogGroup,
}

pub trait ResourceProbe {
    fn exists(&self, kind: ResourceKind, external_id: &str, region: &str) -> Result<bool>;
}

pub trait RegistryClient {
    fn login(&self, config: &RunConfig) -> Result<()>;
    fn repository_exists(&self, config: &RunConfig) -> Result<bool>;
    fn create_repository(&self, config: &RunConfig) -> Result<()>;
    fn build(&self, context: &Path, local_tag: &str) -> Result<()>;
    fn tag(&self, local_tag: &str, remote_ref: &str) -> Result<()>;
    fn push(&self, remote_ref: &str) -> Result<()>;
    /// `Ok(false)` when the repository was already gone.
    fn delete_repository(&self, config: &RunConfig) -> Result<bool>;
}

/// Variables handed to the infrastructure engine.
#[derive(Debug, Clone)]
pub struct InfraVars {
    pub region: String,
    pub prefix: String,
    pub account_id: String,
    pub db_password: crate::domain::models::Secret,
    pub public_key_path: PathBuf,
}

impl InfraVars {
    pub fn new(config: &RunConfig, public_key_path: &Path) -> Self {
        Self {
            region: config.region.clone(),
            prefix: config.prefix.clone(),
            account_id: config.account_id.clone(),
            db_password: config.secret.clone(),
            public_key_path: public_key_path.to_path_buf(),
        }
    }

    /// `TF_VAR_*` environment entries; the only channel the secret travels on.
    pub fn env(&self) -> Vec<(String, String)> {
        vec![
            ("TF_VAR_region".into(), self.region.clone()),
            ("TF_VAR_name_prefix".into(), self.prefix.clone()),
            ("TF_VAR_account_id".into(), self.account_id.clone()),
            ("TF_VAR_db_password".into(), self.db_password.expose().to_string()),
            (
                "TF_VAR_public_key_path".into(),
                self.public_key_path.to_string_lossy().into_owned(),
            ),
        ]
    }
}

pub trait InfraEngine {
    fn init(&self) -> Result<()>;
    /// Resource addresses currently tracked in state.
    fn tracked(&self) -> Result<Vec<String>>;
    fn import(&self, vars: &InfraVars, address: &str, external_id: &str) -> Result<()>;
    fn apply(&self, vars: &InfraVars) -> Result<()>;
    fn outputs(&self) -> Result<BTreeMap<String, String>>;
    fn destroy(&self, vars: &InfraVars) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RolloutState {
    Complete,
    Progressing { available: u64, desired: u64 },
    Failed(String),
}

pub trait ClusterClient {
    /// Point the control-plane client at `cluster`. `Ok(false)` when the
    /// cluster does not exist.
    fn use_cluster(&self, cluster: &str, region: &str) -> Result<bool>;
    fn apply_manifest(&self, manifest: &str) -> Result<()>;
    fn deployment_status(&self, name: &str) -> Result<RolloutState>;
    /// Pod listing and recent logs; best effort, never fails.
    fn diagnostics(&self, name: &str) -> String;
    fn service_address(&self, name: &str) -> Result<Option<String>>;
    /// `Ok(false)` when nothing was there to delete.
    fn delete_workload(&self, name: &str) -> Result<bool>;
}

/// The set of capabilities one pipeline run works against.
pub struct Backends<'a> {
    pub identity: &'a dyn IdentityProvider,
    pub probe: &'a dyn ResourceProbe,
    pub registry: &'a dyn RegistryClient,
    pub infra: &'a dyn InfraEngine,
    pub cluster: &'a dyn ClusterClient,
    pub runner: &'a dyn crate::exec::CommandRunner,
}
