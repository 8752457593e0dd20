use super::{IdentityProvider, ResourceKind, ResourceProbe};
use crate::error::{PipelineError, Result, Stage};
use crate::exec::{run_tolerant, CommandRunner, Invocation};
use serde::Deserialize;

/// `aws` CLI for identity lookups and existence probes.
pub struct AwsCli<'a> {
    runner: &'a dyn CommandRunner,
}

impl<'a> AwsCli<'a> {
    pub fn new(runner: &'a dyn CommandRunner) -> Self {
        Self { runner }
    }
}

#[derive(Deserialize)]
struct CallerIdentity {
    #[serde(rename = "Account")]
    account: String,
}

#[derive(Deserialize)]
struct LogGroups {
    #[serde(rename = "logGroups", default)]
    log_groups: Vec<LogGroup>,
}

#[derive(Deserialize)]
struct LogGroup {
    #[serde(rename = "logGroupName")]
    name: String,
}

impl IdentityProvider for AwsCli<'_> {
    fn account_id(&self, region: &str) -> Result<String> {
        let inv = Invocation::new("aws").args([
            "sts",
            "get-caller-identity",
            "--output",
            "json",
            "--region",
            region,
        ]);
        let out = self
            .runner
            .run(&inv)
            .map_err(|e| PipelineError::CredentialsUnavailable(e.to_string()))?;
        if !out.success() {
            return Err(PipelineError::CredentialsUnavailable(
                crate::error::last_line(&out.stderr),
            ));
        }
        let id: CallerIdentity = serde_json::from_str(&out.stdout).map_err(|e| {
            PipelineError::CredentialsUnavailable(format!("unreadable identity response: {}", e))
        })?;
        Ok(id.account)
    }
}

fn probe_invocation(kind: ResourceKind, id: &str, region: &str) -> Invocation {
    match kind {
        ResourceKind::IamRole => {
            Invocation::new("aws").args(["iam", "get-role", "--role-name", id])
        }
        ResourceKind::S3Bucket => {
            Invocation::new("aws").args(["s3api", "head-bucket", "--bucket", id])
        }
        ResourceKind::DbSubnetGroup => Invocation::new("aws").args([
            "rds",
            "describe-db-subnet-groups",
            "--db-subnet-group-name",
            id,
            "--region",
            region,
        ]),
        ResourceKind::KeyPair => Invocation::new("aws").args([
            "ec2",
            "describe-key-pairs",
            "--key-names",
            id,
            "--region",
            region,
        ]),
        ResourceKind::LogGroup => Invocation::new("aws").args([
            "logs",
            "describe-log-groups",
            "--log-group-name-prefix",
            id,
            "--region",
            region,
            "--output",
            "json",
        ]),
    }
}

/// Error codes the CLI prints when the probed resource is simply absent.
fn not_found_markers(kind: ResourceKind) -> &'static [&'static str] {
    match kind {
        ResourceKind::IamRole => &["NoSuchEntity"],
        ResourceKind::S3Bucket => &["404", "Not Found", "NoSuchBucket"],
        ResourceKind::DbSubnetGroup => &["DBSubnetGroupNotFoundFault"],
        ResourceKind::KeyPair => &["InvalidKeyPair.NotFound"],
        ResourceKind::LogGroup => &["ResourceNotFoundException"],
    }
}

impl ResourceProbe for AwsCli<'_> {
    fn exists(&self, kind: ResourceKind, external_id: &str, region: &str) -> Result<bool> {
        let inv = probe_invocation(kind, external_id, region);
        let out = run_tolerant(self.runner, Stage::Infrastructure, &inv)?;
        if !out.success() {
            if not_found_markers(kind)
                .iter()
                .any(|m| out.stderr.contains(m))
            {
                return Ok(false);
            }
            return Err(PipelineError::external(
                Stage::Infrastructure,
                inv.display_name(),
                out.status,
                &out.stderr,
            ));
        }
        if kind == ResourceKind::LogGroup {
            // The API matches by prefix; only an exact name counts.
            let groups: LogGroups = serde_json::from_str(&out.stdout).map_err(|e| {
                PipelineError::external(
                    Stage::Infrastructure,
                    inv.display_name(),
                    out.status,
                    &e.to_string(),
                )
            })?;
            return Ok(groups.log_groups.iter().any(|g| g.name == external_id));
        }
        Ok(true)
    }
}
