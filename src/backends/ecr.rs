use super::RegistryClient;
use crate::domain::models::RunConfig;
use crate::error::{PipelineError, Result, Stage};
use crate::exec::{run_step, run_tolerant, CommandRunner, Invocation};
use std::path::Path;

const REPOSITORY_NOT_FOUND: &str = "RepositoryNotFoundException";

/// ECR repositories through `aws ecr`, images through `docker`.
pub struct EcrRegistry<'a> {
    runner: &'a dyn CommandRunner,
}

impl<'a> EcrRegistry<'a> {
    pub fn new(runner: &'a dyn CommandRunner) -> Self {
        Self { runner }
    }

    fn ecr(&self, config: &RunConfig, action: &str) -> Invocation {
        // describe takes a list, create/delete a single name
        let name_flag = if action == "describe-repositories" {
            "--repository-names"
        } else {
            "--repository-name"
        };
        Invocation::new("aws").args([
            "ecr",
            action,
            name_flag,
            config.repository_name().as_str(),
            "--region",
            config.region.as_str(),
        ])
    }
}

impl RegistryClient for EcrRegistry<'_> {
    fn login(&self, config: &RunConfig) -> Result<()> {
        let password = run_step(
            self.runner,
            Stage::Registry,
            &Invocation::new("aws").args([
                "ecr",
                "get-login-password",
                "--region",
                config.region.as_str(),
            ]),
        )?;
        let login = Invocation::new("docker")
            .args([
                "login",
                "--username",
                "AWS",
                "--password-stdin",
                config.registry_host().as_str(),
            ])
            .stdin(password.stdout.trim().to_string());
        run_step(self.runner, Stage::Registry, &login)?;
        tracing::info!(registry = %config.registry_host(), "registry login succeeded");
        Ok(())
    }

    fn repository_exists(&self, config: &RunConfig) -> Result<bool> {
        let inv = self.ecr(config, "describe-repositories");
        let out = run_tolerant(self.runner, Stage::Registry, &inv)?;
        if out.success() {
            return Ok(true);
        }
        if out.stderr.contains(REPOSITORY_NOT_FOUND) {
            return Ok(false);
        }
        Err(PipelineError::external(
            Stage::Registry,
            inv.display_name(),
            out.status,
            &out.stderr,
        ))
    }

    fn create_repository(&self, config: &RunConfig) -> Result<()> {
        run_step(self.runner, Stage::Registry, &self.ecr(config, "create-repository"))?;
        Ok(())
    }

    fn build(&self, context: &Path, local_tag: &str) -> Result<()> {
        let inv = Invocation::new("docker").args([
            "build".to_string(),
            "-t".to_string(),
            local_tag.to_string(),
            context.to_string_lossy().into_owned(),
        ]);
        run_step(self.runner, Stage::Registry, &inv)?;
        Ok(())
    }

    fn tag(&self, local_tag: &str, remote_ref: &str) -> Result<()> {
        run_step(
            self.runner,
            Stage::Registry,
            &Invocation::new("docker").args(["tag", local_tag, remote_ref]),
        )?;
        Ok(())
    }

    fn push(&self, remote_ref: &str) -> Result<()> {
        run_step(
            self.runner,
            Stage::Registry,
            &Invocation::new("docker").args(["push", remote_ref]),
        )?;
        Ok(())
    }

    fn delete_repository(&self, config: &RunConfig) -> Result<bool> {
        let inv = self.ecr(config, "delete-repository").arg("--force");
        let out = run_tolerant(self.runner, Stage::Decommission, &inv)?;
        if out.success() {
            return Ok(true);
        }
        if out.stderr.contains(REPOSITORY_NOT_FOUND) {
            return Ok(false);
        }
        Err(PipelineError::external(
            Stage::Decommission,
            inv.display_name(),
            out.status,
            &out.stderr,
        ))
    }
}
