use super::{InfraEngine, InfraVars};
use crate::error::{PipelineError, Result, Stage};
use crate::exec::{run_step, run_tolerant, CommandRunner, Invocation};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// `terraform` CLI working against one configuration directory.
pub struct TerraformCli<'a> {
    runner: &'a dyn CommandRunner,
    dir: PathBuf,
    stage: Stage,
}

impl<'a> TerraformCli<'a> {
    pub fn new(runner: &'a dyn CommandRunner, dir: impl Into<PathBuf>) -> Self {
        Self {
            runner,
            dir: dir.into(),
            stage: Stage::Infrastructure,
        }
    }

    /// Attribute failures to `stage` (decommissioning reuses this client).
    pub fn for_stage(mut self, stage: Stage) -> Self {
        self.stage = stage;
        self
    }

    fn tf(&self, subcommand: &str) -> Invocation {
        Invocation::new("terraform")
            .arg(format!("-chdir={}", self.dir.display()))
            .arg(subcommand)
    }

    fn with_vars(inv: Invocation, vars: &InfraVars) -> Invocation {
        vars.env()
            .into_iter()
            .fold(inv, |inv, (k, v)| inv.env(k, v))
    }
}

impl InfraEngine for TerraformCli<'_> {
    fn init(&self) -> Result<()> {
        run_step(
            self.runner,
            self.stage,
            &self.tf("init").args(["-input=false", "-no-color"]),
        )?;
        Ok(())
    }

    fn tracked(&self) -> Result<Vec<String>> {
        let inv = self.tf("state").arg("list");
        let out = run_tolerant(self.runner, self.stage, &inv)?;
        if !out.success() {
            // Older releases exit non-zero on an empty backend.
            if out.stderr.contains("No state file was found") {
                return Ok(Vec::new());
            }
            return Err(PipelineError::external(
                self.stage,
                inv.display_name(),
                out.status,
                &out.stderr,
            ));
        }
        Ok(parse_state_list(&out.stdout))
    }

    fn import(&self, vars: &InfraVars, address: &str, external_id: &str) -> Result<()> {
        let inv = Self::with_vars(
            self.tf("import")
                .args(["-input=false", "-no-color", address, external_id]),
            vars,
        );
        run_step(self.runner, self.stage, &inv)?;
        Ok(())
    }

    fn apply(&self, vars: &InfraVars) -> Result<()> {
        let inv = Self::with_vars(
            self.tf("apply")
                .args(["-auto-approve", "-input=false", "-no-color"]),
            vars,
        );
        run_step(self.runner, self.stage, &inv)?;
        Ok(())
    }

    fn outputs(&self) -> Result<BTreeMap<String, String>> {
        let inv = self.tf("output").arg("-json");
        let out = run_step(self.runner, self.stage, &inv)?;
        parse_outputs(&out.stdout).map_err(|e| {
            PipelineError::external(self.stage, inv.display_name(), out.status, &e.to_string())
        })
    }

    fn destroy(&self, vars: &InfraVars) -> Result<()> {
        let inv = Self::with_vars(
            self.tf("destroy")
                .args(["-auto-approve", "-input=false", "-no-color"]),
            vars,
        );
        run_step(self.runner, self.stage, &inv)?;
        Ok(())
    }
}

fn parse_state_list(raw: &str) -> Vec<String> {
    raw.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

/// `terraform output -json` → name to string value. Non-string values keep
/// their JSON text.
fn parse_outputs(raw: &str) -> serde_json::Result<BTreeMap<String, String>> {
    let doc: BTreeMap<String, serde_json::Value> = if raw.trim().is_empty() {
        BTreeMap::new()
    } else {
        serde_json::from_str(raw)?
    };
    Ok(doc
        .into_iter()
        .filter_map(|(name, entry)| {
            let value = entry.get("value")?;
            let text = match value {
                serde_json::Value::String(s) => s.clone(),
                serde_json::Value::Null => return None,
                other => other.to_string(),
            };
            Some((name, text))
        })
        .collect())
}
