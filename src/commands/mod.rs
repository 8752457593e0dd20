//! Command handler layer.
//!
//! This module owns CLI-oriented orchestration and output wiring.
//!
//! ## Files
//! - `provision.rs`: the interactive provisioning run.
//! - `decommission.rs`: the interactive teardown run.
//! - `doctor.rs`: read-only preflight report.
//!
//! ## Principles
//! - Parse/match CLI inputs here.
//! - Delegate business logic to `services/*`.
//! - Keep behavior and output schema stable.

pub mod decommission;
pub mod doctor;
pub mod provision;

use crate::backends::aws::AwsCli;
use crate::backends::ecr::EcrRegistry;
use crate::backends::kubectl::KubectlCluster;
use crate::backends::terraform::TerraformCli;
use crate::backends::Backends;
use crate::cli::{Cli, Commands};
use crate::config::Settings;
use crate::error::Stage;
use crate::exec::CommandRunner;

pub fn dispatch(cli: &Cli, settings: &Settings, runner: &dyn CommandRunner) -> anyhow::Result<()> {
    let aws = AwsCli::new(runner);
    let ecr = EcrRegistry::new(runner);
    match cli.command {
        Commands::Provision => {
            let terraform = TerraformCli::new(runner, settings.infra_dir.clone());
            let kubectl = KubectlCluster::new(runner);
            let backends = Backends {
                identity: &aws,
                probe: &aws,
                registry: &ecr,
                infra: &terraform,
                cluster: &kubectl,
                runner,
            };
            provision::handle_provision(cli, settings, &backends)
        }
        Commands::Decommission => {
            let terraform = TerraformCli::new(runner, settings.infra_dir.clone())
                .for_stage(Stage::Decommission);
            let kubectl = KubectlCluster::new(runner).for_stage(Stage::Decommission);
            let backends = Backends {
                identity: &aws,
                probe: &aws,
                registry: &ecr,
                infra: &terraform,
                cluster: &kubectl,
                runner,
            };
            decommission::handle_decommission(cli, settings, &backends)
        }
        Commands::Doctor => doctor::handle_doctor(cli, settings, runner),
    }
}
