use crate::cli::Cli;
use crate::config::Settings;
use crate::exec::CommandRunner;
use crate::services::output::print_one;
use crate::services::preflight::{preflight_report, DOCKER_REMEDIATION};

/// Never fails on findings; the report says what needs attention.
pub fn handle_doctor(
    cli: &Cli,
    settings: &Settings,
    runner: &dyn CommandRunner,
) -> anyhow::Result<()> {
    let report = preflight_report(runner, &settings.required_tools);
    print_one(cli.json, true, report, |r| {
        let mut lines = vec![format!("overall: {}", r.overall)];
        for t in &r.tools {
            lines.push(format!("{}\t{}", t.name, t.status));
        }
        lines.push(format!("{}\t{}", r.container_access.name, r.container_access.status));
        if r.container_access.status == "permission_denied" {
            lines.push(format!("fix: {}", DOCKER_REMEDIATION));
        }
        lines.join("\n")
    })
}
