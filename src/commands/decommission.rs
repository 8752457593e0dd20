use crate::backends::Backends;
use crate::cli::Cli;
use crate::config::Settings;
use crate::domain::models::TeardownOutcome;
use crate::services::input::TerminalPrompter;
use crate::services::output::print_one;
use crate::services::pipeline::decommission_range;

pub fn handle_decommission(
    cli: &Cli,
    settings: &Settings,
    backends: &Backends<'_>,
) -> anyhow::Result<()> {
    let report = decommission_range(backends, settings, &mut TerminalPrompter)?;
    let ok = report.overall == "ok";
    print_one(cli.json, ok, &report, |r| {
        let mut lines = vec![format!("decommission {} in {}: {}", r.prefix, r.region, r.overall)];
        for s in &r.steps {
            let outcome = match &s.outcome {
                TeardownOutcome::Removed => "removed".to_string(),
                TeardownOutcome::AlreadyAbsent => "already absent".to_string(),
                TeardownOutcome::Failed(reason) => format!("failed: {}", reason),
            };
            lines.push(format!("{}\t{}", s.name, outcome));
        }
        lines.join("\n")
    })?;
    if !ok {
        anyhow::bail!("decommission incomplete; re-run to retry the failed steps");
    }
    Ok(())
}
