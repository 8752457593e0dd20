use crate::backends::Backends;
use crate::cli::Cli;
use crate::config::Settings;
use crate::domain::models::{ImportOutcome, ProvisionReport};
use crate::services::input::TerminalPrompter;
use crate::services::output::print_one;
use crate::services::pipeline::provision;
use crate::services::report::{EndpointProbe, HttpProbe};

pub fn handle_provision(
    cli: &Cli,
    settings: &Settings,
    backends: &Backends<'_>,
) -> anyhow::Result<()> {
    let http = HttpProbe::new()?;
    let probe: Option<&dyn EndpointProbe> = Some(&http);
    let report = provision(
        backends,
        settings,
        &mut TerminalPrompter,
        probe,
        &mut std::thread::sleep,
    )?;
    print_one(cli.json, true, report, render_text)
}

fn render_text(r: &ProvisionReport) -> String {
    let mut lines = vec![
        format!("range {} provisioned in {} ({})", r.prefix, r.region, r.account_id),
        format!("image: {}", r.image),
    ];
    for (name, value) in &r.outputs.0 {
        lines.push(format!("{}: {}", name, value));
    }
    let imported = r
        .reconciled
        .iter()
        .filter(|i| i.outcome == ImportOutcome::Imported)
        .count();
    if imported > 0 {
        lines.push(format!("adopted {} pre-existing resources", imported));
    }
    match (&r.endpoint, r.endpoint_reachable) {
        (Some(url), Some(true)) => lines.push(format!("endpoint: {}", url)),
        (Some(url), Some(false)) => lines.push(format!("endpoint: {} (not answering yet)", url)),
        (Some(url), None) => lines.push(format!("endpoint: {}", url)),
        (None, _) => lines.push("endpoint: pending".to_string()),
    }
    for w in &r.warnings {
        lines.push(format!("warning: {}", w));
    }
    lines.join("\n")
}
