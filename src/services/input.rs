use crate::backends::IdentityProvider;
use crate::domain::models::{OperatorInput, RunConfig, Secret};
use crate::error::{PipelineError, Result};
use regex::Regex;
use std::io::{BufRead, IsTerminal, Write};
use std::sync::LazyLock;

pub const MIN_SECRET_LEN: usize = 8;

static PREFIX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9-]+$").expect("static regex"));
static REGION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z]{2}(-[a-z]+)+-\d+$").expect("static regex"));

/// Source of operator answers. `None` means input ended.
pub trait Prompter {
    fn ask(&mut self, question: &str) -> Result<Option<String>>;
    /// Like `ask`, but the answer must never be echoed.
    fn ask_secret(&mut self, question: &str) -> Result<Option<String>>;
    fn warn(&mut self, message: &str);
}

/// Prompts on stderr, answers from stdin. Secrets go through `rpassword`
/// when stdin is a terminal.
#[derive(Default)]
pub struct TerminalPrompter;

impl TerminalPrompter {
    fn read_line(&self) -> Result<Option<String>> {
        let mut line = String::new();
        let n = std::io::stdin().lock().read_line(&mut line)?;
        if n == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
    }
}

impl Prompter for TerminalPrompter {
    fn ask(&mut self, question: &str) -> Result<Option<String>> {
        let mut err = std::io::stderr();
        write!(err, "{}", question)?;
        err.flush()?;
        self.read_line()
    }

    fn ask_secret(&mut self, question: &str) -> Result<Option<String>> {
        if std::io::stdin().is_terminal() {
            return Ok(Some(rpassword::prompt_password(question)?));
        }
        let mut err = std::io::stderr();
        write!(err, "{}", question)?;
        err.flush()?;
        let answer = self.read_line()?;
        writeln!(err)?;
        Ok(answer)
    }

    fn warn(&mut self, message: &str) {
        eprintln!("  {}", message);
    }
}

pub fn validate_prefix(raw: &str) -> Result<String> {
    if PREFIX_RE.is_match(raw) {
        Ok(raw.to_string())
    } else {
        Err(PipelineError::InvalidInput {
            field: "prefix",
            reason: "use only letters, digits and hyphens".to_string(),
        })
    }
}

pub fn validate_region(raw: &str) -> Result<String> {
    if REGION_RE.is_match(raw) {
        Ok(raw.to_string())
    } else {
        Err(PipelineError::InvalidInput {
            field: "region",
            reason: format!("`{}` is not a region name like us-west-2", raw),
        })
    }
}

pub fn validate_secret(raw: &str) -> Result<Secret> {
    let secret = Secret::new(raw);
    if secret.char_count() < MIN_SECRET_LEN {
        return Err(PipelineError::InvalidInput {
            field: "secret",
            reason: format!("must be at least {} characters", MIN_SECRET_LEN),
        });
    }
    Ok(secret)
}

fn end_of_input(field: &'static str) -> PipelineError {
    PipelineError::InvalidInput {
        field,
        reason: "input ended before a valid value was entered".to_string(),
    }
}

fn prompt_until<T>(
    prompter: &mut dyn Prompter,
    question: &str,
    field: &'static str,
    secret: bool,
    validate: impl Fn(&str) -> Result<T>,
) -> Result<T> {
    loop {
        let answer = if secret {
            prompter.ask_secret(question)?
        } else {
            prompter.ask(question)?
        };
        let Some(answer) = answer else {
            return Err(end_of_input(field));
        };
        let value = if secret { answer.as_str() } else { answer.trim() };
        match validate(value) {
            Ok(v) => return Ok(v),
            Err(e @ PipelineError::InvalidInput { .. }) => prompter.warn(&e.to_string()),
            Err(e) => return Err(e),
        }
    }
}

/// Region, prefix and secret, each re-prompted until valid.
pub fn collect_input(prompter: &mut dyn Prompter, default_region: &str) -> Result<OperatorInput> {
    let region = prompt_until(
        prompter,
        &format!("AWS region [{}]: ", default_region),
        "region",
        false,
        |raw| validate_region(if raw.is_empty() { default_region } else { raw }),
    )?;
    let prefix = prompt_until(
        prompter,
        "Name prefix (letters, digits, hyphens): ",
        "prefix",
        false,
        validate_prefix,
    )?;
    let secret = prompt_until(
        prompter,
        &format!("Database password (min {} chars): ", MIN_SECRET_LEN),
        "secret",
        true,
        validate_secret,
    )?;
    tracing::debug!(%region, %prefix, "operator input accepted");
    Ok(OperatorInput {
        region,
        prefix,
        secret,
    })
}

/// The one read-only identity lookup; turns operator input into a run config.
pub fn resolve_identity(
    identity: &dyn IdentityProvider,
    input: OperatorInput,
) -> Result<RunConfig> {
    let account_id = identity.account_id(&input.region)?;
    tracing::info!(account = %account_id, region = %input.region, "resolved caller identity");
    Ok(RunConfig::from_input(input, account_id))
}
