use std::fmt;

/// Pipeline stage names, used to attribute external failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Input,
    Preflight,
    Staging,
    Registry,
    Infrastructure,
    Workload,
    Report,
    Decommission,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Input => "input",
            Stage::Preflight => "preflight",
            Stage::Staging => "staging",
            Stage::Registry => "registry",
            Stage::Infrastructure => "infrastructure",
            Stage::Workload => "workload",
            Stage::Report => "report",
            Stage::Decommission => "decommission",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    #[error("invalid {field}: {reason}")]
    InvalidInput { field: &'static str, reason: String },
    #[error("cloud credentials unavailable: {0}")]
    CredentialsUnavailable(String),
    #[error("missing required tools: {}", tools.join(", "))]
    MissingDependencies { tools: Vec<String> },
    #[error("permission denied for {action}; fix with: {remediation}")]
    PermissionDenied {
        action: String,
        remediation: String,
    },
    #[error("application source unavailable: {0}")]
    SourceUnavailable(String),
    #[error("{stage}: `{step}` failed ({}): {stderr}", status_text(*status))]
    ExternalCallFailed {
        stage: Stage,
        step: String,
        status: Option<i32>,
        stderr: String,
    },
    #[error("provisioning incomplete, missing outputs: {}", missing.join(", "))]
    IncompleteProvisioning { missing: Vec<String> },
    #[error("template placeholder has no value: {name}")]
    UnresolvedTemplateVariable { name: String },
    #[error("rollout of {deployment} failed: {reason}")]
    RolloutFailed {
        deployment: String,
        reason: String,
        diagnostics: String,
    },
    #[error("endpoint for {service} not assigned after {attempts} attempts")]
    EndpointNotReady { service: String, attempts: u32 },
    #[error("config: {0}")]
    Config(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

fn status_text(status: Option<i32>) -> String {
    match status {
        Some(code) => format!("exit {}", code),
        None => "no exit status".to_string(),
    }
}

impl PipelineError {
    /// Pod listings and logs gathered when a rollout failed.
    pub fn diagnostics(&self) -> Option<&str> {
        match self {
            PipelineError::RolloutFailed { diagnostics, .. } => Some(diagnostics),
            _ => None,
        }
    }

    pub fn external(
        stage: Stage,
        step: impl Into<String>,
        status: Option<i32>,
        stderr: &str,
    ) -> Self {
        PipelineError::ExternalCallFailed {
            stage,
            step: step.into(),
            status,
            stderr: last_line(stderr),
        }
    }
}

/// Last non-empty line of a tool's stderr; tools put the useful bit at the end.
pub fn last_line(text: &str) -> String {
    text.lines()
        .rev()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or("no output")
        .to_string()
}

pub type Result<T> = std::result::Result<T, PipelineError>;
