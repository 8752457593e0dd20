use crate::error::{PipelineError, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_CONFIG_FILE: &str = "rangectl.toml";
pub const DEFAULT_APP_SOURCE: &str = "https://github.com/digininja/DVWA.git";

fn default_app_source() -> String {
    DEFAULT_APP_SOURCE.to_string()
}

fn default_app_port() -> u16 {
    80
}

fn default_region() -> String {
    "us-west-2".to_string()
}

fn default_infra_dir() -> PathBuf {
    PathBuf::from("infra")
}

fn default_work_dir() -> PathBuf {
    PathBuf::from(".rangectl")
}

fn default_required_tools() -> Vec<String> {
    ["aws", "terraform", "docker", "kubectl", "git", "ssh-keygen"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_required_outputs() -> Vec<String> {
    ["db_address", "bucket_url", "cluster_name"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_rollout_timeout_secs() -> u64 {
    300
}

fn default_rollout_poll_secs() -> u64 {
    5
}

fn default_endpoint_attempts() -> u32 {
    10
}

fn default_endpoint_initial_backoff_secs() -> u64 {
    5
}

fn default_endpoint_max_backoff_secs() -> u64 {
    60
}

fn default_true() -> bool {
    true
}

/// Tool settings loaded from `rangectl.toml`. Every field has a default.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    /// Local directory or git URL of the application to deploy.
    #[serde(default = "default_app_source")]
    pub app_source: String,
    #[serde(default = "default_app_port")]
    pub app_port: u16,
    #[serde(default = "default_region")]
    pub default_region: String,
    #[serde(default = "default_infra_dir")]
    pub infra_dir: PathBuf,
    #[serde(default = "default_work_dir")]
    pub work_dir: PathBuf,
    /// Overrides the embedded workload manifest.
    #[serde(default)]
    pub manifest_template: Option<PathBuf>,
    #[serde(default = "default_required_tools")]
    pub required_tools: Vec<String>,
    #[serde(default = "default_required_outputs")]
    pub required_outputs: Vec<String>,
    #[serde(default = "default_rollout_timeout_secs")]
    pub rollout_timeout_secs: u64,
    #[serde(default = "default_rollout_poll_secs")]
    pub rollout_poll_secs: u64,
    #[serde(default = "default_endpoint_attempts")]
    pub endpoint_attempts: u32,
    #[serde(default = "default_endpoint_initial_backoff_secs")]
    pub endpoint_initial_backoff_secs: u64,
    #[serde(default = "default_endpoint_max_backoff_secs")]
    pub endpoint_max_backoff_secs: u64,
    #[serde(default = "default_true")]
    pub probe_endpoint: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            app_source: default_app_source(),
            app_port: default_app_port(),
            default_region: default_region(),
            infra_dir: default_infra_dir(),
            work_dir: default_work_dir(),
            manifest_template: None,
            required_tools: default_required_tools(),
            required_outputs: default_required_outputs(),
            rollout_timeout_secs: default_rollout_timeout_secs(),
            rollout_poll_secs: default_rollout_poll_secs(),
            endpoint_attempts: default_endpoint_attempts(),
            endpoint_initial_backoff_secs: default_endpoint_initial_backoff_secs(),
            endpoint_max_backoff_secs: default_endpoint_max_backoff_secs(),
            probe_endpoint: default_true(),
        }
    }
}

impl Settings {
    pub fn rollout_timeout(&self) -> Duration {
        Duration::from_secs(self.rollout_timeout_secs)
    }

    pub fn rollout_poll(&self) -> Duration {
        Duration::from_secs(self.rollout_poll_secs)
    }

    pub fn staging_dir(&self) -> PathBuf {
        self.work_dir.join("app")
    }

    pub fn keys_dir(&self) -> PathBuf {
        self.work_dir.join("keys")
    }

    pub fn audit_path(&self) -> PathBuf {
        self.work_dir.join("audit.jsonl")
    }
}

pub fn parse_settings(raw: &str) -> Result<Settings> {
    toml::from_str(raw).map_err(|e| PipelineError::Config(e.to_string()))
}

/// `--config` wins; otherwise `./rangectl.toml` if present; otherwise defaults.
pub fn load_settings(explicit: Option<&Path>, work_dir: Option<&Path>) -> Result<Settings> {
    let path = match explicit {
        Some(p) => Some(p.to_path_buf()),
        None => {
            let p = PathBuf::from(DEFAULT_CONFIG_FILE);
            p.exists().then_some(p)
        }
    };

    let mut settings = match path {
        Some(p) => {
            let raw = std::fs::read_to_string(&p).map_err(|e| {
                PipelineError::Config(format!("cannot read {}: {}", p.display(), e))
            })?;
            let s = parse_settings(&raw)?;
            tracing::debug!(path = %p.display(), "loaded settings");
            s
        }
        None => Settings::default(),
    };

    if let Some(dir) = work_dir {
        settings.work_dir = dir.to_path_buf();
    }
    Ok(settings)
}
