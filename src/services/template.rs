use crate::domain::models::{ProvisionedOutputs, RunConfig};
use crate::error::{PipelineError, Result};
use regex::Regex;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::LazyLock;

pub const EMBEDDED_MANIFEST: &str = include_str!("../../templates/webapp.yaml");

static PLACEHOLDER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("static regex"));

/// Substitute every `${NAME}`. Values are escaped for a YAML double-quoted
/// scalar, so free text belongs between quotes in the template. Fails on the
/// first name with no value, so a partially rendered manifest never escapes.
pub fn render(template: &str, values: &BTreeMap<String, String>) -> Result<String> {
    let mut escaped = BTreeMap::new();
    for caps in PLACEHOLDER_RE.captures_iter(template) {
        let name = caps[1].to_string();
        let Some(raw) = values.get(&name) else {
            return Err(PipelineError::UnresolvedTemplateVariable { name });
        };
        escaped.insert(name, quoted_scalar_body(raw)?);
    }
    let rendered = PLACEHOLDER_RE.replace_all(template, |c: &regex::Captures<'_>| {
        escaped.get(&c[1]).cloned().unwrap_or_default()
    });
    Ok(rendered.into_owned())
}

/// Body of the JSON string literal for `value`; JSON escapes are valid
/// YAML double-quoted escapes.
fn quoted_scalar_body(value: &str) -> Result<String> {
    let quoted = serde_json::to_string(value)
        .map_err(|e| PipelineError::Config(format!("cannot escape template value: {}", e)))?;
    Ok(quoted[1..quoted.len() - 1].to_string())
}

/// Placeholder values for the workload manifest.
pub fn template_values(
    config: &RunConfig,
    outputs: &ProvisionedOutputs,
    image_tag: &str,
    app_port: u16,
) -> BTreeMap<String, String> {
    let mut v = BTreeMap::new();
    v.insert("ACCOUNT_ID".to_string(), config.account_id.clone());
    v.insert("REGION".to_string(), config.region.clone());
    v.insert("PREFIX".to_string(), config.prefix.clone());
    v.insert("DB_PASSWORD".to_string(), config.secret.expose().to_string());
    if let Some(host) = outputs.get("db_address") {
        v.insert("DB_HOST".to_string(), host.to_string());
    }
    v.insert("IMAGE_TAG".to_string(), image_tag.to_string());
    v.insert("APP_PORT".to_string(), app_port.to_string());
    v
}

/// The configured template file, or the embedded one.
pub fn load_template(custom: Option<&Path>) -> Result<String> {
    match custom {
        Some(path) => std::fs::read_to_string(path).map_err(|e| {
            PipelineError::Config(format!(
                "cannot read manifest template {}: {}",
                path.display(),
                e
            ))
        }),
        None => Ok(EMBEDDED_MANIFEST.to_string()),
    }
}
