use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

#[derive(Serialize)]
pub struct JsonOut<T: Serialize> {
    pub ok: bool,
    pub data: T,
}

/// Operator secret (database password). Never printed, never serialized.
#[derive(Clone)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn char_count(&self) -> usize {
        self.0.chars().count()
    }

    /// `text` with every occurrence of the secret masked.
    pub fn redact(&self, text: &str) -> String {
        if self.0.is_empty() {
            return text.to_string();
        }
        text.replace(&self.0, "***")
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("***")
    }
}

/// Validated operator input, before the identity lookup.
#[derive(Debug, Clone)]
pub struct OperatorInput {
    pub region: String,
    pub prefix: String,
    pub secret: Secret,
}

/// Immutable per-run configuration handed to every stage.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub region: String,
    pub prefix: String,
    pub secret: Secret,
    pub account_id: String,
}

impl RunConfig {
    pub fn from_input(input: OperatorInput, account_id: String) -> Self {
        Self {
            region: input.region,
            prefix: input.prefix,
            secret: input.secret,
            account_id,
        }
    }

    pub fn repository_name(&self) -> String {
        format!("{}-webapp", self.prefix)
    }

    pub fn cluster_name(&self) -> String {
        format!("{}-cluster", self.prefix)
    }

    pub fn registry_host(&self) -> String {
        format!("{}.dkr.ecr.{}.amazonaws.com", self.account_id, self.region)
    }

    pub fn image_ref(&self, tag: &str) -> String {
        format!("{}/{}:{}", self.registry_host(), self.repository_name(), tag)
    }
}

/// Terraform outputs read after a successful apply, keyed by output name.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct ProvisionedOutputs(pub BTreeMap<String, String>);

impl ProvisionedOutputs {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Ensured {
    Existed,
    Created,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "status", content = "detail")]
pub enum ImportOutcome {
    AlreadyTracked,
    Absent,
    Imported,
    Failed(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct ReconcileItem {
    pub address: String,
    pub external_id: String,
    pub outcome: ImportOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "status", content = "detail")]
pub enum TeardownOutcome {
    Removed,
    AlreadyAbsent,
    Failed(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct TeardownStep {
    pub name: String,
    pub outcome: TeardownOutcome,
}

#[derive(Serialize)]
pub struct CheckItem {
    pub name: String,
    pub status: String,
}

#[derive(Serialize)]
pub struct PreflightReport {
    pub overall: String,
    pub tools: Vec<CheckItem>,
    pub container_access: CheckItem,
}

#[derive(Debug, Serialize)]
pub struct ProvisionReport {
    pub region: String,
    pub prefix: String,
    pub account_id: String,
    pub image: String,
    pub repository: Ensured,
    pub reconciled: Vec<ReconcileItem>,
    pub outputs: ProvisionedOutputs,
    pub endpoint: Option<String>,
    pub endpoint_reachable: Option<bool>,
    pub warnings: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct DecommissionReport {
    pub region: String,
    pub prefix: String,
    pub overall: String,
    pub steps: Vec<TeardownStep>,
}
