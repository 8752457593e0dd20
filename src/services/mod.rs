//! Service layer: the pipeline stages and their side-effect helpers.
//!
//! ## Service map
//! - `input.rs`: operator prompts, validation, identity lookup.
//! - `preflight.rs`: required tools and container daemon access.
//! - `stager.rs`: clean copy of the application source + content fingerprint.
//! - `registry.rs`: repository ensure, build/tag/push.
//! - `keys.rs`: lab SSH keypair, generated once.
//! - `infra.rs`: init, import reconciliation, apply, required outputs.
//! - `template.rs`: `${NAME}` manifest rendering.
//! - `workload.rs`: cluster credentials, manifest submit, rollout wait.
//! - `report.rs`: load-balancer address polling and HTTP probe.
//! - `decommission.rs`: reverse teardown with per-step outcomes.
//! - `pipeline.rs`: stage ordering for `provision` and `decommission`.
//! - `ensure.rs`: the check-then-create combinator.
//! - `storage.rs`: run journal + directory copy.
//! - `output.rs`: JSON/text output helpers.
//!
//! ## Conventions
//! - Stages take `&RunConfig` and capability traits, never concrete tools.
//! - Side effects should be explicit and localized.
//! - Keep command handlers thin; delegate to services.

pub mod decommission;
pub mod ensure;
pub mod infra;
pub mod input;
pub mod keys;
pub mod output;
pub mod pipeline;
pub mod preflight;
pub mod registry;
pub mod report;
pub mod stager;
pub mod storage;
pub mod template;
pub mod workload;
