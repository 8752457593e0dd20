//! Shared data model layer (structs only).
//!
//! ## Purpose
//! - Keep run configuration and report structs in one place.
//! - Make `--json` output schema changes explicit and reviewable.
//!
//! ## Rule of thumb
//! Domain types should be data-only: no process/filesystem side effects.
//!
//! ## Compatibility note
//! Report structs feed `--json` output. Keep `docs/contracts/*` in sync.

pub mod models;
