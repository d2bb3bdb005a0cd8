//! Engine Configuration Module
//!
//! Signal envelopes, the scoring policy, and history sizing, loaded from a
//! TOML file instead of being hardcoded.
//!
//! ## Loading Order
//!
//! 1. `--config <path>` on the command line
//! 2. `CONNECTED_OPS_CONFIG` environment variable (path to TOML file)
//! 3. `connected_ops.toml` in the current working directory
//! 4. Built-in defaults
//!
//! The loaded config is handed to [`crate::engine::RiskEngine::new`]; the
//! scoring policy can later be replaced at runtime without a restart.

mod engine_config;
pub mod defaults;
pub mod validation;

pub use engine_config::*;
