//! Configuration loading, env substitution, and validation.
//!
//! Config files: `postern.toml`, `postern.yaml`, or `postern.json`
//! Searched in `./` then `~/.config/postern/`.
//!
//! Supports `${ENV_VAR}` and `${ENV_VAR:-default}` substitution in the raw
//! file, and `POSTERN_*` environment overrides for the bot credentials.

pub mod env_subst;
pub mod error;
pub mod loader;
pub mod schema;
pub mod validate;

pub use {
    error::{Error, Result},
    loader::{apply_env_overrides, config_dir, find_config_file, load_config},
    schema::{MetricsConfig, PosternConfig, RelayConfig, TelegramConfig},
    validate::{Diagnostic, Severity, ValidationResult},
};
