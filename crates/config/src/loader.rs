use std::path::{Path, PathBuf};

use {secrecy::Secret, tracing::debug};

use crate::{
    env_subst::substitute_env,
    error::{Error, Result},
    schema::PosternConfig,
};

/// Standard config file names, checked in order.
const CONFIG_FILENAMES: &[&str] = &[
    "postern.toml",
    "postern.yaml",
    "postern.yml",
    "postern.json",
];

/// Overrides the bot token from the config file.
pub const ENV_TOKEN: &str = "POSTERN_TELEGRAM_TOKEN";
/// Overrides the operator's Telegram user id.
pub const ENV_OPERATOR_ID: &str = "POSTERN_OPERATOR_ID";

/// Load config from the given path (any supported format).
pub fn load_config(path: &Path) -> Result<PosternConfig> {
    let raw = std::fs::read_to_string(path).map_err(|source| Error::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let raw = substitute_env(&raw);
    parse_config(&raw, path)
}

/// Find the first config file in standard locations.
pub fn find_config_file() -> Option<PathBuf> {
    CONFIG_FILENAMES
        .iter()
        .map(PathBuf::from)
        .find(|p| p.exists())
        .or_else(|| {
            let dir = config_dir()?;
            CONFIG_FILENAMES
                .iter()
                .map(|name| dir.join(name))
                .find(|p| p.exists())
        })
}

/// Returns the user-global config directory (`~/.config/postern/`).
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "postern").map(|d| d.config_dir().to_path_buf())
}

/// Apply `POSTERN_*` environment overrides on top of a loaded config.
pub fn apply_env_overrides(config: &mut PosternConfig) -> Result<()> {
    apply_env_overrides_with(config, |name| std::env::var(name).ok())
}

fn apply_env_overrides_with(
    config: &mut PosternConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<()> {
    if let Some(token) = lookup(ENV_TOKEN).filter(|t| !t.is_empty()) {
        debug!(variable = ENV_TOKEN, "bot token taken from environment");
        config.telegram.token = Secret::new(token);
    }
    if let Some(raw) = lookup(ENV_OPERATOR_ID).filter(|v| !v.is_empty()) {
        config.telegram.operator_id =
            raw.trim().parse::<i64>().map_err(|e| Error::EnvOverride {
                variable: ENV_OPERATOR_ID.to_string(),
                message: format!("{e}"),
            })?;
    }
    Ok(())
}

fn parse_config(raw: &str, path: &Path) -> Result<PosternConfig> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match ext {
        "toml" => Ok(toml::from_str(raw)?),
        "yaml" | "yml" => Ok(serde_yaml::from_str(raw)?),
        "json" => Ok(serde_json::from_str(raw)?),
        _ => Err(Error::UnsupportedFormat {
            extension: ext.to_string(),
        }),
    }
}
