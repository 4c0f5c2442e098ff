use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use comper_core::ComperConfig;

pub(crate) fn config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("comper")
        .join("config.toml")
}

/// Explicit paths must exist; a missing default file means defaults
pub(crate) fn load_config(explicit: Option<&Path>) -> Result<ComperConfig> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => {
            let path = config_path();
            if !path.exists() {
                tracing::debug!(path = %path.display(), "No config file, using defaults");
                return Ok(ComperConfig::default());
            }
            path
        }
    };
    let text = std::fs::read_to_string(&path)
        .with_context(|| format!("reading config {}", path.display()))?;
    let config = parse_config(&text).with_context(|| format!("parsing config {}", path.display()))?;
    tracing::info!(path = %path.display(), style = config.style.id(), "Config loaded");
    Ok(config)
}

pub(crate) fn parse_config(text: &str) -> Result<ComperConfig> {
    let config: ComperConfig = toml::from_str(text)?;
    config.validate()?;
    Ok(config)
}

pub(crate) fn render_config(config: &ComperConfig) -> Result<String> {
    Ok(toml::to_string_pretty(config)?)
}
