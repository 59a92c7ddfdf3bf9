//! Locates and reads the optional TOML configuration file.

use super::builder::ConfigBuilder;
use super::file::ConfigFile;
use crate::core::error::Result;
use std::fs;
use std::path::{Path, PathBuf};

/// Environment variable naming an explicit configuration file.
pub const CONFIG_ENV_VAR: &str = "SMTP_PROBE_CONFIG";
const LOCAL_CONFIG_NAME: &str = "smtp-probe.toml";

/// Returns the first configuration file that exists, in lookup order:
/// explicit path, `$SMTP_PROBE_CONFIG`, `./smtp-probe.toml`,
/// `$HOME/.config/smtp-probe/config.toml`.
///
/// An explicit path is returned even if missing so that reading it reports
/// the error instead of silently falling back to defaults.
pub fn find_config_file(explicit: Option<&str>) -> Option<PathBuf> {
    if let Some(path) = explicit.filter(|p| !p.trim().is_empty()) {
        return Some(PathBuf::from(path));
    }
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    let mut candidates = vec![PathBuf::from(LOCAL_CONFIG_NAME)];
    if let Ok(home) = std::env::var("HOME") {
        candidates.push(
            PathBuf::from(home)
                .join(".config")
                .join("smtp-probe")
                .join("config.toml"),
        );
    }
    candidates.into_iter().find(|p| p.is_file())
}

pub(crate) fn read_config_file(path: &Path) -> Result<ConfigFile> {
    let raw = fs::read_to_string(path)?;
    let file: ConfigFile = toml::from_str(&raw)?;
    Ok(file)
}

/// Builds a [`ConfigBuilder`] seeded with defaults and, if one is found, the
/// configuration file. Callers apply their overrides and call `build()`.
pub fn load_config_builder(explicit: Option<&str>) -> Result<ConfigBuilder> {
    let builder = ConfigBuilder::new();
    match find_config_file(explicit) {
        Some(path) => {
            tracing::info!("Loading configuration from {}", path.display());
            let file = read_config_file(&path)?;
            Ok(builder.apply_file(&file, Some(path.display().to_string())))
        }
        None => {
            tracing::debug!("No configuration file found, using defaults");
            Ok(builder)
        }
    }
}
