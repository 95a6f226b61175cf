// src/config/app.rs
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::defaults::*;
use crate::consts::{CONFIG_DIR_NAME, CONFIG_ENV_VAR, CONFIG_FILE_NAME};
use crate::enums::SecurityLevel;
use crate::error::{CoreError, Result};

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub profile: ProfileSettings,
    pub encryption: EncryptionSettings,
    pub verify: VerifySettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileSettings {
    /// Looked up in the builtin profile registry
    pub name: String,
    pub security_level: SecurityLevel,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncryptionSettings {
    pub compress: bool,
    pub utf8: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VerifySettings {
    pub creation_time_offset_secs: i64,
}

impl Default for ProfileSettings {
    fn default() -> Self {
        default_profile()
    }
}

impl Default for EncryptionSettings {
    fn default() -> Self {
        default_encryption()
    }
}

impl Default for VerifySettings {
    fn default() -> Self {
        default_verify()
    }
}

static CONFIG: OnceLock<Config> = OnceLock::new();

/// `$PGP_COMPOSE_CONFIG`, else `<config dir>/pgp-compose/config.toml`.
pub fn config_path() -> Option<PathBuf> {
    match std::env::var_os(CONFIG_ENV_VAR) {
        Some(path) => Some(PathBuf::from(path)),
        None => dirs::config_dir().map(|dir| dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME)),
    }
}

/// Process-wide config, read once. An unreadable file falls back to the
/// defaults with a warning.
pub fn load() -> &'static Config {
    CONFIG.get_or_init(|| {
        let Some(path) = config_path().filter(|p| p.exists()) else {
            debug!("no config file, using built-in defaults");
            return Config::default();
        };
        load_from(&path).unwrap_or_else(|err| {
            warn!(path = %path.display(), %err, "ignoring config file");
            Config::default()
        })
    })
}

pub fn load_from(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)?;
    let config = toml::from_str(&content)
        .map_err(|e| CoreError::Configuration(format!("{}: {e}", path.display())))?;
    debug!(path = %path.display(), "loaded config");
    Ok(config)
}
