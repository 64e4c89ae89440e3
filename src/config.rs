use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::errors::{DriverError, DriverResult};
use crate::session::platform::Platform;
use crate::settings::{Settings, UnknownSettingsPolicy};

pub const CONFIG_FILE_NAME: &str = "image-driver.toml";
pub const ENV_SERVER_URL: &str = "IMAGE_DRIVER_SERVER_URL";
pub const ENV_SESSION_ID: &str = "IMAGE_DRIVER_SESSION_ID";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DriverConfig {
    /// What to do with settings keys this client does not recognize.
    #[serde(default)]
    pub unknown_settings: UnknownSettingsPolicy,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub wait: WaitConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    /// Initial image settings; updated at runtime through the session.
    #[serde(default)]
    pub settings: Settings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Base URL of the automation server, e.g. `http://127.0.0.1:4723`.
    pub url: Option<String>,
    /// Id of an already established session on that server.
    pub session_id: Option<String>,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    #[serde(default)]
    pub platform: Platform,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            url: None,
            session_id: None,
            request_timeout_ms: default_request_timeout_ms(),
            platform: Platform::default(),
        }
    }
}

fn default_request_timeout_ms() -> u64 {
    60_000
}

/// Defaults for find-by-image polling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaitConfig {
    #[serde(default = "default_wait_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_wait_interval_ms")]
    pub interval_ms: u64,
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_wait_timeout_ms(),
            interval_ms: default_wait_interval_ms(),
        }
    }
}

fn default_wait_timeout_ms() -> u64 {
    5_000
}

fn default_wait_interval_ms() -> u64 {
    500
}

/// Bounds for the per-session image element cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Handles kept per session before the least recently used is evicted.
    #[serde(default = "default_max_elements")]
    pub max_elements: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_elements: default_max_elements(),
        }
    }
}

fn default_max_elements() -> usize {
    1024
}

fn resolve_config_path() -> DriverResult<PathBuf> {
    if let Ok(exe) = std::env::current_exe() {
        if let Some(parent) = exe.parent() {
            let candidate = parent.join(CONFIG_FILE_NAME);
            if candidate.exists() {
                tracing::debug!(path = %candidate.display(), "config found next to executable");
                return Ok(candidate);
            }
        }
    }

    let cwd = std::env::current_dir()?;
    let candidate = cwd.join(CONFIG_FILE_NAME);
    if candidate.exists() {
        tracing::debug!(path = %candidate.display(), "config found in working directory");
        return Ok(candidate);
    }

    Err(DriverError::Config(format!(
        "{CONFIG_FILE_NAME} not found next to executable or in working directory"
    )))
}

/// Locate and load the config file, then apply `.env` and environment
/// overrides.
pub fn load_config() -> DriverResult<DriverConfig> {
    let _ = dotenvy::dotenv();
    let path = resolve_config_path()?;
    let mut config = load_config_from(&path)?;
    apply_overrides(&mut config, |key| std::env::var(key).ok());
    Ok(config)
}

pub fn load_config_from(path: &Path) -> DriverResult<DriverConfig> {
    let content = std::fs::read_to_string(path)?;
    let config: DriverConfig = toml::from_str(&content)?;
    config.settings.validate()?;
    if config.cache.max_elements == 0 {
        return Err(DriverError::Config("cache.max_elements must be at least 1".into()));
    }
    tracing::info!(
        path = %path.display(),
        platform = %config.server.platform,
        timeout_ms = config.wait.timeout_ms,
        "config loaded"
    );
    Ok(config)
}

/// Environment values win over the file.
pub fn apply_overrides(config: &mut DriverConfig, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(url) = lookup(ENV_SERVER_URL).filter(|v| !v.is_empty()) {
        tracing::debug!(url = %url, "server url overridden from environment");
        config.server.url = Some(url);
    }
    if let Some(id) = lookup(ENV_SESSION_ID).filter(|v| !v.is_empty()) {
        config.server.session_id = Some(id);
    }
}
