use std::{collections::HashMap, path::Path, time::Duration};

use client_core::{RouteStyle, DEFAULT_REQUEST_TIMEOUT};
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

pub const DEFAULT_SETTINGS_FILE: &str = "desk.toml";
const DEFAULT_API_BASE_URL: &str = "http://127.0.0.1:8080";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DeskSettings {
    pub api_base_url: String,
    #[serde(default)]
    pub route_style: RouteStyle,
    pub request_timeout_secs: u64,
}

impl DeskSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }
}

/// Defaults, then `path` if it exists, then `DESK__*` variables.
pub fn load_settings(path: &Path) -> Result<DeskSettings, ConfigError> {
    load_settings_from(path, None)
}

/// `env` replaces the process environment when given.
pub fn load_settings_from(
    path: &Path,
    env: Option<HashMap<String, String>>,
) -> Result<DeskSettings, ConfigError> {
    Config::builder()
        .set_default("api_base_url", DEFAULT_API_BASE_URL)?
        .set_default("route_style", "path")?
        .set_default("request_timeout_secs", DEFAULT_REQUEST_TIMEOUT.as_secs())?
        .add_source(File::from(path).required(false))
        .add_source(
            Environment::with_prefix("DESK")
                .separator("__")
                .try_parsing(true)
                .source(env),
        )
        .build()?
        .try_deserialize()
}

#[cfg(test)]
#[path = "tests/settings_tests.rs"]
mod tests;
