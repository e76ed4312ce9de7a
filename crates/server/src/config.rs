use std::{collections::HashMap, fs};

use serde::Deserialize;
use storage::ensure_sqlite_parent_dir_exists;

const SETTINGS_FILE: &str = "server.toml";

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Settings {
    pub server_bind: String,
    pub database_url: String,
    pub max_body_bytes: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_bind: "127.0.0.1:8080".into(),
            database_url: "sqlite://./data/service_desk.db".into(),
            max_body_bytes: 64 * 1024,
        }
    }
}

impl Settings {
    /// Applies `bind_addr`, `database_url` and `max_body_bytes` from a flat
    /// TOML table. Unknown keys are ignored.
    fn apply_file(&mut self, raw: &str) {
        let Ok(file_cfg) = toml::from_str::<HashMap<String, toml::Value>>(raw) else {
            tracing::warn!("ignoring unparseable {SETTINGS_FILE}");
            return;
        };
        if let Some(v) = file_cfg.get("bind_addr").and_then(toml::Value::as_str) {
            self.server_bind = v.to_string();
        }
        if let Some(v) = file_cfg.get("database_url").and_then(toml::Value::as_str) {
            self.database_url = v.to_string();
        }
        if let Some(v) = file_cfg
            .get("max_body_bytes")
            .and_then(toml::Value::as_integer)
            .and_then(|v| usize::try_from(v).ok())
        {
            self.max_body_bytes = v;
        }
    }

    /// Later keys win: the `APP__` spelling overrides the plain one.
    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        for key in ["SERVER_BIND", "APP__BIND_ADDR"] {
            if let Some(v) = lookup(key) {
                self.server_bind = v;
            }
        }
        for key in ["DATABASE_URL", "APP__DATABASE_URL"] {
            if let Some(v) = lookup(key) {
                self.database_url = v;
            }
        }
        if let Some(v) = lookup("APP__MAX_BODY_BYTES") {
            if let Ok(parsed) = v.parse::<usize>() {
                self.max_body_bytes = parsed;
            }
        }
    }
}

pub fn load_settings() -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string(SETTINGS_FILE) {
        settings.apply_file(&raw);
    }
    settings.apply_env(|key| std::env::var(key).ok());

    settings
}

pub fn prepare_database_url(raw_database_url: &str) -> anyhow::Result<String> {
    let database_url = normalize_database_url(raw_database_url);
    ensure_sqlite_parent_dir_exists(&database_url)?;
    Ok(database_url)
}

fn normalize_database_url(raw_database_url: &str) -> String {
    let raw_database_url = raw_database_url.trim();

    if raw_database_url.is_empty() {
        return Settings::default().database_url;
    }

    if raw_database_url.starts_with("sqlite::memory:")
        || raw_database_url.starts_with("sqlite://")
        || raw_database_url.contains("://")
    {
        return raw_database_url.to_string();
    }

    if let Some(path) = raw_database_url.strip_prefix("sqlite:") {
        let path = path.replace('\\', "/");
        return format!("sqlite://{path}");
    }

    format!("sqlite://{}", raw_database_url.replace('\\', "/"))
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
