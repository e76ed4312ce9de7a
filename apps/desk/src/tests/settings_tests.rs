use std::{collections::HashMap, fs};

use super::*;

fn env(pairs: &[(&str, &str)]) -> Option<HashMap<String, String>> {
    Some(
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
    )
}

#[test]
fn defaults_apply_without_file_or_env() {
    let dir = tempfile::tempdir().expect("tempdir");
    let settings =
        load_settings_from(&dir.path().join("missing.toml"), env(&[])).expect("settings");
    assert_eq!(settings.api_base_url, "http://127.0.0.1:8080");
    assert_eq!(settings.route_style, RouteStyle::Path);
    assert_eq!(settings.request_timeout(), DEFAULT_REQUEST_TIMEOUT);
}

#[test]
fn file_values_override_defaults() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("desk.toml");
    fs::write(
        &path,
        "api_base_url = \"https://desk.example.net/api\"\nroute_style = \"query\"\n",
    )
    .expect("write");

    let settings = load_settings_from(&path, env(&[])).expect("settings");
    assert_eq!(settings.api_base_url, "https://desk.example.net/api");
    assert_eq!(settings.route_style, RouteStyle::Query);
    assert_eq!(
        settings.request_timeout_secs,
        DEFAULT_REQUEST_TIMEOUT.as_secs()
    );
}

#[test]
fn environment_overrides_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("desk.toml");
    fs::write(&path, "api_base_url = \"http://from-file\"\n").expect("write");

    let settings = load_settings_from(
        &path,
        env(&[
            ("DESK__API_BASE_URL", "http://from-env:8080"),
            ("DESK__REQUEST_TIMEOUT_SECS", "3"),
        ]),
    )
    .expect("settings");
    assert_eq!(settings.api_base_url, "http://from-env:8080");
    assert_eq!(settings.request_timeout().as_secs(), 3);
}

#[test]
fn zero_timeout_is_clamped() {
    let settings = DeskSettings {
        api_base_url: "http://localhost".to_string(),
        route_style: RouteStyle::Path,
        request_timeout_secs: 0,
    };
    assert_eq!(settings.request_timeout().as_secs(), 1);
}
