//! Integration tests for switchyard-config

use std::env;
use std::io::Write;
use switchyard_config::*;

fn settings_file(ext: &str, content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(&format!(".{}", ext))
        .tempfile()
        .unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

#[test]
fn test_settings_from_toml_file() {
    let file = settings_file(
        "toml",
        r#"
        host = "0.0.0.0"
        port = 9090

        [dispatch]
        root_prefix = "/v1"
        debug = true
        "#,
    );

    let settings = ServerSettings::load(Some(file.path())).unwrap();
    assert_eq!(settings.port, 9090);
    assert_eq!(settings.dispatch.root_prefix, "/v1");
    assert!(settings.dispatch.debug);
    // untouched keys keep their defaults
    assert_eq!(settings.dispatch.allow_origin, "*");
    assert_eq!(settings.log_level, "info");
}

#[test]
fn test_invalid_file_is_rejected() {
    let file = settings_file("json", r#"{"dispatch": {"root_prefix": "api/"}}"#);
    let err = ServerSettings::load(Some(file.path())).unwrap_err();
    assert!(matches!(
        err,
        ConfigError::Validation { ref field, .. } if field == "dispatch.root_prefix"
    ));
}

#[test]
fn test_unsupported_extension() {
    let file = settings_file("yaml", "port: 1");
    assert!(matches!(
        ServerSettings::load(Some(file.path())),
        Err(ConfigError::UnsupportedFormat(_))
    ));
}

#[test]
fn test_environment_overrides_file() {
    let file = settings_file("json", r#"{"dispatch": {"allow_origin": "https://file.example"}}"#);
    let manager = ConfigManager::with_prefix("SWYTEST");

    unsafe {
        env::set_var("SWYTEST_DISPATCH__ALLOW_ORIGIN", "https://env.example");
    }

    manager.load_file_auto(file.path()).unwrap();
    manager.load_env();
    assert_eq!(
        manager.get_string("dispatch.allow_origin").unwrap(),
        "https://env.example"
    );

    unsafe {
        env::remove_var("SWYTEST_DISPATCH__ALLOW_ORIGIN");
    }
}

#[test]
fn test_dotenv_file() {
    let file = settings_file("env", "SWYDOTENV_PORT=7070\n");
    let manager = ConfigManager::with_prefix("SWYDOTENV");
    manager.load_dotenv(Some(file.path())).unwrap();
    assert_eq!(manager.get::<u16>("port").unwrap(), 7070);
    assert!(env::var("SWYDOTENV_PORT").is_err());
}

#[test]
fn test_settings_file_beats_dotenv() {
    let dotenv = settings_file("env", "SWITCHYARD_PORT=7000\nSWITCHYARD_LOG_LEVEL=debug\n");
    let file = settings_file("json", r#"{"port": 9000}"#);

    let settings = ServerSettings::load_from(Some(dotenv.path()), Some(file.path())).unwrap();
    assert_eq!(settings.port, 9000);
    // keys the file leaves alone still come from .env
    assert_eq!(settings.log_level, "debug");
    assert!(env::var("SWITCHYARD_LOG_LEVEL").is_err());
}

#[test]
fn test_config_error_display() {
    let err = ConfigError::validation("port", "port 0 is not allowed");
    assert_eq!(err.to_string(), "Invalid setting port: port 0 is not allowed");
}
