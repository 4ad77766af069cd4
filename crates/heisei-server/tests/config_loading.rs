//! Configuration file and environment resolution.
#![allow(clippy::expect_used, clippy::unwrap_used)]

use heisei_server::{ConfigError, ServerConfig};
use serial_test::serial;
use std::io::Write;

const ENV_KEYS: [&str; 5] = [
    "SERVER_HOST",
    "SERVER_PORT",
    "LOG_LEVEL",
    "RATE_LIMIT_BURST",
    "RATE_LIMIT_PER_SECOND",
];

fn clear_env() {
    for key in ENV_KEYS {
        std::env::remove_var(key);
    }
}

fn write_config(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
#[serial]
fn file_values_override_defaults() {
    clear_env();
    let file = write_config(
        r#"
[server]
port = 9000

[limiter]
capacity = 4
refill_per_second = 0.5
"#,
    );

    let config = ServerConfig::load(Some(file.path())).unwrap();
    assert_eq!(config.server.port, 9000);
    assert_eq!(config.server.host, "0.0.0.0");
    assert_eq!(config.limiter.capacity, 4);
    assert_eq!(config.limiter.retention_secs, 3600);
}

#[test]
#[serial]
fn environment_overrides_file() {
    clear_env();
    let file = write_config("[server]\nport = 9000\n");
    std::env::set_var("SERVER_PORT", "7777");
    std::env::set_var("RATE_LIMIT_BURST", "3");

    let config = ServerConfig::load(Some(file.path())).unwrap();
    clear_env();

    assert_eq!(config.server.port, 7777);
    assert_eq!(config.limiter.capacity, 3);
}

#[test]
#[serial]
fn invalid_values_are_rejected() {
    clear_env();
    std::env::set_var("RATE_LIMIT_PER_SECOND", "-1");
    let err = ServerConfig::load(None).unwrap_err();
    clear_env();
    assert!(matches!(
        err,
        ConfigError::Invalid {
            field: "limiter.refill_per_second",
            ..
        }
    ));

    let file = write_config("[server\nport = 1");
    assert!(matches!(
        ServerConfig::load(Some(file.path())),
        Err(ConfigError::Parse { .. })
    ));
}

#[test]
#[serial]
fn missing_file_is_an_io_error() {
    clear_env();
    let missing = std::path::Path::new("/nonexistent/heisei.toml");
    let err = ServerConfig::load(Some(missing)).unwrap_err();
    assert!(matches!(err, ConfigError::Io { .. }));
}
