//! Integration tests for the weather-report CLI

use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

fn weather_report(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_weather-report"))
        .args(args)
        .env("RUST_LOG", "off")
        .output()
        .expect("Failed to execute weather-report")
}

/// Config with geolocation disabled, an empty record file and no email section
fn offline_config(dir: &Path, extra: &str) -> PathBuf {
    let records = dir.join("records.json");
    std::fs::write(&records, "{}").unwrap();

    let config = dir.join("config.toml");
    std::fs::write(
        &config,
        format!(
            r#"
[geolocation]
mode = "disabled"

[records]
path = {:?}

[session]
actor = "tester"
{extra}
"#,
            records.display().to_string()
        ),
    )
    .unwrap();
    config
}

#[test]
fn test_cli_help() {
    let output = weather_report(&["--help"]);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("weather-report"));
    assert!(stdout.contains("show"));
    assert!(stdout.contains("send"));
    assert!(stdout.contains("config"));
}

#[test]
fn test_config_masks_secrets() {
    let dir = TempDir::new().unwrap();
    let config = offline_config(
        dir.path(),
        r#"
[weather]
api_key = "weather-secret"

[email]
username = "bot@example.com"
password = "smtp-secret"
"#,
    );

    let output = weather_report(&["config", "--config", config.to_str().unwrap()]);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("********"));
    assert!(stdout.contains("bot@example.com"));
    assert!(!stdout.contains("weather-secret"));
    assert!(!stdout.contains("smtp-secret"));
}

#[test]
fn test_show_without_email_settings() {
    let dir = TempDir::new().unwrap();
    let config = offline_config(dir.path(), "");

    let output = weather_report(&["show", "--config", config.to_str().unwrap()]);

    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Geolocation is not supported by this browser."));
    assert!(stdout.contains("Temperature:  N/A"));
    assert!(stdout.contains("Humidity:     N/A"));
    assert!(stdout.contains("Last report:  N/A"));
}

#[test]
fn test_failed_send_exits_non_zero() {
    let dir = TempDir::new().unwrap();
    let config = offline_config(dir.path(), "");

    let output = weather_report(&["send", "--config", config.to_str().unwrap()]);

    assert!(!output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Error: No weather data available to send."));
}

#[test]
fn test_invalid_config_is_reported() {
    let dir = TempDir::new().unwrap();
    let config = offline_config(
        dir.path(),
        r#"
[logging]
level = "chatty"
"#,
    );

    let output = weather_report(&["show", "--config", config.to_str().unwrap()]);

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Invalid log level"));
}
