//! Configuration management for the weather report widget
//!
//! Settings come from an optional TOML file overlaid with `WEATHER_REPORT_*`
//! environment variables; nested keys use a double underscore.

use crate::WidgetError;
use crate::models::ActorId;
use crate::view_state::DEFAULT_DATE_TIME_FORMAT;
use anyhow::{Context, Result};
use chrono::format::{Item, StrftimeItems};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct WidgetConfig {
    /// Weather backend configuration
    #[serde(default)]
    pub weather: WeatherConfig,
    /// Device geolocation configuration
    #[serde(default)]
    pub geolocation: GeolocationConfig,
    /// Report email configuration
    #[serde(default)]
    pub email: EmailConfig,
    /// Record store configuration
    #[serde(default)]
    pub records: RecordsConfig,
    /// Who the widget runs as
    #[serde(default)]
    pub session: SessionConfig,
    /// How values are rendered
    #[serde(default)]
    pub display: DisplayConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Weather backend settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherConfig {
    /// Base URL of the weather backend
    #[serde(default = "default_weather_base_url")]
    pub base_url: String,
    /// Optional API key sent as `x-api-key`
    #[serde(default)]
    pub api_key: Option<String>,
    /// Seconds before a lookup is abandoned
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u32,
}

/// How the device position is obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum GeolocationMode {
    #[default]
    Ip,
    Fixed,
    Disabled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeolocationConfig {
    #[serde(default)]
    pub mode: GeolocationMode,
    /// Used in `fixed` mode
    #[serde(default)]
    pub latitude: Option<f64>,
    /// Used in `fixed` mode
    #[serde(default)]
    pub longitude: Option<f64>,
    /// Used in `ip` mode
    #[serde(default = "default_geolocation_url")]
    pub lookup_url: String,
}

/// SMTP settings for report emails
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    #[serde(default = "default_smtp_relay")]
    pub smtp_relay: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    /// From address; defaults to `username`
    #[serde(default)]
    pub sender_address: Option<String>,
    #[serde(default = "default_sender_name")]
    pub sender_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordsConfig {
    /// JSON file holding entity and user records
    #[serde(default = "default_records_path")]
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Current user when no entity is bound
    #[serde(default = "default_actor")]
    pub actor: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplayConfig {
    /// strftime pattern for the last-report time; defaults to en-US style
    #[serde(default = "default_date_time_format")]
    pub date_time_format: String,
}

/// Log output settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Level for this crate unless RUST_LOG is set
    #[serde(default = "default_log_level")]
    pub level: String,
    /// "pretty" or "json"
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_weather_base_url() -> String {
    "http://localhost:8080/api".to_string()
}

fn default_date_time_format() -> String {
    DEFAULT_DATE_TIME_FORMAT.to_string()
}

fn default_timeout() -> u32 {
    30
}

fn default_geolocation_url() -> String {
    "http://ip-api.com/json".to_string()
}

fn default_smtp_relay() -> String {
    "smtp.gmail.com".to_string()
}

fn default_sender_name() -> String {
    "Weather Report".to_string()
}

fn default_records_path() -> String {
    dirs::data_dir()
        .map(|dir| dir.join("weather-report").join("records.json"))
        .unwrap_or_else(|| PathBuf::from("records.json"))
        .to_string_lossy()
        .into_owned()
}

fn default_actor() -> String {
    std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "default".to_string())
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            base_url: default_weather_base_url(),
            api_key: None,
            timeout_seconds: default_timeout(),
        }
    }
}

impl Default for GeolocationConfig {
    fn default() -> Self {
        Self {
            mode: GeolocationMode::default(),
            latitude: None,
            longitude: None,
            lookup_url: default_geolocation_url(),
        }
    }
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            smtp_relay: default_smtp_relay(),
            username: None,
            password: None,
            sender_address: None,
            sender_name: default_sender_name(),
        }
    }
}

impl Default for RecordsConfig {
    fn default() -> Self {
        Self {
            path: default_records_path(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            actor: default_actor(),
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            date_time_format: default_date_time_format(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl WidgetConfig {
    /// Load from the default config path and the environment
    pub fn load() -> Result<Self> {
        Self::load_from_path(None)
    }

    /// Load from `config_path` (or the default path) and the environment
    pub fn load_from_path(config_path: Option<PathBuf>) -> Result<Self> {
        let mut builder = Config::builder();

        let config_file = config_path.unwrap_or_else(|| {
            Self::get_config_path().unwrap_or_else(|| PathBuf::from("config.toml"))
        });

        if config_file.exists() {
            builder = builder.add_source(
                File::from(config_file.clone())
                    .required(false)
                    .format(config::FileFormat::Toml),
            );
        }

        // WEATHER_REPORT_EMAIL__PASSWORD overrides email.password
        builder = builder.add_source(
            Environment::with_prefix("WEATHER_REPORT")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let settings = builder
            .build()
            .context("Failed to read configuration sources")?;

        let mut config: WidgetConfig = settings
            .try_deserialize()
            .context("Configuration has an unexpected shape")?;

        config.apply_defaults();
        config.validate()?;

        Ok(config)
    }

    /// `<config dir>/weather-report/config.toml`
    #[must_use]
    pub fn get_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("weather-report").join("config.toml"))
    }

    /// Apply default values to empty configuration fields
    pub fn apply_defaults(&mut self) {
        if self.weather.base_url.is_empty() {
            self.weather.base_url = default_weather_base_url();
        }
        if self.weather.timeout_seconds == 0 {
            self.weather.timeout_seconds = default_timeout();
        }
        if self.geolocation.lookup_url.is_empty() {
            self.geolocation.lookup_url = default_geolocation_url();
        }
        if self.email.smtp_relay.is_empty() {
            self.email.smtp_relay = default_smtp_relay();
        }
        if self.email.sender_name.is_empty() {
            self.email.sender_name = default_sender_name();
        }
        if self.records.path.is_empty() {
            self.records.path = default_records_path();
        }
        if self.session.actor.is_empty() {
            self.session.actor = default_actor();
        }
        if self.display.date_time_format.is_empty() {
            self.display.date_time_format = default_date_time_format();
        }
        if self.logging.level.is_empty() {
            self.logging.level = default_log_level();
        }
        if self.logging.format.is_empty() {
            self.logging.format = default_log_format();
        }
    }

    /// Reject settings the widget cannot run with
    pub fn validate(&self) -> Result<()> {
        self.validate_weather()?;
        self.validate_logging()?;
        self.validate_geolocation()?;
        self.validate_display()?;
        Ok(())
    }

    fn validate_weather(&self) -> Result<()> {
        if self.weather.timeout_seconds > MAX_TIMEOUT_SECONDS {
            return Err(WidgetError::config(format!(
                "Weather API timeout cannot exceed {MAX_TIMEOUT_SECONDS} seconds"
            ))
            .into());
        }
        if !is_http_url(&self.weather.base_url) {
            return Err(WidgetError::config(
                "Weather API base URL must be a valid HTTP or HTTPS URL",
            )
            .into());
        }
        Ok(())
    }

    fn validate_display(&self) -> Result<()> {
        let format = &self.display.date_time_format;
        if StrftimeItems::new(format).any(|item| matches!(item, Item::Error)) {
            return Err(
                WidgetError::config(format!("Invalid date_time_format '{format}'")).into(),
            );
        }
        Ok(())
    }

    fn validate_logging(&self) -> Result<()> {
        one_of("log level", &self.logging.level, LOG_LEVELS)?;
        one_of("log format", &self.logging.format, LOG_FORMATS)
    }

    fn validate_geolocation(&self) -> Result<()> {
        match self.geolocation.mode {
            GeolocationMode::Ip if !is_http_url(&self.geolocation.lookup_url) => Err(
                WidgetError::config("Geolocation lookup URL must be a valid HTTP or HTTPS URL")
                    .into(),
            ),
            GeolocationMode::Fixed => {
                let (Some(latitude), Some(longitude)) =
                    (self.geolocation.latitude, self.geolocation.longitude)
                else {
                    return Err(WidgetError::config(
                        "Fixed geolocation requires both latitude and longitude",
                    )
                    .into());
                };
                if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
                    return Err(WidgetError::config(format!(
                        "Fixed geolocation out of range: {latitude}, {longitude}"
                    ))
                    .into());
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    #[must_use]
    pub fn actor(&self) -> ActorId {
        ActorId::new(self.session.actor.clone())
    }

    #[must_use]
    pub fn records_path(&self) -> PathBuf {
        PathBuf::from(&self.records.path)
    }
}

const MAX_TIMEOUT_SECONDS: u32 = 300;
const LOG_LEVELS: &[&str] = &["error", "warn", "info", "debug", "trace"];
const LOG_FORMATS: &[&str] = &["pretty", "json"];

fn one_of(what: &str, value: &str, allowed: &[&str]) -> Result<()> {
    if allowed.contains(&value) {
        return Ok(());
    }
    Err(WidgetError::config(format!(
        "Invalid {what} '{value}'. Must be one of: {}",
        allowed.join(", ")
    ))
    .into())
}

fn is_http_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = WidgetConfig::default();
        assert_eq!(config.weather.base_url, "http://localhost:8080/api");
        assert_eq!(config.weather.timeout_seconds, 30);
        assert_eq!(config.geolocation.mode, GeolocationMode::Ip);
        assert_eq!(config.logging.level, "info");
        assert!(config.weather.api_key.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_unknown_log_level_rejected() {
        let mut config = WidgetConfig::default();
        config.logging.level = "invalid".to_string();
        let message = config.validate().unwrap_err().to_string();
        assert!(message.contains("Invalid log level 'invalid'"));
    }

    #[test]
    fn test_timeout_upper_bound() {
        let mut config = WidgetConfig::default();
        config.weather.timeout_seconds = 500;
        assert!(config.validate().unwrap_err().to_string().contains("cannot exceed 300"));
    }

    #[test]
    fn test_fixed_geolocation_validation() {
        let mut config = WidgetConfig::default();
        config.geolocation.mode = GeolocationMode::Fixed;
        assert!(config.validate().is_err());

        config.geolocation.latitude = Some(48.85);
        config.geolocation.longitude = Some(2.35);
        assert!(config.validate().is_ok());

        config.geolocation.latitude = Some(95.0);
        assert!(config.validate().unwrap_err().to_string().contains("out of range"));
    }

    #[test]
    fn test_apply_defaults_fills_blanks() {
        let mut config = WidgetConfig::default();
        config.weather.base_url.clear();
        config.logging.format.clear();
        config.apply_defaults();
        assert_eq!(config.weather.base_url, "http://localhost:8080/api");
        assert_eq!(config.logging.format, "pretty");
    }

    #[test]
    fn test_load_from_toml_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[weather]
base_url = "https://weather.example.com/api"

[geolocation]
mode = "disabled"

[session]
actor = "jdoe"
"#
        )
        .unwrap();

        let config = WidgetConfig::load_from_path(Some(file.path().to_path_buf())).unwrap();
        assert_eq!(config.weather.base_url, "https://weather.example.com/api");
        assert_eq!(config.geolocation.mode, GeolocationMode::Disabled);
        assert_eq!(config.actor(), ActorId::new("jdoe"));
        assert_eq!(config.email.smtp_relay, "smtp.gmail.com");
    }

    #[test]
    fn test_date_time_format_checked() {
        let mut config = WidgetConfig::default();
        assert_eq!(config.display.date_time_format, "%-m/%-d/%Y, %-I:%M:%S %p");

        config.display.date_time_format = "%d.%m.%Y %H:%M".to_string();
        assert!(config.validate().is_ok());

        config.display.date_time_format = "%Q".to_string();
        assert!(config.validate().unwrap_err().to_string().contains("date_time_format"));
    }

    #[test]
    fn test_default_path_is_namespaced() {
        if let Some(path) = WidgetConfig::get_config_path() {
            assert!(path.to_string_lossy().contains("weather-report"));
            assert!(path.to_string_lossy().ends_with("config.toml"));
        }
    }
}
