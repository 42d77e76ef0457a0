//! Report and notification models

use serde::{Deserialize, Serialize};

use super::location::EntityId;
use super::weather::WeatherReading;

/// Literal token the report-send backend returns on success
pub const SUCCESS_TOKEN: &str = "Success";

/// What the user asked to send
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportContext {
    /// Present only when the location came from a bound entity
    pub entity_id: Option<EntityId>,
    pub reading: WeatherReading,
}

/// Payload handed to the report-send backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<EntityId>,
    pub weather_data: WeatherReading,
}

impl From<ReportContext> for ReportRequest {
    fn from(context: ReportContext) -> Self {
        Self {
            entity_id: context.entity_id,
            weather_data: context.reading,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Success,
    Error,
}

/// Transient user-facing message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub title: String,
    pub message: String,
    pub severity: Severity,
}

impl Notification {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            title: "Success".to_string(),
            message: message.into(),
            severity: Severity::Success,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            title: "Error".to_string(),
            message: message.into(),
            severity: Severity::Error,
        }
    }
}
