//! Data models for the weather report widget
//!
//! This module contains the core domain models organized by concern:
//! - Location: where a reading is fetched for and its source
//! - Weather: provider readings, validated readings and cloud icons
//! - Report: report payloads and user notifications

pub mod location;
pub mod report;
pub mod weather;

// Re-export all public types for convenient access
pub use location::{ActorId, Coordinates, EntityId, Location, LocationSource, Place};
pub use report::{Notification, ReportContext, ReportRequest, SUCCESS_TOKEN, Severity};
pub use weather::{CLOUD_ICONS, ProviderReading, WeatherReading, cloud_icon_url};
