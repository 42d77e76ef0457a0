//! Weather report widget
//!
//! Resolves a location (from a bound record's stored address or the device
//! position), fetches current conditions for it, exposes them as display
//! state, and mails a weather report on request.

pub mod config;
pub mod email;
pub mod error;
pub mod geolocation;
pub mod location_resolver;
pub mod logging;
pub mod models;
pub mod notify;
pub mod records;
pub mod report;
pub mod view_state;
pub mod weather;
pub mod widget;

// Re-export core types for public API
pub use config::WidgetConfig;
pub use error::{DispatchError, FetchError, ResolveError, WidgetError};
pub use location_resolver::{LocationEvent, LocationFeed, LocationResolver};
pub use models::{
    ActorId, Coordinates, EntityId, Location, LocationSource, Notification, Place,
    ReportContext, Severity, WeatherReading,
};
pub use report::{ReportDispatcher, ReportSender};
pub use view_state::{ViewHandle, ViewState};
pub use weather::{HttpWeatherLookup, WeatherFetcher, WeatherLookup};
pub use widget::{EventOutcome, WeatherWidget};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Result type for host-level operations
pub type Result<T> = std::result::Result<T, WidgetError>;
