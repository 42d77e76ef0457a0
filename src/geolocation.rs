//! Device geolocation providers
//!
//! A provider either yields the current coordinates or reports that position
//! is unavailable; no further error detail is carried.

use crate::config::{GeolocationConfig, GeolocationMode};
use crate::error::WidgetError;
use crate::models::Coordinates;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

#[async_trait]
pub trait GeolocationProvider: Send + Sync {
    /// Current position, or `None` when unavailable or denied
    async fn current_position(&self) -> Option<Coordinates>;
}

/// Always reports the same position
#[derive(Debug, Clone)]
pub struct FixedGeolocation {
    coordinates: Coordinates,
}

impl FixedGeolocation {
    #[must_use]
    pub fn new(coordinates: Coordinates) -> Self {
        Self { coordinates }
    }
}

#[async_trait]
impl GeolocationProvider for FixedGeolocation {
    async fn current_position(&self) -> Option<Coordinates> {
        Some(self.coordinates)
    }
}

/// Geolocation switched off
#[derive(Debug, Clone, Default)]
pub struct NoGeolocation;

#[async_trait]
impl GeolocationProvider for NoGeolocation {
    async fn current_position(&self) -> Option<Coordinates> {
        None
    }
}

/// Position from an IP geolocation endpoint
#[derive(Debug, Clone)]
pub struct IpGeolocation {
    client: Client,
    url: String,
}

#[derive(Debug, Deserialize)]
struct IpLookupResponse {
    #[serde(default)]
    status: Option<String>,
    #[serde(default, alias = "lat")]
    latitude: Option<f64>,
    #[serde(default, alias = "lon")]
    longitude: Option<f64>,
}

impl IpGeolocation {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, WidgetError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("weather-report/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| WidgetError::config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl GeolocationProvider for IpGeolocation {
    #[instrument(skip(self), fields(url = %self.url))]
    async fn current_position(&self) -> Option<Coordinates> {
        let response = match self.client.get(&self.url).send().await {
            Ok(response) if response.status().is_success() => response,
            Ok(response) => {
                warn!("IP geolocation returned HTTP {}", response.status());
                return None;
            }
            Err(e) => {
                warn!("IP geolocation request failed: {}", e);
                return None;
            }
        };

        let body: IpLookupResponse = match response.json().await {
            Ok(body) => body,
            Err(e) => {
                warn!("Failed to parse IP geolocation response: {}", e);
                return None;
            }
        };

        if body.status.as_deref().is_some_and(|s| s != "success") {
            debug!("IP geolocation declined: {:?}", body.status);
            return None;
        }

        let coordinates = Coordinates::new(body.latitude?, body.longitude?);
        if !coordinates.is_valid() {
            warn!("IP geolocation returned out-of-range coordinates");
            return None;
        }

        debug!("Device position {}", coordinates.format_coordinates());
        Some(coordinates)
    }
}

/// Build the provider selected in configuration
pub fn from_config(
    config: &GeolocationConfig,
    timeout: Duration,
) -> Result<Arc<dyn GeolocationProvider>, WidgetError> {
    let provider: Arc<dyn GeolocationProvider> = match config.mode {
        GeolocationMode::Ip => Arc::new(IpGeolocation::new(config.lookup_url.clone(), timeout)?),
        GeolocationMode::Fixed => match (config.latitude, config.longitude) {
            (Some(latitude), Some(longitude)) => {
                Arc::new(FixedGeolocation::new(Coordinates::new(latitude, longitude)))
            }
            _ => {
                return Err(WidgetError::config(
                    "Fixed geolocation requires both latitude and longitude",
                ));
            }
        },
        GeolocationMode::Disabled => Arc::new(NoGeolocation),
    };
    Ok(provider)
}
