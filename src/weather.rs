//! Current weather lookup and normalization
//!
//! The fetcher picks the lookup from the resolved place, validates the
//! provider's answer and derives the cloud icon.

use crate::config::WeatherConfig;
use crate::error::{FetchError, WidgetError};
use crate::models::{Location, Place, ProviderReading, WeatherReading};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, instrument, warn};

/// Failure reported by a lookup; the message is shown to the user when present
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupError {
    pub message: Option<String>,
}

impl LookupError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
        }
    }

    #[must_use]
    pub fn unknown() -> Self {
        Self { message: None }
    }
}

/// Remote weather lookups. Responses are returned raw and validated by the caller.
#[async_trait]
pub trait WeatherLookup: Send + Sync {
    async fn by_coordinates(&self, latitude: &str, longitude: &str) -> Result<Value, LookupError>;

    async fn by_city(&self, city: &str, country: &str) -> Result<Value, LookupError>;
}

/// HTTP client for the weather backend
#[derive(Debug, Clone)]
pub struct HttpWeatherLookup {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpWeatherLookup {
    pub fn new(config: &WeatherConfig) -> Result<Self, WidgetError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds.into()))
            .user_agent(concat!("weather-report/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| WidgetError::config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }

    async fn get(&self, url: String) -> Result<Value, LookupError> {
        let start_time = Instant::now();
        let mut request = self.client.get(&url);
        if let Some(api_key) = &self.api_key {
            request = request.header("x-api-key", api_key);
        }

        let response = request.send().await.map_err(|e| {
            error!("Weather request failed: {}", e);
            LookupError::new(e.to_string())
        })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            error!("Failed to read weather response body: {}", e);
            LookupError::new(e.to_string())
        })?;

        if !status.is_success() {
            warn!("Weather backend returned HTTP {}", status);
            let message = serde_json::from_str::<Value>(&body)
                .ok()
                .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_string));
            return Err(LookupError { message });
        }

        info!(
            "Weather response received in {:.3}s",
            start_time.elapsed().as_secs_f64()
        );

        // non-JSON bodies fail validation as malformed
        Ok(serde_json::from_str(&body).unwrap_or_else(|e| {
            warn!("Weather response is not JSON: {}", e);
            Value::Null
        }))
    }
}

#[async_trait]
impl WeatherLookup for HttpWeatherLookup {
    #[instrument(skip(self))]
    async fn by_coordinates(&self, latitude: &str, longitude: &str) -> Result<Value, LookupError> {
        let url = format!(
            "{}/weather/coordinates?latitude={}&longitude={}",
            self.base_url,
            urlencoding::encode(latitude),
            urlencoding::encode(longitude)
        );
        debug!("Weather request URL: {}", url);
        self.get(url).await
    }

    #[instrument(skip(self))]
    async fn by_city(&self, city: &str, country: &str) -> Result<Value, LookupError> {
        let url = format!(
            "{}/weather/city?city={}&country={}",
            self.base_url,
            urlencoding::encode(city),
            urlencoding::encode(country)
        );
        debug!("Weather request URL: {}", url);
        self.get(url).await
    }
}

/// Fetch-and-normalize pipeline over a [`WeatherLookup`]
#[derive(Clone)]
pub struct WeatherFetcher {
    lookup: Arc<dyn WeatherLookup>,
}

impl WeatherFetcher {
    pub fn new(lookup: Arc<dyn WeatherLookup>) -> Self {
        Self { lookup }
    }

    /// Fetch the current reading for a location.
    ///
    /// Coordinates use the coordinates lookup, a city/country pair the city
    /// lookup; an unresolved place fails without any remote call.
    pub async fn fetch_weather(&self, location: &Location) -> Result<WeatherReading, FetchError> {
        let response = match &location.place {
            Place::Coordinates(coords) => {
                debug!("Fetching weather by coordinates {}", coords.format_coordinates());
                self.lookup
                    .by_coordinates(&coords.latitude.to_string(), &coords.longitude.to_string())
                    .await
            }
            Place::CityCountry { city, country } => {
                debug!("Fetching weather by city {}, {}", city, country);
                self.lookup.by_city(city, country).await
            }
            Place::Unresolved => {
                warn!("No location to fetch weather for");
                return Err(FetchError::NoLocation);
            }
        };

        let value = response.map_err(|e| {
            error!("Error fetching weather data: {:?}", e.message);
            FetchError::remote(e.message)
        })?;

        let reading = ProviderReading::from_value(&value).validate().ok_or_else(|| {
            error!("Unexpected result structure: {}", value);
            FetchError::MalformedResponse
        })?;

        info!(
            "Weather for {}: {} {}",
            location.place, reading.temperature, reading.weather_conditions
        );
        Ok(reading)
    }
}
