//! Weather reading model and cloud icon derivation

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Icon shown when a cloud code is not in the table
pub const UNKNOWN_CLOUD_CODE: &str = "n/a";

/// Cloud code to icon URL table
pub const CLOUD_ICONS: [(&str, &str); 11] = [
    (UNKNOWN_CLOUD_CODE, "https://example.com/icons/na.png"),
    ("SKC", "https://example.com/icons/clear_sky.png"),
    ("CLR", "https://example.com/icons/clear_sky.png"),
    ("FEW", "https://example.com/icons/few_clouds.png"),
    ("SCT", "https://example.com/icons/scattered_clouds.png"),
    ("BKN", "https://example.com/icons/broken_clouds.png"),
    ("OVC", "https://example.com/icons/overcast.png"),
    (
        "CAVOK",
        "https://cdn-icons-png.freepik.com/512/1163/1163661.png?ga=GA1.1.1584079416.1716860712",
    ),
    ("NCD", "https://example.com/icons/no_clouds_detected.png"),
    ("NSC", "https://example.com/icons/nil_significant_cloud.png"),
    ("VV", "https://example.com/icons/vertical_visibility.png"),
];

/// Look up the icon for a cloud code, falling back to the `n/a` entry.
#[must_use]
pub fn cloud_icon_url(code: &str) -> &'static str {
    CLOUD_ICONS
        .iter()
        .find(|(known, _)| *known == code)
        .or_else(|| CLOUD_ICONS.iter().find(|(known, _)| *known == UNKNOWN_CLOUD_CODE))
        .map_or("", |(_, url)| *url)
}

/// Reading as delivered by the provider, every field possibly missing
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderReading {
    pub temperature: Option<String>,
    pub weather_conditions: Option<String>,
    pub humidity: Option<String>,
    pub wind_speed: Option<String>,
    pub clouds: Option<String>,
}

fn truthy_text(value: &Value) -> Option<String> {
    match value {
        Value::Null | Value::Bool(false) => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) if n.as_f64().is_some_and(|f| f == 0.0 || f.is_nan()) => None,
        Value::Number(n) => Some(n.to_string()),
        other => Some(other.to_string()),
    }
}

impl ProviderReading {
    /// Extract the reading fields from an arbitrary JSON payload.
    ///
    /// Numbers and other truthy values are kept as their text; null, `false`
    /// and zero count as missing so `validate` rejects them.
    #[must_use]
    pub fn from_value(value: &Value) -> Self {
        let field = |name: &str| value.get(name).and_then(truthy_text);
        Self {
            temperature: field("temperature"),
            weather_conditions: field("weatherConditions"),
            humidity: field("humidity"),
            wind_speed: field("windSpeed"),
            clouds: field("clouds"),
        }
    }

    /// Turn into a display reading if all five fields are present and non-empty.
    #[must_use]
    pub fn validate(self) -> Option<WeatherReading> {
        let present = |v: Option<String>| v.filter(|s| !s.is_empty());

        let temperature = present(self.temperature)?;
        let weather_conditions = present(self.weather_conditions)?;
        let humidity = present(self.humidity)?;
        let wind_speed = present(self.wind_speed)?;
        let clouds = present(self.clouds)?;

        Some(WeatherReading::new(
            temperature,
            weather_conditions,
            humidity,
            wind_speed,
            clouds,
        ))
    }
}

/// Normalized weather snapshot ready for display
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeatherReading {
    pub temperature: String,
    pub weather_conditions: String,
    pub humidity: String,
    pub wind_speed: String,
    pub clouds: String,
    /// Derived from `clouds`, never supplied by the provider
    pub cloud_icon_url: String,
}

impl WeatherReading {
    #[must_use]
    pub fn new(
        temperature: String,
        weather_conditions: String,
        humidity: String,
        wind_speed: String,
        clouds: String,
    ) -> Self {
        let cloud_icon_url = cloud_icon_url(&clouds).to_string();
        Self {
            temperature,
            weather_conditions,
            humidity,
            wind_speed,
            clouds,
            cloud_icon_url,
        }
    }

    /// Plain-text summary used in report emails
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "Temperature: {}\nConditions: {}\nHumidity: {}\nWind speed: {}\nClouds: {}",
            self.temperature, self.weather_conditions, self.humidity, self.wind_speed, self.clouds
        )
    }
}
