//! Error types and handling for the weather report widget

use thiserror::Error;

/// Location could not be resolved
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    /// Entity or current-user field delivery failed
    #[error("{0}")]
    Subscription(String),

    #[error("Geolocation is not supported by this browser.")]
    GeolocationUnavailable,
}

/// Weather could not be fetched for a location
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// Neither coordinates nor city/country were available
    #[error("Location information is not available.")]
    NoLocation,

    /// Provider answered but a required field was missing
    #[error("Unexpected result structure")]
    MalformedResponse,

    /// Transport or provider level failure
    #[error("{0}")]
    Remote(String),
}

impl FetchError {
    /// Remote failure with the provider's message, or "Unknown error"
    pub fn remote(message: Option<String>) -> Self {
        Self::Remote(
            message
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| UNKNOWN_ERROR.to_string()),
        )
    }
}

/// Report could not be dispatched
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    /// Backend answered with something other than the success token
    #[error("{0}")]
    BusinessFailure(String),

    /// The send call itself failed
    #[error("{0}")]
    Transport(String),

    /// A report is already being sent
    #[error("A weather report is already being sent.")]
    InFlight,

    /// There is no reading to put in a report
    #[error("No weather data available to send.")]
    NoReading,
}

impl DispatchError {
    pub fn transport(message: Option<String>) -> Self {
        Self::Transport(
            message
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| UNKNOWN_ERROR.to_string()),
        )
    }
}

/// Fallback text when a failure carries no message
pub const UNKNOWN_ERROR: &str = "Unknown error";

/// Failure while wiring the widget to its host (settings, record file, I/O)
#[derive(Error, Debug)]
pub enum WidgetError {
    #[error("Invalid configuration: {message}")]
    Config { message: String },

    #[error("Record store error: {message}")]
    Records { message: String },

    #[error("Record file I/O failed: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
}

impl WidgetError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub fn records(message: impl Into<String>) -> Self {
        Self::Records {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_visible_strings() {
        assert_eq!(
            FetchError::NoLocation.to_string(),
            "Location information is not available."
        );
        assert_eq!(
            FetchError::MalformedResponse.to_string(),
            "Unexpected result structure"
        );
        assert_eq!(
            ResolveError::GeolocationUnavailable.to_string(),
            "Geolocation is not supported by this browser."
        );
        assert_eq!(
            ResolveError::Subscription("Record not found: 001".into()).to_string(),
            "Record not found: 001"
        );
    }

    #[test]
    fn test_remote_falls_back_to_unknown_error() {
        assert_eq!(FetchError::remote(None).to_string(), "Unknown error");
        assert_eq!(FetchError::remote(Some(String::new())).to_string(), "Unknown error");
        assert_eq!(
            FetchError::remote(Some("Quota exceeded".into())).to_string(),
            "Quota exceeded"
        );
        assert_eq!(DispatchError::transport(None).to_string(), "Unknown error");
    }

    #[test]
    fn test_widget_error_display() {
        assert_eq!(
            WidgetError::config("missing relay").to_string(),
            "Invalid configuration: missing relay"
        );

        let missing = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: WidgetError = missing.into();
        assert!(matches!(err, WidgetError::Io { .. }));
        assert!(err.to_string().starts_with("Record file I/O failed"));
    }
}
