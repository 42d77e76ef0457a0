//! Presentation state and derived display values

use crate::error::FetchError;
use crate::models::{Location, WeatherReading};
use chrono::{DateTime, Local, TimeZone, Utc};
use std::fmt::Display;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Shown in place of a missing value
pub const NOT_AVAILABLE: &str = "N/A";

/// en-US style date-time, e.g. "3/5/2024, 2:07:09 PM"
pub const DEFAULT_DATE_TIME_FORMAT: &str = "%-m/%-d/%Y, %-I:%M:%S %p";

/// Everything the widget renders
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ViewState {
    pub location: Location,
    pub reading: Option<WeatherReading>,
    pub error: Option<String>,
    pub is_sending: bool,
    pub last_report_sent_at: Option<DateTime<Utc>>,
    fetch_generation: u64,
}

impl ViewState {
    fn field(&self, pick: impl Fn(&WeatherReading) -> &str) -> &str {
        self.reading
            .as_ref()
            .map(pick)
            .filter(|v| !v.is_empty())
            .unwrap_or(NOT_AVAILABLE)
    }

    #[must_use]
    pub fn temperature(&self) -> &str {
        self.field(|r| r.temperature.as_str())
    }

    #[must_use]
    pub fn humidity(&self) -> &str {
        self.field(|r| r.humidity.as_str())
    }

    #[must_use]
    pub fn wind_speed(&self) -> &str {
        self.field(|r| r.wind_speed.as_str())
    }

    #[must_use]
    pub fn weather_conditions(&self) -> &str {
        self.field(|r| r.weather_conditions.as_str())
    }

    /// Icon URL, or an empty string without a reading
    #[must_use]
    pub fn cloud_icon_url(&self) -> &str {
        self.reading.as_ref().map_or("", |r| r.cloud_icon_url.as_str())
    }

    /// Last report time in the local time zone
    #[must_use]
    pub fn last_report_sent_formatted(&self) -> String {
        self.last_report_sent_formatted_in(&Local)
    }

    /// Last report time rendered in `tz`, or "N/A"
    #[must_use]
    pub fn last_report_sent_formatted_in<Tz>(&self, tz: &Tz) -> String
    where
        Tz: TimeZone,
        Tz::Offset: Display,
    {
        self.last_report_sent_formatted_as(tz, DEFAULT_DATE_TIME_FORMAT)
    }

    /// Last report time rendered in `tz` with a strftime `format`, or "N/A".
    ///
    /// `format` must be a valid pattern; configuration checks this on load.
    #[must_use]
    pub fn last_report_sent_formatted_as<Tz>(&self, tz: &Tz, format: &str) -> String
    where
        Tz: TimeZone,
        Tz::Offset: Display,
    {
        self.last_report_sent_at.map_or_else(
            || NOT_AVAILABLE.to_string(),
            |at| at.with_timezone(tz).format(format).to_string(),
        )
    }
}

/// Shared handle to a widget's [`ViewState`]
#[derive(Debug, Clone, Default)]
pub struct ViewHandle {
    inner: Arc<RwLock<ViewState>>,
}

impl ViewHandle {
    fn read(&self) -> RwLockReadGuard<'_, ViewState> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, ViewState> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Copy of the current state
    #[must_use]
    pub fn snapshot(&self) -> ViewState {
        self.read().clone()
    }

    /// Run `f` against the current state without copying it
    pub fn with<R>(&self, f: impl FnOnce(&ViewState) -> R) -> R {
        f(&self.read())
    }

    pub(crate) fn update<R>(&self, f: impl FnOnce(&mut ViewState) -> R) -> R {
        f(&mut self.write())
    }

    /// Start a fetch: returns its generation and the location to fetch for
    pub(crate) fn begin_fetch(&self) -> (u64, Location) {
        let mut state = self.write();
        state.fetch_generation += 1;
        (state.fetch_generation, state.location.clone())
    }

    /// Apply a fetch result unless a newer fetch has started since.
    ///
    /// Success replaces the reading and clears the error; failure sets the
    /// error and clears the reading. Returns whether the result was applied.
    pub(crate) fn apply_fetch(
        &self,
        generation: u64,
        result: &Result<WeatherReading, FetchError>,
    ) -> bool {
        let mut state = self.write();
        if state.fetch_generation != generation {
            return false;
        }
        match result {
            Ok(reading) => {
                state.reading = Some(reading.clone());
                state.error = None;
            }
            Err(e) => {
                state.reading = None;
                state.error = Some(e.to_string());
            }
        }
        true
    }

    /// Invalidate any fetch still in flight
    pub(crate) fn cancel_fetches(&self) {
        self.write().fetch_generation += 1;
    }

    /// Mark a report send as started, unless one already is
    pub(crate) fn begin_sending(&self) -> Option<SendingGuard> {
        let mut state = self.write();
        if state.is_sending {
            return None;
        }
        state.is_sending = true;
        Some(SendingGuard {
            inner: self.inner.clone(),
        })
    }
}

/// Clears `is_sending` when dropped
#[derive(Debug)]
pub struct SendingGuard {
    inner: Arc<RwLock<ViewState>>,
}

impl Drop for SendingGuard {
    fn drop(&mut self) {
        self.inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .is_sending = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reading() -> WeatherReading {
        WeatherReading::new(
            "20C".into(),
            "Clear".into(),
            "40%".into(),
            "10km/h".into(),
            "CAVOK".into(),
        )
    }

    #[test]
    fn test_getters_without_reading() {
        let state = ViewState::default();
        assert_eq!(state.temperature(), "N/A");
        assert_eq!(state.humidity(), "N/A");
        assert_eq!(state.wind_speed(), "N/A");
        assert_eq!(state.weather_conditions(), "N/A");
        assert_eq!(state.cloud_icon_url(), "");
        assert_eq!(state.last_report_sent_formatted_in(&Utc), "N/A");
    }

    #[test]
    fn test_getters_are_idempotent() {
        let state = ViewState {
            reading: Some(reading()),
            ..ViewState::default()
        };
        let before = state.clone();

        for _ in 0..3 {
            assert_eq!(state.temperature(), "20C");
            assert_eq!(state.weather_conditions(), "Clear");
            assert_eq!(state.humidity(), "40%");
            assert_eq!(state.wind_speed(), "10km/h");
            assert!(state.cloud_icon_url().contains("1163661"));
        }
        assert_eq!(state, before);
    }

    #[test]
    fn test_last_report_formatting() {
        let state = ViewState {
            last_report_sent_at: Some(Utc.with_ymd_and_hms(2024, 3, 5, 14, 7, 9).unwrap()),
            ..ViewState::default()
        };
        assert_eq!(state.last_report_sent_formatted_in(&Utc), "3/5/2024, 2:07:09 PM");
        assert_eq!(
            state.last_report_sent_formatted_as(&Utc, "%d.%m.%Y %H:%M"),
            "05.03.2024 14:07"
        );
        assert_ne!(state.last_report_sent_formatted(), "N/A");
    }

    #[test]
    fn test_stale_fetch_is_discarded() {
        let handle = ViewHandle::default();
        let (first, _) = handle.begin_fetch();
        let (second, _) = handle.begin_fetch();

        assert!(!handle.apply_fetch(first, &Ok(reading())));
        assert!(handle.snapshot().reading.is_none());

        assert!(handle.apply_fetch(second, &Err(FetchError::MalformedResponse)));
        assert_eq!(handle.snapshot().error.as_deref(), Some("Unexpected result structure"));
    }

    #[test]
    fn test_fetch_failure_clears_reading() {
        let handle = ViewHandle::default();
        let (generation, _) = handle.begin_fetch();
        handle.apply_fetch(generation, &Ok(reading()));
        assert!(handle.snapshot().reading.is_some());

        let (generation, _) = handle.begin_fetch();
        handle.apply_fetch(generation, &Err(FetchError::Remote("down".into())));

        let state = handle.snapshot();
        assert!(state.reading.is_none());
        assert_eq!(state.error.as_deref(), Some("down"));
    }

    #[test]
    fn test_sending_guard_resets_flag() {
        let handle = ViewHandle::default();
        let guard = handle.begin_sending().unwrap();
        assert!(handle.snapshot().is_sending);
        assert!(handle.begin_sending().is_none());

        drop(guard);
        assert!(!handle.snapshot().is_sending);
        assert!(handle.begin_sending().is_some());
    }
}
