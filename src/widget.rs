//! Weather widget
//!
//! Wires the location resolver, weather fetcher and report dispatcher to one
//! [`ViewState`]. Resolver events drive weather fetches; refreshing and report
//! sending are explicit user actions.

use crate::error::{DispatchError, FetchError};
use crate::location_resolver::{LocationEvent, LocationFeed, LocationResolver};
use crate::models::{ActorId, EntityId, Location, LocationSource, Notification, ReportContext, WeatherReading};
use crate::notify::NotificationSink;
use crate::report::ReportDispatcher;
use crate::view_state::{ViewHandle, ViewState};
use crate::weather::WeatherFetcher;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// What handling a resolver event led to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOutcome {
    /// A new reading is displayed
    WeatherUpdated,
    /// The error slot was set and no reading is displayed
    Failed,
    /// A result arrived after a newer fetch started and was dropped
    Superseded,
    /// Only display metadata changed
    Metadata,
}

impl EventOutcome {
    /// Whether the widget has something to show for its location
    #[must_use]
    pub fn is_settled(self) -> bool {
        matches!(self, Self::WeatherUpdated | Self::Failed)
    }
}

/// One mounted weather widget
pub struct WeatherWidget {
    resolver: LocationResolver,
    fetcher: WeatherFetcher,
    dispatcher: ReportDispatcher,
    notifier: Arc<dyn NotificationSink>,
    bound_entity: Option<EntityId>,
    actor: ActorId,
    state: ViewHandle,
}

impl WeatherWidget {
    pub fn new(
        resolver: LocationResolver,
        fetcher: WeatherFetcher,
        dispatcher: ReportDispatcher,
        notifier: Arc<dyn NotificationSink>,
        bound_entity: Option<EntityId>,
        actor: ActorId,
    ) -> Self {
        Self {
            resolver,
            fetcher,
            dispatcher,
            notifier,
            bound_entity,
            actor,
            state: ViewHandle::default(),
        }
    }

    /// Reset the view and start resolving the location.
    ///
    /// Feed the returned events to [`WeatherWidget::handle_event`]; dropping
    /// the feed unmounts.
    pub fn mount(&self) -> LocationFeed {
        self.state.update(|state| *state = ViewState::default());
        info!(
            "Mounting weather widget (entity: {:?}, actor: {})",
            self.bound_entity, self.actor
        );
        self.resolver.resolve(self.bound_entity.as_ref(), &self.actor)
    }

    /// Drive the widget until the first reading or error is displayed
    pub async fn settle(&self, feed: &mut LocationFeed) -> Option<EventOutcome> {
        while let Some(event) = feed.next().await {
            let outcome = self.handle_event(event).await;
            if outcome.is_settled() {
                return Some(outcome);
            }
        }
        None
    }

    /// Apply one resolver event, fetching weather when a location arrives
    pub async fn handle_event(&self, event: LocationEvent) -> EventOutcome {
        match event {
            LocationEvent::Located(location) => {
                self.state.update(|state| state.location = location);
                match self.refresh().await {
                    Some(Ok(_)) => EventOutcome::WeatherUpdated,
                    Some(Err(_)) => EventOutcome::Failed,
                    None => EventOutcome::Superseded,
                }
            }
            LocationEvent::LastReportSent(at) => {
                self.state.update(|state| state.last_report_sent_at = at);
                EventOutcome::Metadata
            }
            LocationEvent::Failed(error) => {
                warn!("Location unavailable: {}", error);
                self.state.cancel_fetches();
                self.state.update(|state| {
                    state.location = Location::empty();
                    state.reading = None;
                    state.error = Some(error.to_string());
                });
                EventOutcome::Failed
            }
            LocationEvent::LastReportUnavailable(error) => {
                self.state.update(|state| state.error = Some(error.to_string()));
                EventOutcome::Metadata
            }
        }
    }

    /// Fetch weather for the current location.
    ///
    /// Returns `None` when a newer fetch started meanwhile and this result was
    /// discarded.
    pub async fn refresh(&self) -> Option<Result<WeatherReading, FetchError>> {
        let (generation, location) = self.state.begin_fetch();
        let result = self.fetcher.fetch_weather(&location).await;

        if self.state.apply_fetch(generation, &result) {
            Some(result)
        } else {
            debug!("Discarding superseded weather result");
            None
        }
    }

    /// Send the displayed reading as a report and show the outcome.
    ///
    /// Returns the notification shown, or `None` when the request was ignored
    /// because a send is already in flight.
    pub async fn send_report(&self) -> Option<Notification> {
        let context = self.state.with(|state| {
            let entity_id = match state.location.source {
                LocationSource::Entity => self.bound_entity.clone(),
                LocationSource::Device | LocationSource::None => None,
            };
            state
                .reading
                .clone()
                .map(|reading| ReportContext { entity_id, reading })
        });

        let result = match context {
            Some(context) => self.dispatcher.send_report(&self.state, context).await,
            None => Err(DispatchError::NoReading),
        };

        let notification = match result {
            Ok(notification) => notification,
            Err(DispatchError::InFlight) => return None,
            Err(error) => error.notification(),
        };

        self.notifier.notify(notification.clone());
        Some(notification)
    }

    /// Copy of the current view
    #[must_use]
    pub fn state(&self) -> ViewState {
        self.state.snapshot()
    }

    #[must_use]
    pub fn view(&self) -> &ViewHandle {
        &self.state
    }
}
