//! Location Resolution Module
//!
//! Works out where to fetch weather for. A bound entity's stored address takes
//! absolute precedence; without one the device position is requested once and
//! the current user's record is followed for its last-report timestamp only.

use crate::error::ResolveError;
use crate::geolocation::GeolocationProvider;
use crate::models::{ActorId, EntityId, Location, Place};
use crate::records::{
    ENTITY_FIELDS, FieldSnapshot, RecordKey, RecordSource, Subscription, USER_FIELDS,
};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Something the resolver learned
#[derive(Debug, Clone, PartialEq)]
pub enum LocationEvent {
    /// A location to fetch weather for (its place may still be unresolved)
    Located(Location),
    /// The record's last-report timestamp, delivered for display
    LastReportSent(Option<DateTime<Utc>>),
    /// Resolution failed; no location is available
    Failed(ResolveError),
    /// The current user's fields could not be read; location is unaffected
    LastReportUnavailable(ResolveError),
}

/// Build an entity location from delivered address fields
#[must_use]
pub fn entity_location(snapshot: &FieldSnapshot) -> Location {
    Location::from_entity(Place::from_fields(
        snapshot.latitude,
        snapshot.longitude,
        snapshot.city.as_deref(),
        snapshot.country.as_deref(),
    ))
}

/// Stream of resolver events for one mounted widget.
///
/// Dropping the feed stops the background forwarding.
#[derive(Debug)]
pub struct LocationFeed {
    receiver: mpsc::UnboundedReceiver<LocationEvent>,
    tasks: Vec<JoinHandle<()>>,
}

impl LocationFeed {
    /// Next event, or `None` once every source has finished
    pub async fn next(&mut self) -> Option<LocationEvent> {
        self.receiver.recv().await
    }
}

impl Drop for LocationFeed {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

/// Service for resolving the widget's location
#[derive(Clone)]
pub struct LocationResolver {
    records: Arc<dyn RecordSource>,
    geolocation: Arc<dyn GeolocationProvider>,
}

impl LocationResolver {
    pub fn new(records: Arc<dyn RecordSource>, geolocation: Arc<dyn GeolocationProvider>) -> Self {
        Self {
            records,
            geolocation,
        }
    }

    /// Start resolving for an optionally bound entity on behalf of `actor`.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn resolve(&self, bound_entity: Option<&EntityId>, actor: &ActorId) -> LocationFeed {
        let (sender, receiver) = mpsc::unbounded_channel();

        let tasks = match bound_entity {
            Some(entity_id) => {
                debug!("Resolving location from entity {}", entity_id);
                let subscription = self
                    .records
                    .subscribe(&RecordKey::Entity(entity_id.clone()), ENTITY_FIELDS);
                vec![tokio::spawn(forward_entity(subscription, sender))]
            }
            None => {
                debug!("No entity bound, using device position for {}", actor);
                let subscription = self
                    .records
                    .subscribe(&RecordKey::User(actor.clone()), USER_FIELDS);
                vec![
                    tokio::spawn(forward_user(subscription, sender.clone())),
                    tokio::spawn(locate_device(self.geolocation.clone(), sender)),
                ]
            }
        };

        LocationFeed { receiver, tasks }
    }
}

async fn forward_entity(mut subscription: Subscription, sender: mpsc::UnboundedSender<LocationEvent>) {
    while let Some(delivery) = subscription.next().await {
        let events = match delivery {
            Ok(snapshot) => {
                let location = entity_location(&snapshot);
                info!("Entity location resolved: {}", location.place);
                vec![
                    LocationEvent::LastReportSent(snapshot.last_report_sent_at),
                    LocationEvent::Located(location),
                ]
            }
            Err(e) => {
                warn!("Entity field delivery failed: {}", e);
                vec![LocationEvent::Failed(e)]
            }
        };

        for event in events {
            if sender.send(event).is_err() {
                return;
            }
        }
    }
}

async fn forward_user(mut subscription: Subscription, sender: mpsc::UnboundedSender<LocationEvent>) {
    while let Some(delivery) = subscription.next().await {
        let event = match delivery {
            Ok(snapshot) => LocationEvent::LastReportSent(snapshot.last_report_sent_at),
            Err(e) => {
                warn!("User field delivery failed: {}", e);
                LocationEvent::LastReportUnavailable(e)
            }
        };
        if sender.send(event).is_err() {
            return;
        }
    }
}

async fn locate_device(
    geolocation: Arc<dyn GeolocationProvider>,
    sender: mpsc::UnboundedSender<LocationEvent>,
) {
    let event = match geolocation.current_position().await {
        Some(coordinates) => {
            info!("Device location resolved: {}", coordinates.format_coordinates());
            LocationEvent::Located(Location::from_device(coordinates))
        }
        None => {
            warn!("Device geolocation unavailable");
            LocationEvent::Failed(ResolveError::GeolocationUnavailable)
        }
    };
    let _ = sender.send(event);
}
