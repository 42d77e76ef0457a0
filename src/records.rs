//! Record field subscriptions
//!
//! A component registers interest in a record and a field set and receives a
//! snapshot (or an error) immediately and again on every change. Delivery is
//! push based over an unbounded channel; dropping the [`Subscription`]
//! unregisters it on the next change.

use crate::error::{ResolveError, WidgetError};
use crate::models::{ActorId, EntityId};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Fields a subscriber can ask for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordField {
    Latitude,
    Longitude,
    City,
    Country,
    LastReportSentAt,
}

/// Address fields read from a bound entity
pub const ENTITY_FIELDS: &[RecordField] = &[
    RecordField::Latitude,
    RecordField::Longitude,
    RecordField::City,
    RecordField::Country,
    RecordField::LastReportSentAt,
];

/// Fields read from the current user when nothing is bound
pub const USER_FIELDS: &[RecordField] = &[RecordField::LastReportSentAt];

/// Which record a subscription is for
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RecordKey {
    Entity(EntityId),
    User(ActorId),
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Entity(id) => write!(f, "{id}"),
            Self::User(id) => write!(f, "{id}"),
        }
    }
}

/// Values of the requested fields at delivery time
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldSnapshot {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub city: Option<String>,
    pub country: Option<String>,
    pub last_report_sent_at: Option<DateTime<Utc>>,
}

pub type Delivery = std::result::Result<FieldSnapshot, ResolveError>;

/// Receiving half of a field subscription
#[derive(Debug)]
pub struct Subscription {
    receiver: mpsc::UnboundedReceiver<Delivery>,
}

impl Subscription {
    /// Create a connected sender/subscription pair
    #[must_use]
    pub fn channel() -> (mpsc::UnboundedSender<Delivery>, Self) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (sender, Self { receiver })
    }

    /// Wait for the next delivery; `None` once the source is gone
    pub async fn next(&mut self) -> Option<Delivery> {
        self.receiver.recv().await
    }
}

/// Push-based source of record fields
pub trait RecordSource: Send + Sync {
    fn subscribe(&self, key: &RecordKey, fields: &'static [RecordField]) -> Subscription;
}

/// Recipient lookup and report bookkeeping used by the report sender
pub trait RecipientDirectory: Send + Sync {
    fn recipient(&self, key: &RecordKey) -> Option<String>;

    fn mark_report_sent(&self, key: &RecordKey, at: DateTime<Utc>) -> Result<()>;
}

/// One stored record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Record {
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub last_report_sent_at: Option<DateTime<Utc>>,
    /// Where weather reports for this record are mailed
    #[serde(default)]
    pub email: Option<String>,
}

impl Record {
    fn snapshot(&self, fields: &[RecordField]) -> FieldSnapshot {
        let mut snapshot = FieldSnapshot::default();
        for field in fields {
            match field {
                RecordField::Latitude => snapshot.latitude = self.latitude,
                RecordField::Longitude => snapshot.longitude = self.longitude,
                RecordField::City => snapshot.city.clone_from(&self.city),
                RecordField::Country => snapshot.country.clone_from(&self.country),
                RecordField::LastReportSentAt => {
                    snapshot.last_report_sent_at = self.last_report_sent_at;
                }
            }
        }
        snapshot
    }
}

/// On-disk layout of the record file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecordFile {
    #[serde(default)]
    pub entities: HashMap<String, Record>,
    #[serde(default)]
    pub users: HashMap<String, Record>,
}

struct Subscriber {
    key: RecordKey,
    fields: &'static [RecordField],
    sender: mpsc::UnboundedSender<Delivery>,
}

struct StoreInner {
    records: RecordFile,
    subscribers: Vec<Subscriber>,
}

impl StoreInner {
    fn lookup(&self, key: &RecordKey) -> Option<&Record> {
        match key {
            RecordKey::Entity(id) => self.records.entities.get(id.as_str()),
            RecordKey::User(id) => self.records.users.get(id.as_str()),
        }
    }

    fn delivery(&self, key: &RecordKey, fields: &[RecordField]) -> Delivery {
        match (self.lookup(key), key) {
            (Some(record), _) => Ok(record.snapshot(fields)),
            // users always exist on the host; an unknown one simply has no data
            (None, RecordKey::User(_)) => Ok(FieldSnapshot::default()),
            (None, RecordKey::Entity(id)) => Err(ResolveError::Subscription(format!(
                "Record not found: {id}"
            ))),
        }
    }
}

/// JSON-file-backed record store
pub struct FileRecordStore {
    path: Option<PathBuf>,
    inner: Mutex<StoreInner>,
}

impl FileRecordStore {
    /// Store that lives only in memory
    #[must_use]
    pub fn in_memory(records: RecordFile) -> Self {
        Self {
            path: None,
            inner: Mutex::new(StoreInner {
                records,
                subscribers: Vec::new(),
            }),
        }
    }

    /// Load the store from `path`; a missing file yields an empty store
    pub fn load(path: impl AsRef<Path>) -> std::result::Result<Self, WidgetError> {
        let path = path.as_ref().to_path_buf();

        let records = if path.exists() {
            let contents = std::fs::read_to_string(&path)?;
            serde_json::from_str::<RecordFile>(&contents).map_err(|e| {
                WidgetError::records(format!("Failed to parse {}: {e}", path.display()))
            })?
        } else {
            warn!("Record file {} not found, starting empty", path.display());
            RecordFile::default()
        };

        info!(
            "Loaded {} entities and {} users from {}",
            records.entities.len(),
            records.users.len(),
            path.display()
        );

        let mut store = Self::in_memory(records);
        store.path = Some(path);
        Ok(store)
    }

    fn lock(&self) -> MutexGuard<'_, StoreInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert or replace a record and notify its subscribers
    pub fn upsert(&self, key: &RecordKey, record: Record) -> Result<()> {
        let mut inner = self.lock();
        match key {
            RecordKey::Entity(id) => inner.records.entities.insert(id.0.clone(), record),
            RecordKey::User(id) => inner.records.users.insert(id.0.clone(), record),
        };
        self.persist(&inner.records)?;
        Self::notify(&mut inner, key);
        Ok(())
    }

    /// Current copy of a record
    #[must_use]
    pub fn get(&self, key: &RecordKey) -> Option<Record> {
        self.lock().lookup(key).cloned()
    }

    fn persist(&self, records: &RecordFile) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create record directory: {}", parent.display())
            })?;
        }
        let json = serde_json::to_string_pretty(records)
            .context("Failed to serialize record file")?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write record file: {}", path.display()))?;
        Ok(())
    }

    fn notify(inner: &mut StoreInner, key: &RecordKey) {
        let mut subscribers = std::mem::take(&mut inner.subscribers);
        subscribers.retain(|sub| {
            if &sub.key != key {
                return !sub.sender.is_closed();
            }
            sub.sender.send(inner.delivery(key, sub.fields)).is_ok()
        });
        debug!("Notified subscribers of {}, {} still active", key, subscribers.len());
        inner.subscribers = subscribers;
    }
}

impl RecordSource for FileRecordStore {
    fn subscribe(&self, key: &RecordKey, fields: &'static [RecordField]) -> Subscription {
        let (sender, subscription) = Subscription::channel();
        let mut inner = self.lock();

        let first = inner.delivery(key, fields);
        if sender.send(first).is_ok() {
            inner.subscribers.push(Subscriber {
                key: key.clone(),
                fields,
                sender,
            });
        }

        debug!("Subscribed to {} ({} fields)", key, fields.len());
        subscription
    }
}

impl RecipientDirectory for FileRecordStore {
    fn recipient(&self, key: &RecordKey) -> Option<String> {
        self.lock()
            .lookup(key)
            .and_then(|record| record.email.clone())
            .filter(|email| !email.trim().is_empty())
    }

    fn mark_report_sent(&self, key: &RecordKey, at: DateTime<Utc>) -> Result<()> {
        let mut inner = self.lock();
        let record = match key {
            RecordKey::Entity(id) => inner.records.entities.entry(id.0.clone()).or_default(),
            RecordKey::User(id) => inner.records.users.entry(id.0.clone()).or_default(),
        };
        record.last_report_sent_at = Some(at);

        self.persist(&inner.records)?;
        Self::notify(&mut inner, key);
        info!("Recorded report for {} at {}", key, at);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn paris() -> Record {
        Record {
            latitude: Some(48.85),
            longitude: Some(2.35),
            city: Some("Paris".into()),
            country: Some("France".into()),
            last_report_sent_at: None,
            email: Some("ops@example.com".into()),
        }
    }

    fn store_with_paris() -> FileRecordStore {
        let mut records = RecordFile::default();
        records.entities.insert("001".into(), paris());
        FileRecordStore::in_memory(records)
    }

    #[tokio::test]
    async fn test_subscribe_delivers_requested_fields_only() {
        let store = store_with_paris();
        let key = RecordKey::Entity(EntityId::new("001"));

        let mut sub = store.subscribe(&key, USER_FIELDS);
        let snapshot = sub.next().await.unwrap().unwrap();
        assert_eq!(snapshot, FieldSnapshot::default());

        let mut sub = store.subscribe(&key, ENTITY_FIELDS);
        let snapshot = sub.next().await.unwrap().unwrap();
        assert_eq!(snapshot.latitude, Some(48.85));
        assert_eq!(snapshot.city.as_deref(), Some("Paris"));
    }

    #[tokio::test]
    async fn test_missing_entity_is_an_error() {
        let store = store_with_paris();
        let mut sub = store.subscribe(&RecordKey::Entity(EntityId::new("404")), ENTITY_FIELDS);

        let err = sub.next().await.unwrap().unwrap_err();
        assert_eq!(err.to_string(), "Record not found: 404");
    }

    #[tokio::test]
    async fn test_unknown_user_has_empty_snapshot() {
        let store = store_with_paris();
        let mut sub = store.subscribe(&RecordKey::User(ActorId::new("nobody")), USER_FIELDS);
        assert_eq!(sub.next().await.unwrap().unwrap(), FieldSnapshot::default());
    }

    #[tokio::test]
    async fn test_mark_report_sent_redelivers() {
        let store = store_with_paris();
        let key = RecordKey::Entity(EntityId::new("001"));
        let mut sub = store.subscribe(&key, ENTITY_FIELDS);
        sub.next().await.unwrap().unwrap();

        let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        store.mark_report_sent(&key, at).unwrap();

        let snapshot = sub.next().await.unwrap().unwrap();
        assert_eq!(snapshot.last_report_sent_at, Some(at));
    }

    #[tokio::test]
    async fn test_dropped_subscription_is_pruned() {
        let store = store_with_paris();
        let key = RecordKey::Entity(EntityId::new("001"));
        drop(store.subscribe(&key, ENTITY_FIELDS));

        store.mark_report_sent(&key, Utc::now()).unwrap();
        assert!(store.lock().subscribers.is_empty());
    }

    #[test]
    fn test_recipient_lookup() {
        let store = store_with_paris();
        assert_eq!(
            store.recipient(&RecordKey::Entity(EntityId::new("001"))),
            Some("ops@example.com".to_string())
        );
        assert_eq!(store.recipient(&RecordKey::User(ActorId::new("jdoe"))), None);
    }

    #[test]
    fn test_load_and_persist_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.json");
        std::fs::write(
            &path,
            r#"{"entities": {"001": {"city": "Lyon", "country": "France"}}}"#,
        )
        .unwrap();

        let store = FileRecordStore::load(&path).unwrap();
        let key = RecordKey::User(ActorId::new("jdoe"));
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        store.mark_report_sent(&key, at).unwrap();

        let reloaded = FileRecordStore::load(&path).unwrap();
        assert_eq!(reloaded.get(&key).unwrap().last_report_sent_at, Some(at));
        assert_eq!(
            reloaded
                .get(&RecordKey::Entity(EntityId::new("001")))
                .unwrap()
                .city
                .as_deref(),
            Some("Lyon")
        );
    }

    #[test]
    fn test_load_rejects_invalid_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.json");
        std::fs::write(&path, "not json").unwrap();

        let result = FileRecordStore::load(&path);
        assert!(matches!(result, Err(WidgetError::Records { .. })));
    }
}
