//! Report dispatch
//!
//! Sends the current reading through the report backend on explicit user
//! request and turns the outcome into a notification. Only one send may be in
//! flight per widget.

use crate::error::DispatchError;
use crate::models::{Notification, ReportContext, ReportRequest, SUCCESS_TOKEN};
use crate::view_state::ViewHandle;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Message shown after a successful send
pub const SENT_MESSAGE: &str = "Weather report sent successfully";

/// The send call itself failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendFailure {
    pub message: Option<String>,
}

impl SendFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
        }
    }
}

/// Report-send backend.
///
/// Answers [`SUCCESS_TOKEN`] on success and any other string to describe a
/// business failure.
#[async_trait]
pub trait ReportSender: Send + Sync {
    async fn send_report(&self, request: &ReportRequest) -> Result<String, SendFailure>;
}

/// Runs report sends and interprets their outcome
#[derive(Clone)]
pub struct ReportDispatcher {
    sender: Arc<dyn ReportSender>,
}

impl ReportDispatcher {
    pub fn new(sender: Arc<dyn ReportSender>) -> Self {
        Self { sender }
    }

    /// Send a report for `context`, marking `state` as sending meanwhile.
    ///
    /// Returns [`DispatchError::InFlight`] without calling the backend when a
    /// send is already running. The sending flag is cleared on every exit path.
    pub async fn send_report(
        &self,
        state: &ViewHandle,
        context: ReportContext,
    ) -> Result<Notification, DispatchError> {
        let Some(_sending) = state.begin_sending() else {
            debug!("Report send ignored, one is already in flight");
            return Err(DispatchError::InFlight);
        };

        let request = ReportRequest::from(context);
        debug!("Sending weather report (entity: {:?})", request.entity_id);

        match self.sender.send_report(&request).await {
            Ok(response) if response == SUCCESS_TOKEN => {
                info!("Weather report sent");
                Ok(Notification::success(SENT_MESSAGE))
            }
            Ok(response) => {
                warn!("Weather report rejected: {}", response);
                Err(DispatchError::BusinessFailure(response))
            }
            Err(failure) => {
                error!("Error sending weather report: {:?}", failure.message);
                Err(DispatchError::transport(failure.message))
            }
        }
    }
}

impl DispatchError {
    /// Error notification carrying this failure's message
    #[must_use]
    pub fn notification(&self) -> Notification {
        Notification::error(self.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EntityId, Severity, WeatherReading};
    use std::sync::Mutex;

    struct FakeSender {
        response: Result<String, SendFailure>,
        requests: Mutex<Vec<ReportRequest>>,
    }

    impl FakeSender {
        fn new(response: Result<String, SendFailure>) -> Arc<Self> {
            Arc::new(Self {
                response,
                requests: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl ReportSender for FakeSender {
        async fn send_report(&self, request: &ReportRequest) -> Result<String, SendFailure> {
            self.requests.lock().unwrap().push(request.clone());
            self.response.clone()
        }
    }

    fn context(entity: Option<&str>) -> ReportContext {
        ReportContext {
            entity_id: entity.map(EntityId::new),
            reading: WeatherReading::new(
                "20C".into(),
                "Clear".into(),
                "40%".into(),
                "10km/h".into(),
                "CAVOK".into(),
            ),
        }
    }

    #[tokio::test]
    async fn test_success_token() {
        let sender = FakeSender::new(Ok("Success".into()));
        let dispatcher = ReportDispatcher::new(sender.clone());
        let state = ViewHandle::default();

        let notification = dispatcher
            .send_report(&state, context(Some("001")))
            .await
            .unwrap();

        assert_eq!(notification.severity, Severity::Success);
        assert_eq!(notification.message, SENT_MESSAGE);
        assert!(!state.snapshot().is_sending);
        assert_eq!(
            sender.requests.lock().unwrap()[0].entity_id,
            Some(EntityId::new("001"))
        );
    }

    #[tokio::test]
    async fn test_other_token_is_business_failure() {
        let dispatcher = ReportDispatcher::new(FakeSender::new(Ok("Invalid recipient".into())));
        let state = ViewHandle::default();

        let err = dispatcher.send_report(&state, context(None)).await.unwrap_err();

        assert_eq!(err, DispatchError::BusinessFailure("Invalid recipient".into()));
        assert_eq!(err.notification().message, "Invalid recipient");
        assert!(!state.snapshot().is_sending);
    }

    #[tokio::test]
    async fn test_transport_failure() {
        let dispatcher =
            ReportDispatcher::new(FakeSender::new(Err(SendFailure { message: None })));
        let state = ViewHandle::default();

        let err = dispatcher.send_report(&state, context(None)).await.unwrap_err();

        assert_eq!(err.notification(), Notification::error("Unknown error"));
        assert!(!state.snapshot().is_sending);
    }

    #[tokio::test]
    async fn test_in_flight_send_is_rejected() {
        let sender = FakeSender::new(Ok("Success".into()));
        let dispatcher = ReportDispatcher::new(sender.clone());
        let state = ViewHandle::default();

        let guard = state.begin_sending().unwrap();
        let err = dispatcher.send_report(&state, context(None)).await.unwrap_err();
        assert_eq!(err, DispatchError::InFlight);
        assert!(sender.requests.lock().unwrap().is_empty());

        drop(guard);
        assert!(dispatcher.send_report(&state, context(None)).await.is_ok());
    }
}
