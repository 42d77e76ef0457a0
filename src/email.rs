use crate::config::EmailConfig;
use crate::models::{ActorId, ReportRequest, SUCCESS_TOKEN};
use crate::records::{RecipientDirectory, RecordKey};
use crate::report::{ReportSender, SendFailure};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use lettre::{
    Message, Transport, message::Mailbox, transport::smtp::SmtpTransport,
    transport::smtp::authentication::Credentials,
};
use std::fmt::Display;
use std::sync::Arc;

/// SMTP mailer for the configured relay
pub fn create_mailer(config: &EmailConfig) -> Result<SmtpTransport> {
    let mut builder = SmtpTransport::relay(&config.smtp_relay)
        .with_context(|| format!("Invalid SMTP relay: {}", config.smtp_relay))?;

    if let (Some(username), Some(password)) = (&config.username, &config.password) {
        builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
    }

    Ok(builder.build())
}

/// Mailbox reports are sent from
pub fn sender_mailbox(config: &EmailConfig) -> Result<Mailbox> {
    let address = config
        .sender_address
        .as_ref()
        .or(config.username.as_ref())
        .context("Missing email sender_address (or username)")?;

    format!("{} <{}>", config.sender_name, address)
        .parse()
        .context("Failed to parse from address")
}

/// Report-send backend that mails the reading to the record's recipient
pub struct EmailReportSender<T> {
    transport: Arc<T>,
    directory: Arc<dyn RecipientDirectory>,
    actor: ActorId,
    from: Mailbox,
}

impl<T> EmailReportSender<T>
where
    T: Transport + Send + Sync + 'static,
    T::Error: Display,
{
    pub fn new(
        transport: T,
        directory: Arc<dyn RecipientDirectory>,
        actor: ActorId,
        from: Mailbox,
    ) -> Self {
        Self {
            transport: Arc::new(transport),
            directory,
            actor,
            from,
        }
    }

    fn record_key(&self, request: &ReportRequest) -> RecordKey {
        match &request.entity_id {
            Some(entity_id) => RecordKey::Entity(entity_id.clone()),
            None => RecordKey::User(self.actor.clone()),
        }
    }

    fn build_message(&self, to: Mailbox, request: &ReportRequest) -> Result<Message> {
        let reading = &request.weather_data;
        let subject = match &request.entity_id {
            Some(entity_id) => format!("Weather Report for {entity_id}"),
            None => "Weather Report".to_string(),
        };

        Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(subject)
            .body(format!(
                "Current weather conditions:\n\n{}\n\nIcon: {}\n\nSent {}",
                reading.summary(),
                reading.cloud_icon_url,
                Utc::now().format("%Y-%m-%d %H:%M UTC")
            ))
            .context("Failed to build report email")
    }
}

#[async_trait]
impl<T> ReportSender for EmailReportSender<T>
where
    T: Transport + Send + Sync + 'static,
    T::Error: Display,
{
    async fn send_report(&self, request: &ReportRequest) -> Result<String, SendFailure> {
        let key = self.record_key(request);

        let Some(recipient) = self.directory.recipient(&key) else {
            return Ok(format!("No recipient configured for {key}"));
        };
        let Ok(to) = recipient.parse::<Mailbox>() else {
            return Ok(format!("Invalid recipient: {recipient}"));
        };

        let email = self
            .build_message(to, request)
            .map_err(|e| SendFailure::new(e.to_string()))?;

        let transport = self.transport.clone();
        tokio::task::spawn_blocking(move || {
            transport
                .send(&email)
                .map(|_| ())
                .map_err(|e| format!("Failed to send email: {e}"))
        })
        .await
        .map_err(|e| SendFailure::new(e.to_string()))?
        .map_err(SendFailure::new)?;

        tracing::info!("Sent weather report email to {}", recipient);

        if let Err(e) = self.directory.mark_report_sent(&key, Utc::now()) {
            tracing::warn!("Report sent but not recorded for {}: {:#}", key, e);
        }

        Ok(SUCCESS_TOKEN.to_string())
    }
}

/// Stands in for the SMTP sender when email settings are incomplete.
///
/// Every send fails with the configuration problem, so read-only use of the
/// widget is unaffected.
#[derive(Debug, Clone)]
pub struct UnavailableEmail {
    reason: String,
}

impl UnavailableEmail {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl ReportSender for UnavailableEmail {
    async fn send_report(&self, _request: &ReportRequest) -> Result<String, SendFailure> {
        Err(SendFailure::new(format!(
            "Email is not configured: {}",
            self.reason
        )))
    }
}

/// SMTP report sender for `config`, or [`UnavailableEmail`] when it is incomplete
pub fn report_sender(
    config: &EmailConfig,
    directory: Arc<dyn RecipientDirectory>,
    actor: ActorId,
) -> Arc<dyn ReportSender> {
    let mailer = create_mailer(config).and_then(|mailer| Ok((mailer, sender_mailbox(config)?)));
    let sender: Arc<dyn ReportSender> = match mailer {
        Ok((transport, from)) => Arc::new(EmailReportSender::new(transport, directory, actor, from)),
        Err(e) => {
            tracing::warn!("Report email disabled: {:#}", e);
            Arc::new(UnavailableEmail::new(format!("{e:#}")))
        }
    };
    sender
}
