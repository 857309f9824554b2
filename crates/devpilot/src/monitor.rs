//! One-shot database health check that emails an alert when the probe finds
//! something. Scheduling is left to cron or a similar external runner.

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message as Email, Tokio1Executor};
use thiserror::Error;

use crate::config::{EmailSettings, Settings};
use crate::diagnostics::{needs_attention, performance_report};
use crate::supabase::{SupabaseClient, SupabaseError};

pub const ALERT_SUBJECT: &str = "🚨 Supabase Performance Alert";

#[derive(Error, Debug)]
pub enum MonitorError {
    #[error("Supabase credentials missing: {0}")]
    MissingCredentials(String),

    #[error("Supabase client error: {0}")]
    Client(#[from] SupabaseError),

    #[error("Failed to send alert email: {0}")]
    Email(String),
}

/// Delivers alert messages
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, subject: &str, body: &str) -> Result<(), MonitorError>;
}

/// Plain-text mail over SMTP with implicit TLS
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Mailbox,
}

impl SmtpMailer {
    pub fn new(settings: &EmailSettings) -> Result<Self, MonitorError> {
        let from: Mailbox = settings
            .sender
            .parse()
            .map_err(|e| MonitorError::Email(format!("invalid sender address: {}", e)))?;
        let to: Mailbox = settings
            .recipient
            .parse()
            .map_err(|e| MonitorError::Email(format!("invalid recipient address: {}", e)))?;

        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&settings.smtp_host)
            .map_err(|e| MonitorError::Email(e.to_string()))?
            .port(settings.smtp_port)
            .credentials(Credentials::new(
                settings.sender.clone(),
                settings.password.clone(),
            ))
            .build();

        Ok(Self {
            transport,
            from,
            to,
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, subject: &str, body: &str) -> Result<(), MonitorError> {
        let email = Email::builder()
            .from(self.from.clone())
            .to(self.to.clone())
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())
            .map_err(|e| MonitorError::Email(e.to_string()))?;

        self.transport
            .send(email)
            .await
            .map_err(|e| MonitorError::Email(e.to_string()))?;
        Ok(())
    }
}

/// What a single monitoring pass did
#[derive(Debug, Clone, PartialEq)]
pub enum MonitorOutcome {
    Healthy { report: String },
    Alerted { report: String },
    AlertSkipped { report: String },
    AlertFailed { report: String, error: String },
}

pub struct Monitor {
    client: SupabaseClient,
    mailer: Option<Box<dyn Mailer>>,
}

impl Monitor {
    pub fn new(client: SupabaseClient, mailer: Option<Box<dyn Mailer>>) -> Self {
        Self { client, mailer }
    }

    /// Requires Supabase credentials; email settings are optional
    pub fn from_settings(settings: &Settings) -> Result<Self, MonitorError> {
        let (url, key) = settings
            .supabase_credentials()
            .map_err(|e| MonitorError::MissingCredentials(e.to_string()))?;
        let client = SupabaseClient::new(url, key)?;

        let mailer: Option<Box<dyn Mailer>> = match settings.email() {
            Some(email) => match SmtpMailer::new(&email) {
                Ok(mailer) => Some(Box::new(mailer)),
                Err(e) => {
                    tracing::error!("{}", e);
                    None
                }
            },
            None => None,
        };

        Ok(Self::new(client, mailer))
    }

    pub async fn run_once(&self) -> MonitorOutcome {
        tracing::info!("Running Supabase performance check...");
        let report = performance_report(&self.client).await;

        if !needs_attention(&report) {
            tracing::info!("{}", report);
            return MonitorOutcome::Healthy { report };
        }

        tracing::warn!("Performance issues detected:\n{}", report);
        let Some(mailer) = &self.mailer else {
            tracing::warn!(
                "Email alerting is not fully configured (ALERT_EMAIL_SENDER, \
                 ALERT_EMAIL_PASSWORD, ALERT_EMAIL_RECIPIENT). Skipping email."
            );
            return MonitorOutcome::AlertSkipped { report };
        };

        match mailer.send(ALERT_SUBJECT, &report).await {
            Ok(()) => {
                tracing::info!("Alert email sent successfully.");
                MonitorOutcome::Alerted { report }
            }
            Err(e) => {
                tracing::error!("{}", e);
                MonitorOutcome::AlertFailed {
                    report,
                    error: e.to_string(),
                }
            }
        }
    }
}
