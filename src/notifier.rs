use std::{fmt::Display, num::ParseIntError, sync::Arc};

use async_trait::async_trait;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    address::AddressError,
    message::{Mailbox, header::ContentType},
    transport::smtp::authentication::Credentials,
};
use thiserror::Error;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::config::Configuration;

pub const SUCCESS_SUBJECT: &str = "[ADMC][SUCCESS] MailChimp To Website Automation";
pub const ERROR_SUBJECT: &str = "[ADMC][ERROR] with MailChimp to Website Automation";

const DEFAULT_SUBMISSION_PORT: u16 = 587;
const IMPLICIT_TLS_PORT: u16 = 465;

#[async_trait]
pub trait Notifier: Send + Sync {
    /// Sends a plain-text email with the given subject and body to the configured recipients.
    async fn notify(&self, subject: &str, body: &str) -> Result<(), NotifyError>;
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("invalid SMTP port: {0}")]
    InvalidPort(#[from] ParseIntError),
    #[error("invalid email address {address:?}: {source}")]
    InvalidAddress {
        address: String,
        source: AddressError,
    },
    #[error("no email recipients configured")]
    NoRecipients,
    #[error("failed to build email: {0}")]
    Message(#[from] lettre::error::Error),
    #[error("failed to send email: {0}")]
    Transport(#[from] lettre::transport::smtp::Error),
}

/// Reports a failed run: emails `error` with the [`ERROR_SUBJECT`].
///
/// Only reports; deciding to stop the process is up to the caller.
///
/// # Errors
/// Will return [`Err`] if the error email itself could not be sent.
pub async fn report_failure(
    notifier: &dyn Notifier,
    error: &(dyn Display + Sync),
    run_id: Uuid,
) -> Result<(), NotifyError> {
    let body = format!("Error Message: {error}\r\n\r\nRun ID: {run_id}");
    notifier.notify(ERROR_SUBJECT, &body).await
}

/// Splits a comma separated recipient list, ignoring blank entries.
///
/// # Errors
/// Will return [`Err`] if any entry is not a valid mailbox or no entries remain.
pub fn parse_recipients(send_email_to: &str) -> Result<Vec<Mailbox>, NotifyError> {
    let recipients = send_email_to
        .split(',')
        .map(str::trim)
        .filter(|address| !address.is_empty())
        .map(parse_mailbox)
        .collect::<Result<Vec<_>, _>>()?;

    if recipients.is_empty() {
        return Err(NotifyError::NoRecipients);
    }
    Ok(recipients)
}

fn parse_mailbox(address: &str) -> Result<Mailbox, NotifyError> {
    address
        .parse()
        .map_err(|source| NotifyError::InvalidAddress {
            address: address.to_owned(),
            source,
        })
}

/// [`Notifier`] that submits mail to the configured SMTP server.
pub struct SmtpNotifier {
    config: Arc<Configuration>,
}

impl SmtpNotifier {
    #[must_use]
    pub const fn new(config: Arc<Configuration>) -> Self {
        Self { config }
    }

    fn port(&self) -> Result<u16, NotifyError> {
        match self.config.smtp_port.trim() {
            "" => Ok(DEFAULT_SUBMISSION_PORT),
            port => Ok(port.parse()?),
        }
    }

    fn credentials(&self) -> Credentials {
        // NOTE: older setups only configured the from address as the login
        let username = if self.config.smtp_username.is_empty() {
            &self.config.smtp_from_email
        } else {
            &self.config.smtp_username
        };
        Credentials::new(username.clone(), self.config.smtp_password.clone())
    }

    fn build_message(&self, subject: &str, body: &str) -> Result<Message, NotifyError> {
        let mut builder = Message::builder()
            .from(parse_mailbox(&self.config.smtp_from_email)?)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN);
        for recipient in parse_recipients(&self.config.send_email_to)? {
            builder = builder.to(recipient);
        }
        Ok(builder.body(body.to_owned())?)
    }

    fn transport(&self) -> Result<AsyncSmtpTransport<Tokio1Executor>, NotifyError> {
        let port = self.port()?;
        let builder = if port == IMPLICIT_TLS_PORT {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&self.config.smtp_host)?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.config.smtp_host)?
        };
        Ok(builder.port(port).credentials(self.credentials()).build())
    }
}

#[async_trait]
impl Notifier for SmtpNotifier {
    #[instrument(skip(self, body), fields(host = %self.config.smtp_host, to = %self.config.send_email_to))]
    async fn notify(&self, subject: &str, body: &str) -> Result<(), NotifyError> {
        let message = self.build_message(subject, body)?;
        self.transport()?.send(message).await?;
        info!("Email sent");
        Ok(())
    }
}
