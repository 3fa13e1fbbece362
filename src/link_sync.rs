use std::{fmt, sync::Arc};

use thiserror::Error;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};
use tracing::{error, info, instrument};
use uuid::Uuid;

use crate::{
    campaign::{CampaignError, CampaignService},
    notifier::{self, Notifier, NotifyError, SUCCESS_SUBJECT},
    short_link::{ShortLinkError, ShortLinkService},
};

/// Points the short link at the latest sent campaign's archive.
pub struct LinkSync {
    short_links: Arc<dyn ShortLinkService>,
    campaigns: Arc<dyn CampaignService>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    Unchanged,
    Updated,
}

/// Result of a successful run; its [`Display`](fmt::Display) is the status email body.
#[derive(Debug)]
pub struct SyncReport {
    pub run_id: Uuid,
    pub current_destination: String,
    pub latest_campaign_url: String,
    pub outcome: SyncOutcome,
    pub completed_at: OffsetDateTime,
}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("{0}")]
    ReadShortLink(#[source] ShortLinkError),
    #[error("{0}")]
    ReadCampaign(#[from] CampaignError),
    #[error("{0}")]
    UpdateShortLink(#[source] ShortLinkError),
}

#[derive(Debug, Error)]
pub enum RunError {
    #[error("automation run failed: {0}")]
    Sync(#[from] SyncError),
    #[error("failed to send status email: {0}")]
    StatusEmail(#[from] NotifyError),
}

impl LinkSync {
    #[must_use]
    pub fn new(
        short_links: Arc<dyn ShortLinkService>,
        campaigns: Arc<dyn CampaignService>,
    ) -> Self {
        Self {
            short_links,
            campaigns,
        }
    }

    /// Reads both URLs and updates the short link only when they differ.
    ///
    /// # Errors
    /// Will return [`Err`] on the first failing call; later calls are not made.
    #[instrument(skip(self))]
    pub async fn run(&self, run_id: Uuid) -> Result<SyncReport, SyncError> {
        let current_destination = self
            .short_links
            .current_destination()
            .await
            .map_err(SyncError::ReadShortLink)?;
        let latest_campaign_url = self.campaigns.latest_sent_campaign_url().await?;

        let outcome = if current_destination == latest_campaign_url {
            info!(%current_destination, "Short link already points at the latest campaign");
            SyncOutcome::Unchanged
        } else {
            info!(
                %current_destination,
                %latest_campaign_url,
                "Short link is stale; updating"
            );
            self.short_links
                .update_destination(&latest_campaign_url)
                .await
                .map_err(SyncError::UpdateShortLink)?;
            SyncOutcome::Updated
        };

        Ok(SyncReport {
            run_id,
            current_destination,
            latest_campaign_url,
            outcome,
            completed_at: OffsetDateTime::now_utc(),
        })
    }
}

impl fmt::Display for SyncReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Current UrlDay: {}\r\nCurrent MailChimp: {}\r\n",
            self.current_destination, self.latest_campaign_url
        )?;
        match self.outcome {
            SyncOutcome::Unchanged => write!(f, "\tNO Update Required")?,
            SyncOutcome::Updated => write!(f, "\tUpdate Required\r\n\tUpdate Successful")?,
        }
        let completed_at = self.completed_at.format(&Rfc3339).map_err(|_| fmt::Error)?;
        write!(f, "\r\n\r\nRun ID: {}\r\nCompleted: {completed_at}", self.run_id)
    }
}

/// Performs one run and emails its outcome: the status report on success, the error
/// otherwise.
///
/// The error email is best effort; the run's error is returned either way so the
/// caller can exit unsuccessfully.
///
/// # Errors
/// Will return [`Err`] if the run failed or the status email could not be sent.
#[instrument(skip_all, fields(%run_id))]
pub async fn execute(
    sync: &LinkSync,
    notifier: &dyn Notifier,
    run_id: Uuid,
) -> Result<SyncReport, RunError> {
    match sync.run(run_id).await {
        Ok(report) => {
            notifier.notify(SUCCESS_SUBJECT, &report.to_string()).await?;
            info!(outcome = ?report.outcome, "Run completed");
            Ok(report)
        }
        Err(err) => {
            error!(?err, "Run failed");
            if let Err(notify_err) = notifier::report_failure(notifier, &err, run_id).await {
                error!(?notify_err, "Failed to send error email");
            }
            Err(RunError::Sync(err))
        }
    }
}
