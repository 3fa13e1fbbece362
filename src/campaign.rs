use async_trait::async_trait;
use reqwest::{StatusCode, header};
use serde::Deserialize;
use thiserror::Error;
use tracing::{info, instrument, warn};
use url::Url;

/// `{prefix}` is replaced with the account's server prefix, e.g. `us21`.
pub const MAILCHIMP_BASE_URL_TEMPLATE: &str = "https://{prefix}.api.mailchimp.com/";

// NOTE: the API only checks the password, any username is accepted
const BASIC_AUTH_USERNAME: &str = "anystring";

/// Response body of `GET /3.0/campaigns`.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CampaignList {
    pub total_items: u64,
    pub campaigns: Vec<Campaign>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Campaign {
    pub id: String,
    pub archive_url: String,
    pub status: String,
}

impl CampaignList {
    /// The archive URL if the list holds exactly one campaign, otherwise an empty string.
    #[must_use]
    pub fn single_archive_url(&self) -> String {
        match self.campaigns.as_slice() {
            [campaign] => campaign.archive_url.clone(),
            campaigns => {
                warn!(
                    count = campaigns.len(),
                    total_items = self.total_items,
                    "Expected exactly one sent campaign"
                );
                String::new()
            }
        }
    }
}

#[async_trait]
pub trait CampaignService: Send + Sync {
    /// Returns the archive URL of the most recently sent campaign, or an empty string
    /// when the service did not return exactly one campaign.
    async fn latest_sent_campaign_url(&self) -> Result<String, CampaignError>;
}

#[derive(Debug, Error)]
pub enum CampaignError {
    #[error("invalid campaign service URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("campaign request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("failed to decode campaign response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("issue with campaign lookup, response status {0} is not successful")]
    UnexpectedStatus(StatusCode),
}

/// [`CampaignService`] backed by the Mailchimp Marketing API.
pub struct MailChimpClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl MailChimpClient {
    #[must_use]
    pub const fn new(http: reqwest::Client, base_url: String, api_key: String) -> Self {
        Self {
            http,
            base_url,
            api_key,
        }
    }

    fn latest_sent_url(&self) -> Result<Url, CampaignError> {
        let mut url = Url::parse(&self.base_url)?.join("3.0/campaigns")?;
        url.query_pairs_mut()
            .append_pair("status", "sent")
            .append_pair("sort_field", "send_time")
            .append_pair("sort_dir", "DESC")
            .append_pair("count", "1");
        Ok(url)
    }
}

#[async_trait]
impl CampaignService for MailChimpClient {
    #[instrument(skip(self), fields(base_url = %self.base_url))]
    async fn latest_sent_campaign_url(&self) -> Result<String, CampaignError> {
        let response = self
            .http
            .get(self.latest_sent_url()?)
            .header(header::ACCEPT, "application/json")
            .basic_auth(BASIC_AUTH_USERNAME, Some(&self.api_key))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(CampaignError::UnexpectedStatus(status));
        }

        let campaigns: CampaignList = serde_json::from_str(&response.text().await?)?;
        let archive_url = campaigns.single_archive_url();
        info!(%archive_url, "Read latest sent campaign");
        Ok(archive_url)
    }
}
