use async_trait::async_trait;
use reqwest::{StatusCode, header};
use serde::{Deserialize, Deserializer};
use thiserror::Error;
use tracing::{info, instrument};
use url::Url;

pub const URLDAY_BASE_URL: &str = "https://www.urlday.com/";

/// Response body of `GET /api/v1/links/{id}`.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ShortLinkState {
    pub status: i64,
    pub data: ShortLinkData,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ShortLinkData {
    pub id: Option<String>,
    pub alias: Option<String>,
    /// Where the short link currently redirects to
    #[serde(deserialize_with = "null_as_empty")]
    pub url: String,
    pub short_url: Option<String>,
}

fn null_as_empty<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

#[async_trait]
pub trait ShortLinkService: Send + Sync {
    /// Returns the URL the short link currently redirects to.
    async fn current_destination(&self) -> Result<String, ShortLinkError>;

    /// Points the short link at `new_url`.
    async fn update_destination(&self, new_url: &str) -> Result<(), ShortLinkError>;
}

#[derive(Debug, Error)]
pub enum ShortLinkError {
    #[error("invalid short link service URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("short link service URL {0} cannot have a path")]
    InvalidEndpoint(String),
    #[error("short link request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("failed to decode short link response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("issue with short link {operation}, response status {status} is not 200 OK")]
    UnexpectedStatus {
        operation: &'static str,
        status: StatusCode,
    },
}

/// [`ShortLinkService`] backed by the urlday.com REST API.
pub struct UrlDayClient {
    http: reqwest::Client,
    base_url: String,
    link_id: String,
    api_key: String,
}

impl UrlDayClient {
    #[must_use]
    pub const fn new(
        http: reqwest::Client,
        base_url: String,
        link_id: String,
        api_key: String,
    ) -> Self {
        Self {
            http,
            base_url,
            link_id,
            api_key,
        }
    }

    fn link_url(&self) -> Result<Url, ShortLinkError> {
        let mut url = Url::parse(&self.base_url)?;
        url.path_segments_mut()
            .map_err(|()| ShortLinkError::InvalidEndpoint(self.base_url.clone()))?
            .pop_if_empty()
            .extend(["api", "v1", "links", self.link_id.as_str()]);
        Ok(url)
    }
}

#[async_trait]
impl ShortLinkService for UrlDayClient {
    #[instrument(skip(self), fields(link_id = %self.link_id))]
    async fn current_destination(&self) -> Result<String, ShortLinkError> {
        let response = self
            .http
            .get(self.link_url()?)
            .header(header::ACCEPT, "application/json")
            .bearer_auth(&self.api_key)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ShortLinkError::UnexpectedStatus {
                operation: "lookup",
                status,
            });
        }

        let state: ShortLinkState = serde_json::from_str(&response.text().await?)?;
        info!(destination = %state.data.url, "Read current short link destination");
        Ok(state.data.url)
    }

    #[instrument(skip(self), fields(link_id = %self.link_id))]
    async fn update_destination(&self, new_url: &str) -> Result<(), ShortLinkError> {
        let response = self
            .http
            .put(self.link_url()?)
            .bearer_auth(&self.api_key)
            .form(&[("url", new_url)])
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => {
                info!("Short link destination updated");
                Ok(())
            }
            status => Err(ShortLinkError::UnexpectedStatus {
                operation: "update",
                status,
            }),
        }
    }
}
