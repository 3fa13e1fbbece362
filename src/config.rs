use std::{
    env::{self, VarError},
    path::Path,
    sync::Arc,
};

use anyhow::Context;
use rearch::{CapsuleHandle, Container};
use tracing::{info, instrument, warn};

use crate::{
    campaign::{CampaignService, MAILCHIMP_BASE_URL_TEMPLATE, MailChimpClient},
    link_sync::LinkSync,
    notifier::{Notifier, SmtpNotifier},
    short_link::{ShortLinkService, URLDAY_BASE_URL, UrlDayClient},
};

/// Settings for one run, read once from the environment.
///
/// Every field is kept verbatim; a variable that is not set becomes an empty string.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Configuration {
    pub smtp_host: String,
    pub smtp_port: String,
    pub smtp_username: String,
    pub smtp_password: String,
    pub smtp_from_email: String,
    pub send_email_to: String,
    pub mailchimp_server_prefix: String,
    pub mailchimp_api_key: String,
    pub urlday_link_id: String,
    pub urlday_api_key: String,
}

impl Configuration {
    /// Reads every setting from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name))
    }

    /// Reads every setting through `lookup`, which behaves like [`env::var`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Result<String, VarError>) -> Self {
        let var = |name: &str| match lookup(name) {
            Ok(value) => value,
            Err(VarError::NotPresent) => {
                warn!("{name} environment variable not set; defaulting to empty");
                String::new()
            }
            Err(VarError::NotUnicode(actual)) => {
                warn!(
                    "{name} environment variable is invalid unicode: {}; defaulting to empty",
                    actual.display()
                );
                String::new()
            }
        };

        Self {
            smtp_host: var("SmtpHost"),
            smtp_port: var("SmtpPort"),
            smtp_username: var("SmtpUsername"),
            smtp_password: var("SmtpPassword"),
            smtp_from_email: var("SmtpFromEmail"),
            send_email_to: var("SendEmailTo"),
            mailchimp_server_prefix: var("MailChimpServerPrefix"),
            mailchimp_api_key: var("MailChimpApiKey"),
            urlday_link_id: var("UrlDayLinkId"),
            urlday_api_key: var("UrlDayApiKey"),
        }
    }
}

// NOTE: secrets stay out of the logs
impl std::fmt::Debug for Configuration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Configuration")
            .field("smtp_host", &self.smtp_host)
            .field("smtp_port", &self.smtp_port)
            .field("smtp_username", &self.smtp_username)
            .field("smtp_from_email", &self.smtp_from_email)
            .field("send_email_to", &self.send_email_to)
            .field("mailchimp_server_prefix", &self.mailchimp_server_prefix)
            .field("urlday_link_id", &self.urlday_link_id)
            .finish_non_exhaustive()
    }
}

const ENV_FILE: &str = ".env";

/// Loads the `.env` file from the working directory and creates the [`Container`].
///
/// # Errors
/// Will return [`Err`] if the `.env` file cannot be found or parsed.
pub fn init_container() -> anyhow::Result<Container> {
    init_container_from(Path::new(ENV_FILE))
}

/// Loads exactly `env_file` (parent directories are never searched) and creates the
/// [`Container`].
///
/// # Errors
/// Will return [`Err`] if `env_file` cannot be found or parsed.
#[instrument]
pub fn init_container_from(env_file: &Path) -> anyhow::Result<Container> {
    dotenvy::from_path(env_file).context("Error loading .env file")?;
    info!(env_file = %env_file.display(), "Loaded environment file");
    Ok(Container::new())
}

pub fn configuration_capsule(_: CapsuleHandle) -> Arc<Configuration> {
    let configuration = Configuration::from_env();
    info!(?configuration, "Configuration read from environment");
    Arc::new(configuration)
}

#[must_use]
pub fn http_client_capsule(_: CapsuleHandle) -> reqwest::Client {
    reqwest::Client::new()
}

pub fn short_link_service_capsule(
    CapsuleHandle { mut get, .. }: CapsuleHandle,
) -> Arc<dyn ShortLinkService> {
    let http = get.as_ref(http_client_capsule).clone();
    let config = get.as_ref(configuration_capsule);
    Arc::new(UrlDayClient::new(
        http,
        URLDAY_BASE_URL.to_owned(),
        config.urlday_link_id.clone(),
        config.urlday_api_key.clone(),
    ))
}

pub fn campaign_service_capsule(
    CapsuleHandle { mut get, .. }: CapsuleHandle,
) -> Arc<dyn CampaignService> {
    let http = get.as_ref(http_client_capsule).clone();
    let config = get.as_ref(configuration_capsule);
    Arc::new(MailChimpClient::new(
        http,
        MAILCHIMP_BASE_URL_TEMPLATE.replace("{prefix}", &config.mailchimp_server_prefix),
        config.mailchimp_api_key.clone(),
    ))
}

pub fn notifier_capsule(CapsuleHandle { mut get, .. }: CapsuleHandle) -> Arc<dyn Notifier> {
    let config = Arc::clone(get.as_ref(configuration_capsule));
    Arc::new(SmtpNotifier::new(config))
}

pub fn link_sync_capsule(CapsuleHandle { mut get, .. }: CapsuleHandle) -> Arc<LinkSync> {
    let short_links = Arc::clone(get.as_ref(short_link_service_capsule));
    let campaigns = Arc::clone(get.as_ref(campaign_service_capsule));
    Arc::new(LinkSync::new(short_links, campaigns))
}
