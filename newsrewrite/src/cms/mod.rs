//! WordPress client: article publishing through the news-rewrite plugin
//! endpoint, category lookup and media upload through the core REST API.

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::RequestBuilder;

pub mod categories;
pub mod media;
pub mod publish;

pub use categories::{Category, CategoryMap, CategorySource};
pub use media::{MediaUploaded, StagedUpload};
pub use publish::{PublishOutcome, PublishRequest, Publisher};

/// Path of the plugin endpoint that creates posts
pub const CREATE_POST_PATH: &str = "/wp-json/news-rewrite-onrender/v1/createpost";
pub const CATEGORIES_PATH: &str = "/wp-json/wp/v2/categories";
pub const MEDIA_PATH: &str = "/wp-json/wp/v2/media";

/// Shared HTTP access to one WordPress site
#[derive(Clone)]
pub struct WordPressClient {
    site_url: String,
    api_token: String,
    app_password: String,
    client: reqwest::Client,
}

impl WordPressClient {
    /// `app_password` is the `user:application-password` pair used for basic auth.
    pub fn new(
        site_url: impl Into<String>,
        api_token: impl Into<String>,
        app_password: impl Into<String>,
        timeout_secs: u64,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent("newsrewrite/0.1.0")
            .build()
            .context("failed to build reqwest client")?;

        Ok(Self {
            site_url: site_url.into().trim_end_matches('/').to_string(),
            api_token: api_token.into(),
            app_password: app_password.into(),
            client,
        })
    }

    pub fn site_url(&self) -> &str {
        &self.site_url
    }

    pub(crate) fn api_token(&self) -> &str {
        &self.api_token
    }

    pub(crate) fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.site_url, path)
    }

    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.client
    }

    /// Attach application-password basic auth.
    pub(crate) fn with_basic_auth(&self, builder: RequestBuilder) -> RequestBuilder {
        match self.app_password.split_once(':') {
            Some((user, password)) => builder.basic_auth(user, Some(password)),
            None => builder.basic_auth(&self.app_password, None::<&str>),
        }
    }
}

/// Describe a transport-level failure for callers.
pub(crate) fn describe_transport_error(e: &reqwest::Error) -> String {
    if e.is_timeout() {
        format!("Request to WordPress site timed out: {}", e)
    } else if e.is_connect() {
        format!("Could not connect to WordPress site: {}", e)
    } else if e.is_decode() {
        format!("Could not decode WordPress response: {}", e)
    } else {
        format!("Unexpected error during the WordPress request: {}", e)
    }
}
