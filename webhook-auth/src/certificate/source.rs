//! Where signing certificates come from.

use async_trait::async_trait;
use reqwest::StatusCode;
use tracing::{debug, warn};
use url::Url;

use crate::error::{fetch_error, Error, FetchErrorKind};
use crate::http::{ClientBuilder, HttpClientConfig};

/// Trait for retrieving a PEM certificate from an already allow-listed URL.
#[async_trait]
pub trait CertificateSource: Send + Sync {
    /// Fetch the PEM text published at `url`.
    ///
    /// # Returns
    ///
    /// The response body on HTTP 200, `FetchErrorKind::FailedStatus` on any other status and
    /// `FetchErrorKind::Network`/`FetchErrorKind::Timeout` on transport failures.
    async fn fetch(&self, url: &Url) -> Result<String, Error>;
}

/// Fetches certificates over HTTPS with reqwest.
#[derive(Clone)]
pub struct HttpCertificateSource {
    client: reqwest::Client,
}

impl HttpCertificateSource {
    /// Wrap an existing client.
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Build a dedicated client from `config`.
    pub fn from_config(config: HttpClientConfig) -> Result<Self, Error> {
        let client = ClientBuilder::new()
            .with_timeout(config.timeout)
            .with_connect_timeout(config.connect_timeout)
            .with_user_agent(config.user_agent)
            .build()?;
        Ok(Self::new(client))
    }
}

#[async_trait]
impl CertificateSource for HttpCertificateSource {
    async fn fetch(&self, url: &Url) -> Result<String, Error> {
        debug!("Fetching signing certificate from {}", url);

        let response = self.client.get(url.clone()).send().await?;

        let status = response.status();
        if status != StatusCode::OK {
            warn!("Certificate fetch from {} returned {}", url, status);
            return Err(fetch_error(
                FetchErrorKind::FailedStatus(status.as_u16()),
                &format!("Certificate host returned {}", status),
            ));
        }

        Ok(response.text().await?)
    }
}
