//! HTTP client builder for fetching provider signing certificates.

use std::time::Duration;

/// HTTP client configuration.
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Request timeout for a single certificate fetch.
    pub timeout: Duration,
    /// Connect timeout.
    pub connect_timeout: Duration,
    /// User agent string.
    pub user_agent: String,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            connect_timeout: Duration::from_secs(3),
            user_agent: format!("webhook-auth/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Builder for the reqwest client used by [`crate::certificate::HttpCertificateSource`].
///
/// Certificate fetches are never retried here. A failed fetch surfaces to the caller,
/// who may re-run the whole verification.
pub struct ClientBuilder {
    config: HttpClientConfig,
}

impl ClientBuilder {
    /// Create a new client builder with default configuration.
    pub fn new() -> Self {
        Self {
            config: HttpClientConfig::default(),
        }
    }

    /// Set the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Set the connect timeout.
    pub fn with_connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.config.connect_timeout = connect_timeout;
        self
    }

    /// Set the user agent string.
    pub fn with_user_agent(mut self, user_agent: String) -> Self {
        self.config.user_agent = user_agent;
        self
    }

    /// Build the configured HTTP client.
    pub fn build(self) -> Result<reqwest::Client, reqwest::Error> {
        reqwest::Client::builder()
            .timeout(self.config.timeout)
            .connect_timeout(self.config.connect_timeout)
            .user_agent(self.config.user_agent)
            // A certificate URL that redirects elsewhere would bypass the domain allow-list.
            .redirect(reqwest::redirect::Policy::none())
            .build()
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}
