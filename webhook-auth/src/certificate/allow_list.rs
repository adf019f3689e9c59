//! Certificate URL allow-listing.
//!
//! The certificate URL arrives in a request header, so it is attacker controlled until
//! proven otherwise. Only hosts under the provider's certificate domains are fetched.

use url::Url;

use crate::error::{fetch_error, Error, FetchErrorKind};

/// PayPal's certificate hosts for the live and sandbox environments.
pub const PAYPAL_CERT_DOMAINS: [&str; 2] = ["api.paypal.com", "api.sandbox.paypal.com"];

/// Which certificate URLs may be fetched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertUrlPolicy {
    allowed_domains: Vec<String>,
    allow_insecure_http: bool,
}

impl CertUrlPolicy {
    /// Create a policy allowing each domain and any of its subdomains, over HTTPS only.
    pub fn new<I, D>(allowed_domains: I) -> Self
    where
        I: IntoIterator<Item = D>,
        D: AsRef<str>,
    {
        let allowed_domains = allowed_domains
            .into_iter()
            .map(|d| d.as_ref().trim().trim_matches('.').to_ascii_lowercase())
            .filter(|d| !d.is_empty())
            .collect();

        Self {
            allowed_domains,
            allow_insecure_http: false,
        }
    }

    /// Policy for PayPal's published certificate hosts.
    pub fn paypal() -> Self {
        Self::new(PAYPAL_CERT_DOMAINS)
    }

    /// Also accept plain `http` URLs. Only meant for local test servers.
    pub fn with_insecure_http(mut self, allow: bool) -> Self {
        self.allow_insecure_http = allow;
        self
    }

    /// The normalised domain list.
    pub fn allowed_domains(&self) -> &[String] {
        &self.allowed_domains
    }

    /// Validate `url` against the policy, returning the parsed URL on success.
    pub fn check(&self, url: &str) -> Result<Url, Error> {
        let rejected = |reason: &str| {
            fetch_error(
                FetchErrorKind::InvalidCertUrlDomain(url.to_string()),
                &format!("Certificate URL rejected: {}", reason),
            )
        };

        let parsed = Url::parse(url).map_err(|_| rejected("not a valid URL"))?;

        match parsed.scheme() {
            "https" => {}
            "http" if self.allow_insecure_http => {}
            _ => return Err(rejected("scheme is not https")),
        }

        if !parsed.username().is_empty() || parsed.password().is_some() {
            return Err(rejected("credentials are not allowed"));
        }

        let host = parsed
            .host_str()
            .ok_or_else(|| rejected("missing host"))?
            .to_ascii_lowercase();

        if !self.host_allowed(&host) {
            return Err(rejected("host is not an allowed certificate domain"));
        }

        Ok(parsed)
    }

    fn host_allowed(&self, host: &str) -> bool {
        self.allowed_domains.iter().any(|domain| {
            host == domain
                || host
                    .strip_suffix(domain.as_str())
                    .is_some_and(|prefix| prefix.ends_with('.'))
        })
    }
}

impl Default for CertUrlPolicy {
    fn default() -> Self {
        Self::paypal()
    }
}
