use config::Config;
use log::info;
use std::sync::Arc;
use webhook_auth::certificate::{CertUrlPolicy, CertificateCache, HttpCertificateSource};
use webhook_auth::http::HttpClientConfig;
use webhook_auth::{Error, PaypalWebhookVerifier};

pub mod config;
pub mod logging;

pub type PaypalVerifier = PaypalWebhookVerifier<HttpCertificateSource>;

/// Builds the PayPal verifier and its certificate cache from configuration.
pub fn init_verifier(config: &Config) -> Result<PaypalVerifier, Error> {
    info!(
        "Certificate cache config: domains={:?}, fetch_timeout={}s, max_age={}s, insecure_http={}",
        config.paypal_cert_domains,
        config.cert_fetch_timeout_secs,
        config.cert_cache_max_age_secs,
        config.allow_insecure_cert_urls,
    );

    let http_config = HttpClientConfig {
        timeout: config.cert_fetch_timeout(),
        ..HttpClientConfig::default()
    };
    let source = HttpCertificateSource::from_config(http_config)?;

    let policy = CertUrlPolicy::new(&config.paypal_cert_domains)
        .with_insecure_http(config.allow_insecure_cert_urls);
    let cache = CertificateCache::with_max_age(source, policy, config.cert_cache_max_age());

    Ok(PaypalWebhookVerifier::new(config.paypal_webhook_id(), cache))
}

// Service-level state shared by everything that verifies deliveries.
// The verifier owns the process-wide certificate cache, so it is shared rather than rebuilt.
#[derive(Clone)]
pub struct AppState {
    pub verifier: Arc<PaypalVerifier>,
    pub config: Config,
}

impl AppState {
    pub fn new(app_config: Config, verifier: &Arc<PaypalVerifier>) -> Self {
        Self {
            verifier: Arc::clone(verifier),
            config: app_config,
        }
    }

    pub fn verifier_ref(&self) -> &PaypalVerifier {
        self.verifier.as_ref()
    }
}
