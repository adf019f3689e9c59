//! Webhook signature verification.

mod algorithm;
pub mod payload;
mod paypal;

pub use algorithm::AuthAlgorithm;
pub use paypal::{
    PaypalWebhookVerifier, VerificationRequest, VerifiedWebhook, AUTH_ALGO_HEADER,
    CERT_URL_HEADER, REQUIRED_HEADERS, TRANSMISSION_ID_HEADER, TRANSMISSION_SIG_HEADER,
    TRANSMISSION_TIME_HEADER,
};

use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::Error;

/// Case-insensitive access to request headers.
///
/// Implemented for reqwest's (and therefore axum's) `HeaderMap` and for plain string maps,
/// such as headers captured to a JSON file.
pub trait HeaderLookup {
    /// The value of header `name`, if present and valid UTF-8.
    fn header(&self, name: &str) -> Option<&str>;
}

impl HeaderLookup for reqwest::header::HeaderMap {
    fn header(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(|value| value.to_str().ok())
    }
}

impl HeaderLookup for HashMap<String, String> {
    fn header(&self, name: &str) -> Option<&str> {
        self.iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Trait for verifying inbound webhook deliveries.
#[async_trait]
pub trait WebhookVerifier: Send + Sync {
    /// Verify a webhook delivery.
    ///
    /// # Arguments
    ///
    /// * `headers` - HTTP headers from the webhook request
    /// * `raw_body` - Request body bytes exactly as received, before any JSON decoding
    ///
    /// # Returns
    ///
    /// The verified transmission details, or the specific reason verification failed.
    async fn verify(
        &self,
        headers: &(dyn HeaderLookup + Sync),
        raw_body: &[u8],
    ) -> Result<VerifiedWebhook, Error>;

    /// Get the provider identifier for this verifier.
    fn provider_id(&self) -> &str;
}
