//! PayPal webhook signature verification.
//!
//! PayPal signs each delivery with the private key behind a certificate it publishes at the
//! `paypal-cert-url` header. Verification:
//!
//! 1. Require the five transmission headers, a non-empty body and a configured webhook id
//! 2. Map `paypal-auth-algo` to a digest
//! 3. Rebuild the signed payload (see [`super::payload`])
//! 4. Resolve the certificate through the cache and check its validity window
//! 5. Decode the base64 `paypal-transmission-sig` and verify it with the certificate's key
//!
//! Each step fails with its own error kind and nothing is retried. The raw body has to be
//! captured before any JSON body parsing, since the checksum covers the exact bytes.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use tokio::time::Instant;
use tracing::{debug, warn};

use super::algorithm::AuthAlgorithm;
use super::{payload, HeaderLookup, WebhookVerifier};
use crate::certificate::{validator, CertificateCache, CertificateSource};
use crate::error::{
    config_error, request_error, signature_error, ConfigErrorKind, Error, RequestErrorKind,
    SignatureErrorKind,
};

pub const CERT_URL_HEADER: &str = "paypal-cert-url";
pub const TRANSMISSION_ID_HEADER: &str = "paypal-transmission-id";
pub const TRANSMISSION_TIME_HEADER: &str = "paypal-transmission-time";
pub const TRANSMISSION_SIG_HEADER: &str = "paypal-transmission-sig";
pub const AUTH_ALGO_HEADER: &str = "paypal-auth-algo";

/// Headers every PayPal delivery must carry, in the order they are checked.
pub const REQUIRED_HEADERS: [&str; 5] = [
    CERT_URL_HEADER,
    TRANSMISSION_ID_HEADER,
    TRANSMISSION_TIME_HEADER,
    TRANSMISSION_SIG_HEADER,
    AUTH_ALGO_HEADER,
];

const PROVIDER_ID: &str = "paypal";

/// The transmission fields of one delivery, borrowed from the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationRequest<'a> {
    pub cert_url: &'a str,
    pub transmission_id: &'a str,
    /// Opaque provider token; signed as-is and never parsed as a date.
    pub transmission_time: &'a str,
    pub signature_b64: &'a str,
    pub auth_algo: &'a str,
    pub raw_body: &'a [u8],
}

impl<'a> VerificationRequest<'a> {
    /// Collect the transmission fields, failing on the first missing one.
    pub fn from_parts(
        headers: &'a (dyn HeaderLookup + Sync),
        raw_body: &'a [u8],
    ) -> Result<Self, Error> {
        let cert_url = required_header(headers, CERT_URL_HEADER)?;
        let transmission_id = required_header(headers, TRANSMISSION_ID_HEADER)?;
        let transmission_time = required_header(headers, TRANSMISSION_TIME_HEADER)?;
        let signature_b64 = required_header(headers, TRANSMISSION_SIG_HEADER)?;
        let auth_algo = required_header(headers, AUTH_ALGO_HEADER)?;

        if raw_body.is_empty() {
            return Err(request_error(
                RequestErrorKind::InvalidRawBody,
                "Webhook body is empty",
            ));
        }

        Ok(Self {
            cert_url,
            transmission_id,
            transmission_time,
            signature_b64,
            auth_algo,
            raw_body,
        })
    }
}

fn required_header<'a>(
    headers: &'a (dyn HeaderLookup + Sync),
    name: &str,
) -> Result<&'a str, Error> {
    headers
        .header(name)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| {
            request_error(
                RequestErrorKind::MissingHeader(name.to_string()),
                &format!("Missing header: {}", name),
            )
        })
}

/// Details of a delivery whose signature checked out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedWebhook {
    pub transmission_id: String,
    pub transmission_time: String,
    pub cert_url: String,
    pub auth_algo: AuthAlgorithm,
}

/// Verifies PayPal webhook deliveries against certificates from a shared cache.
pub struct PaypalWebhookVerifier<S: CertificateSource> {
    webhook_id: String,
    cache: CertificateCache<S>,
}

impl<S: CertificateSource> PaypalWebhookVerifier<S> {
    /// Create a verifier.
    ///
    /// # Arguments
    ///
    /// * `webhook_id` - This application's webhook id as registered with PayPal
    /// * `cache` - Certificate cache shared by all verifiers in the process
    pub fn new(webhook_id: impl Into<String>, cache: CertificateCache<S>) -> Self {
        Self {
            webhook_id: webhook_id.into(),
            cache,
        }
    }

    /// The certificate cache backing this verifier.
    pub fn cache(&self) -> &CertificateCache<S> {
        &self.cache
    }

    /// Verify a delivery.
    pub async fn verify(
        &self,
        headers: &(dyn HeaderLookup + Sync),
        raw_body: &[u8],
    ) -> Result<VerifiedWebhook, Error> {
        self.run(headers, raw_body, None).await
    }

    /// Verify a delivery, abandoning the certificate fetch once `deadline` passes.
    pub async fn verify_with_deadline(
        &self,
        headers: &(dyn HeaderLookup + Sync),
        raw_body: &[u8],
        deadline: Instant,
    ) -> Result<VerifiedWebhook, Error> {
        self.run(headers, raw_body, Some(deadline)).await
    }

    async fn run(
        &self,
        headers: &(dyn HeaderLookup + Sync),
        raw_body: &[u8],
        deadline: Option<Instant>,
    ) -> Result<VerifiedWebhook, Error> {
        let result = self.verify_steps(headers, raw_body, deadline).await;

        match &result {
            Ok(verified) => debug!(
                "Verified PayPal webhook transmission {}",
                verified.transmission_id
            ),
            Err(e) => warn!(
                "PayPal webhook verification failed for transmission {}: {}",
                headers.header(TRANSMISSION_ID_HEADER).unwrap_or("<none>"),
                e
            ),
        }

        result
    }

    async fn verify_steps(
        &self,
        headers: &(dyn HeaderLookup + Sync),
        raw_body: &[u8],
        deadline: Option<Instant>,
    ) -> Result<VerifiedWebhook, Error> {
        let request = VerificationRequest::from_parts(headers, raw_body)?;

        if self.webhook_id.trim().is_empty() {
            return Err(config_error(
                ConfigErrorKind::MissingWebhookId,
                "No PayPal webhook id configured",
            ));
        }

        let algorithm = AuthAlgorithm::from_header(request.auth_algo)?;

        let signed_payload = payload::build(
            request.transmission_id,
            request.transmission_time,
            &self.webhook_id,
            request.raw_body,
        );

        let pem_text = match deadline {
            Some(deadline) => {
                self.cache
                    .get_certificate_until(request.cert_url, deadline)
                    .await?
            }
            None => self.cache.get_certificate(request.cert_url).await?,
        };
        let certificate = validator::is_in_date(&pem_text)?;
        let public_key = validator::public_key(&certificate);

        let signature = STANDARD.decode(request.signature_b64).map_err(|e| {
            signature_error(
                SignatureErrorKind::DecodeFailed,
                &format!("Transmission signature is not valid base64: {}", e),
            )
        })?;

        algorithm.verify(public_key, signed_payload.as_bytes(), &signature)?;

        Ok(VerifiedWebhook {
            transmission_id: request.transmission_id.to_string(),
            transmission_time: request.transmission_time.to_string(),
            cert_url: request.cert_url.to_string(),
            auth_algo: algorithm,
        })
    }
}

#[async_trait]
impl<S: CertificateSource> WebhookVerifier for PaypalWebhookVerifier<S> {
    async fn verify(
        &self,
        headers: &(dyn HeaderLookup + Sync),
        raw_body: &[u8],
    ) -> Result<VerifiedWebhook, Error> {
        PaypalWebhookVerifier::verify(self, headers, raw_body).await
    }

    fn provider_id(&self) -> &str {
        PROVIDER_ID
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::certificate::{CertTime, CertUrlPolicy};
    use crate::error::{CertificateErrorKind, ErrorKind, FetchErrorKind};
    use crate::test_support;
    use chrono::{Duration, Utc};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use url::Url;

    const WEBHOOK_ID: &str = "1JE4291016473214C";
    const CERT_URL: &str = "https://api.paypal.com/v1/notifications/certs/CERT-360caa42-fca2a594-1d93a270";
    const TRANSMISSION_ID: &str = "69cd13f0-d67a-11e5-baa3-778b53f4ae55";
    const TRANSMISSION_TIME: &str = "2016-02-18T20:01:35Z";
    const BODY: &[u8] =
        br#"{"id":"WH-2WR32451HC0233532-67976317FL4543714","event_type":"BILLING.SUBSCRIPTION.ACTIVATED","resource":{"id":"I-BW452GLLEP1G","status":"ACTIVE"}}"#;

    struct StaticSource {
        pem_text: String,
        calls: Arc<AtomicUsize>,
        delay: std::time::Duration,
    }

    #[async_trait]
    impl CertificateSource for StaticSource {
        async fn fetch(&self, _url: &Url) -> Result<String, Error> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            Ok(self.pem_text.clone())
        }
    }

    fn verifier_with(
        webhook_id: &str,
        pem_text: String,
    ) -> (PaypalWebhookVerifier<StaticSource>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let source = StaticSource {
            pem_text,
            calls: Arc::clone(&calls),
            delay: std::time::Duration::ZERO,
        };
        let cache = CertificateCache::new(source, CertUrlPolicy::paypal());
        (PaypalWebhookVerifier::new(webhook_id, cache), calls)
    }

    fn verifier() -> (PaypalWebhookVerifier<StaticSource>, Arc<AtomicUsize>) {
        verifier_with(WEBHOOK_ID, test_support::current_certificate_pem())
    }

    fn signed_headers(body: &[u8]) -> HashMap<String, String> {
        let signed = payload::build(TRANSMISSION_ID, TRANSMISSION_TIME, WEBHOOK_ID, body);
        HashMap::from([
            ("PAYPAL-CERT-URL".to_string(), CERT_URL.to_string()),
            ("PAYPAL-TRANSMISSION-ID".to_string(), TRANSMISSION_ID.to_string()),
            ("PAYPAL-TRANSMISSION-TIME".to_string(), TRANSMISSION_TIME.to_string()),
            (
                "PAYPAL-TRANSMISSION-SIG".to_string(),
                test_support::sign_base64(signed.as_bytes()),
            ),
            ("PAYPAL-AUTH-ALGO".to_string(), "SHA256withRSA".to_string()),
        ])
    }

    #[tokio::test]
    async fn test_accepts_valid_signature() {
        let (verifier, calls) = verifier();
        let headers = signed_headers(BODY);

        let verified = verifier.verify(&headers, BODY).await.unwrap();

        assert_eq!(verified.transmission_id, TRANSMISSION_ID);
        assert_eq!(verified.transmission_time, TRANSMISSION_TIME);
        assert_eq!(verified.cert_url, CERT_URL);
        assert_eq!(verified.auth_algo, AuthAlgorithm::Sha256WithRsa);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_repeat_verification_uses_cached_certificate() {
        let (verifier, calls) = verifier();
        let headers = signed_headers(BODY);

        verifier.verify(&headers, BODY).await.unwrap();
        verifier.verify(&headers, BODY).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_rejects_tampered_body() {
        let (verifier, _calls) = verifier();
        let headers = signed_headers(BODY);

        let mut tampered = BODY.to_vec();
        tampered[10] ^= 0x01;

        let err = verifier.verify(&headers, &tampered).await.unwrap_err();
        assert_eq!(err.error_kind, ErrorKind::Signature(SignatureErrorKind::Invalid));
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn test_rejects_signature_for_other_webhook_id() {
        let (verifier, _calls) = verifier_with("9XL90610J3647323C", test_support::current_certificate_pem());
        let headers = signed_headers(BODY);

        let err = verifier.verify(&headers, BODY).await.unwrap_err();
        assert_eq!(err.error_kind, ErrorKind::Signature(SignatureErrorKind::Invalid));
    }

    #[tokio::test]
    async fn test_unsupported_algorithm_stops_before_fetch() {
        let (verifier, calls) = verifier();
        let mut headers = signed_headers(BODY);
        headers.insert("PAYPAL-AUTH-ALGO".to_string(), "SHA512withRSA".to_string());

        let err = verifier.verify(&headers, BODY).await.unwrap_err();
        assert_eq!(
            err.error_kind,
            ErrorKind::Signature(SignatureErrorKind::UnsupportedAuthAlgorithm(
                "SHA512withRSA".to_string()
            ))
        );
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_each_missing_header_is_named() {
        for missing in REQUIRED_HEADERS {
            let (verifier, calls) = verifier();
            let mut headers = signed_headers(BODY);
            headers.retain(|name, _| !name.eq_ignore_ascii_case(missing));

            let err = verifier.verify(&headers, BODY).await.unwrap_err();
            assert_eq!(
                err.error_kind,
                ErrorKind::Request(RequestErrorKind::MissingHeader(missing.to_string()))
            );
            assert_eq!(calls.load(Ordering::SeqCst), 0, "{} triggered a fetch", missing);
        }
    }

    #[tokio::test]
    async fn test_blank_header_counts_as_missing() {
        let (verifier, _calls) = verifier();
        let mut headers = signed_headers(BODY);
        headers.insert("PAYPAL-TRANSMISSION-SIG".to_string(), "   ".to_string());

        let err = verifier.verify(&headers, BODY).await.unwrap_err();
        assert_eq!(
            err.error_kind,
            ErrorKind::Request(RequestErrorKind::MissingHeader(
                TRANSMISSION_SIG_HEADER.to_string()
            ))
        );
    }

    #[tokio::test]
    async fn test_empty_body_is_rejected() {
        let (verifier, calls) = verifier();
        let headers = signed_headers(b"");

        let err = verifier.verify(&headers, b"").await.unwrap_err();
        assert_eq!(err.error_kind, ErrorKind::Request(RequestErrorKind::InvalidRawBody));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_missing_webhook_id_is_a_config_error() {
        let (verifier, calls) = verifier_with("", test_support::current_certificate_pem());
        let headers = signed_headers(BODY);

        let err = verifier.verify(&headers, BODY).await.unwrap_err();
        assert_eq!(err.error_kind, ErrorKind::Config(ConfigErrorKind::MissingWebhookId));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_foreign_cert_url_is_rejected_without_fetch() {
        let (verifier, calls) = verifier();
        let mut headers = signed_headers(BODY);
        headers.insert(
            "PAYPAL-CERT-URL".to_string(),
            "https://attacker.example/cert.pem".to_string(),
        );

        let err = verifier.verify(&headers, BODY).await.unwrap_err();
        assert_eq!(
            err.error_kind,
            ErrorKind::Fetch(FetchErrorKind::InvalidCertUrlDomain(
                "https://attacker.example/cert.pem".to_string()
            ))
        );
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_expired_certificate_is_reported() {
        let now = Utc::now();
        let pem = test_support::certificate_pem(
            &CertTime::UtcTime(now - Duration::days(30)),
            &CertTime::UtcTime(now - Duration::days(1)),
        );
        let (verifier, _calls) = verifier_with(WEBHOOK_ID, pem);
        let headers = signed_headers(BODY);

        let err = verifier.verify(&headers, BODY).await.unwrap_err();
        assert_eq!(
            err.error_kind,
            ErrorKind::Certificate(CertificateErrorKind::Expired)
        );
    }

    #[tokio::test]
    async fn test_not_yet_valid_certificate_is_reported() {
        let now = Utc::now();
        let pem = test_support::certificate_pem(
            &CertTime::UtcTime(now + Duration::days(1)),
            &CertTime::UtcTime(now + Duration::days(30)),
        );
        let (verifier, _calls) = verifier_with(WEBHOOK_ID, pem);
        let headers = signed_headers(BODY);

        let err = verifier.verify(&headers, BODY).await.unwrap_err();
        assert_eq!(
            err.error_kind,
            ErrorKind::Certificate(CertificateErrorKind::NotYetValid)
        );
    }

    #[tokio::test]
    async fn test_undecodable_signature() {
        let (verifier, _calls) = verifier();
        let mut headers = signed_headers(BODY);
        headers.insert("PAYPAL-TRANSMISSION-SIG".to_string(), "not*base64!".to_string());

        let err = verifier.verify(&headers, BODY).await.unwrap_err();
        assert_eq!(
            err.error_kind,
            ErrorKind::Signature(SignatureErrorKind::DecodeFailed)
        );
    }

    #[tokio::test]
    async fn test_verification_is_idempotent() {
        let (verifier, _calls) = verifier();
        let headers = signed_headers(BODY);

        let first = verifier.verify(&headers, BODY).await.unwrap();
        let second = verifier.verify(&headers, BODY).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_works_through_trait_object() {
        let (verifier, _calls) = verifier();
        let verifier: Arc<dyn WebhookVerifier> = Arc::new(verifier);
        let headers = signed_headers(BODY);

        assert_eq!(verifier.provider_id(), "paypal");
        assert!(verifier.verify(&headers, BODY).await.is_ok());
    }

    #[tokio::test]
    async fn test_end_to_end_over_http() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/v1/notifications/certs/CERT-1")
            .with_status(200)
            .with_body(test_support::current_certificate_pem())
            .expect(1)
            .create_async()
            .await;

        let source = crate::certificate::HttpCertificateSource::from_config(
            crate::http::HttpClientConfig::default(),
        )
        .unwrap();
        let policy = CertUrlPolicy::new(["127.0.0.1"]).with_insecure_http(true);
        let verifier = PaypalWebhookVerifier::new(WEBHOOK_ID, CertificateCache::new(source, policy));

        let mut headers = signed_headers(BODY);
        headers.insert(
            "PAYPAL-CERT-URL".to_string(),
            format!("{}/v1/notifications/certs/CERT-1", server.url()),
        );

        verifier.verify(&headers, BODY).await.unwrap();
        verifier.verify(&headers, BODY).await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_deadline_reports_timeout() {
        let calls = Arc::new(AtomicUsize::new(0));
        let source = StaticSource {
            pem_text: test_support::current_certificate_pem(),
            calls: Arc::clone(&calls),
            delay: std::time::Duration::from_secs(5),
        };
        let verifier =
            PaypalWebhookVerifier::new(WEBHOOK_ID, CertificateCache::new(source, CertUrlPolicy::paypal()));
        let headers = signed_headers(BODY);

        let deadline = Instant::now() + std::time::Duration::from_millis(50);
        let err = verifier
            .verify_with_deadline(&headers, BODY, deadline)
            .await
            .unwrap_err();
        assert_eq!(err.error_kind, ErrorKind::Fetch(FetchErrorKind::Timeout));
        assert!(err.is_transient());
        assert!(verifier.cache().inspect_cache().is_empty());
    }
}
