//! # webhook-auth
//!
//! Verification of signed webhook deliveries from payment providers:
//! - Certificate URL allow-listing and fetching
//! - A process-wide certificate cache with single-flight refresh
//! - X.509 validity checks and RSA public key extraction
//! - Canonical payload reconstruction and signature verification
//!
//! ## Architecture
//!
//! `PaypalWebhookVerifier` drives the pipeline and is the only type most callers need. It
//! resolves certificates through a `CertificateCache`, which fetches through any
//! `CertificateSource` (`HttpCertificateSource` in production).
//!
//! ## Usage
//!
//! ```rust,ignore
//! use webhook_auth::{
//!     certificate::{CertUrlPolicy, CertificateCache, HttpCertificateSource},
//!     http::HttpClientConfig,
//!     webhook::PaypalWebhookVerifier,
//! };
//!
//! let source = HttpCertificateSource::from_config(HttpClientConfig::default())?;
//! let cache = CertificateCache::new(source, CertUrlPolicy::paypal());
//! let verifier = PaypalWebhookVerifier::new(webhook_id, cache);
//! let verified = verifier.verify(&headers, &raw_body).await?;
//! ```

pub mod certificate;
pub mod error;
pub mod http;
pub mod webhook;

#[cfg(test)]
pub(crate) mod test_support;

// Re-export commonly used types
pub use certificate::{CertificateCache, HttpCertificateSource};
pub use error::{Error, ErrorKind};
pub use webhook::{HeaderLookup, PaypalWebhookVerifier, VerifiedWebhook, WebhookVerifier};
