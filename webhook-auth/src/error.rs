//! Error types for the `webhook-auth` crate.
//!
//! Follows the same pattern as the service layer: a root Error struct holding an error kind
//! enum and an optional source. Every verification failure is a distinct kind so callers can
//! tell "retry later" apart from "reject permanently" and "configuration bug".

use std::error::Error as StdError;
use std::fmt;

/// Top-level error type for webhook-auth crate.
/// Holds error kind and optional source for error chaining.
#[derive(Debug)]
pub struct Error {
    pub source: Option<Box<dyn StdError + Send + Sync>>,
    pub error_kind: ErrorKind,
}

/// Major categories of errors in webhook-auth.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    Request(RequestErrorKind),
    Config(ConfigErrorKind),
    Fetch(FetchErrorKind),
    Certificate(CertificateErrorKind),
    Signature(SignatureErrorKind),
}

/// Errors caused by the shape of the inbound webhook request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestErrorKind {
    /// A required transmission header is absent or blank. Holds the header name.
    MissingHeader(String),
    /// The raw request body is missing or empty.
    InvalidRawBody,
}

/// Errors caused by missing process configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigErrorKind {
    MissingWebhookId,
}

/// Errors from retrieving a signing certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchErrorKind {
    /// The certificate URL is not on the allow-list. Holds the offending URL.
    InvalidCertUrlDomain(String),
    /// The certificate host answered with a non-200 status.
    FailedStatus(u16),
    Network,
    Timeout,
}

/// Errors from decoding or date-checking a certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CertificateErrorKind {
    InvalidPem,
    Malformed,
    NotYetValid,
    Expired,
}

/// Errors from the signature itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignatureErrorKind {
    /// The `paypal-auth-algo` value has no digest mapping. Holds the value.
    UnsupportedAuthAlgorithm(String),
    DecodeFailed,
    Invalid,
}

impl Error {
    /// The kind of failure, for matching by callers.
    pub fn kind(&self) -> &ErrorKind {
        &self.error_kind
    }

    /// Whether re-running the whole verification later might succeed.
    ///
    /// Only certificate retrieval failures are transient; everything else is a
    /// property of the request, the configuration or the certificate itself.
    pub fn is_transient(&self) -> bool {
        matches!(
            self.error_kind,
            ErrorKind::Fetch(FetchErrorKind::FailedStatus(_))
                | ErrorKind::Fetch(FetchErrorKind::Network)
                | ErrorKind::Fetch(FetchErrorKind::Timeout)
        )
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.error_kind {
            ErrorKind::Request(kind) => write!(f, "Request error: {:?}", kind),
            ErrorKind::Config(kind) => write!(f, "Configuration error: {:?}", kind),
            ErrorKind::Fetch(kind) => write!(f, "Certificate fetch error: {:?}", kind),
            ErrorKind::Certificate(kind) => write!(f, "Certificate error: {:?}", kind),
            ErrorKind::Signature(kind) => write!(f, "Signature error: {:?}", kind),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn StdError + 'static))
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        let error_kind = if err.is_timeout() {
            ErrorKind::Fetch(FetchErrorKind::Timeout)
        } else if let Some(status) = err.status() {
            ErrorKind::Fetch(FetchErrorKind::FailedStatus(status.as_u16()))
        } else {
            ErrorKind::Fetch(FetchErrorKind::Network)
        };

        Error {
            source: Some(Box::new(err)),
            error_kind,
        }
    }
}

/// Helper function to create request errors.
pub fn request_error(kind: RequestErrorKind, message: &str) -> Error {
    Error {
        source: Some(message.to_string().into()),
        error_kind: ErrorKind::Request(kind),
    }
}

/// Helper function to create configuration errors.
pub fn config_error(kind: ConfigErrorKind, message: &str) -> Error {
    Error {
        source: Some(message.to_string().into()),
        error_kind: ErrorKind::Config(kind),
    }
}

/// Helper function to create certificate fetch errors.
pub fn fetch_error(kind: FetchErrorKind, message: &str) -> Error {
    Error {
        source: Some(message.to_string().into()),
        error_kind: ErrorKind::Fetch(kind),
    }
}

/// Helper function to create certificate errors.
pub fn certificate_error(kind: CertificateErrorKind, message: &str) -> Error {
    Error {
        source: Some(message.to_string().into()),
        error_kind: ErrorKind::Certificate(kind),
    }
}

/// Helper function to create signature errors.
pub fn signature_error(kind: SignatureErrorKind, message: &str) -> Error {
    Error {
        source: Some(message.to_string().into()),
        error_kind: ErrorKind::Signature(kind),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_errors_are_transient() {
        assert!(fetch_error(FetchErrorKind::Network, "down").is_transient());
        assert!(fetch_error(FetchErrorKind::Timeout, "slow").is_transient());
        assert!(fetch_error(FetchErrorKind::FailedStatus(503), "busy").is_transient());
    }

    #[test]
    fn test_rejections_are_not_transient() {
        let url = "https://evil.example/cert.pem".to_string();
        assert!(!fetch_error(FetchErrorKind::InvalidCertUrlDomain(url), "nope").is_transient());
        assert!(!signature_error(SignatureErrorKind::Invalid, "bad").is_transient());
        assert!(!certificate_error(CertificateErrorKind::Expired, "old").is_transient());
        assert!(!config_error(ConfigErrorKind::MissingWebhookId, "unset").is_transient());
    }

    #[test]
    fn test_display_names_category_and_kind() {
        let err = request_error(
            RequestErrorKind::MissingHeader("paypal-auth-algo".to_string()),
            "missing",
        );
        assert_eq!(
            err.to_string(),
            "Request error: MissingHeader(\"paypal-auth-algo\")"
        );
    }

    #[test]
    fn test_source_is_preserved() {
        let err = signature_error(SignatureErrorKind::DecodeFailed, "bad base64");
        let source = StdError::source(&err).map(|s| s.to_string());
        assert_eq!(source, Some("bad base64".to_string()));
    }
}
