//! Certificate parsing and validity-window checks.

use chrono::{DateTime, Utc};
use rsa::pkcs8::DecodePublicKey;
use rsa::RsaPublicKey;

use super::validity::{read_validity, Validity};
use crate::error::{certificate_error, CertificateErrorKind, Error};

const CERTIFICATE_PEM_LABEL: &str = "CERTIFICATE";

/// A decoded signing certificate.
///
/// Derived deterministically from PEM text and never mutated afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedCertificate {
    validity: Validity,
    public_key: RsaPublicKey,
}

impl ParsedCertificate {
    /// Start of the validity window.
    pub fn not_before(&self) -> DateTime<Utc> {
        self.validity.not_before.to_datetime()
    }

    /// End of the validity window.
    pub fn not_after(&self) -> DateTime<Utc> {
        self.validity.not_after.to_datetime()
    }

    /// Both bounds with their original encodings.
    pub fn validity(&self) -> &Validity {
        &self.validity
    }
}

/// Parse PEM text into a [`ParsedCertificate`].
///
/// Provider certificate URLs may serve a chain; the leaf is the first block and is the
/// one that signed the transmission.
pub fn parse(pem_text: &str) -> Result<ParsedCertificate, Error> {
    let blocks = pem::parse_many(pem_text).map_err(|e| {
        certificate_error(
            CertificateErrorKind::InvalidPem,
            &format!("Failed to decode PEM: {}", e),
        )
    })?;

    let leaf = blocks.first().ok_or_else(|| {
        certificate_error(CertificateErrorKind::InvalidPem, "No PEM block found")
    })?;

    if leaf.tag() != CERTIFICATE_PEM_LABEL {
        return Err(certificate_error(
            CertificateErrorKind::InvalidPem,
            &format!("Expected a CERTIFICATE block, found {}", leaf.tag()),
        ));
    }

    let der = leaf.contents();
    let (_, certificate) = x509_parser::parse_x509_certificate(der).map_err(|e| {
        certificate_error(
            CertificateErrorKind::Malformed,
            &format!("Failed to parse X.509 certificate: {}", e),
        )
    })?;

    let validity = read_validity(&certificate)?;

    let public_key = RsaPublicKey::from_public_key_der(certificate.public_key().raw).map_err(|e| {
        certificate_error(
            CertificateErrorKind::Malformed,
            &format!("Certificate does not carry an RSA public key: {}", e),
        )
    })?;

    Ok(ParsedCertificate {
        validity,
        public_key,
    })
}

/// Parse the certificate and confirm the current time lies within its validity window.
pub fn is_in_date(pem_text: &str) -> Result<ParsedCertificate, Error> {
    is_in_date_at(pem_text, Utc::now())
}

/// Parse the certificate and confirm `now` lies within its validity window.
///
/// Both bounds are inclusive.
pub fn is_in_date_at(pem_text: &str, now: DateTime<Utc>) -> Result<ParsedCertificate, Error> {
    let certificate = parse(pem_text)?;

    if now < certificate.not_before() {
        return Err(certificate_error(
            CertificateErrorKind::NotYetValid,
            &format!("Certificate is not valid before {}", certificate.not_before()),
        ));
    }

    if now > certificate.not_after() {
        return Err(certificate_error(
            CertificateErrorKind::Expired,
            &format!("Certificate expired at {}", certificate.not_after()),
        ));
    }

    Ok(certificate)
}

/// The key that verifies transmission signatures.
pub fn public_key(certificate: &ParsedCertificate) -> &RsaPublicKey {
    &certificate.public_key
}
