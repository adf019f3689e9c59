//! Certificate validity window.
//!
//! X.509 encodes `notBefore` and `notAfter` as either `UTCTime` (two digit year, `YY >= 50`
//! meaning 19YY) or `GeneralizedTime` (four digit year), independently for each bound.
//! x509-parser decodes both; this module keeps which encoding each bound used.

use chrono::{DateTime, Utc};
use x509_parser::certificate::X509Certificate;
use x509_parser::time::ASN1Time;

use crate::error::{certificate_error, CertificateErrorKind, Error};

/// A certificate timestamp, tagged with the encoding it was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CertTime {
    /// `YYMMDDHHMMSSZ`.
    UtcTime(DateTime<Utc>),
    /// `YYYYMMDDHHMMSSZ`.
    GeneralizedTime(DateTime<Utc>),
}

impl CertTime {
    /// Convert a time decoded by x509-parser, keeping its encoding.
    ///
    /// Fractional seconds are rejected; RFC 5280 forbids them in certificates.
    pub fn from_asn1(time: &ASN1Time) -> Result<Self, Error> {
        if time.to_datetime().nanosecond() != 0 {
            return Err(certificate_error(
                CertificateErrorKind::Malformed,
                &format!("Certificate time {} carries fractional seconds", time),
            ));
        }

        let instant = DateTime::from_timestamp(time.timestamp(), 0).ok_or_else(|| {
            certificate_error(
                CertificateErrorKind::Malformed,
                &format!("Certificate time {} is out of range", time),
            )
        })?;

        Ok(if time.is_generalizedtime() {
            CertTime::GeneralizedTime(instant)
        } else {
            CertTime::UtcTime(instant)
        })
    }

    /// The instant this value denotes, regardless of encoding.
    pub fn to_datetime(&self) -> DateTime<Utc> {
        match self {
            CertTime::UtcTime(dt) | CertTime::GeneralizedTime(dt) => *dt,
        }
    }
}

/// The `notBefore`/`notAfter` pair of a certificate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Validity {
    pub not_before: CertTime,
    pub not_after: CertTime,
}

/// Read the validity window of a parsed certificate.
pub fn read_validity(certificate: &X509Certificate<'_>) -> Result<Validity, Error> {
    let validity = certificate.validity();
    Ok(Validity {
        not_before: CertTime::from_asn1(&validity.not_before)?,
        not_after: CertTime::from_asn1(&validity.not_after)?,
    })
}
