//! Mapping of `paypal-auth-algo` values to verification routines.

use rsa::pkcs1v15::{Signature, VerifyingKey};
use rsa::signature::Verifier;
use rsa::RsaPublicKey;
use sha2::Sha256;

use crate::error::{signature_error, Error, SignatureErrorKind};

/// Signature algorithms accepted in the `paypal-auth-algo` header.
///
/// New algorithms are added here and nowhere else.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthAlgorithm {
    /// RSASSA-PKCS1-v1_5 over SHA-256.
    Sha256WithRsa,
}

impl AuthAlgorithm {
    /// Map a header value to an algorithm.
    pub fn from_header(value: &str) -> Result<Self, Error> {
        match value {
            "SHA256withRSA" => Ok(AuthAlgorithm::Sha256WithRsa),
            other => Err(signature_error(
                SignatureErrorKind::UnsupportedAuthAlgorithm(other.to_string()),
                &format!("Unsupported auth algorithm: {}", other),
            )),
        }
    }

    /// The header spelling of this algorithm.
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthAlgorithm::Sha256WithRsa => "SHA256withRSA",
        }
    }

    /// Verify `signature` over `message` with `public_key`.
    pub fn verify(
        &self,
        public_key: &RsaPublicKey,
        message: &[u8],
        signature: &[u8],
    ) -> Result<(), Error> {
        let invalid = |e: rsa::signature::Error| {
            signature_error(
                SignatureErrorKind::Invalid,
                &format!("Signature verification failed: {}", e),
            )
        };

        match self {
            AuthAlgorithm::Sha256WithRsa => {
                let verifying_key = VerifyingKey::<Sha256>::new(public_key.clone());
                let signature = Signature::try_from(signature).map_err(invalid)?;
                verifying_key.verify(message, &signature).map_err(invalid)
            }
        }
    }
}
