//! Provider signing certificates: allow-listed retrieval, caching and validation.

mod allow_list;
mod cache;
mod source;
pub mod validator;
mod validity;

pub use allow_list::{CertUrlPolicy, PAYPAL_CERT_DOMAINS};
pub use cache::{CachedCertificate, CertificateCache};
pub use source::{CertificateSource, HttpCertificateSource};
pub use validator::ParsedCertificate;
pub use validity::{read_validity, CertTime, Validity};
