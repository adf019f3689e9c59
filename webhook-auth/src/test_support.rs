//! Key material and certificate builders shared by the unit tests.

use std::sync::OnceLock;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{Duration, Utc};
use rsa::pkcs1v15::SigningKey;
use rsa::pkcs8::EncodePublicKey;
use rsa::signature::{SignatureEncoding, Signer};
use rsa::RsaPrivateKey;
use sha2::Sha256;

use crate::certificate::CertTime;

/// sha256WithRSAEncryption (1.2.840.113549.1.1.11).
const SHA256_WITH_RSA_OID: [u8; 9] = [0x2a, 0x86, 0x48, 0x86, 0xf7, 0x0d, 0x01, 0x01, 0x0b];
/// id-at-commonName (2.5.4.3).
const COMMON_NAME_OID: [u8; 3] = [0x55, 0x04, 0x03];

/// One RSA key per test binary; generation dominates test time otherwise.
pub(crate) fn private_key() -> &'static RsaPrivateKey {
    static KEY: OnceLock<RsaPrivateKey> = OnceLock::new();
    KEY.get_or_init(|| RsaPrivateKey::new(&mut rand::thread_rng(), 2048).unwrap())
}

/// Sign `message` the way the provider does and return the base64 header value.
pub(crate) fn sign_base64(message: &[u8]) -> String {
    let signing_key = SigningKey::<Sha256>::new(private_key().clone());
    STANDARD.encode(signing_key.sign(message).to_bytes())
}

/// Encode a single DER TLV.
pub(crate) fn der(tag: u8, value: &[u8]) -> Vec<u8> {
    let mut out = vec![tag];
    let len = value.len();
    if len < 0x80 {
        out.push(len as u8);
    } else {
        let bytes: Vec<u8> = len
            .to_be_bytes()
            .into_iter()
            .skip_while(|b| *b == 0)
            .collect();
        out.push(0x80 | bytes.len() as u8);
        out.extend(bytes);
    }
    out.extend_from_slice(value);
    out
}

fn encode_time(time: &CertTime) -> Vec<u8> {
    match time {
        CertTime::UtcTime(dt) => der(0x17, dt.format("%y%m%d%H%M%SZ").to_string().as_bytes()),
        CertTime::GeneralizedTime(dt) => {
            der(0x18, dt.format("%Y%m%d%H%M%SZ").to_string().as_bytes())
        }
    }
}

fn name(common_name: &str) -> Vec<u8> {
    let attribute = [
        der(0x06, &COMMON_NAME_OID),
        der(0x0c, common_name.as_bytes()),
    ]
    .concat();
    der(0x30, &der(0x31, &der(0x30, &attribute)))
}

/// A self-signed v3 certificate for the shared test key with the given validity window.
pub(crate) fn certificate_der(not_before: &CertTime, not_after: &CertTime) -> Vec<u8> {
    certificate_der_with_times(encode_time(not_before), encode_time(not_after))
}

/// Like [`certificate_der`], with the validity bounds given as raw DER TLVs.
pub(crate) fn certificate_der_with_times(not_before: Vec<u8>, not_after: Vec<u8>) -> Vec<u8> {
    let algorithm = der(0x30, &[der(0x06, &SHA256_WITH_RSA_OID), der(0x05, &[])].concat());
    let subject = name("api.paypal.com");
    let spki = private_key()
        .to_public_key()
        .to_public_key_der()
        .unwrap()
        .as_bytes()
        .to_vec();

    let tbs = der(
        0x30,
        &[
            der(0xa0, &der(0x02, &[0x02])),
            der(0x02, &[0x01]),
            algorithm.clone(),
            subject.clone(),
            der(0x30, &[not_before, not_after].concat()),
            subject,
            spki,
        ]
        .concat(),
    );

    let signing_key = SigningKey::<Sha256>::new(private_key().clone());
    let signature = [vec![0x00], signing_key.sign(&tbs).to_vec()].concat();

    der(0x30, &[tbs, algorithm, der(0x03, &signature)].concat())
}

/// [`certificate_der`] wrapped in PEM armour.
pub(crate) fn certificate_pem(not_before: &CertTime, not_after: &CertTime) -> String {
    pem::encode(&pem::Pem::new(
        "CERTIFICATE",
        certificate_der(not_before, not_after),
    ))
}

/// A certificate valid from an hour ago until tomorrow.
pub(crate) fn current_certificate_pem() -> String {
    let now = Utc::now();
    certificate_pem(
        &CertTime::UtcTime(now - Duration::hours(1)),
        &CertTime::UtcTime(now + Duration::days(1)),
    )
}
