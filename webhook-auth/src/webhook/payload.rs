//! Canonical signing payload reconstruction.
//!
//! PayPal signs `<transmission id>|<transmission time>|<webhook id>|<crc32 of body>`, with the
//! checksum written in decimal. The body must be the exact bytes received on the wire.

/// Standard CRC-32 (IEEE 802.3) of the raw body.
pub fn crc32(raw_body: &[u8]) -> u32 {
    crc32fast::hash(raw_body)
}

/// Build the string the provider signed for this transmission.
pub fn build(
    transmission_id: &str,
    transmission_time: &str,
    webhook_id: &str,
    raw_body: &[u8],
) -> String {
    format!(
        "{}|{}|{}|{}",
        transmission_id,
        transmission_time,
        webhook_id,
        crc32(raw_body)
    )
}
