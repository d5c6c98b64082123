//! Server broadcast envelope.
//!
//! Operator text is packed into a fixed binary record, base64-encoded and
//! wrapped as `!CPC<len:4 hex><base64><crc32:8 hex>\n`. Two envelopes are
//! built per message: one checksummed over the base64 text, one over the raw
//! record bytes. Which variant receivers verify is unconfirmed; both are sent.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

/// Message-type tag at byte 0.
pub const MESSAGE_TYPE: u8 = 0x05;
/// Subtype tag at byte 2.
pub const MESSAGE_SUBTYPE: u8 = 0x40;
/// Sender label written at [`LABEL_OFFSET`].
pub const LABEL: &[u8] = b"Message from server";
/// First byte of the sender label.
pub const LABEL_OFFSET: usize = 6;
/// First byte of the payload text.
pub const PAYLOAD_OFFSET: usize = 26;
/// Record size before the payload is added.
pub const HEADER_LEN: usize = 27;
/// Envelope prefix.
pub const PREFIX: &str = "!CPC";

/// Build the zero-filled binary record carrying `text`.
pub fn build_record(text: &str) -> Vec<u8> {
    let payload = text.as_bytes();
    let mut record = vec![0u8; HEADER_LEN + payload.len()];
    record[0] = MESSAGE_TYPE;
    record[2] = MESSAGE_SUBTYPE;
    record[LABEL_OFFSET..LABEL_OFFSET + LABEL.len()].copy_from_slice(LABEL);
    record[PAYLOAD_OFFSET..PAYLOAD_OFFSET + payload.len()].copy_from_slice(payload);
    record
}

/// Wrap an encoded payload and its checksum in the `!CPC` envelope.
pub fn wrap(encoded: &str, crc: u32) -> String {
    format!("{PREFIX}{:04x}{encoded}{crc:08x}\n", encoded.len())
}

/// Build both envelopes for `text`, in send order.
///
/// The first carries the CRC-32 of the base64 text, the second the CRC-32 of
/// the raw record bytes. The base64 payload is identical in both.
pub fn build_envelopes(text: &str) -> [String; 2] {
    let record = build_record(text);
    let encoded = STANDARD.encode(&record);
    let over_encoded = crc32fast::hash(encoded.as_bytes());
    let over_record = crc32fast::hash(&record);
    [wrap(&encoded, over_encoded), wrap(&encoded, over_record)]
}
