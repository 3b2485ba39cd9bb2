//! Wire codec boundary around `hickory-proto`.
//!
//! Every decode failure surfaces as `DomainError::Decode` so callers can treat
//! malformed packets like any other per-attempt transport fault.

use conduit_dns_domain::DomainError;
use hickory_proto::op::Message;
use hickory_proto::serialize::binary::{BinEncodable, BinEncoder};

pub fn encode(message: &Message) -> Result<Vec<u8>, DomainError> {
    let mut buf = Vec::with_capacity(512);
    let mut encoder = BinEncoder::new(&mut buf);

    message
        .emit(&mut encoder)
        .map_err(|e| DomainError::Encode(e.to_string()))?;

    Ok(buf)
}

pub fn decode(bytes: &[u8]) -> Result<Message, DomainError> {
    Message::from_vec(bytes).map_err(|e| DomainError::Decode(e.to_string()))
}

/// Reads the message id from a packet that may not decode.
pub fn peek_id(bytes: &[u8]) -> Option<u16> {
    match bytes {
        [hi, lo, ..] => Some(u16::from_be_bytes([*hi, *lo])),
        _ => None,
    }
}
