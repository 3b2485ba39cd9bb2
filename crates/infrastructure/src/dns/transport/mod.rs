//! Datagram and stream transports.
//!
//! Streams carry each message behind a 2-byte big-endian length prefix;
//! datagrams carry exactly one message each.

mod connection;
pub mod lookup;
pub mod tcp;
pub mod udp;

pub use connection::{socket_kind, Connection};
pub use tcp::{read_chunk, write_chunk};

/// Conservative datagram size; larger client queries skip UDP endpoints.
pub const UDP_TRUNCATION_SIZE: usize = 512;

/// Receive buffer for any single datagram.
pub const UDP_MAX_SIZE: usize = 65536;

/// Largest payload a 16-bit length prefix can describe.
pub const MAX_CHUNK_SIZE: usize = u16::MAX as usize;
