//! conduit-dns infrastructure layer
pub mod dns;
pub mod system;
