//! conduit-dns domain layer
pub mod config;
pub mod endpoint;
pub mod errors;
pub mod message;
pub mod name;
pub mod rcode;

pub use config::{CliOverrides, Config, ConfigError, LoggingConfig, ResolverConfig, ServerConfig};
pub use endpoint::{Endpoint, EndpointAddr, HostAddr, TransportKind, DEFAULT_PORT};
pub use errors::{DomainError, OriginError};
pub use message::{chunked, merge_message, DEFAULT_TTL, MAX_CHARACTER_STRING};
pub use name::{dot_count, parse_name, NameOriginExt};
pub use rcode::{parse_rcode, rcode_from_value, MAX_HEADER_RCODE};
