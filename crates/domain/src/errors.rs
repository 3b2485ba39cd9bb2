use std::io;
use thiserror::Error;

/// A question name that does not fall under the configured origin.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{name} does not end with {origin}")]
pub struct OriginError {
    pub name: String,
    pub origin: String,
}

#[derive(Error, Debug, Clone)]
pub enum DomainError {
    #[error("Could not decode DNS message: {0}")]
    Decode(String),

    #[error("Could not encode DNS message: {0}")]
    Encode(String),

    #[error("Resolution failure: {0}")]
    ResolutionFailure(String),

    #[error("Invalid protocol for {0}: socket is neither datagram nor stream")]
    InvalidProtocol(String),

    #[error(transparent)]
    Origin(#[from] OriginError),

    #[error("Invalid domain name: {0}")]
    InvalidName(String),

    #[error("Invalid response code: {0}")]
    InvalidRcode(String),

    #[error("Invalid record data: {0}")]
    InvalidRecordData(String),

    #[error("Transport timeout talking to {server}")]
    TransportTimeout { server: String },

    #[error("Transport connection reset by {server}")]
    TransportConnectionReset { server: String },

    #[error("Transport broken pipe to {server}")]
    TransportBrokenPipe { server: String },

    #[error("Transport closed prematurely by {server}")]
    TransportEof { server: String },

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl DomainError {
    /// Faults that only affect the attempt that raised them.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            DomainError::TransportTimeout { .. }
                | DomainError::TransportConnectionReset { .. }
                | DomainError::TransportBrokenPipe { .. }
                | DomainError::TransportEof { .. }
                | DomainError::Io(_)
                | DomainError::Decode(_)
        )
    }

    /// Maps an I/O error raised while talking to `server` onto the transport taxonomy.
    pub fn from_io(error: io::Error, server: impl Into<String>) -> Self {
        let server = server.into();
        match error.kind() {
            io::ErrorKind::UnexpectedEof => DomainError::TransportEof { server },
            io::ErrorKind::ConnectionReset | io::ErrorKind::ConnectionAborted => {
                DomainError::TransportConnectionReset { server }
            }
            io::ErrorKind::BrokenPipe => DomainError::TransportBrokenPipe { server },
            io::ErrorKind::TimedOut => DomainError::TransportTimeout { server },
            _ => DomainError::Io(format!("{}: {}", server, error)),
        }
    }
}

impl From<io::Error> for DomainError {
    fn from(error: io::Error) -> Self {
        DomainError::from_io(error, "peer")
    }
}
