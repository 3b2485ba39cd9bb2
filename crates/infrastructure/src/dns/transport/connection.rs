use conduit_dns_domain::{DomainError, EndpointAddr, TransportKind};
use socket2::{SockRef, Type};
use std::net::SocketAddr;
use tokio::net::{TcpStream, UdpSocket};

use super::{lookup, tcp, udp};

/// A connected socket to one candidate endpoint, scoped to a single attempt.
///
/// Dropping it closes the socket.
#[derive(Debug)]
pub enum Connection {
    Datagram { socket: UdpSocket, peer: SocketAddr },
    Stream { stream: TcpStream, peer: SocketAddr },
}

impl Connection {
    pub async fn open(endpoint: &EndpointAddr) -> Result<Self, DomainError> {
        let peer = lookup::resolve_host(&endpoint.addr).await?;

        let connection = match endpoint.kind {
            TransportKind::Datagram => Connection::Datagram {
                socket: udp::connect(peer).await?,
                peer,
            },
            TransportKind::Stream => Connection::Stream {
                stream: tcp::connect(peer).await?,
                peer,
            },
        };
        Ok(connection)
    }

    pub fn peer(&self) -> SocketAddr {
        match self {
            Connection::Datagram { peer, .. } | Connection::Stream { peer, .. } => *peer,
        }
    }

    /// Transport kind as reported by the socket itself.
    pub fn kind(&self) -> Result<TransportKind, DomainError> {
        let peer = self.peer().to_string();
        match self {
            Connection::Datagram { socket, .. } => socket_kind(SockRef::from(socket), &peer),
            Connection::Stream { stream, .. } => socket_kind(SockRef::from(stream), &peer),
        }
    }

    /// Sends `packet` and returns the raw reply, framed according to the socket kind.
    pub async fn exchange(&mut self, packet: &[u8]) -> Result<Vec<u8>, DomainError> {
        let kind = self.kind()?;
        match (kind, self) {
            (TransportKind::Datagram, Connection::Datagram { socket, peer }) => {
                udp::exchange(socket, *peer, packet).await
            }
            (TransportKind::Stream, Connection::Stream { stream, peer }) => {
                tcp::exchange(stream, *peer, packet).await
            }
            (_, connection) => Err(DomainError::InvalidProtocol(connection.peer().to_string())),
        }
    }
}

/// Maps `SO_TYPE` onto datagram/stream; anything else is `InvalidProtocol`.
pub fn socket_kind(socket: SockRef<'_>, peer: &str) -> Result<TransportKind, DomainError> {
    let socket_type = socket
        .r#type()
        .map_err(|e| DomainError::from_io(e, peer))?;

    if socket_type == Type::DGRAM {
        Ok(TransportKind::Datagram)
    } else if socket_type == Type::STREAM {
        Ok(TransportKind::Stream)
    } else {
        Err(DomainError::InvalidProtocol(peer.to_string()))
    }
}
