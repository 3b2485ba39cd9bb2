//! Raw datagram exchange (RFC 1035 §4.2.1). No framing; one message per datagram.

use conduit_dns_domain::DomainError;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use tokio::net::UdpSocket;
use tracing::{debug, warn};

use super::UDP_MAX_SIZE;

/// Binds an ephemeral socket of the peer's family and connects it.
pub async fn connect(peer: SocketAddr) -> Result<UdpSocket, DomainError> {
    let bind_addr: SocketAddr = if peer.is_ipv4() {
        (Ipv4Addr::UNSPECIFIED, 0).into()
    } else {
        (Ipv6Addr::UNSPECIFIED, 0).into()
    };

    let socket = UdpSocket::bind(bind_addr)
        .await
        .map_err(|e| DomainError::from_io(e, peer.to_string()))?;
    socket
        .connect(peer)
        .await
        .map_err(|e| DomainError::from_io(e, peer.to_string()))?;
    Ok(socket)
}

/// Sends one datagram and waits for exactly one in return.
pub async fn exchange(
    socket: &UdpSocket,
    peer: SocketAddr,
    packet: &[u8],
) -> Result<Vec<u8>, DomainError> {
    let bytes_sent = socket
        .send(packet)
        .await
        .map_err(|e| DomainError::from_io(e, peer.to_string()))?;

    if bytes_sent != packet.len() {
        warn!(server = %peer, bytes_sent, expected = packet.len(), "Short UDP send");
    }

    let mut recv_buf = vec![0u8; UDP_MAX_SIZE];
    let bytes_received = socket
        .recv(&mut recv_buf)
        .await
        .map_err(|e| DomainError::from_io(e, peer.to_string()))?;
    recv_buf.truncate(bytes_received);

    debug!(server = %peer, bytes_sent, bytes_received, "UDP exchange complete");
    Ok(recv_buf)
}
