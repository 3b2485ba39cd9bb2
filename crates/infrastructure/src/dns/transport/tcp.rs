//! Length-prefixed stream framing (RFC 1035 §4.2.2).

use conduit_dns_domain::DomainError;
use std::io;
use std::net::SocketAddr;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::debug;

use super::MAX_CHUNK_SIZE;

/// Writes one framed message and flushes.
pub async fn write_chunk<S>(stream: &mut S, payload: &[u8]) -> io::Result<()>
where
    S: AsyncWrite + Unpin,
{
    if payload.len() > MAX_CHUNK_SIZE {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!(
                "payload of {} bytes exceeds {}",
                payload.len(),
                MAX_CHUNK_SIZE
            ),
        ));
    }

    let mut frame = Vec::with_capacity(payload.len() + 2);
    frame.extend_from_slice(&(payload.len() as u16).to_be_bytes());
    frame.extend_from_slice(payload);

    stream.write_all(&frame).await?;
    stream.flush().await
}

/// Reads one framed message.
///
/// `Ok(None)` when the peer closed before sending any byte of a prefix;
/// `UnexpectedEof` when it closed mid-prefix or mid-payload.
pub async fn read_chunk<S>(stream: &mut S) -> io::Result<Option<Vec<u8>>>
where
    S: AsyncRead + Unpin,
{
    let mut prefix = [0u8; 2];
    if stream.read(&mut prefix[..1]).await? == 0 {
        return Ok(None);
    }
    stream.read_exact(&mut prefix[1..]).await?;

    let mut payload = vec![0u8; u16::from_be_bytes(prefix) as usize];
    stream.read_exact(&mut payload).await?;
    Ok(Some(payload))
}

pub async fn connect(peer: SocketAddr) -> Result<TcpStream, DomainError> {
    let stream = TcpStream::connect(peer)
        .await
        .map_err(|e| DomainError::from_io(e, peer.to_string()))?;
    stream
        .set_nodelay(true)
        .map_err(|e| DomainError::from_io(e, peer.to_string()))?;
    Ok(stream)
}

/// Writes one framed query and reads one framed response.
pub async fn exchange(
    stream: &mut TcpStream,
    peer: SocketAddr,
    packet: &[u8],
) -> Result<Vec<u8>, DomainError> {
    write_chunk(stream, packet)
        .await
        .map_err(|e| DomainError::from_io(e, peer.to_string()))?;

    let response = read_chunk(stream)
        .await
        .map_err(|e| DomainError::from_io(e, peer.to_string()))?
        .ok_or_else(|| DomainError::TransportEof {
            server: peer.to_string(),
        })?;

    debug!(server = %peer, request_len = packet.len(), response_len = response.len(), "TCP exchange complete");
    Ok(response)
}
