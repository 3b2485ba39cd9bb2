//! Listener loops and per-request glue.
//!
//! Every failure here is contained to the datagram or connection that caused
//! it; listeners only stop when cancelled.

use conduit_dns_domain::DomainError;
use futures::FutureExt;
use hickory_proto::op::{Message, MessageType, OpCode, ResponseCode};
use std::net::SocketAddr;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream, UdpSocket};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use super::codec;
use super::server::DnsServer;
use super::transport::{read_chunk, write_chunk, MAX_CHUNK_SIZE, UDP_MAX_SIZE};

/// Decodes and processes one raw query.
///
/// Undecodable input and a panicking processor both yield ServFail.
pub async fn process_raw(server: &DnsServer, bytes: &[u8]) -> Message {
    match codec::decode(bytes) {
        Ok(query) => match AssertUnwindSafe(server.process_query(&query))
            .catch_unwind()
            .await
        {
            Ok(response) => response,
            Err(_) => {
                error!(id = query.id(), "Query processor panicked");
                error_response(query.id(), query.op_code(), ResponseCode::ServFail)
            }
        },
        Err(e) => {
            let id = codec::peek_id(bytes).unwrap_or(0);
            warn!(id, error = %e, "Could not decode query");
            error_response(id, OpCode::Query, ResponseCode::ServFail)
        }
    }
}

pub fn error_response(id: u16, op_code: OpCode, rcode: ResponseCode) -> Message {
    let mut response = Message::new();
    response.set_id(id);
    response.set_message_type(MessageType::Response);
    response.set_op_code(op_code);
    response.set_response_code(rcode);
    response
}

/// Empty reply with only TC set, telling the client to retry over TCP.
pub fn truncation_response(response: &Message) -> Message {
    let mut truncated = Message::new();
    truncated.set_id(response.id());
    truncated.set_message_type(MessageType::Response);
    truncated.set_op_code(response.op_code());
    truncated.set_truncated(true);
    truncated
}

/// Encodes `response`, falling back to a bare ServFail when it cannot be
/// encoded or exceeds `limit`.
fn encode_within(response: &Message, limit: usize) -> Option<Vec<u8>> {
    let fallback = |reason: &dyn std::fmt::Display| {
        warn!(id = response.id(), error = %reason, "Replacing unencodable response with ServFail");
        codec::encode(&error_response(
            response.id(),
            response.op_code(),
            ResponseCode::ServFail,
        ))
        .ok()
    };

    match codec::encode(response) {
        Ok(bytes) if bytes.len() <= limit => Some(bytes),
        Ok(bytes) => fallback(&format!("{} bytes exceeds {}", bytes.len(), limit)),
        Err(e) => fallback(&e),
    }
}

/// Encodes a datagram reply, substituting a truncation response when it is
/// above the reasonable size.
pub fn datagram_reply(response: &Message, reasonable_size: usize) -> Option<Vec<u8>> {
    let bytes = encode_within(response, UDP_MAX_SIZE)?;
    if bytes.len() <= reasonable_size {
        return Some(bytes);
    }

    debug!(
        id = response.id(),
        size = bytes.len(),
        limit = reasonable_size,
        "Response too large for UDP, sending truncation"
    );
    codec::encode(&truncation_response(response)).ok()
}

pub async fn run_datagram_listener(
    server: Arc<DnsServer>,
    socket: Arc<UdpSocket>,
    cancel: CancellationToken,
) {
    let mut recv_buf = vec![0u8; UDP_MAX_SIZE];

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            result = socket.recv_from(&mut recv_buf) => match result {
                Ok((len, peer)) => {
                    let packet = recv_buf[..len].to_vec();
                    let server = Arc::clone(&server);
                    let socket = Arc::clone(&socket);
                    tokio::spawn(async move {
                        respond_datagram(&server, &socket, &packet, peer).await;
                    });
                }
                Err(e) => {
                    warn!(error = %e, "UDP receive failed");
                }
            }
        }
    }

    debug!("Datagram listener stopped");
}

async fn respond_datagram(server: &DnsServer, socket: &UdpSocket, packet: &[u8], peer: SocketAddr) {
    let response = process_raw(server, packet).await;

    let Some(bytes) = datagram_reply(&response, server.udp_reasonable_size()) else {
        return;
    };

    if let Err(e) = socket.send_to(&bytes, peer).await {
        warn!(id = response.id(), client = %peer, error = %e, "UDP send failed");
    }
}

pub async fn run_stream_listener(
    server: Arc<DnsServer>,
    listener: TcpListener,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            result = listener.accept() => match result {
                Ok((stream, peer)) => {
                    tokio::spawn(handle_connection(
                        Arc::clone(&server),
                        stream,
                        peer,
                        cancel.child_token(),
                    ));
                }
                Err(e) => {
                    warn!(error = %e, "TCP accept failed");
                }
            }
        }
    }

    debug!("Stream listener stopped");
}

/// Strict request/response alternation until the client closes.
pub async fn handle_connection(
    server: Arc<DnsServer>,
    mut stream: TcpStream,
    peer: SocketAddr,
    cancel: CancellationToken,
) {
    loop {
        let request = tokio::select! {
            _ = cancel.cancelled() => break,
            request = tokio::time::timeout(server.tcp_idle_timeout(), read_chunk(&mut stream)) => request,
        };

        let Ok(request) = request else {
            debug!(client = %peer, "Closing idle connection");
            break;
        };

        let packet = match request {
            Ok(Some(packet)) => packet,
            Ok(None) => break,
            Err(e) => {
                let e = DomainError::from_io(e, peer.to_string());
                debug!(client = %peer, error = %e, "Connection closed with error");
                break;
            }
        };

        let response = process_raw(&server, &packet).await;
        let Some(bytes) = encode_within(&response, MAX_CHUNK_SIZE) else {
            break;
        };

        if let Err(e) = write_chunk(&mut stream, &bytes).await {
            let e = DomainError::from_io(e, peer.to_string());
            debug!(id = response.id(), client = %peer, error = %e, "TCP write failed");
            break;
        }
    }

    debug!(client = %peer, "Connection finished");
}
