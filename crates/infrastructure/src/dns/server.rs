use conduit_dns_application::ports::QueryProcessor;
use conduit_dns_application::use_cases::Transaction;
use conduit_dns_domain::{
    parse_name, DomainError, Endpoint, EndpointAddr, NameOriginExt, ServerConfig, TransportKind,
};
use hickory_proto::op::{Message, MessageType, ResponseCode};
use hickory_proto::rr::Name;
use socket2::{Domain, Protocol, SockRef, Socket, Type};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, UdpSocket};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::handler;
use super::transport::{lookup, socket_kind, UDP_TRUNCATION_SIZE};

pub const DEFAULT_TCP_IDLE_TIMEOUT: Duration = Duration::from_secs(10);

/// Multiplexed UDP/TCP server that hands every question to a `QueryProcessor`.
pub struct DnsServer {
    listen: Endpoint,
    processor: Arc<dyn QueryProcessor>,
    origin: Name,
    udp_reasonable_size: usize,
    tcp_idle_timeout: Duration,
}

impl DnsServer {
    pub fn new(listen: Endpoint, processor: Arc<dyn QueryProcessor>) -> Self {
        Self {
            listen,
            processor,
            origin: Name::root(),
            udp_reasonable_size: UDP_TRUNCATION_SIZE,
            tcp_idle_timeout: DEFAULT_TCP_IDLE_TIMEOUT,
        }
    }

    /// Only questions under `origin` are processed.
    pub fn with_origin(mut self, origin: Name) -> Self {
        self.origin = origin.to_absolute();
        self
    }

    pub fn with_udp_reasonable_size(mut self, size: usize) -> Self {
        self.udp_reasonable_size = size;
        self
    }

    /// How long a stream connection may wait for its next request.
    pub fn with_tcp_idle_timeout(mut self, timeout: Duration) -> Self {
        self.tcp_idle_timeout = timeout;
        self
    }

    pub fn from_config(
        config: &ServerConfig,
        processor: Arc<dyn QueryProcessor>,
    ) -> Result<Self, DomainError> {
        let listen = Endpoint::parse_all(&config.listen)?;
        let origin = parse_name(&config.origin)?;
        Ok(Self::new(listen, processor)
            .with_origin(origin)
            .with_udp_reasonable_size(config.udp_reasonable_size)
            .with_tcp_idle_timeout(Duration::from_millis(config.tcp_idle_timeout_ms)))
    }

    pub fn origin(&self) -> &Name {
        &self.origin
    }

    pub fn udp_reasonable_size(&self) -> usize {
        self.udp_reasonable_size
    }

    pub fn tcp_idle_timeout(&self) -> Duration {
        self.tcp_idle_timeout
    }

    pub fn listen(&self) -> &Endpoint {
        &self.listen
    }

    /// Runs one transaction per question and aggregates the response.
    ///
    /// Questions outside the origin are skipped. A processor error turns the
    /// whole response into ServFail.
    pub async fn process_query(&self, query: &Message) -> Message {
        let mut response = Message::new();
        response.set_id(query.id());
        response.set_message_type(MessageType::Response);
        response.set_op_code(query.op_code());
        response.set_authoritative(true);
        response.set_recursion_desired(query.recursion_desired());
        response.set_recursion_available(false);
        response.set_response_code(ResponseCode::NoError);

        let mut failure = None;

        for question in query.queries() {
            let name = match question.name().without_origin(&self.origin) {
                Ok(name) => name,
                Err(e) => {
                    debug!(id = query.id(), error = %e, "Skipping question outside origin");
                    continue;
                }
            };

            debug!(id = query.id(), name = %question.name(), record_type = %question.query_type(), "Processing question");

            let outcome = match Transaction::new(
                self.processor.as_ref(),
                query,
                &mut response,
                name,
                question.query_type(),
                &self.origin,
            ) {
                Ok(mut transaction) => transaction.run().await,
                Err(e) => Err(e),
            };

            if let Err(e) = outcome {
                failure = Some(e);
                break;
            }
        }

        if let Some(e) = failure {
            error!(id = query.id(), error = %e, "Failed to process query");
            response.set_response_code(ResponseCode::ServFail);
        }

        response
    }

    /// Binds every listen address and starts its listener loop.
    pub async fn bind(self: Arc<Self>) -> Result<ServerHandle, DomainError> {
        let cancel = CancellationToken::new();
        let mut tasks = JoinSet::new();
        let mut local_addrs = Vec::with_capacity(self.listen.len());

        for endpoint in self.listen.iter() {
            let addr = lookup::resolve_host(&endpoint.addr).await?;

            let socket = create_socket(endpoint.kind, addr)
                .map_err(|e| DomainError::from_io(e, endpoint.to_string()))?;
            let bound = socket
                .local_addr()
                .ok()
                .and_then(|a| a.as_socket())
                .unwrap_or(addr);

            match socket_kind(SockRef::from(&socket), &endpoint.to_string())? {
                TransportKind::Datagram => {
                    let std_socket: std::net::UdpSocket = socket.into();
                    let udp = UdpSocket::from_std(std_socket)
                        .map_err(|e| DomainError::from_io(e, endpoint.to_string()))?;
                    tasks.spawn(handler::run_datagram_listener(
                        Arc::clone(&self),
                        Arc::new(udp),
                        cancel.child_token(),
                    ));
                    local_addrs.push(EndpointAddr::udp(bound));
                }
                TransportKind::Stream => {
                    let std_listener: std::net::TcpListener = socket.into();
                    let listener = TcpListener::from_std(std_listener)
                        .map_err(|e| DomainError::from_io(e, endpoint.to_string()))?;
                    tasks.spawn(handler::run_stream_listener(
                        Arc::clone(&self),
                        listener,
                        cancel.child_token(),
                    ));
                    local_addrs.push(EndpointAddr::tcp(bound));
                }
            }

            info!(endpoint = %endpoint, bound = %bound, "DNS server listening");
        }

        Ok(ServerHandle {
            local_addrs,
            cancel,
            tasks,
        })
    }

    /// Binds and serves until every listener stops.
    pub async fn run(self: Arc<Self>) -> Result<(), DomainError> {
        self.bind().await?.join().await;
        Ok(())
    }
}

fn create_socket(kind: TransportKind, addr: SocketAddr) -> std::io::Result<Socket> {
    let domain = if addr.is_ipv4() {
        Domain::IPV4
    } else {
        Domain::IPV6
    };

    let socket = match kind {
        TransportKind::Datagram => Socket::new(domain, Type::DGRAM, Some(Protocol::UDP))?,
        TransportKind::Stream => Socket::new(domain, Type::STREAM, Some(Protocol::TCP))?,
    };
    if addr.is_ipv6() {
        socket.set_only_v6(false)?;
    }
    socket.set_reuse_address(true)?;
    socket.bind(&addr.into())?;
    if kind == TransportKind::Stream {
        socket.listen(1024)?;
    }
    socket.set_nonblocking(true)?;
    Ok(socket)
}

/// Running listeners of a bound server. Dropping it aborts them.
pub struct ServerHandle {
    local_addrs: Vec<EndpointAddr>,
    cancel: CancellationToken,
    tasks: JoinSet<()>,
}

impl ServerHandle {
    /// The addresses actually bound, in listen order.
    pub fn local_addrs(&self) -> &[EndpointAddr] {
        &self.local_addrs
    }

    /// First bound address of the given kind.
    pub fn local_addr(&self, kind: TransportKind) -> Option<SocketAddr> {
        self.local_addrs
            .iter()
            .find(|addr| addr.kind == kind)
            .and_then(|addr| addr.addr.socket_addr())
    }

    /// Makes every listener loop return; requests in flight are not awaited.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    pub async fn join(mut self) {
        while let Some(result) = self.tasks.join_next().await {
            if let Err(e) = result {
                warn!(error = %e, "Listener task ended abnormally");
            }
        }
    }

    pub async fn shutdown(self) {
        self.stop();
        self.join().await;
    }
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
