use conduit_dns_domain::{Endpoint, EndpointAddr, TransportKind};
use conduit_dns_infrastructure::dns::codec;
use conduit_dns_infrastructure::dns::transport::{read_chunk, write_chunk};
use hickory_proto::op::{Message, MessageType, ResponseCode};
use hickory_proto::rr::{Name, Record, RecordType};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::net::{TcpListener, UdpSocket};
use tokio_util::sync::CancellationToken;

pub enum Reply {
    Message(Message),
    Raw(Vec<u8>),
    Nothing,
}

pub type Responder = Arc<dyn Fn(&Message, TransportKind) -> Reply + Send + Sync>;

type QueryLog = Arc<Mutex<Vec<(Name, RecordType, TransportKind)>>>;

pub fn responder<F>(f: F) -> Responder
where
    F: Fn(&Message, TransportKind) -> Reply + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Upstream nameserver on loopback, listening on UDP and TCP.
pub struct MockUpstream {
    udp: SocketAddr,
    tcp: SocketAddr,
    log: QueryLog,
    cancel: CancellationToken,
}

impl MockUpstream {
    pub async fn start(responder: Responder) -> Self {
        let udp_socket = Arc::new(UdpSocket::bind("127.0.0.1:0").await.unwrap());
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let udp = udp_socket.local_addr().unwrap();
        let tcp = listener.local_addr().unwrap();
        let log: QueryLog = Arc::default();
        let cancel = CancellationToken::new();

        tokio::spawn(serve_udp(
            udp_socket,
            responder.clone(),
            log.clone(),
            cancel.clone(),
        ));
        tokio::spawn(serve_tcp(listener, responder, log.clone(), cancel.clone()));

        Self {
            udp,
            tcp,
            log,
            cancel,
        }
    }

    /// Answers from `records`; CNAMEs are returned for any type of their owner.
    pub async fn zone(records: Vec<Record>) -> Self {
        Self::start(zone_responder(records)).await
    }

    pub async fn garbage() -> Self {
        Self::start(responder(|_, _| Reply::Raw(vec![0xDE, 0xAD, 0xBE]))).await
    }

    pub async fn silent() -> Self {
        Self::start(responder(|_, _| Reply::Nothing)).await
    }

    /// Sets TC on every UDP reply; TCP replies are complete.
    pub async fn truncating_udp(records: Vec<Record>) -> Self {
        let zone = zone_responder(records);
        Self::start(responder(move |query, kind| match zone(query, kind) {
            Reply::Message(mut message) if kind == TransportKind::Datagram => {
                message.take_answers();
                message.set_truncated(true);
                Reply::Message(message)
            }
            other => other,
        }))
        .await
    }

    pub async fn wrong_id(records: Vec<Record>) -> Self {
        let zone = zone_responder(records);
        Self::start(responder(move |query, kind| match zone(query, kind) {
            Reply::Message(mut message) => {
                message.set_id(message.id().wrapping_add(1));
                Reply::Message(message)
            }
            other => other,
        }))
        .await
    }

    pub fn udp_endpoint(&self) -> EndpointAddr {
        EndpointAddr::udp(self.udp)
    }

    pub fn tcp_endpoint(&self) -> EndpointAddr {
        EndpointAddr::tcp(self.tcp)
    }

    /// UDP then TCP.
    pub fn endpoint(&self) -> Endpoint {
        Endpoint::new(vec![self.udp_endpoint(), self.tcp_endpoint()])
    }

    pub fn queries(&self) -> Vec<(Name, RecordType, TransportKind)> {
        self.log.lock().unwrap().clone()
    }

    pub fn count(&self, name: &str, record_type: RecordType) -> usize {
        let wanted = name.trim_end_matches('.').to_ascii_lowercase();
        self.queries()
            .iter()
            .filter(|(n, t, _)| {
                *t == record_type
                    && n.to_string().trim_end_matches('.').to_ascii_lowercase() == wanted
            })
            .count()
    }

    pub fn total(&self) -> usize {
        self.log.lock().unwrap().len()
    }
}

impl Drop for MockUpstream {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

fn zone_responder(records: Vec<Record>) -> Responder {
    responder(move |query, _| {
        let mut response = Message::new();
        response.set_id(query.id());
        response.set_message_type(MessageType::Response);
        response.set_op_code(query.op_code());
        response.set_recursion_desired(query.recursion_desired());
        response.set_recursion_available(true);
        response.add_queries(query.queries().to_vec());

        let mut found = false;
        for question in query.queries() {
            for record in &records {
                if record.name() == question.name()
                    && (record.record_type() == question.query_type()
                        || record.record_type() == RecordType::CNAME)
                {
                    response.add_answer(record.clone());
                    found = true;
                }
            }
        }
        if !found {
            response.set_response_code(ResponseCode::NXDomain);
        }
        Reply::Message(response)
    })
}

fn log_query(log: &QueryLog, query: &Message, kind: TransportKind) {
    let mut log = log.lock().unwrap();
    for question in query.queries() {
        log.push((question.name().clone(), question.query_type(), kind));
    }
}

async fn serve_udp(
    socket: Arc<UdpSocket>,
    responder: Responder,
    log: QueryLog,
    cancel: CancellationToken,
) {
    let mut buf = vec![0u8; 65536];
    loop {
        let (len, peer) = tokio::select! {
            _ = cancel.cancelled() => break,
            result = socket.recv_from(&mut buf) => match result {
                Ok(received) => received,
                Err(_) => continue,
            },
        };

        let Ok(query) = codec::decode(&buf[..len]) else {
            continue;
        };
        log_query(&log, &query, TransportKind::Datagram);

        match responder(&query, TransportKind::Datagram) {
            Reply::Message(message) => {
                let bytes = codec::encode(&message).unwrap();
                let _ = socket.send_to(&bytes, peer).await;
            }
            Reply::Raw(bytes) => {
                let _ = socket.send_to(&bytes, peer).await;
            }
            Reply::Nothing => {}
        }
    }
}

async fn serve_tcp(
    listener: TcpListener,
    responder: Responder,
    log: QueryLog,
    cancel: CancellationToken,
) {
    loop {
        let (mut stream, _) = tokio::select! {
            _ = cancel.cancelled() => break,
            result = listener.accept() => match result {
                Ok(accepted) => accepted,
                Err(_) => continue,
            },
        };

        let responder = responder.clone();
        let log = log.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move {
            while let Ok(Some(packet)) = read_chunk(&mut stream).await {
                let Ok(query) = codec::decode(&packet) else {
                    break;
                };
                log_query(&log, &query, TransportKind::Stream);

                let bytes = match responder(&query, TransportKind::Stream) {
                    Reply::Message(message) => codec::encode(&message).unwrap(),
                    Reply::Raw(bytes) => bytes,
                    Reply::Nothing => {
                        cancel.cancelled().await;
                        break;
                    }
                };
                if write_chunk(&mut stream, &bytes).await.is_err() {
                    break;
                }
            }
        });
    }
}
