use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::sync::Arc;

use crate::errors::DomainError;

pub const DEFAULT_PORT: u16 = 53;

/// Socket semantics of one connectable sub-endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportKind {
    Datagram,
    Stream,
}

impl TransportKind {
    pub fn scheme(&self) -> &'static str {
        match self {
            TransportKind::Datagram => "udp",
            TransportKind::Stream => "tcp",
        }
    }
}

/// A host that may or may not be resolved to an IP yet.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum HostAddr {
    Resolved(SocketAddr),
    Unresolved { hostname: Arc<str>, port: u16 },
}

impl HostAddr {
    pub fn socket_addr(&self) -> Option<SocketAddr> {
        match self {
            HostAddr::Resolved(addr) => Some(*addr),
            HostAddr::Unresolved { .. } => None,
        }
    }

    pub fn port(&self) -> u16 {
        match self {
            HostAddr::Resolved(addr) => addr.port(),
            HostAddr::Unresolved { port, .. } => *port,
        }
    }

    pub fn is_unresolved(&self) -> bool {
        matches!(self, HostAddr::Unresolved { .. })
    }

    fn from_host(host: &str, port: u16) -> Self {
        match host.parse::<IpAddr>() {
            Ok(ip) => HostAddr::Resolved(SocketAddr::new(ip, port)),
            Err(_) => HostAddr::Unresolved {
                hostname: host.into(),
                port,
            },
        }
    }
}

impl fmt::Display for HostAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostAddr::Resolved(addr) => write!(f, "{}", addr),
            HostAddr::Unresolved { hostname, port } => write!(f, "{}:{}", hostname, port),
        }
    }
}

/// One (transport kind, host, port) triple.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EndpointAddr {
    pub kind: TransportKind,
    pub addr: HostAddr,
}

impl EndpointAddr {
    pub fn udp(addr: SocketAddr) -> Self {
        Self {
            kind: TransportKind::Datagram,
            addr: HostAddr::Resolved(addr),
        }
    }

    pub fn tcp(addr: SocketAddr) -> Self {
        Self {
            kind: TransportKind::Stream,
            addr: HostAddr::Resolved(addr),
        }
    }

    pub fn is_datagram(&self) -> bool {
        self.kind == TransportKind::Datagram
    }
}

impl fmt::Display for EndpointAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}", self.kind.scheme(), self.addr)
    }
}

impl FromStr for EndpointAddr {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, rest) = if let Some(rest) = s.strip_prefix("udp://") {
            (TransportKind::Datagram, rest)
        } else if let Some(rest) = s.strip_prefix("tcp://") {
            (TransportKind::Stream, rest)
        } else {
            return Err(DomainError::ConfigError(format!(
                "Invalid endpoint '{}'. Expected udp://HOST:PORT or tcp://HOST:PORT",
                s
            )));
        };

        let addr = parse_host_addr(rest)
            .ok_or_else(|| DomainError::ConfigError(format!("Invalid address '{}'", rest)))?;
        Ok(Self { kind, addr })
    }
}

fn parse_host_port(s: &str) -> Option<(&str, u16)> {
    if s.starts_with('[') {
        let end = s.find(']')?;
        let host = &s[1..end];
        let port = s[end + 1..].strip_prefix(':')?.parse::<u16>().ok()?;
        Some((host, port))
    } else {
        let (host, port_str) = s.rsplit_once(':')?;
        if host.is_empty() || host.contains(':') {
            return None;
        }
        Some((host, port_str.parse::<u16>().ok()?))
    }
}

fn parse_host_addr(s: &str) -> Option<HostAddr> {
    if let Ok(addr) = s.parse::<SocketAddr>() {
        return Some(HostAddr::Resolved(addr));
    }
    let (host, port) = parse_host_port(s)?;
    Some(HostAddr::from_host(host, port))
}

/// Ordered list of candidate sub-endpoints, tried front to back.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Endpoint {
    addrs: Vec<EndpointAddr>,
}

impl Endpoint {
    pub fn new(addrs: Vec<EndpointAddr>) -> Self {
        Self { addrs }
    }

    /// UDP then TCP for every host, in the given order.
    pub fn for_nameservers<S: AsRef<str>>(hosts: &[S], port: u16) -> Self {
        let addrs = hosts
            .iter()
            .flat_map(|host| {
                let addr = HostAddr::from_host(host.as_ref(), port);
                [
                    EndpointAddr {
                        kind: TransportKind::Datagram,
                        addr: addr.clone(),
                    },
                    EndpointAddr {
                        kind: TransportKind::Stream,
                        addr,
                    },
                ]
            })
            .collect();
        Self { addrs }
    }

    /// Parses endpoint strings; a bare `host:port` contributes UDP then TCP.
    pub fn parse_all<S: AsRef<str>>(specs: &[S]) -> Result<Self, DomainError> {
        let mut addrs = Vec::with_capacity(specs.len() * 2);
        for spec in specs {
            addrs.extend(spec.as_ref().parse::<Endpoint>()?.addrs);
        }
        Ok(Self { addrs })
    }

    pub fn push(&mut self, addr: EndpointAddr) {
        self.addrs.push(addr);
    }

    pub fn iter(&self) -> impl Iterator<Item = &EndpointAddr> {
        self.addrs.iter()
    }

    pub fn addrs(&self) -> &[EndpointAddr] {
        &self.addrs
    }

    pub fn len(&self) -> usize {
        self.addrs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.addrs.is_empty()
    }
}

impl FromStr for Endpoint {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.starts_with("udp://") || s.starts_with("tcp://") {
            return Ok(Self::new(vec![s.parse()?]));
        }

        let addr = parse_host_addr(s).or_else(|| {
            s.parse::<IpAddr>()
                .ok()
                .map(|ip| HostAddr::Resolved(SocketAddr::new(ip, DEFAULT_PORT)))
        });
        let addr = addr.ok_or_else(|| {
            DomainError::ConfigError(format!(
                "Invalid endpoint '{}'. Expected udp://HOST:PORT, tcp://HOST:PORT or HOST:PORT",
                s
            ))
        })?;

        Ok(Self::new(vec![
            EndpointAddr {
                kind: TransportKind::Datagram,
                addr: addr.clone(),
            },
            EndpointAddr {
                kind: TransportKind::Stream,
                addr,
            },
        ]))
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.addrs.iter().map(|a| a.to_string()).collect();
        write!(f, "[{}]", parts.join(", "))
    }
}

impl From<Vec<EndpointAddr>> for Endpoint {
    fn from(addrs: Vec<EndpointAddr>) -> Self {
        Self::new(addrs)
    }
}

impl<'a> IntoIterator for &'a Endpoint {
    type Item = &'a EndpointAddr;
    type IntoIter = std::slice::Iter<'a, EndpointAddr>;

    fn into_iter(self) -> Self::IntoIter {
        self.addrs.iter()
    }
}
