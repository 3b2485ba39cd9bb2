use async_trait::async_trait;
use conduit_dns_application::ports::UpstreamResolver;
use conduit_dns_domain::{
    dot_count, parse_name, DomainError, Endpoint, EndpointAddr, NameOriginExt, ResolverConfig,
};
use futures::future::BoxFuture;
use hickory_proto::op::{Message, MessageType, OpCode, Query};
use hickory_proto::rr::{Name, RData, Record, RecordType};
use std::collections::HashSet;
use std::net::IpAddr;
use std::time::Duration;
use tracing::{debug, warn};

use super::cache::RecordCache;
use super::codec;
use super::transport::{Connection, UDP_TRUNCATION_SIZE};
use crate::system::SystemResolvConf;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_RETRIES: u32 = 10;
pub const DEFAULT_DELAY: Duration = Duration::from_millis(10);

/// Longest alias chain followed by `addresses_for`.
pub const MAX_CNAME_DEPTH: usize = 16;

/// Retry loop around a lookup that got no response at all.
///
/// An answer of any RCODE ends the loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    /// Sleep before every attempt except the first.
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(attempts: u32, delay: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            delay,
        }
    }

    pub fn once() -> Self {
        Self::new(1, Duration::ZERO)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_RETRIES, DEFAULT_DELAY)
    }
}

/// DNS client over an ordered list of candidate endpoints.
#[derive(Debug, Clone)]
pub struct Resolver {
    endpoint: Endpoint,
    origin: Option<Name>,
    search: Vec<Name>,
    ndots: usize,
    timeout: Duration,
    retry: RetryPolicy,
}

impl Resolver {
    pub fn new(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            origin: None,
            search: Vec::new(),
            ndots: 1,
            timeout: DEFAULT_TIMEOUT,
            retry: RetryPolicy::default(),
        }
    }

    /// Suffix for relative names when no search list is configured.
    pub fn with_origin(mut self, origin: Name) -> Self {
        self.origin = Some(origin);
        self
    }

    pub fn with_search(mut self, search: Vec<Name>) -> Self {
        self.search = search;
        self
    }

    pub fn with_ndots(mut self, ndots: usize) -> Self {
        self.ndots = ndots;
        self
    }

    /// Bound on each single endpoint attempt.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Builds a resolver from configuration, reading resolv.conf for
    /// nameservers and search domains the configuration leaves empty.
    pub async fn from_config(config: &ResolverConfig) -> Result<Self, DomainError> {
        let mut search = config
            .search
            .iter()
            .map(|domain| parse_name(domain))
            .collect::<Result<Vec<_>, _>>()?;

        let endpoint = if config.nameservers.is_empty() && config.use_system {
            let system = SystemResolvConf::local().await?;
            if search.is_empty() {
                search = system.search_names();
            }
            system.endpoint()
        } else {
            Endpoint::parse_all(&config.nameservers)?
        };

        Ok(Self::new(endpoint)
            .with_search(search)
            .with_ndots(config.ndots)
            .with_timeout(Duration::from_millis(config.timeout_ms))
            .with_retry(RetryPolicy::new(
                config.retries,
                Duration::from_millis(config.retry_delay_ms),
            )))
    }

    /// Resolver configured entirely from /etc/resolv.conf.
    pub async fn system() -> Result<Self, DomainError> {
        let system = SystemResolvConf::local().await?;
        Ok(Self::new(system.endpoint())
            .with_search(system.search_names())
            .with_ndots(system.ndots))
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn retry(&self) -> RetryPolicy {
        self.retry
    }

    /// Absolute names pass through; relative names get the origin (or root).
    pub fn fully_qualified_name(&self, name: &Name) -> Result<Name, DomainError> {
        if name.is_fqdn() {
            return Ok(name.clone());
        }
        match &self.origin {
            Some(origin) => name.with_origin(origin),
            None => Ok(name.to_absolute()),
        }
    }

    /// Absolute names to try for `name`, in order.
    ///
    /// Names with at least `ndots` dots are tried bare first, others last.
    pub fn candidate_names(&self, name: &Name) -> Vec<Name> {
        if name.is_fqdn() {
            return vec![name.clone()];
        }

        let suffixes: Vec<&Name> = if self.search.is_empty() {
            self.origin.iter().collect()
        } else {
            self.search.iter().collect()
        };

        let bare = name.to_absolute();
        let qualified = suffixes
            .into_iter()
            .filter_map(|suffix| name.with_origin(suffix).ok());

        let ordered: Vec<Name> = if dot_count(name) >= self.ndots {
            std::iter::once(bare).chain(qualified).collect()
        } else {
            qualified.chain(std::iter::once(bare)).collect()
        };

        let mut seen = HashSet::new();
        ordered
            .into_iter()
            .filter(|candidate| seen.insert(candidate.to_lowercase()))
            .collect()
    }

    /// Sends one recursive question to the configured endpoints.
    pub async fn query(
        &self,
        name: &Name,
        record_type: RecordType,
    ) -> Result<Option<Message>, DomainError> {
        let mut message = Message::new();
        message.set_id(fastrand::u16(..));
        message.set_message_type(MessageType::Query);
        message.set_op_code(OpCode::Query);
        message.set_recursion_desired(true);
        message.add_query(Query::query(self.fully_qualified_name(name)?, record_type));

        self.dispatch_request(&message).await
    }

    /// Tries each candidate endpoint in order until one answers validly.
    ///
    /// `Err` carries the last failure when every attempted endpoint failed;
    /// `Ok(None)` means there were no candidates or one answered invalidly.
    pub async fn dispatch_request(&self, message: &Message) -> Result<Option<Message>, DomainError> {
        let packet = codec::encode(message)?;
        let id = message.id();

        // Oversized queries cannot go over UDP without truncation.
        let candidates = self
            .endpoint
            .iter()
            .filter(|endpoint| packet.len() <= UDP_TRUNCATION_SIZE || !endpoint.is_datagram());

        let mut last_error = None;
        let mut declined = false;

        for endpoint in candidates {
            debug!(id, server = %endpoint, "Sending request");

            match tokio::time::timeout(self.timeout, try_server(endpoint, &packet)).await {
                Ok(Ok(response)) => {
                    if valid_response(message, &response) {
                        debug!(id, server = %endpoint, answers = response.answers().len(), "Received valid response");
                        return Ok(Some(response));
                    }
                    declined = true;
                }
                Ok(Err(e @ DomainError::InvalidProtocol(_))) => return Err(e),
                Ok(Err(e)) => {
                    warn!(id, server = %endpoint, error = %e, "Request failed");
                    last_error = Some(e);
                }
                Err(_) => {
                    debug!(id, server = %endpoint, "Request timed out");
                    last_error = Some(DomainError::TransportTimeout {
                        server: endpoint.to_string(),
                    });
                }
            }
        }

        match last_error {
            Some(e) if !declined => Err(e),
            _ => Ok(None),
        }
    }

    /// Records for `name` of each type, consulting `cache` before the network.
    pub async fn records_for(
        &self,
        name: &Name,
        record_types: &[RecordType],
        cache: &RecordCache,
    ) -> Result<Vec<Record>, DomainError> {
        cache
            .fetch(name, record_types, |name, record_type| {
                self.lookup_into(cache, name, record_type)
            })
            .await
    }

    /// Queries with retries and stores every answer under its owner name.
    async fn lookup_into(
        &self,
        cache: &RecordCache,
        name: Name,
        record_type: RecordType,
    ) -> Result<(), DomainError> {
        for attempt in 0..self.retry.attempts {
            if attempt > 0 && !self.retry.delay.is_zero() {
                tokio::time::sleep(self.retry.delay).await;
            }

            match self.query(&name, record_type).await {
                Ok(Some(mut response)) => {
                    for record in response.take_answers() {
                        let owner = record.name().clone();
                        cache.store(&owner, record_type, record);
                    }
                    return Ok(());
                }
                Ok(None) => {
                    debug!(name = %name, record_type = %record_type, attempt, "No response");
                }
                Err(e @ DomainError::InvalidProtocol(_)) => return Err(e),
                Err(e) => {
                    debug!(name = %name, record_type = %record_type, attempt, error = %e, "No response");
                }
            }
        }

        Err(DomainError::ResolutionFailure(format!(
            "Could not resolve {} after {} attempt(s)",
            name, self.retry.attempts
        )))
    }

    pub async fn addresses_for(&self, name: &str) -> Result<Vec<IpAddr>, DomainError> {
        self.addresses_for_types(name, &[RecordType::A, RecordType::AAAA])
            .await
    }

    /// Addresses for `name`, following aliases.
    ///
    /// The cache lives for this call only.
    pub async fn addresses_for_types(
        &self,
        name: &str,
        record_types: &[RecordType],
    ) -> Result<Vec<IpAddr>, DomainError> {
        let name = parse_name(name)?;
        let cache = RecordCache::new();

        let addresses = self
            .addresses_with_cache(&name, record_types, &cache, 0)
            .await?;

        let mut seen = HashSet::new();
        Ok(addresses.into_iter().filter(|ip| seen.insert(*ip)).collect())
    }

    fn addresses_with_cache<'a>(
        &'a self,
        name: &'a Name,
        record_types: &'a [RecordType],
        cache: &'a RecordCache,
        depth: usize,
    ) -> BoxFuture<'a, Result<Vec<IpAddr>, DomainError>> {
        Box::pin(async move {
            if depth > MAX_CNAME_DEPTH {
                return Err(DomainError::ResolutionFailure(format!(
                    "Alias chain for {} exceeds {} names",
                    name, MAX_CNAME_DEPTH
                )));
            }

            let mut records = Vec::new();
            for candidate in self.candidate_names(name) {
                records = self.records_for(&candidate, record_types, cache).await?;
                if !records.is_empty() {
                    break;
                }
            }

            if records.is_empty() {
                return Err(DomainError::ResolutionFailure(format!(
                    "No records found for {}",
                    name
                )));
            }

            let mut addresses = Vec::new();
            let mut followed = HashSet::new();

            for record in &records {
                match record.data() {
                    Some(RData::A(a)) => addresses.push(IpAddr::V4(a.0)),
                    Some(RData::AAAA(aaaa)) => addresses.push(IpAddr::V6(aaaa.0)),
                    Some(RData::CNAME(target)) => {
                        let target = target.0.to_absolute();
                        if followed.insert(target.to_lowercase()) {
                            debug!(name = %name, target = %target, "Following alias");
                            let aliased = self
                                .addresses_with_cache(&target, record_types, cache, depth + 1)
                                .await?;
                            addresses.extend(aliased);
                        }
                    }
                    _ => {}
                }
            }

            if addresses.is_empty() {
                return Err(DomainError::ResolutionFailure(format!(
                    "Could not find any addresses for {}",
                    name
                )));
            }

            Ok(addresses)
        })
    }
}

#[async_trait]
impl UpstreamResolver for Resolver {
    async fn query(
        &self,
        name: &Name,
        record_type: RecordType,
    ) -> Result<Option<Message>, DomainError> {
        Resolver::query(self, name, record_type).await
    }
}

/// One attempt against one endpoint; the connection closes when this returns
/// or is cancelled.
async fn try_server(endpoint: &EndpointAddr, packet: &[u8]) -> Result<Message, DomainError> {
    let mut connection = Connection::open(endpoint).await?;
    let bytes = connection.exchange(packet).await?;
    codec::decode(&bytes)
}

fn valid_response(request: &Message, response: &Message) -> bool {
    if response.truncated() {
        warn!(id = request.id(), "Received truncated response");
        false
    } else if response.id() != request.id() {
        warn!(
            id = request.id(),
            response_id = response.id(),
            "Received response with incorrect message id"
        );
        false
    } else {
        true
    }
}
