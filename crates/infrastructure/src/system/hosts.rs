use conduit_dns_domain::DomainError;
use std::collections::HashMap;
use std::net::IpAddr;
use std::str::FromStr;
use tokio::fs;
use tracing::{debug, warn};

pub const HOSTS: &str = "/etc/hosts";

/// Static name to address table in hosts(5) format.
#[derive(Debug, Clone, Default)]
pub struct Hosts {
    addresses: HashMap<IpAddr, Vec<String>>,
    names: HashMap<String, Vec<IpAddr>>,
}

fn normalize(name: &str) -> String {
    name.trim_end_matches('.').to_ascii_lowercase()
}

impl Hosts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hosts for the local system; empty when the file is missing.
    pub async fn local() -> Self {
        match Self::load(HOSTS).await {
            Ok(hosts) => hosts,
            Err(e) => {
                debug!(error = %e, "No local hosts file");
                Self::new()
            }
        }
    }

    pub async fn load(path: &str) -> Result<Self, DomainError> {
        let content = fs::read_to_string(path).await.map_err(|e| {
            DomainError::ConfigError(format!("Failed to read hosts file {}: {}", path, e))
        })?;
        let hosts = Self::parse(&content);
        debug!(path, names = hosts.names.len(), "Hosts file parsed");
        Ok(hosts)
    }

    pub fn parse(content: &str) -> Self {
        let mut hosts = Self::new();

        for line in content.lines() {
            let line = line.split('#').next().unwrap_or_default();
            let mut fields = line.split_whitespace();

            let Some(address) = fields.next() else {
                continue;
            };
            let names: Vec<&str> = fields.collect();
            if names.is_empty() {
                continue;
            }

            match IpAddr::from_str(address) {
                Ok(ip) => hosts.add(ip, &names),
                Err(e) => warn!(error = %e, address, "Invalid address in hosts file"),
            }
        }

        hosts
    }

    pub fn add<S: AsRef<str>>(&mut self, address: IpAddr, names: &[S]) {
        let entry = self.addresses.entry(address).or_default();
        for name in names {
            let name = normalize(name.as_ref());
            entry.push(name.clone());
            self.names.entry(name).or_default().push(address);
        }
    }

    /// The most recently added address for `name`.
    pub fn lookup(&self, name: &str) -> Option<IpAddr> {
        self.names.get(&normalize(name))?.last().copied()
    }

    pub fn addresses(&self, name: &str) -> &[IpAddr] {
        self.names
            .get(&normalize(name))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn names_for(&self, address: &IpAddr) -> &[String] {
        self.addresses
            .get(address)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
