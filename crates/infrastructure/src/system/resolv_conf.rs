use conduit_dns_domain::{parse_name, DomainError, Endpoint, DEFAULT_PORT};
use hickory_proto::rr::Name;
use tokio::fs;
use tracing::{debug, warn};

pub const RESOLV_CONF: &str = "/etc/resolv.conf";

/// The parts of resolv.conf the resolver consumes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemResolvConf {
    pub nameservers: Vec<String>,
    pub search: Vec<String>,
    pub ndots: usize,
}

impl Default for SystemResolvConf {
    fn default() -> Self {
        Self {
            nameservers: Vec::new(),
            search: Vec::new(),
            ndots: 1,
        }
    }
}

impl SystemResolvConf {
    pub async fn load(path: &str) -> Result<Self, DomainError> {
        let content = fs::read_to_string(path).await.map_err(|e| {
            DomainError::ConfigError(format!("Failed to read {}: {}", path, e))
        })?;
        let parsed = parse_resolv_conf(&content);
        debug!(
            path,
            nameservers = parsed.nameservers.len(),
            search = parsed.search.len(),
            ndots = parsed.ndots,
            "resolv.conf parsed"
        );
        Ok(parsed)
    }

    pub async fn local() -> Result<Self, DomainError> {
        Self::load(RESOLV_CONF).await
    }

    /// UDP then TCP on port 53 for each nameserver, in file order.
    pub fn endpoint(&self) -> Endpoint {
        Endpoint::for_nameservers(&self.nameservers, DEFAULT_PORT)
    }

    pub fn search_names(&self) -> Vec<Name> {
        self.search
            .iter()
            .filter_map(|domain| match parse_name(domain) {
                Ok(name) => Some(name),
                Err(e) => {
                    warn!(domain = %domain, error = %e, "Ignoring invalid search domain");
                    None
                }
            })
            .collect()
    }
}

pub fn parse_resolv_conf(content: &str) -> SystemResolvConf {
    let mut conf = SystemResolvConf::default();

    for line in content.lines() {
        // Comments start at '#' or ';'.
        let line = line.split(['#', ';']).next().unwrap_or_default();
        let mut fields = line.split_whitespace();

        match fields.next() {
            Some("nameserver") => conf.nameservers.extend(fields.map(str::to_string)),
            // The last of `search` / `domain` wins.
            Some("search") => conf.search = fields.map(str::to_string).collect(),
            Some("domain") => conf.search = fields.take(1).map(str::to_string).collect(),
            Some("options") => {
                for option in fields {
                    if let Some(value) = option.strip_prefix("ndots:") {
                        match value.parse::<usize>() {
                            Ok(ndots) => conf.ndots = ndots.min(15),
                            Err(_) => warn!(option, "Invalid ndots option"),
                        }
                    }
                }
            }
            _ => {}
        }
    }

    conf
}
