use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ResolverConfig {
    /// Upstream endpoints. A bare `host:port` expands to UDP then TCP.
    #[serde(default)]
    pub nameservers: Vec<String>,

    #[serde(default)]
    pub search: Vec<String>,

    #[serde(default = "default_ndots")]
    pub ndots: usize,

    /// Per-endpoint attempt timeout.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    #[serde(default = "default_retries")]
    pub retries: u32,

    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// Fall back to `/etc/resolv.conf` when `nameservers` is empty.
    #[serde(default = "default_true")]
    pub use_system: bool,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            nameservers: Vec::new(),
            search: Vec::new(),
            ndots: default_ndots(),
            timeout_ms: default_timeout_ms(),
            retries: default_retries(),
            retry_delay_ms: default_retry_delay_ms(),
            use_system: true,
        }
    }
}

fn default_ndots() -> usize {
    1
}

fn default_timeout_ms() -> u64 {
    5000
}

fn default_retries() -> u32 {
    10
}

fn default_retry_delay_ms() -> u64 {
    10
}

fn default_true() -> bool {
    true
}
