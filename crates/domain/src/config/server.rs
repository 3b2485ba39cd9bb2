use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Endpoint strings to bind, e.g. `udp://0.0.0.0:53`.
    #[serde(default = "default_listen")]
    pub listen: Vec<String>,

    /// Zone suffix stripped from every question name.
    #[serde(default = "default_origin")]
    pub origin: String,

    /// Datagram responses above this size are replaced by a truncated reply.
    #[serde(default = "default_udp_reasonable_size")]
    pub udp_reasonable_size: usize,

    #[serde(default)]
    pub hosts_file: Option<String>,

    /// Stream connections without a complete request for this long are closed.
    #[serde(default = "default_tcp_idle_timeout_ms")]
    pub tcp_idle_timeout_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            origin: default_origin(),
            udp_reasonable_size: default_udp_reasonable_size(),
            hosts_file: None,
            tcp_idle_timeout_ms: default_tcp_idle_timeout_ms(),
        }
    }
}

fn default_listen() -> Vec<String> {
    vec!["udp://0.0.0.0:53".to_string(), "tcp://0.0.0.0:53".to_string()]
}

fn default_origin() -> String {
    ".".to_string()
}

fn default_udp_reasonable_size() -> usize {
    512
}

fn default_tcp_idle_timeout_ms() -> u64 {
    10_000
}
