use conduit_dns_domain::{DomainError, HostAddr};
use std::net::SocketAddr;

/// Resolves a hostname to all its IP addresses (IPv4 + IPv6).
pub async fn resolve_all(hostname: &str, port: u16) -> Result<Vec<SocketAddr>, DomainError> {
    let target = format!("{}:{}", hostname, port);

    let addrs: Vec<SocketAddr> = tokio::net::lookup_host(&target)
        .await
        .map_err(|e| {
            DomainError::ResolutionFailure(format!("System lookup failed for {}: {}", target, e))
        })?
        .collect();

    if addrs.is_empty() {
        return Err(DomainError::ResolutionFailure(format!(
            "No addresses found for {}",
            target
        )));
    }

    Ok(addrs)
}

/// First usable socket address for an endpoint host, resolving lazily.
pub async fn resolve_host(addr: &HostAddr) -> Result<SocketAddr, DomainError> {
    match addr {
        HostAddr::Resolved(addr) => Ok(*addr),
        HostAddr::Unresolved { hostname, port } => {
            let addrs = resolve_all(hostname, *port).await?;
            addrs
                .into_iter()
                .next()
                .ok_or_else(|| DomainError::ResolutionFailure(format!("{}:{}", hostname, port)))
        }
    }
}
