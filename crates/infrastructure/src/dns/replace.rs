//! Process-wide hostname lookup override.
//!
//! Compatibility shim for code that wants plain `host -> address` lookups to
//! go through a configured `Resolver`. Nothing in the resolver or server uses
//! it; it is opt-in and removable at any time.

use arc_swap::ArcSwapOption;
use conduit_dns_domain::DomainError;
use std::net::IpAddr;
use std::sync::Arc;
use tracing::debug;

use super::resolver::Resolver;
use super::transport::lookup;

static OVERRIDE: ArcSwapOption<Resolver> = ArcSwapOption::const_empty();

pub struct ResolverOverride;

impl ResolverOverride {
    pub fn install(resolver: Arc<Resolver>) {
        debug!(endpoints = resolver.endpoint().len(), "Installing resolver override");
        OVERRIDE.store(Some(resolver));
    }

    /// Uninstalls and returns the previous resolver, if any.
    pub fn remove() -> Option<Arc<Resolver>> {
        OVERRIDE.swap(None)
    }

    pub fn is_installed() -> bool {
        OVERRIDE.load().is_some()
    }

    pub fn current() -> Option<Arc<Resolver>> {
        OVERRIDE.load_full()
    }

    /// One address for `host`: a random pick from the installed resolver's
    /// answer, or the system lookup when none is installed.
    pub async fn get_address(host: &str) -> Result<IpAddr, DomainError> {
        if let Ok(ip) = host.parse::<IpAddr>() {
            return Ok(ip);
        }

        match Self::current() {
            Some(resolver) => {
                let addresses = resolver.addresses_for(host).await.map_err(|e| {
                    DomainError::ResolutionFailure(format!("Hostname not known: {} ({})", host, e))
                })?;
                addresses
                    .get(fastrand::usize(..addresses.len().max(1)))
                    .copied()
                    .ok_or_else(|| {
                        DomainError::ResolutionFailure(format!("Hostname not known: {}", host))
                    })
            }
            None => {
                let addrs = lookup::resolve_all(host, 0).await?;
                addrs
                    .first()
                    .map(|addr| addr.ip())
                    .ok_or_else(|| {
                        DomainError::ResolutionFailure(format!("Hostname not known: {}", host))
                    })
            }
        }
    }
}
