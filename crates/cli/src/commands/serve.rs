use conduit_dns_domain::Config;
use conduit_dns_infrastructure::dns::{DnsServer, Resolver};
use conduit_dns_infrastructure::system::Hosts;
use std::sync::Arc;
use tracing::info;

use crate::processor::ForwardingProcessor;

/// Serves until interrupted.
pub async fn serve(config: &Config) -> anyhow::Result<()> {
    let resolver = Resolver::from_config(&config.resolver).await?;
    info!(upstream = %resolver.endpoint(), "Upstream resolver configured");

    let hosts = match &config.server.hosts_file {
        Some(path) => Hosts::load(path).await?,
        None => Hosts::new(),
    };

    let processor = ForwardingProcessor::new(hosts, Arc::new(resolver));
    let server = Arc::new(DnsServer::from_config(&config.server, Arc::new(processor))?);
    let handle = server.bind().await?;

    tokio::signal::ctrl_c().await?;
    info!("Shutting down");
    handle.shutdown().await;

    Ok(())
}
