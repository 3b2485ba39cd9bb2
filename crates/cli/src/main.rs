use clap::{Parser, Subcommand};
use conduit_dns_domain::CliOverrides;
use tracing::info;

mod bootstrap;
mod commands;
mod processor;

#[derive(Parser)]
#[command(name = "conduit-dns")]
#[command(version)]
#[command(about = "Conduit DNS - pluggable DNS server and stub resolver")]
struct Cli {
    /// Configuration file path
    #[arg(short = 'c', long, value_name = "FILE", global = true)]
    config: Option<String>,

    /// Upstream nameserver, e.g. 1.1.1.1 or udp://1.1.1.1:53 (repeatable)
    #[arg(short = 'n', long = "nameserver", global = true)]
    nameservers: Vec<String>,

    /// Per-attempt upstream timeout in milliseconds
    #[arg(long, global = true)]
    timeout_ms: Option<u64>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Look up a name through the configured nameservers
    Resolve {
        name: String,

        /// Record type to ask for
        #[arg(short = 't', long = "type", default_value = "A")]
        record_type: String,
    },

    /// Run a forwarding DNS server
    Serve {
        /// Endpoint to listen on, e.g. udp://0.0.0.0:5353 (repeatable)
        #[arg(short = 'l', long)]
        listen: Vec<String>,

        /// Zone the server answers for
        #[arg(long)]
        origin: Option<String>,

        /// Hosts file consulted before forwarding
        #[arg(long, value_name = "FILE")]
        hosts: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut overrides = CliOverrides {
        nameservers: cli.nameservers,
        timeout_ms: cli.timeout_ms,
        log_level: cli.log_level,
        ..Default::default()
    };
    if let Command::Serve { listen, origin, .. } = &cli.command {
        overrides.listen = listen.clone();
        overrides.origin = origin.clone();
    }

    let mut config = bootstrap::load_config(cli.config.as_deref(), overrides)?;
    bootstrap::init_logging(&config);

    match cli.command {
        Command::Resolve { name, record_type } => {
            commands::resolve(&config, &name, &record_type).await?;
        }
        Command::Serve { hosts, .. } => {
            if hosts.is_some() {
                config.server.hosts_file = hosts;
            }
            info!("Starting Conduit DNS v{}", env!("CARGO_PKG_VERSION"));
            commands::serve(&config).await?;
            info!("Server shutdown complete");
        }
    }

    Ok(())
}
