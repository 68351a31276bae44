//! Chatline server binary.
//!
//! # Usage
//!
//! ```bash
//! # Listen on the default port with accounts.dat in the working directory
//! chatline-server
//!
//! # Custom address and account file
//! chatline-server --bind 127.0.0.1:7000 --accounts /var/lib/chatline/accounts.dat
//! ```

use std::path::PathBuf;

use chatline_server::{Server, ServerRuntimeConfig};
use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Chatline chat server
#[derive(Parser, Debug)]
#[command(name = "chatline-server")]
#[command(about = "Multi-client line chat server")]
#[command(version)]
struct Args {
    /// Address to bind to
    #[arg(short, long, default_value = "0.0.0.0:59001")]
    bind: String,

    /// Path to the account file
    #[arg(short, long, default_value = "accounts.dat")]
    accounts: PathBuf,

    /// Maximum concurrent connections
    #[arg(long, default_value = "500")]
    max_connections: usize,

    /// Lines buffered per client before it is disconnected as too slow
    #[arg(long, default_value = "256")]
    outbound_capacity: usize,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    tracing::info!("Chatline server starting");
    tracing::info!("Binding to {}", args.bind);

    let config = ServerRuntimeConfig {
        bind_address: args.bind,
        accounts_path: args.accounts,
        max_connections: args.max_connections,
        outbound_capacity: args.outbound_capacity,
    };

    let server = Server::bind(config).await?;

    tracing::info!("Server listening on {}", server.local_addr()?);

    server.run().await?;

    Ok(())
}
