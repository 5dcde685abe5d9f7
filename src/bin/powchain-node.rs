#![forbid(unsafe_code)]
//! Run a powchain node: load config, build the ledger and serve the API.

use clap::Parser;
use colored::*;
use powchain::config::load_config;
use powchain::node::{init_tracing, Node};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the TOML config file
    #[arg(long, default_value = "powchain.toml")]
    config: PathBuf,
    /// Port for the HTTP API (overrides network.api_port)
    #[arg(long, short)]
    port: Option<u16>,
    /// Peer to register at startup; may be repeated
    #[arg(long = "peer")]
    peers: Vec<String>,
    /// Log level filter (overrides logging.level)
    #[arg(long)]
    log_level: Option<String>,
    /// Resolve against peers before serving
    #[arg(long)]
    resolve: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = load_config(&cli.config)?;
    if let Some(port) = cli.port {
        config.network.api_port = port;
    }
    config.network.bootstrap_peers.extend(cli.peers);
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }
    if cli.resolve {
        config.consensus.resolve_on_startup = true;
    }

    init_tracing(&config.logging.level);

    let node = Arc::new(Node::new(config)?);

    println!("{}", "powchain node".bright_cyan().bold());
    println!("  identifier: {}", node.node_identifier.bright_white());
    println!(
        "  api:        http://{}:{}",
        node.config.network.bind_address, node.config.network.api_port
    );
    println!();

    node.run().await?;
    Ok(())
}
