//! Bulwark router daemon binary.
//!
//! ```text
//! bulwark-server --node-id 10.0.0.1 --keyring keys.json
//! ```
//!
//! Reads operator commands from stdin (`/flood`, `/routes`, `/neighbors`,
//! `/quit`). With stdin closed it keeps routing until interrupted.

use std::{
    net::{IpAddr, Ipv4Addr, SocketAddr},
    path::PathBuf,
    sync::Arc,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use bulwark_core::ForwardingMode;
use bulwark_server::{
    Command, Keyring, Node, NodeConfig, ROUTER_PORT, ServerError, TcpTransport, commands,
};
use clap::Parser;
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    sync::broadcast::error::RecvError,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Bulwark distance-vector router
#[derive(Parser, Debug)]
#[command(name = "bulwark-server", version, about)]
struct Args {
    /// This node's identifier, the address neighbors reach it by
    #[arg(long)]
    node_id: String,

    /// Address to listen on
    #[arg(long, default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED))]
    listen: IpAddr,

    /// Router port, used for listening and for dialing neighbors
    #[arg(long, default_value_t = ROUTER_PORT)]
    port: u16,

    /// Keyring file with this node's keypair and trusted public keys
    #[arg(long)]
    keyring: PathBuf,

    /// Seconds between route advertisement rounds
    #[arg(long, default_value_t = 10)]
    advertise_interval: u64,

    /// Seconds of inbound silence before a link is closed
    #[arg(long, default_value_t = 60)]
    idle_timeout: u64,

    /// Drop transit floods instead of relaying them
    #[arg(long)]
    drop_floods: bool,
}

#[tokio::main]
async fn main() -> Result<(), ServerError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let keyring = Keyring::load(&args.keyring)?;
    let identity = keyring.identity(args.node_id.clone());
    let directory = Arc::new(keyring.directory(args.node_id.clone()));
    info!(node = %args.node_id, trusted = keyring.trusted().len(), "loaded keyring");

    let config = NodeConfig {
        port: args.port,
        advertise_interval: Duration::from_secs(args.advertise_interval),
        idle_timeout: Duration::from_secs(args.idle_timeout),
        forwarding: if args.drop_floods { ForwardingMode::Drop } else { ForwardingMode::Forward },
        initial_sequence: clock_sequence(),
        ..NodeConfig::new(args.node_id)
    };

    let transport = TcpTransport::bind(SocketAddr::new(args.listen, args.port)).await?;
    info!(addr = %transport.local_addr()?, "listening");

    let node = Node::new(config, identity, directory, transport);
    let tasks = node.start();

    let mut deliveries = node.subscribe();
    tokio::spawn(async move {
        loop {
            match deliveries.recv().await {
                Ok(packet) => info!(
                    source = %packet.source,
                    destination = %packet.destination,
                    sequence = packet.sequence,
                    payload = %packet.payload,
                    "received flood"
                ),
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "delivery log lagging"),
                Err(RecvError::Closed) => break,
            }
        }
    });

    if !run_commands(&node).await? {
        tokio::signal::ctrl_c().await?;
    }

    info!("shutting down");
    for task in tasks {
        task.abort();
    }
    Ok(())
}

/// Execute stdin commands. Returns `true` on `/quit`, `false` on EOF.
async fn run_commands(node: &Arc<Node<TcpTransport>>) -> Result<bool, ServerError> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await? {
        match commands::parse(&line) {
            Command::Flood { destination, count } => {
                if let Err(e) = node.flood(&destination, count).await {
                    warn!(%destination, "flood failed: {e}");
                }
            },
            Command::Routes => {
                let table = node.router().table();
                info!(hosts = ?table.hosts(), "hosted endpoints");
                for (destination, next_hop) in table.routes() {
                    info!(%destination, next_hop = next_hop.as_deref().unwrap_or("-"), "route");
                }
            },
            Command::Neighbors => {
                let neighbors = node.router().table().neighbors();
                info!(?neighbors, links = ?node.connections().peers(), "neighbors");
            },
            Command::Quit => return Ok(true),
            Command::Empty => {},
            Command::Unknown { input } => warn!(%input, "unknown command"),
            Command::InvalidArgs { command, error } => warn!(%command, "{error}"),
        }
    }

    Ok(false)
}

/// Wall-clock milliseconds, so a restarted node signs with sequence numbers
/// its neighbors have not seen yet.
fn clock_sequence() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .ok()
        .and_then(|elapsed| u64::try_from(elapsed.as_millis()).ok())
        .unwrap_or(0)
}
