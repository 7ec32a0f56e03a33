//! # roulette
//!
//! Main binary: loads configuration, wires the matching engine to the
//! WebSocket gateway, and serves. Single node, in-memory only — a restart
//! drops all queues and pairs, and clients simply reconnect and re-join.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};

use roulette_common::config::AppConfig;
use roulette_core::Matchmaker;
use roulette_gateway::{build_router, GatewayState};

// ── CLI ───────────────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "roulette",
    about = "Matchmaking and signaling server for anonymous 1:1 video chat",
    version = env!("CARGO_PKG_VERSION"),
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the server.
    Serve {
        /// TCP port to listen on; overrides configuration.
        #[arg(long, env = "ROULETTE_PORT")]
        port: Option<u16>,

        /// Interface to bind; overrides configuration.
        #[arg(long, env = "ROULETTE_BIND")]
        bind: Option<IpAddr>,

        /// The single origin allowed for CORS and WebSocket handshakes;
        /// overrides configuration.
        #[arg(long, env = "ROULETTE_ORIGIN")]
        origin: Option<String>,
    },
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Serve { port, bind, origin } => run_server(port, bind, origin).await,
    }
}

// ── Server startup ────────────────────────────────────────────────────────────

async fn run_server(
    port: Option<u16>,
    bind: Option<IpAddr>,
    origin: Option<String>,
) -> anyhow::Result<()> {
    let mut config = AppConfig::load().context("loading configuration")?;
    if let Some(port) = port {
        config.server.port = port;
    }
    if let Some(bind) = bind {
        config.server.bind_address = bind.to_string();
    }
    if let Some(origin) = origin {
        config.server.allowed_origin = origin;
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "roulette=info,tower_http=info".into()),
        )
        .with_thread_ids(false)
        .init();

    tracing::info!("starting roulette v{}", env!("CARGO_PKG_VERSION"));

    let engine = Arc::new(Matchmaker::new());
    let state = GatewayState::new(engine, &config.server.allowed_origin)
        .context("building gateway state")?;
    let app = build_router(state);

    let host: IpAddr = config
        .server
        .bind_address
        .parse()
        .context("parsing bind address")?;
    let addr = SocketAddr::new(host, config.server.port);

    tracing::info!("gateway    → ws://{addr}/ws");
    tracing::info!("health     → http://{addr}/");
    tracing::info!("origin     → {}", config.server.allowed_origin);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    axum::serve(listener, app).await.context("serving")?;

    Ok(())
}
