//! NestKV Server Binary
//!
//! Starts the Unix-socket server for NestKV.

use std::sync::Arc;

use bytes::Bytes;
use clap::Parser;
use nestkv::network::Server;
use nestkv::{Config, Engine};
use tracing_subscriber::{fmt, EnvFilter};

/// NestKV Server
#[derive(Parser, Debug)]
#[command(name = "nestkv-server")]
#[command(about = "Concurrent in-memory key-value store")]
#[command(version)]
struct Args {
    /// Unix socket path to listen on
    #[arg(short, long, default_value = "/tmp/nestkv.sock")]
    socket: String,

    /// Initial capacity of each slot table
    #[arg(short, long, default_value = "1024")]
    capacity: usize,

    /// Slot count of the task queue
    #[arg(short, long, default_value = "1024")]
    queue_capacity: usize,

    /// Number of worker threads
    #[arg(short, long, default_value = "4")]
    workers: usize,

    /// Maximum concurrent peer connections
    #[arg(short, long, default_value = "1024")]
    max_connections: usize,
}

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,nestkv=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    let args = Args::parse();

    tracing::info!("NestKV Server v{}", nestkv::VERSION);
    tracing::info!("Socket: {}", args.socket);
    tracing::info!("Capacity: {} slots per table", args.capacity);

    // Build config from args
    let config = Config::builder()
        .socket_path(&args.socket)
        .initial_capacity(args.capacity)
        .queue_capacity(args.queue_capacity)
        .worker_threads(args.workers)
        .max_connections(args.max_connections)
        .build();

    let engine: Arc<Engine<Bytes, Bytes>> = Arc::new(Engine::new(config.clone()));

    tracing::info!("Engine initialized");

    // Start server
    let mut server = Server::new(config, engine);
    if let Err(e) = server.run() {
        tracing::error!("Server error: {e}");
        std::process::exit(1);
    }

    tracing::info!("Server stopped");
}
