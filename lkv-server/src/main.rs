//! # LineKV Server Binary
//!
//! Wires the cache engine, the background cleaner, and the TCP line server
//! together behind a small CLI surface.

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use lkv_engine::cleaner::SWEEP_INTERVAL;
use lkv_engine::Cache;
use lkv_server::LineServer;

/// In-memory multi-type cache speaking a line protocol over TCP.
#[derive(Debug, Parser)]
#[command(name = "lkv-server", version, about)]
struct Args {
    /// Port to listen on.
    #[arg(long, default_value_t = 7089)]
    port: u16,

    /// Address to bind.
    #[arg(long, default_value = "127.0.0.1")]
    bind: IpAddr,

    /// Directory holding named snapshots.
    #[arg(long, default_value = "saves")]
    save_dir: PathBuf,

    /// Period of the expired-key sweeper, in milliseconds.
    #[arg(long, default_value_t = SWEEP_INTERVAL.as_millis() as u64)]
    sweep_interval_ms: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let cache = Arc::new(Cache::with_save_root(&args.save_dir));
    let _cleaner = cache.start_cleaner(Duration::from_millis(args.sweep_interval_ms));

    let mut server = LineServer::new();
    let handler_cache = Arc::clone(&cache);
    server.set_handler(
        "default",
        Box::new(move |req| handler_cache.handle_request(&req.method, &req.args)),
    );

    let addr = SocketAddr::new(args.bind, args.port);
    info!(save_dir = %args.save_dir.display(), "starting cache server");
    server
        .listen_and_serve(addr)
        .await
        .with_context(|| format!("serving on {addr}"))?;
    Ok(())
}
