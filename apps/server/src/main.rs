use anyhow::Context;
use clap::Parser;
use roster_core::{AppConfig, Core};
use std::path::PathBuf;
use tokio::net::TcpListener;
use tracing::info;

mod api;
mod utils;
mod ws;

/// Contact sync server for field devices
#[derive(Debug, Parser)]
#[command(name = "roster-server", version)]
struct Args {
	/// Directory holding roster.json, the database and logs
	#[arg(long, env = "DATA_DIR", default_value = "./roster_data")]
	data_dir: PathBuf,

	/// Overrides the port of the configured bind address
	#[arg(long, env = "PORT")]
	port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	let args = Args::parse();

	let config = AppConfig::load_from(&args.data_dir).context("Failed to load config")?;
	let _log_guard = utils::init_logging(&config)?;

	let mut addr = utils::bind_address(&config.server.bind_address)?;
	if let Some(port) = args.port {
		addr.set_port(port);
	}

	let core = Core::with_config(config)
		.await
		.context("Failed to start core")?;
	let app = api::router(api::AppState::new(core.clone()));

	let listener = TcpListener::bind(addr)
		.await
		.with_context(|| format!("Failed to bind {addr}"))?;
	info!(%addr, "Listening");

	axum::serve(listener, app)
		.with_graceful_shutdown(utils::shutdown_signal())
		.await
		.context("Server error")?;

	core.shutdown();
	Ok(())
}
