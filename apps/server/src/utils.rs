use anyhow::Context;
use roster_core::AppConfig;
use std::net::SocketAddr;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Logs to stdout and to a daily file under the data dir. `RUST_LOG` wins
/// over the configured level. Keep the guard alive or buffered lines are lost.
pub fn init_logging(config: &AppConfig) -> anyhow::Result<WorkerGuard> {
	let logs_dir = config.logs_dir();
	std::fs::create_dir_all(&logs_dir)
		.with_context(|| format!("Failed to create logs directory {}", logs_dir.display()))?;

	let default_filter = format!(
		"roster_core={level},roster_server={level},tower_http=info",
		level = config.log_level
	);
	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

	let (file_writer, guard) =
		tracing_appender::non_blocking(RollingFileAppender::new(Rotation::DAILY, logs_dir, "server.log"));

	tracing_subscriber::registry()
		.with(filter)
		.with(fmt::layer().with_target(true))
		.with(fmt::layer().with_ansi(false).with_writer(file_writer))
		.try_init()
		.context("Failed to install tracing subscriber")?;

	Ok(guard)
}

pub fn bind_address(value: &str) -> anyhow::Result<SocketAddr> {
	value
		.parse()
		.with_context(|| format!("Invalid bind address '{value}'"))
}

pub async fn shutdown_signal() {
	if let Err(e) = tokio::signal::ctrl_c().await {
		tracing::error!("Failed to listen for shutdown signal: {e}");
		std::future::pending::<()>().await;
	}
	info!("Shutdown signal received, draining connections");
}
