//! Application configuration

use crate::config::migration::Migrate;
use crate::domain::LivenessThresholds;
use anyhow::{anyhow, Result};
use rand::{distributions::Alphanumeric, Rng};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

const CONFIG_FILE: &str = "roster.json";
const DATABASE_FILE: &str = "roster.db";

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
	/// Config schema version
	pub version: u32,

	/// Data directory path
	pub data_dir: PathBuf,

	/// Default tracing filter, overridable with `RUST_LOG`
	pub log_level: String,

	#[serde(default)]
	pub server: ServerConfig,

	#[serde(default)]
	pub sync: SyncConfig,

	/// Added in v2
	#[serde(default)]
	pub monitoring: MonitoringConfig,

	#[serde(default)]
	pub auth: AuthConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
	pub bind_address: String,

	/// `*` allows any origin
	pub cors_origin: String,
}

impl Default for ServerConfig {
	fn default() -> Self {
		Self {
			bind_address: "0.0.0.0:3000".to_string(),
			cors_origin: "*".to_string(),
		}
	}
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
	/// Maximum rows returned by one pull
	pub batch_limit: u64,

	pub pull_timeout_secs: u64,

	pub event_bus_capacity: usize,

	/// Per-connection push queue; a full queue drops deliveries
	pub outbound_queue_size: usize,

	pub ws_ping_interval_secs: u64,
}

impl Default for SyncConfig {
	fn default() -> Self {
		Self {
			batch_limit: 1000,
			pull_timeout_secs: 30,
			event_bus_capacity: 10_000,
			outbound_queue_size: 256,
			ws_ping_interval_secs: 25,
		}
	}
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringConfig {
	pub online_within_secs: u64,

	pub idle_within_secs: u64,

	/// Used whenever a caller does not pass its own threshold
	pub outdated_threshold: i64,
}

impl Default for MonitoringConfig {
	fn default() -> Self {
		Self {
			online_within_secs: 60,
			idle_within_secs: 15 * 60,
			outdated_threshold: 100,
		}
	}
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
	/// Mixed into every API key hash. Changing it invalidates all keys.
	pub api_key_salt: String,
}

impl Default for AuthConfig {
	fn default() -> Self {
		Self {
			api_key_salt: rand::thread_rng()
				.sample_iter(&Alphanumeric)
				.take(32)
				.map(char::from)
				.collect(),
		}
	}
}

impl AppConfig {
	/// Load configuration from a data directory, creating it if missing
	pub fn load_from(data_dir: &Path) -> Result<Self> {
		let config_path = data_dir.join(CONFIG_FILE);

		if config_path.exists() {
			info!("Loading config from {:?}", config_path);
			let json = fs::read_to_string(&config_path)?;
			let mut config: AppConfig = serde_json::from_str(&json)?;
			config.data_dir = data_dir.to_path_buf();

			if config.needs_migration() {
				info!(
					"Migrating config from v{} to v{}",
					config.version,
					Self::target_version()
				);
				config.migrate()?;
				config.save()?;
			}

			Ok(config)
		} else {
			warn!("No config found, creating default at {:?}", config_path);
			let config = Self::default_with_dir(data_dir.to_path_buf());
			config.save()?;
			Ok(config)
		}
	}

	/// Create default configuration with specific data directory
	pub fn default_with_dir(data_dir: PathBuf) -> Self {
		Self {
			version: Self::target_version(),
			data_dir,
			log_level: "info".to_string(),
			server: ServerConfig::default(),
			sync: SyncConfig::default(),
			monitoring: MonitoringConfig::default(),
			auth: AuthConfig::default(),
		}
	}

	pub fn save(&self) -> Result<()> {
		fs::create_dir_all(&self.data_dir)?;

		let config_path = self.data_dir.join(CONFIG_FILE);
		let json = serde_json::to_string_pretty(self)?;
		fs::write(&config_path, json)?;
		info!("Saved config to {:?}", config_path);
		Ok(())
	}

	pub fn db_path(&self) -> PathBuf {
		self.data_dir.join(DATABASE_FILE)
	}

	pub fn logs_dir(&self) -> PathBuf {
		self.data_dir.join("logs")
	}

	pub fn pull_timeout(&self) -> Duration {
		Duration::from_secs(self.sync.pull_timeout_secs)
	}

	pub fn ws_ping_interval(&self) -> Duration {
		Duration::from_secs(self.sync.ws_ping_interval_secs.max(1))
	}

	pub fn liveness_thresholds(&self) -> LivenessThresholds {
		LivenessThresholds {
			online_within: chrono::Duration::seconds(self.monitoring.online_within_secs as i64),
			idle_within: chrono::Duration::seconds(self.monitoring.idle_within_secs as i64),
		}
	}
}

impl Migrate for AppConfig {
	fn current_version(&self) -> u32 {
		self.version
	}

	fn target_version() -> u32 {
		2
	}

	fn migrate(&mut self) -> Result<()> {
		match self.version {
			0 => {
				self.version = 1;
				self.migrate()
			}
			1 => {
				// v2 introduced configurable monitoring windows
				self.monitoring = MonitoringConfig::default();
				self.version = 2;
				Ok(())
			}
			2 => Ok(()),
			v => Err(anyhow!("Unknown config version: {}", v)),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_creates_default_config() {
		let dir = tempfile::tempdir().unwrap();
		let config = AppConfig::load_from(dir.path()).unwrap();

		assert_eq!(config.version, 2);
		assert_eq!(config.sync.batch_limit, 1000);
		assert_eq!(config.monitoring.outdated_threshold, 100);
		assert_eq!(config.auth.api_key_salt.len(), 32);
		assert!(dir.path().join("roster.json").exists());

		// the salt must survive a reload or every key breaks
		let reloaded = AppConfig::load_from(dir.path()).unwrap();
		assert_eq!(reloaded.auth.api_key_salt, config.auth.api_key_salt);
	}

	#[test]
	fn test_migrates_v1_config() {
		let dir = tempfile::tempdir().unwrap();
		let v1 = serde_json::json!({
			"version": 1,
			"data_dir": dir.path(),
			"log_level": "debug",
			"auth": { "api_key_salt": "fixed" }
		});
		fs::write(dir.path().join("roster.json"), v1.to_string()).unwrap();

		let config = AppConfig::load_from(dir.path()).unwrap();
		assert_eq!(config.version, 2);
		assert_eq!(config.log_level, "debug");
		assert_eq!(config.auth.api_key_salt, "fixed");
		assert_eq!(config.monitoring.idle_within_secs, 900);

		let saved: serde_json::Value =
			serde_json::from_str(&fs::read_to_string(dir.path().join("roster.json")).unwrap()).unwrap();
		assert_eq!(saved["version"], 2);
	}

	#[test]
	fn test_unknown_version_fails() {
		let mut config = AppConfig::default_with_dir(PathBuf::from("/tmp/roster"));
		config.version = 9;
		assert!(config.migrate().is_err());
	}
}
