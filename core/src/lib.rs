//! Roster core: versioned contact synchronization for field devices
//!
//! Every contact mutation is stamped with a value from a single global
//! counter inside its own transaction. Devices catch up by pulling all rows
//! stamped after the last version they acknowledged, and receive live pushes
//! for mutations made by other connections in between.

pub mod config;
pub mod domain;
pub mod error;
pub mod infra;
pub mod service;

pub use config::AppConfig;
pub use error::{Error, Result, ValidationErrors};

use infra::db::Database;
use infra::sync::{DeltaResolver, MutationLog, SyncEventBus, SyncLedger, VersionAuthority};
use parking_lot::Mutex;
use service::realtime::{spawn_broadcaster, ConnectionRegistry, PushSession, ServerMessage};
use service::{AgentService, ContactService, DeviceMonitor};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::info;

/// Wires the engine together and owns its background broadcaster
pub struct Core {
	config: AppConfig,
	db: Database,
	agents: AgentService,
	contacts: ContactService,
	delta: DeltaResolver,
	ledger: SyncLedger,
	devices: DeviceMonitor,
	registry: Arc<ConnectionRegistry>,
	broadcaster: Mutex<Option<JoinHandle<()>>>,
}

impl Core {
	/// Loads (or creates) the config in `data_dir` and opens the store
	pub async fn new(data_dir: impl AsRef<Path>) -> anyhow::Result<Arc<Self>> {
		let config = AppConfig::load_from(data_dir.as_ref())?;
		Self::with_config(config).await
	}

	pub async fn with_config(config: AppConfig) -> anyhow::Result<Arc<Self>> {
		let db = Database::create(&config.db_path()).await?;
		db.migrate().await?;
		let conn = db.conn().clone();

		let events = SyncEventBus::new_with_capacity(config.sync.event_bus_capacity);
		let registry = Arc::new(ConnectionRegistry::new());
		let ledger = SyncLedger::new(conn.clone());
		let agents = AgentService::new(conn.clone(), config.auth.api_key_salt.clone());
		let contacts = ContactService::new(MutationLog::new(conn.clone()), events.clone());
		let delta = DeltaResolver::new(
			conn.clone(),
			ledger.clone(),
			config.sync.batch_limit,
			config.pull_timeout(),
		);
		let devices = DeviceMonitor::new(
			conn,
			ledger.clone(),
			agents.clone(),
			config.liveness_thresholds(),
			config.monitoring.outdated_threshold,
		);

		let broadcaster = spawn_broadcaster(&events, registry.clone());

		info!(
			data_dir = %config.data_dir.display(),
			batch_limit = config.sync.batch_limit,
			"Core initialized"
		);

		Ok(Arc::new(Self {
			config,
			db,
			agents,
			contacts,
			delta,
			ledger,
			devices,
			registry,
			broadcaster: Mutex::new(Some(broadcaster)),
		}))
	}

	pub fn config(&self) -> &AppConfig {
		&self.config
	}

	pub fn database(&self) -> &Database {
		&self.db
	}

	pub fn agents(&self) -> &AgentService {
		&self.agents
	}

	pub fn contacts(&self) -> &ContactService {
		&self.contacts
	}

	pub fn delta(&self) -> &DeltaResolver {
		&self.delta
	}

	pub fn ledger(&self) -> &SyncLedger {
		&self.ledger
	}

	pub fn devices(&self) -> &DeviceMonitor {
		&self.devices
	}

	pub fn registry(&self) -> &Arc<ConnectionRegistry> {
		&self.registry
	}

	pub async fn current_version(&self) -> Result<i64> {
		Ok(VersionAuthority::current_version(self.db.conn()).await?)
	}

	/// Starts an unauthenticated push session. The receiver yields pushes
	/// fanned out to this connection once it authenticates.
	pub fn open_push_session(&self) -> (PushSession, mpsc::Receiver<ServerMessage>) {
		let (tx, rx) = mpsc::channel(self.config.sync.outbound_queue_size.max(1));
		let session = PushSession::new(
			self.agents.clone(),
			self.contacts.clone(),
			self.delta.clone(),
			self.registry.clone(),
			tx,
		);
		(session, rx)
	}

	/// Stops the broadcaster; live sessions receive no further pushes
	pub fn shutdown(&self) {
		if let Some(handle) = self.broadcaster.lock().take() {
			handle.abort();
			info!("Core shut down");
		}
	}
}

impl Drop for Core {
	fn drop(&mut self) {
		self.shutdown();
	}
}
