//! Connection registry
//!
//! In-memory set of authenticated push connections keyed by (agent, device).
//! The lock is only held for map operations, never across an await.

use super::protocol::ServerMessage;
use crate::domain::ConnectionId;
use parking_lot::RwLock;
use std::collections::HashMap;
use tokio::sync::mpsc;
use tracing::{debug, info};

/// Sending half of one connection's bounded outbound queue
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
	pub id: ConnectionId,
	pub agent_code: String,
	pub device_id: String,
	outbound: mpsc::Sender<ServerMessage>,
}

impl ConnectionHandle {
	pub fn new(
		id: ConnectionId,
		agent_code: impl Into<String>,
		device_id: impl Into<String>,
		outbound: mpsc::Sender<ServerMessage>,
	) -> Self {
		Self {
			id,
			agent_code: agent_code.into(),
			device_id: device_id.into(),
			outbound,
		}
	}

	/// Never waits; a full or closed queue returns the message
	pub fn try_deliver(
		&self,
		message: ServerMessage,
	) -> Result<(), mpsc::error::TrySendError<ServerMessage>> {
		self.outbound.try_send(message)
	}
}

#[derive(Debug, Default)]
pub struct ConnectionRegistry {
	connections: RwLock<HashMap<(String, String), ConnectionHandle>>,
}

impl ConnectionRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	/// Registers a connection, returning the one it replaced for the same
	/// (agent, device)
	pub fn register(&self, handle: ConnectionHandle) -> Option<ConnectionHandle> {
		let key = (handle.agent_code.clone(), handle.device_id.clone());
		let id = handle.id;
		let replaced = self.connections.write().insert(key, handle);

		match &replaced {
			Some(old) => info!(
				connection_id = %id,
				replaced = %old.id,
				agent_code = %old.agent_code,
				device_id = %old.device_id,
				"Connection replaced"
			),
			None => debug!(connection_id = %id, "Connection registered"),
		}

		replaced
	}

	/// Removes the entry only if it still belongs to `connection_id`
	pub fn unregister(&self, agent_code: &str, device_id: &str, connection_id: ConnectionId) -> bool {
		let mut connections = self.connections.write();
		let key = (agent_code.to_string(), device_id.to_string());

		match connections.get(&key) {
			Some(current) if current.id == connection_id => {
				connections.remove(&key);
				debug!(connection_id = %connection_id, "Connection unregistered");
				true
			}
			_ => false,
		}
	}

	/// Snapshot of every member except `origin`
	pub fn members_except(&self, origin: Option<ConnectionId>) -> Vec<ConnectionHandle> {
		self.connections
			.read()
			.values()
			.filter(|handle| Some(handle.id) != origin)
			.cloned()
			.collect()
	}

	pub fn contains(&self, connection_id: ConnectionId) -> bool {
		self.connections
			.read()
			.values()
			.any(|handle| handle.id == connection_id)
	}

	pub fn len(&self) -> usize {
		self.connections.read().len()
	}

	pub fn is_empty(&self) -> bool {
		self.connections.read().is_empty()
	}
}
