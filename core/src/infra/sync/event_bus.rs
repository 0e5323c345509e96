//! Event bus for committed contact mutations
//!
//! Feeds the realtime broadcaster. Emission never blocks the commit path: a
//! lagging subscriber loses events and the devices behind it recover through
//! their next pull.

use crate::domain::{ConnectionId, Contact};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;

pub const DEFAULT_CAPACITY: usize = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContactEventKind {
	Created,
	Updated,
	Deleted,
}

impl ContactEventKind {
	pub fn as_str(&self) -> &'static str {
		match self {
			ContactEventKind::Created => "created",
			ContactEventKind::Updated => "updated",
			ContactEventKind::Deleted => "deleted",
		}
	}
}

/// One committed mutation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContactEvent {
	pub kind: ContactEventKind,
	pub contact: Contact,
	pub version: i64,
	/// Agent who performed the mutation
	pub actor: String,
	/// Push connection the mutation arrived on; it is not echoed back there
	pub origin: Option<ConnectionId>,
}

#[derive(Debug, Clone)]
pub struct SyncEventBus {
	sender: broadcast::Sender<ContactEvent>,
}

impl SyncEventBus {
	pub fn new() -> Self {
		Self::new_with_capacity(DEFAULT_CAPACITY)
	}

	pub fn new_with_capacity(capacity: usize) -> Self {
		let (sender, _) = broadcast::channel(capacity.max(1));
		debug!("Created sync event bus with capacity {}", capacity);
		Self { sender }
	}

	/// Returns the number of subscribers that will see the event
	pub fn emit(&self, event: ContactEvent) -> usize {
		let kind = event.kind.as_str();
		let contact_id = event.contact.id;
		let version = event.version;

		match self.sender.send(event) {
			Ok(count) => {
				debug!(
					kind,
					contact_id = %contact_id,
					version,
					subscribers = count,
					"Contact event emitted"
				);
				count
			}
			Err(_) => {
				debug!(
					kind,
					contact_id = %contact_id,
					version,
					"Contact event emitted but no subscribers"
				);
				0
			}
		}
	}

	pub fn subscribe(&self) -> broadcast::Receiver<ContactEvent> {
		self.sender.subscribe()
	}
}

impl Default for SyncEventBus {
	fn default() -> Self {
		Self::new()
	}
}
