//! Fans committed mutations out to live connections
//!
//! Delivery is best-effort: a full or closed outbound queue drops that one
//! delivery. Devices recover anything they missed on their next pull.

use super::protocol::ServerMessage;
use super::registry::ConnectionRegistry;
use crate::infra::sync::{ContactEvent, SyncEventBus};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc::error::TrySendError};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FanOutStats {
	pub delivered: usize,
	pub dropped: usize,
}

pub fn spawn_broadcaster(bus: &SyncEventBus, registry: Arc<ConnectionRegistry>) -> JoinHandle<()> {
	let mut events = bus.subscribe();

	tokio::spawn(async move {
		info!("Realtime broadcaster started");
		loop {
			match events.recv().await {
				Ok(event) => {
					fan_out(&registry, &event);
				}
				Err(broadcast::error::RecvError::Lagged(skipped)) => {
					warn!(skipped, "Broadcaster lagged behind the event bus, events dropped");
				}
				Err(broadcast::error::RecvError::Closed) => {
					info!("Event bus closed, broadcaster stopping");
					break;
				}
			}
		}
	})
}

/// Delivers one event to every member except its originating connection
pub fn fan_out(registry: &ConnectionRegistry, event: &ContactEvent) -> FanOutStats {
	let message = ServerMessage::from_event(event);
	let mut stats = FanOutStats::default();

	for member in registry.members_except(event.origin) {
		match member.try_deliver(message.clone()) {
			Ok(()) => stats.delivered += 1,
			Err(TrySendError::Full(_)) => {
				stats.dropped += 1;
				warn!(
					connection_id = %member.id,
					agent_code = %member.agent_code,
					device_id = %member.device_id,
					version = event.version,
					"Outbound queue full, dropping push"
				);
			}
			Err(TrySendError::Closed(_)) => {
				stats.dropped += 1;
				debug!(connection_id = %member.id, "Outbound queue closed, dropping push");
			}
		}
	}

	debug!(
		contact_id = %event.contact.id,
		version = event.version,
		delivered = stats.delivered,
		dropped = stats.dropped,
		"Fanned out contact event"
	);

	stats
}
