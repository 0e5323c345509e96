//! Push channel wire format
//!
//! JSON text frames tagged by `type`. A client frame may carry a
//! `request_id`, which is echoed on the matching reply.

use crate::domain::{Contact, ContactPatch, NewContact};
use crate::infra::sync::{ContactEvent, ContactEventKind, SyncResponse};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Deserialize)]
pub struct ClientFrame {
	#[serde(default)]
	pub request_id: Option<String>,
	#[serde(flatten)]
	pub message: ClientMessage,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
	Auth {
		api_key: String,
		agent_code: String,
		device_id: String,
	},
	SyncRequest {
		last_known_version: i64,
	},
	ContactCreate {
		data: NewContact,
	},
	ContactUpdate {
		id: Uuid,
		data: ContactPatch,
	},
	ContactDelete {
		id: Uuid,
	},
	Ping,
}

impl ClientMessage {
	pub fn name(&self) -> &'static str {
		match self {
			ClientMessage::Auth { .. } => "auth",
			ClientMessage::SyncRequest { .. } => "sync_request",
			ClientMessage::ContactCreate { .. } => "contact_create",
			ClientMessage::ContactUpdate { .. } => "contact_update",
			ClientMessage::ContactDelete { .. } => "contact_delete",
			ClientMessage::Ping => "ping",
		}
	}
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AckPayload {
	Sync(SyncResponse),
	Contact(Contact),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
	AuthResult {
		#[serde(skip_serializing_if = "Option::is_none")]
		request_id: Option<String>,
		success: bool,
		#[serde(skip_serializing_if = "Option::is_none")]
		agent_code: Option<String>,
		#[serde(skip_serializing_if = "Option::is_none")]
		agent_name: Option<String>,
		#[serde(skip_serializing_if = "Option::is_none")]
		error: Option<String>,
	},
	Ack {
		#[serde(skip_serializing_if = "Option::is_none")]
		request_id: Option<String>,
		success: bool,
		#[serde(skip_serializing_if = "Option::is_none")]
		data: Option<AckPayload>,
		#[serde(skip_serializing_if = "Option::is_none")]
		message: Option<String>,
		#[serde(skip_serializing_if = "Option::is_none")]
		error: Option<String>,
	},
	SyncComplete {
		current_version: i64,
		changes_count: usize,
	},
	ContactCreated {
		contact: Contact,
		version: i64,
		created_by: String,
	},
	ContactUpdated {
		contact: Contact,
		version: i64,
		updated_by: String,
	},
	ContactDeleted {
		contact_id: Uuid,
		version: i64,
		deleted_by: String,
	},
	Pong {
		#[serde(skip_serializing_if = "Option::is_none")]
		request_id: Option<String>,
		/// Milliseconds since the Unix epoch
		timestamp: i64,
	},
	Rejected {
		reason: String,
	},
}

impl ServerMessage {
	pub fn ack(request_id: Option<String>, data: AckPayload) -> Self {
		ServerMessage::Ack {
			request_id,
			success: true,
			data: Some(data),
			message: None,
			error: None,
		}
	}

	pub fn ack_error(request_id: Option<String>, error: impl Into<String>) -> Self {
		ServerMessage::Ack {
			request_id,
			success: false,
			data: None,
			message: None,
			error: Some(error.into()),
		}
	}

	pub fn from_event(event: &ContactEvent) -> Self {
		match event.kind {
			ContactEventKind::Created => ServerMessage::ContactCreated {
				contact: event.contact.clone(),
				version: event.version,
				created_by: event.actor.clone(),
			},
			ContactEventKind::Updated => ServerMessage::ContactUpdated {
				contact: event.contact.clone(),
				version: event.version,
				updated_by: event.actor.clone(),
			},
			ContactEventKind::Deleted => ServerMessage::ContactDeleted {
				contact_id: event.contact.id,
				version: event.version,
				deleted_by: event.actor.clone(),
			},
		}
	}
}
