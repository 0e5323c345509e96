//! Per-connection push protocol state
//!
//! A session starts unauthenticated. A successful `auth` registers it in the
//! connection registry; a failed one closes it. Dropping the session
//! unregisters it.

use super::protocol::{AckPayload, ClientFrame, ClientMessage, ServerMessage};
use super::registry::{ConnectionHandle, ConnectionRegistry};
use crate::domain::ConnectionId;
use crate::error::Error;
use crate::infra::sync::{DeltaResolver, SyncRequest};
use crate::service::agents::AgentService;
use crate::service::contacts::{ContactService, MutationOrigin};
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
enum SessionState {
	Unauthenticated,
	Authenticated { agent_code: String, device_id: String },
	Closed,
}

/// Replies to one client frame, in order
#[derive(Debug, Default)]
pub struct SessionReply {
	pub messages: Vec<ServerMessage>,
	/// The transport should close after sending `messages`
	pub close: bool,
}

impl SessionReply {
	fn send(message: ServerMessage) -> Self {
		Self {
			messages: vec![message],
			close: false,
		}
	}

	fn close_with(message: ServerMessage) -> Self {
		Self {
			messages: vec![message],
			close: true,
		}
	}
}

pub struct PushSession {
	id: ConnectionId,
	state: SessionState,
	agents: AgentService,
	contacts: ContactService,
	delta: DeltaResolver,
	registry: Arc<ConnectionRegistry>,
	outbound: mpsc::Sender<ServerMessage>,
}

impl PushSession {
	pub fn new(
		agents: AgentService,
		contacts: ContactService,
		delta: DeltaResolver,
		registry: Arc<ConnectionRegistry>,
		outbound: mpsc::Sender<ServerMessage>,
	) -> Self {
		Self {
			id: ConnectionId::new(),
			state: SessionState::Unauthenticated,
			agents,
			contacts,
			delta,
			registry,
			outbound,
		}
	}

	pub fn id(&self) -> ConnectionId {
		self.id
	}

	pub fn is_authenticated(&self) -> bool {
		matches!(self.state, SessionState::Authenticated { .. })
	}

	pub fn is_closed(&self) -> bool {
		self.state == SessionState::Closed
	}

	/// Handles one text frame from the client
	pub async fn handle_frame(&mut self, text: &str) -> SessionReply {
		if self.is_closed() {
			return SessionReply {
				messages: Vec::new(),
				close: true,
			};
		}

		let frame: ClientFrame = match serde_json::from_str(text) {
			Ok(frame) => frame,
			Err(e) => {
				warn!(connection_id = %self.id, error = %e, "Rejected malformed frame");
				self.close();
				return SessionReply::close_with(ServerMessage::Rejected {
					reason: format!("Invalid message format: {e}"),
				});
			}
		};

		debug!(
			connection_id = %self.id,
			message = frame.message.name(),
			"Received push frame"
		);

		let request_id = frame.request_id;
		match frame.message {
			ClientMessage::Auth {
				api_key,
				agent_code,
				device_id,
			} => self.authenticate(request_id, &api_key, &agent_code, &device_id).await,
			ClientMessage::Ping => SessionReply::send(ServerMessage::Pong {
				request_id,
				timestamp: Utc::now().timestamp_millis(),
			}),
			message => {
				let SessionState::Authenticated {
					agent_code,
					device_id,
				} = self.state.clone()
				else {
					return SessionReply::send(ServerMessage::ack_error(
						request_id,
						"Not authenticated",
					));
				};
				self.dispatch(request_id, message, agent_code, device_id).await
			}
		}
	}

	async fn authenticate(
		&mut self,
		request_id: Option<String>,
		api_key: &str,
		agent_code: &str,
		device_id: &str,
	) -> SessionReply {
		let result = if device_id.trim().is_empty() {
			Err(Error::validation("device_id is required"))
		} else {
			self.agents.authenticate_as(api_key, agent_code).await
		};

		let agent = match result {
			Ok(agent) => agent,
			Err(e) => {
				let reason = match e {
					Error::AgentInactive(_) => "Agent is inactive",
					Error::Storage(_) => "Authentication failed",
					_ => "Invalid credentials",
				};
				warn!(
					connection_id = %self.id,
					agent_code = %agent_code,
					error = %e,
					"Push authentication failed"
				);
				self.close();
				return SessionReply::close_with(ServerMessage::AuthResult {
					request_id,
					success: false,
					agent_code: None,
					agent_name: None,
					error: Some(reason.to_string()),
				});
			}
		};

		if let SessionState::Authenticated {
			agent_code: old_agent,
			device_id: old_device,
		} = &self.state
		{
			self.registry.unregister(old_agent, old_device, self.id);
		}

		self.registry.register(ConnectionHandle::new(
			self.id,
			agent.agent_code.clone(),
			device_id,
			self.outbound.clone(),
		));
		self.state = SessionState::Authenticated {
			agent_code: agent.agent_code.clone(),
			device_id: device_id.to_string(),
		};

		info!(
			connection_id = %self.id,
			agent_code = %agent.agent_code,
			device_id = %device_id,
			"Push session authenticated"
		);

		SessionReply::send(ServerMessage::AuthResult {
			request_id,
			success: true,
			agent_code: Some(agent.agent_code),
			agent_name: Some(agent.agent_name),
			error: None,
		})
	}

	async fn dispatch(
		&self,
		request_id: Option<String>,
		message: ClientMessage,
		agent_code: String,
		device_id: String,
	) -> SessionReply {
		let origin = MutationOrigin::connection(agent_code.clone(), self.id);

		let result = match message {
			ClientMessage::SyncRequest { last_known_version } => {
				let request = SyncRequest {
					device_id,
					agent_code,
					last_known_version,
				};
				return match self.delta.resolve(&request).await {
					Ok(response) => {
						let complete = ServerMessage::SyncComplete {
							current_version: response.current_version,
							changes_count: response.changes.len(),
						};
						SessionReply {
							messages: vec![
								ServerMessage::ack(request_id, AckPayload::Sync(response)),
								complete,
							],
							close: false,
						}
					}
					Err(e) => SessionReply::send(ServerMessage::ack_error(request_id, e.to_string())),
				};
			}
			ClientMessage::ContactCreate { data } => self.contacts.create(data, &origin).await,
			ClientMessage::ContactUpdate { id, data } => {
				self.contacts.update(id, data, &origin).await
			}
			ClientMessage::ContactDelete { id } => {
				return match self.contacts.delete(id, &origin).await {
					Ok(_) => SessionReply::send(ServerMessage::Ack {
						request_id,
						success: true,
						data: None,
						message: Some("Contact deleted".to_string()),
						error: None,
					}),
					Err(e) => SessionReply::send(ServerMessage::ack_error(request_id, e.to_string())),
				};
			}
			ClientMessage::Auth { .. } | ClientMessage::Ping => {
				return SessionReply::send(ServerMessage::ack_error(request_id, "Unexpected message"));
			}
		};

		match result {
			Ok(contact) => SessionReply::send(ServerMessage::ack(request_id, AckPayload::Contact(contact))),
			Err(e) => SessionReply::send(ServerMessage::ack_error(request_id, e.to_string())),
		}
	}

	fn close(&mut self) {
		if let SessionState::Authenticated {
			agent_code,
			device_id,
		} = &self.state
		{
			self.registry.unregister(agent_code, device_id, self.id);
		}
		self.state = SessionState::Closed;
	}
}

impl Drop for PushSession {
	fn drop(&mut self) {
		self.close();
		debug!(connection_id = %self.id, "Push session closed");
	}
}
