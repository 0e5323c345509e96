//! WebSocket transport for push sessions
//!
//! Text frames are handed to the session as they arrive. Replies go out
//! immediately, fanned-out pushes are drained from the outbound queue, and a
//! ping keeps idle connections alive through proxies.

use crate::api::AppState;
use axum::{
	extract::{
		ws::{Message, WebSocket, WebSocketUpgrade},
		State,
	},
	response::Response,
};
use roster_core::service::realtime::ServerMessage;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

pub async fn upgrade(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
	ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(mut socket: WebSocket, state: AppState) {
	let (mut session, mut outbound) = state.core.open_push_session();
	let connection_id = session.id();
	debug!(%connection_id, "WebSocket connected");

	let mut ping = interval(state.core.config().ws_ping_interval());
	ping.set_missed_tick_behavior(MissedTickBehavior::Delay);
	ping.tick().await;

	loop {
		tokio::select! {
			frame = socket.recv() => match frame {
				Some(Ok(Message::Text(text))) => {
					let reply = session.handle_frame(&text).await;
					for message in &reply.messages {
						if send(&mut socket, message).await.is_err() {
							return;
						}
					}
					if reply.close {
						let _ = socket.send(Message::Close(None)).await;
						break;
					}
				}
				Some(Ok(Message::Binary(_))) => {
					warn!(%connection_id, "Ignoring binary frame");
				}
				Some(Ok(Message::Ping(data))) => {
					if socket.send(Message::Pong(data)).await.is_err() {
						break;
					}
				}
				Some(Ok(Message::Pong(_))) => {}
				Some(Ok(Message::Close(_))) | None => break,
				Some(Err(e)) => {
					debug!(%connection_id, error = %e, "WebSocket receive failed");
					break;
				}
			},
			Some(message) = outbound.recv() => {
				if send(&mut socket, &message).await.is_err() {
					break;
				}
			}
			_ = ping.tick() => {
				if socket.send(Message::Ping(Vec::new())).await.is_err() {
					break;
				}
			}
		}
	}

	info!(%connection_id, authenticated = session.is_authenticated(), "WebSocket closed");
}

async fn send(socket: &mut WebSocket, message: &ServerMessage) -> Result<(), axum::Error> {
	match serde_json::to_string(message) {
		Ok(json) => socket.send(Message::Text(json)).await,
		Err(e) => {
			warn!(error = %e, "Failed to serialize push message");
			Ok(())
		}
	}
}
