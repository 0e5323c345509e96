//! Shared fixtures for integration tests

#![allow(dead_code)]

use roster_core::{
	config::AppConfig,
	domain::{NewContact, RegisteredAgent},
	service::{
		realtime::{PushSession, ServerMessage},
		MutationOrigin,
	},
	Core,
};
use serde_json::json;
use std::sync::Arc;
use tempfile::TempDir;
use tokio::sync::mpsc;

/// A core backed by a throwaway data directory
pub struct TestCore {
	pub core: Arc<Core>,
	_dir: TempDir,
}

impl TestCore {
	pub async fn new() -> Self {
		Self::with(|_| {}).await
	}

	pub async fn with(configure: impl FnOnce(&mut AppConfig)) -> Self {
		let dir = TempDir::new().unwrap();
		let mut config = AppConfig::default_with_dir(dir.path().to_path_buf());
		configure(&mut config);
		let core = Core::with_config(config).await.unwrap();
		Self { core, _dir: dir }
	}

	pub async fn register_agent(&self, code: &str) -> RegisteredAgent {
		self.core
			.agents()
			.register(code, &format!("Agent {code}"))
			.await
			.unwrap()
	}

	/// Opens a push session and authenticates it as `agent` on `device_id`
	pub async fn connect(
		&self,
		agent: &RegisteredAgent,
		device_id: &str,
	) -> (PushSession, mpsc::Receiver<ServerMessage>) {
		let (mut session, rx) = self.core.open_push_session();
		let reply = session
			.handle_frame(&auth_frame(agent, device_id))
			.await;
		assert!(!reply.close, "authentication failed: {:?}", reply.messages);
		(session, rx)
	}
}

pub fn origin(code: &str) -> MutationOrigin {
	MutationOrigin::agent(code)
}

pub fn jane() -> NewContact {
	NewContact::new("Jane", "Doe").with_phone("+1 (555) 010-2030")
}

pub fn auth_frame(agent: &RegisteredAgent, device_id: &str) -> String {
	json!({
		"type": "auth",
		"api_key": agent.api_key,
		"agent_code": agent.agent.agent_code,
		"device_id": device_id,
	})
	.to_string()
}
