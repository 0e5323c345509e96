//! Agent directory
//!
//! Source of truth for authenticating both the pull and the push channel.
//! Only salted key hashes are stored; the plaintext key is handed out once
//! at registration.

use crate::domain::agent::{generate_api_key, hash_api_key};
use crate::domain::{Agent, RegisteredAgent};
use crate::error::{Error, Result, ValidationErrors};
use crate::infra::db::entities::agent;
use chrono::Utc;
use sea_orm::{
	sea_query::Expr, ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter,
	QueryOrder, Set, SqlErr,
};
use tracing::{debug, info, warn};

#[derive(Clone)]
pub struct AgentService {
	conn: DatabaseConnection,
	salt: String,
}

impl AgentService {
	pub fn new(conn: DatabaseConnection, salt: impl Into<String>) -> Self {
		Self {
			conn,
			salt: salt.into(),
		}
	}

	pub async fn register(&self, agent_code: &str, agent_name: &str) -> Result<RegisteredAgent> {
		let agent_code = agent_code.trim();
		let agent_name = agent_name.trim();

		let mut errors = ValidationErrors::new();
		if agent_code.is_empty() {
			errors.push("agent_code is required");
		}
		if agent_name.is_empty() {
			errors.push("agent_name is required");
		}
		errors.into_result()?;

		if agent::Entity::find_by_id(agent_code.to_string())
			.one(&self.conn)
			.await?
			.is_some()
		{
			return Err(Error::Conflict(format!("Agent code already exists: {agent_code}")));
		}

		let api_key = generate_api_key();
		let model = agent::ActiveModel {
			agent_code: Set(agent_code.to_string()),
			agent_name: Set(agent_name.to_string()),
			api_key_hash: Set(hash_api_key(&api_key, &self.salt)),
			is_active: Set(true),
			created_at: Set(Utc::now()),
			last_seen: Set(None),
		}
		.insert(&self.conn)
		.await
		// A concurrent registration can pass the lookup above
		.map_err(|e| match e.sql_err() {
			Some(SqlErr::UniqueConstraintViolation(_)) => {
				Error::Conflict(format!("Agent code already exists: {agent_code}"))
			}
			_ => Error::Storage(e),
		})?;

		info!(agent_code = %agent_code, "Agent registered");

		Ok(RegisteredAgent {
			agent: model.into(),
			api_key,
		})
	}

	/// Resolves an API key to an active agent and touches its `last_seen`
	pub async fn authenticate(&self, api_key: &str) -> Result<Agent> {
		let api_key = api_key.trim();
		if api_key.is_empty() {
			return Err(Error::Authentication("API key required".to_string()));
		}

		let model = agent::Entity::find()
			.filter(agent::Column::ApiKeyHash.eq(hash_api_key(api_key, &self.salt)))
			.one(&self.conn)
			.await?
			.ok_or_else(|| {
				debug!("Rejected unknown API key");
				Error::Authentication("Invalid API key".to_string())
			})?;

		if !model.is_active {
			warn!(agent_code = %model.agent_code, "Inactive agent attempted to authenticate");
			return Err(Error::AgentInactive(model.agent_code));
		}

		let now = Utc::now();
		agent::Entity::update_many()
			.col_expr(agent::Column::LastSeen, Expr::value(now))
			.filter(agent::Column::AgentCode.eq(model.agent_code.as_str()))
			.exec(&self.conn)
			.await?;

		let mut agent = Agent::from(model);
		agent.last_seen = Some(now);
		Ok(agent)
	}

	/// Like [`Self::authenticate`], but the key must belong to `agent_code`
	pub async fn authenticate_as(&self, api_key: &str, agent_code: &str) -> Result<Agent> {
		let agent = self.authenticate(api_key).await?;
		if agent.agent_code != agent_code {
			warn!(
				claimed = %agent_code,
				actual = %agent.agent_code,
				"API key presented for another agent"
			);
			return Err(Error::Authentication(
				"API key does not belong to this agent".to_string(),
			));
		}
		Ok(agent)
	}

	pub async fn get(&self, agent_code: &str) -> Result<Agent> {
		agent::Entity::find_by_id(agent_code.to_string())
			.one(&self.conn)
			.await?
			.map(Agent::from)
			.ok_or_else(|| Error::not_found("Agent", agent_code))
	}

	pub async fn list(&self) -> Result<Vec<Agent>> {
		Ok(agent::Entity::find()
			.order_by_asc(agent::Column::AgentCode)
			.all(&self.conn)
			.await?
			.into_iter()
			.map(Agent::from)
			.collect())
	}

	pub async fn set_active(&self, agent_code: &str, active: bool) -> Result<Agent> {
		let model = agent::Entity::find_by_id(agent_code.to_string())
			.one(&self.conn)
			.await?
			.ok_or_else(|| Error::not_found("Agent", agent_code))?;

		let mut active_model: agent::ActiveModel = model.into();
		active_model.is_active = Set(active);
		let updated = active_model.update(&self.conn).await?;

		info!(agent_code = %agent_code, active, "Agent activation changed");

		Ok(updated.into())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::infra::db::test_database;

	#[tokio::test]
	async fn test_register_and_authenticate() {
		let (_dir, db) = test_database().await;
		let agents = AgentService::new(db.conn().clone(), "salt");

		let registered = agents.register(" AG001 ", "Alice").await.unwrap();
		assert_eq!(registered.agent.agent_code, "AG001");
		assert!(registered.api_key.starts_with("sk_"));

		let agent = agents.authenticate(&registered.api_key).await.unwrap();
		assert_eq!(agent.agent_code, "AG001");
		assert!(agent.last_seen.is_some());

		assert!(agents.get("AG001").await.unwrap().last_seen.is_some());
		assert!(agents.authenticate_as(&registered.api_key, "AG001").await.is_ok());
	}

	#[tokio::test]
	async fn test_rejections() {
		let (_dir, db) = test_database().await;
		let agents = AgentService::new(db.conn().clone(), "salt");
		let registered = agents.register("AG001", "Alice").await.unwrap();
		agents.register("AG002", "Bob").await.unwrap();

		assert!(matches!(
			agents.register("AG001", "Again").await,
			Err(Error::Conflict(_))
		));
		assert!(matches!(
			agents.register("", " ").await,
			Err(Error::Validation(errors)) if errors.messages().len() == 2
		));
		assert!(matches!(
			agents.authenticate("sk_unknown").await,
			Err(Error::Authentication(_))
		));
		assert!(matches!(
			agents.authenticate_as(&registered.api_key, "AG002").await,
			Err(Error::Authentication(_))
		));

		agents.set_active("AG001", false).await.unwrap();
		assert!(matches!(
			agents.authenticate(&registered.api_key).await,
			Err(Error::AgentInactive(_))
		));
	}

	#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
	async fn test_concurrent_register_same_code() {
		let (_dir, db) = test_database().await;
		let agents = AgentService::new(db.conn().clone(), "salt");

		let (first, second) = tokio::join!(
			agents.register("AG001", "Alice"),
			agents.register("AG001", "Alice")
		);

		let results = [first, second];
		assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
		assert!(results
			.iter()
			.any(|r| matches!(r, Err(Error::Conflict(message)) if message.contains("AG001"))));
		assert_eq!(agents.list().await.unwrap().len(), 1);
	}

	#[tokio::test]
	async fn test_salt_changes_hash() {
		let (_dir, db) = test_database().await;
		let registered = AgentService::new(db.conn().clone(), "salt-a")
			.register("AG001", "Alice")
			.await
			.unwrap();

		let other = AgentService::new(db.conn().clone(), "salt-b");
		assert!(other.authenticate(&registered.api_key).await.is_err());
		assert_eq!(other.list().await.unwrap().len(), 1);
	}
}
