//! Sales agents and their API keys

use chrono::{DateTime, Utc};
use rand::{distributions::Alphanumeric, Rng};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

const API_KEY_PREFIX: &str = "sk_";
const API_KEY_LENGTH: usize = 32;

/// A registered agent. Key material never leaves the directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Agent {
	pub agent_code: String,
	pub agent_name: String,
	pub is_active: bool,
	pub created_at: DateTime<Utc>,
	pub last_seen: Option<DateTime<Utc>>,
}

/// Returned once from registration; the plaintext key is not stored.
#[derive(Debug, Clone, Serialize)]
pub struct RegisteredAgent {
	pub agent: Agent,
	pub api_key: String,
}

pub fn generate_api_key() -> String {
	let suffix: String = rand::thread_rng()
		.sample_iter(&Alphanumeric)
		.take(API_KEY_LENGTH)
		.map(char::from)
		.collect();
	format!("{API_KEY_PREFIX}{suffix}")
}

/// Hex SHA-256 of `salt + key`
pub fn hash_api_key(api_key: &str, salt: &str) -> String {
	let mut hasher = Sha256::new();
	hasher.update(salt.as_bytes());
	hasher.update(api_key.as_bytes());
	hex::encode(hasher.finalize())
}
