use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identity of one live push connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
	pub fn new() -> Self {
		Self(Uuid::new_v4())
	}
}

impl Default for ConnectionId {
	fn default() -> Self {
		Self::new()
	}
}

impl fmt::Display for ConnectionId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		self.0.fmt(f)
	}
}
