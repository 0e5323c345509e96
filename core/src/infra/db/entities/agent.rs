use crate::domain;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "agents")]
pub struct Model {
	#[sea_orm(primary_key, auto_increment = false)]
	pub agent_code: String,

	pub agent_name: String,

	/// Hex SHA-256 of salt + key
	#[sea_orm(unique)]
	#[serde(skip_serializing)]
	pub api_key_hash: String,

	pub is_active: bool,

	pub created_at: DateTimeUtc,

	pub last_seen: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for domain::Agent {
	fn from(model: Model) -> Self {
		Self {
			agent_code: model.agent_code,
			agent_name: model.agent_name,
			is_active: model.is_active,
			created_at: model.created_at,
			last_seen: model.last_seen,
		}
	}
}
