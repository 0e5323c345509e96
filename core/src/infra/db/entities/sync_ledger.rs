//! Sync ledger entity
//!
//! One row per (device, agent), overwritten on every pull attempt.

use crate::domain::{LedgerEntry, SyncOutcome};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "sync_ledger")]
pub struct Model {
	#[sea_orm(primary_key, auto_increment = false)]
	pub device_id: String,

	#[sea_orm(primary_key, auto_increment = false)]
	pub agent_code: String,

	/// Version the device reached on its last attempt
	pub last_sync_version: i64,

	pub last_sync_at: DateTimeUtc,

	/// "success" or "failed"
	pub sync_status: String,

	pub changes_count: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for LedgerEntry {
	fn from(model: Model) -> Self {
		Self {
			// Anything unrecognised was written by a failed attempt
			sync_status: SyncOutcome::parse(&model.sync_status).unwrap_or(SyncOutcome::Failed),
			device_id: model.device_id,
			agent_code: model.agent_code,
			last_sync_version: model.last_sync_version,
			last_sync_at: model.last_sync_at,
			changes_count: model.changes_count,
		}
	}
}
