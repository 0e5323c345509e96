//! Per-device sync ledger
//!
//! Keeps only the latest pull attempt for each (device, agent). Entries are
//! created on the first attempt and overwritten afterwards, never removed.

use crate::domain::{LedgerEntry, SyncOutcome};
use crate::error::Result;
use crate::infra::db::entities::sync_ledger;
use chrono::Utc;
use sea_orm::{
	sea_query::OnConflict, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
	Set,
};
use tracing::debug;

#[derive(Clone)]
pub struct SyncLedger {
	conn: DatabaseConnection,
}

impl SyncLedger {
	pub fn new(conn: DatabaseConnection) -> Self {
		Self { conn }
	}

	/// Upsert the latest attempt for `(device_id, agent_code)`
	pub async fn record_attempt(
		&self,
		device_id: &str,
		agent_code: &str,
		version_reached: i64,
		changes_delivered: i64,
		outcome: SyncOutcome,
	) -> Result<LedgerEntry> {
		let entry = LedgerEntry {
			device_id: device_id.to_string(),
			agent_code: agent_code.to_string(),
			last_sync_version: version_reached,
			last_sync_at: Utc::now(),
			sync_status: outcome,
			changes_count: changes_delivered,
		};

		let model = sync_ledger::ActiveModel {
			device_id: Set(entry.device_id.clone()),
			agent_code: Set(entry.agent_code.clone()),
			last_sync_version: Set(entry.last_sync_version),
			last_sync_at: Set(entry.last_sync_at),
			sync_status: Set(outcome.as_str().to_string()),
			changes_count: Set(entry.changes_count),
		};

		sync_ledger::Entity::insert(model)
			.on_conflict(
				OnConflict::columns([sync_ledger::Column::DeviceId, sync_ledger::Column::AgentCode])
					.update_columns([
						sync_ledger::Column::LastSyncVersion,
						sync_ledger::Column::LastSyncAt,
						sync_ledger::Column::SyncStatus,
						sync_ledger::Column::ChangesCount,
					])
					.to_owned(),
			)
			.exec_without_returning(&self.conn)
			.await?;

		debug!(
			device_id = %device_id,
			agent_code = %agent_code,
			version = version_reached,
			changes = changes_delivered,
			status = outcome.as_str(),
			"Recorded sync attempt"
		);

		Ok(entry)
	}

	pub async fn get(&self, device_id: &str, agent_code: &str) -> Result<Option<LedgerEntry>> {
		Ok(sync_ledger::Entity::find_by_id((device_id.to_string(), agent_code.to_string()))
			.one(&self.conn)
			.await?
			.map(LedgerEntry::from))
	}

	/// All entries, most recent sync first
	pub async fn entries(&self) -> Result<Vec<LedgerEntry>> {
		Ok(sync_ledger::Entity::find()
			.order_by_desc(sync_ledger::Column::LastSyncAt)
			.all(&self.conn)
			.await?
			.into_iter()
			.map(LedgerEntry::from)
			.collect())
	}

	pub async fn entries_for_agent(&self, agent_code: &str) -> Result<Vec<LedgerEntry>> {
		Ok(sync_ledger::Entity::find()
			.filter(sync_ledger::Column::AgentCode.eq(agent_code))
			.order_by_desc(sync_ledger::Column::LastSyncAt)
			.all(&self.conn)
			.await?
			.into_iter()
			.map(LedgerEntry::from)
			.collect())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::infra::db::test_database;

	#[tokio::test]
	async fn test_record_attempt_overwrites() {
		let (_dir, db) = test_database().await;
		let ledger = SyncLedger::new(db.conn().clone());

		assert!(ledger.get("phone-1", "AG001").await.unwrap().is_none());

		ledger
			.record_attempt("phone-1", "AG001", 5, 5, SyncOutcome::Success)
			.await
			.unwrap();
		ledger
			.record_attempt("phone-1", "AG001", 5, 0, SyncOutcome::Failed)
			.await
			.unwrap();
		ledger
			.record_attempt("phone-2", "AG002", 9, 9, SyncOutcome::Success)
			.await
			.unwrap();

		let entry = ledger.get("phone-1", "AG001").await.unwrap().unwrap();
		assert_eq!(entry.last_sync_version, 5);
		assert_eq!(entry.changes_count, 0);
		assert_eq!(entry.sync_status, SyncOutcome::Failed);

		assert_eq!(ledger.entries().await.unwrap().len(), 2);
		let for_agent = ledger.entries_for_agent("AG002").await.unwrap();
		assert_eq!(for_agent.len(), 1);
		assert_eq!(for_agent[0].device_id, "phone-2");
	}
}
