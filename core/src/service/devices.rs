//! Device monitoring
//!
//! Read-only views derived from the sync ledger. Devices that only ever
//! received pushes have no ledger entry and do not appear here.

use super::agents::AgentService;
use crate::domain::{
	Agent, DeviceStatus, HealthSummary, LedgerEntry, LivenessThresholds, SyncStatistics,
};
use crate::error::Result;
use crate::infra::sync::{SyncLedger, VersionAuthority};
use chrono::Utc;
use sea_orm::DatabaseConnection;
use std::collections::HashMap;

#[derive(Clone)]
pub struct DeviceMonitor {
	conn: DatabaseConnection,
	ledger: SyncLedger,
	agents: AgentService,
	thresholds: LivenessThresholds,
	default_outdated_threshold: i64,
}

impl DeviceMonitor {
	pub fn new(
		conn: DatabaseConnection,
		ledger: SyncLedger,
		agents: AgentService,
		thresholds: LivenessThresholds,
		default_outdated_threshold: i64,
	) -> Self {
		Self {
			conn,
			ledger,
			agents,
			thresholds,
			default_outdated_threshold,
		}
	}

	/// Every known device, most recently synced first
	pub async fn all_device_status(&self) -> Result<Vec<DeviceStatus>> {
		Ok(self.snapshot().await?.1)
	}

	pub async fn device_status_by_agent(&self, agent_code: &str) -> Result<Vec<DeviceStatus>> {
		let current_version = VersionAuthority::current_version(&self.conn).await?;
		let entries = self.ledger.entries_for_agent(agent_code).await?;
		self.derive_all(entries, current_version).await
	}

	/// Devices strictly more than `threshold` versions behind, furthest first
	pub async fn outdated_devices(&self, threshold: Option<i64>) -> Result<Vec<DeviceStatus>> {
		let threshold = threshold.unwrap_or(self.default_outdated_threshold);
		let mut outdated: Vec<_> = self
			.all_device_status()
			.await?
			.into_iter()
			.filter(|status| status.is_outdated(threshold))
			.collect();
		outdated.sort_by(|a, b| b.versions_behind.cmp(&a.versions_behind));
		Ok(outdated)
	}

	pub async fn health_summary(&self, threshold: Option<i64>) -> Result<HealthSummary> {
		let threshold = threshold.unwrap_or(self.default_outdated_threshold);
		let (current_version, statuses) = self.snapshot().await?;
		Ok(HealthSummary::from_statuses(&statuses, threshold, current_version))
	}

	pub async fn sync_statistics(&self) -> Result<SyncStatistics> {
		let (current_version, statuses) = self.snapshot().await?;
		Ok(SyncStatistics::from_statuses(&statuses, Utc::now(), current_version))
	}

	/// Statuses of every device, all measured against the returned version
	async fn snapshot(&self) -> Result<(i64, Vec<DeviceStatus>)> {
		let current_version = VersionAuthority::current_version(&self.conn).await?;
		let entries = self.ledger.entries().await?;
		let statuses = self.derive_all(entries, current_version).await?;
		Ok((current_version, statuses))
	}

	async fn derive_all(
		&self,
		entries: Vec<LedgerEntry>,
		current_version: i64,
	) -> Result<Vec<DeviceStatus>> {
		let agents: HashMap<String, Agent> = self
			.agents
			.list()
			.await?
			.into_iter()
			.map(|agent| (agent.agent_code.clone(), agent))
			.collect();
		let now = Utc::now();

		Ok(entries
			.into_iter()
			.map(|entry| {
				let agent = agents.get(&entry.agent_code);
				DeviceStatus::derive(entry, agent, current_version, now, &self.thresholds)
			})
			.collect())
	}
}
