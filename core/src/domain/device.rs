//! Device sync state as seen by monitoring
//!
//! Nothing here is stored except [`LedgerEntry`]. Liveness and staleness are
//! derived on read from the ledger, the agent directory and the current
//! global version.

use super::agent::Agent;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Outcome of the most recent pull from a device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncOutcome {
	Success,
	Failed,
}

impl SyncOutcome {
	pub fn as_str(&self) -> &'static str {
		match self {
			SyncOutcome::Success => "success",
			SyncOutcome::Failed => "failed",
		}
	}

	pub fn parse(value: &str) -> Option<Self> {
		match value {
			"success" => Some(SyncOutcome::Success),
			"failed" => Some(SyncOutcome::Failed),
			_ => None,
		}
	}
}

/// Latest sync attempt of one (device, agent) pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
	pub device_id: String,
	pub agent_code: String,
	pub last_sync_version: i64,
	pub last_sync_at: DateTime<Utc>,
	pub sync_status: SyncOutcome,
	/// Changes delivered by that attempt
	pub changes_count: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
	Online,
	Idle,
	Offline,
}

/// Recency windows used to bucket `now - last_sync_at`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LivenessThresholds {
	pub online_within: Duration,
	pub idle_within: Duration,
}

impl LivenessThresholds {
	pub fn classify(&self, elapsed: Duration) -> ConnectionStatus {
		if elapsed < self.online_within {
			ConnectionStatus::Online
		} else if elapsed < self.idle_within {
			ConnectionStatus::Idle
		} else {
			ConnectionStatus::Offline
		}
	}
}

impl Default for LivenessThresholds {
	fn default() -> Self {
		Self {
			online_within: Duration::seconds(60),
			idle_within: Duration::minutes(15),
		}
	}
}

/// Ledger entry joined with its agent and the current version
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceStatus {
	pub device_id: String,
	pub agent_code: String,
	/// `None` when the agent has since been removed from the directory
	pub agent_name: Option<String>,
	pub agent_active: bool,
	pub last_sync_version: i64,
	pub last_sync_at: DateTime<Utc>,
	pub sync_status: SyncOutcome,
	pub changes_count: i64,
	pub current_version: i64,
	pub versions_behind: i64,
	pub connection_status: ConnectionStatus,
}

impl DeviceStatus {
	pub fn derive(
		entry: LedgerEntry,
		agent: Option<&Agent>,
		current_version: i64,
		now: DateTime<Utc>,
		thresholds: &LivenessThresholds,
	) -> Self {
		let connection_status = thresholds.classify(now - entry.last_sync_at);

		Self {
			versions_behind: current_version - entry.last_sync_version,
			agent_name: agent.map(|a| a.agent_name.clone()),
			agent_active: agent.map(|a| a.is_active).unwrap_or(false),
			device_id: entry.device_id,
			agent_code: entry.agent_code,
			last_sync_version: entry.last_sync_version,
			last_sync_at: entry.last_sync_at,
			sync_status: entry.sync_status,
			changes_count: entry.changes_count,
			current_version,
			connection_status,
		}
	}

	/// Strictly more than `threshold` versions behind
	pub fn is_outdated(&self, threshold: i64) -> bool {
		self.versions_behind > threshold
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthSummary {
	pub total_devices: usize,
	pub online: usize,
	pub idle: usize,
	pub offline: usize,
	pub outdated: usize,
	pub outdated_threshold: i64,
	/// `online / total * 100`, or 100 with no devices
	pub health_percentage: f64,
	pub current_version: i64,
}

impl HealthSummary {
	pub fn from_statuses(statuses: &[DeviceStatus], threshold: i64, current_version: i64) -> Self {
		let count = |status: ConnectionStatus| {
			statuses
				.iter()
				.filter(|s| s.connection_status == status)
				.count()
		};
		let online = count(ConnectionStatus::Online);
		let total_devices = statuses.len();

		let health_percentage = if total_devices == 0 {
			100.0
		} else {
			online as f64 / total_devices as f64 * 100.0
		};

		Self {
			total_devices,
			online,
			idle: count(ConnectionStatus::Idle),
			offline: count(ConnectionStatus::Offline),
			outdated: statuses.iter().filter(|s| s.is_outdated(threshold)).count(),
			outdated_threshold: threshold,
			health_percentage,
			current_version,
		}
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncStatistics {
	pub total_devices: usize,
	pub total_agents: usize,
	pub synced_last_hour: usize,
	pub synced_last_day: usize,
	pub failed_syncs: usize,
	pub avg_versions_behind: f64,
	pub max_versions_behind: i64,
	pub total_changes_delivered: i64,
	pub current_version: i64,
}

impl SyncStatistics {
	pub fn from_statuses(statuses: &[DeviceStatus], now: DateTime<Utc>, current_version: i64) -> Self {
		let synced_within = |window: Duration| {
			statuses
				.iter()
				.filter(|s| now - s.last_sync_at < window)
				.count()
		};

		let avg_versions_behind = if statuses.is_empty() {
			0.0
		} else {
			statuses.iter().map(|s| s.versions_behind as f64).sum::<f64>() / statuses.len() as f64
		};

		Self {
			total_devices: statuses.len(),
			total_agents: statuses
				.iter()
				.map(|s| s.agent_code.as_str())
				.collect::<HashSet<_>>()
				.len(),
			synced_last_hour: synced_within(Duration::hours(1)),
			synced_last_day: synced_within(Duration::days(1)),
			failed_syncs: statuses
				.iter()
				.filter(|s| s.sync_status == SyncOutcome::Failed)
				.count(),
			avg_versions_behind,
			max_versions_behind: statuses.iter().map(|s| s.versions_behind).max().unwrap_or(0),
			total_changes_delivered: statuses.iter().map(|s| s.changes_count).sum(),
			current_version,
		}
	}
}
