//! Delta resolution for pull-based catch-up
//!
//! A device presents the last version it acknowledged and receives every
//! contact row stamped after it, in version order, bounded by the batch
//! limit. Each pull is recorded in the sync ledger.

use super::ledger::SyncLedger;
use super::mutation_log::MutationLog;
use super::version::VersionAuthority;
use crate::domain::{Contact, SyncOutcome};
use crate::error::{Error, Result, ValidationErrors};
use sea_orm::{DatabaseConnection, TransactionTrait};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, info, warn};

pub const DEFAULT_BATCH_LIMIT: u64 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeAction {
	Create,
	Update,
	Delete,
}

impl ChangeAction {
	/// Tombstones are deletes; everything is a create for a fresh device
	pub fn classify(contact: &Contact, last_known_version: i64) -> Self {
		if contact.is_deleted {
			ChangeAction::Delete
		} else if last_known_version == 0 {
			ChangeAction::Create
		} else {
			ChangeAction::Update
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactChange {
	pub action: ChangeAction,
	pub contact: Contact,
	pub version: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncRequest {
	pub device_id: String,
	pub agent_code: String,
	pub last_known_version: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncResponse {
	pub current_version: i64,
	pub changes: Vec<ContactChange>,
	pub has_more: bool,
}

impl SyncResponse {
	/// Version the device has fully caught up to after applying this batch
	pub fn version_reached(&self, last_known_version: i64) -> i64 {
		if self.has_more {
			self.changes
				.last()
				.map(|c| c.version)
				.unwrap_or(last_known_version)
		} else {
			self.current_version
		}
	}
}

#[derive(Clone)]
pub struct DeltaResolver {
	conn: DatabaseConnection,
	ledger: SyncLedger,
	batch_limit: u64,
	timeout: Duration,
}

impl DeltaResolver {
	pub fn new(conn: DatabaseConnection, ledger: SyncLedger, batch_limit: u64, timeout: Duration) -> Self {
		Self {
			conn,
			ledger,
			batch_limit: batch_limit.max(1),
			timeout,
		}
	}

	pub async fn resolve(&self, request: &SyncRequest) -> Result<SyncResponse> {
		validate(request)?;

		let read = tokio::time::timeout(self.timeout, self.read_delta(request.last_known_version)).await;

		let response = match read {
			Err(_) => {
				warn!(
					device_id = %request.device_id,
					agent_code = %request.agent_code,
					timeout = ?self.timeout,
					"Delta read timed out"
				);
				return Err(Error::Timeout(self.timeout));
			}
			Ok(Err(e)) => {
				error!(
					device_id = %request.device_id,
					agent_code = %request.agent_code,
					error = %e,
					"Delta read failed"
				);
				if let Err(record_err) = self
					.ledger
					.record_attempt(
						&request.device_id,
						&request.agent_code,
						request.last_known_version,
						0,
						SyncOutcome::Failed,
					)
					.await
				{
					warn!(error = %record_err, "Failed to record failed sync attempt");
				}
				return Err(e);
			}
			Ok(Ok(response)) => response,
		};

		let reached = response.version_reached(request.last_known_version);
		self.ledger
			.record_attempt(
				&request.device_id,
				&request.agent_code,
				reached,
				response.changes.len() as i64,
				SyncOutcome::Success,
			)
			.await?;

		info!(
			device_id = %request.device_id,
			agent_code = %request.agent_code,
			since = request.last_known_version,
			current_version = response.current_version,
			changes = response.changes.len(),
			has_more = response.has_more,
			"Resolved delta"
		);

		Ok(response)
	}

	/// Reads the counter and the changed rows from one snapshot
	async fn read_delta(&self, since: i64) -> Result<SyncResponse> {
		let txn = self.conn.begin().await?;
		let current_version = VersionAuthority::current_version(&txn).await?;
		let rows = MutationLog::changes_since_in(&txn, since, self.batch_limit).await?;
		txn.commit().await?;

		let has_more = rows.len() as u64 == self.batch_limit;
		debug!(since, current_version, rows = rows.len(), has_more, "Read delta");

		let changes = rows
			.into_iter()
			.map(|contact| ContactChange {
				action: ChangeAction::classify(&contact, since),
				version: contact.version,
				contact,
			})
			.collect();

		Ok(SyncResponse {
			current_version,
			changes,
			has_more,
		})
	}
}

fn validate(request: &SyncRequest) -> Result<()> {
	let mut errors = ValidationErrors::new();
	if request.device_id.trim().is_empty() {
		errors.push("device_id is required");
	}
	if request.agent_code.trim().is_empty() {
		errors.push("agent_code is required");
	}
	if request.last_known_version < 0 {
		errors.push("last_known_version must be a non-negative integer");
	}
	errors.into_result()
}
