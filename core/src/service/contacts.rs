//! Contact service
//!
//! Validation and sanitization in front of the mutation log. Every committed
//! mutation is announced on the sync event bus after the commit.

use crate::domain::{ConnectionId, Contact, ContactPatch, NewContact};
use crate::error::{Error, Result};
use crate::infra::sync::{
	ContactEvent, ContactEventKind, ContactQuery, ContactStats, MutationLog, Page, SyncEventBus,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

/// Who performed a mutation, and over which push connection if any
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationOrigin {
	pub agent_code: String,
	pub connection: Option<ConnectionId>,
}

impl MutationOrigin {
	pub fn agent(agent_code: impl Into<String>) -> Self {
		Self {
			agent_code: agent_code.into(),
			connection: None,
		}
	}

	pub fn connection(agent_code: impl Into<String>, connection: ConnectionId) -> Self {
		Self {
			agent_code: agent_code.into(),
			connection: Some(connection),
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkRowError {
	/// 1-based position in the submitted batch
	pub row: usize,
	pub error: String,
}

/// Outcome of a bulk import. Invalid rows are reported, valid rows are
/// committed together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkImportReport {
	pub total: usize,
	pub success: usize,
	pub failed: usize,
	pub errors: Vec<BulkRowError>,
}

#[derive(Clone)]
pub struct ContactService {
	log: MutationLog,
	events: SyncEventBus,
}

impl ContactService {
	pub fn new(log: MutationLog, events: SyncEventBus) -> Self {
		Self { log, events }
	}

	pub async fn create(&self, fields: NewContact, origin: &MutationOrigin) -> Result<Contact> {
		fields.validate()?;
		let contact = self.log.create(fields.sanitized(), &origin.agent_code).await?;
		self.announce(ContactEventKind::Created, &contact, origin);
		Ok(contact)
	}

	pub async fn update(&self, id: Uuid, patch: ContactPatch, origin: &MutationOrigin) -> Result<Contact> {
		patch.validate()?;
		let contact = self.log.update(id, patch.sanitized()).await?;
		self.announce(ContactEventKind::Updated, &contact, origin);
		Ok(contact)
	}

	/// Returns the tombstone
	pub async fn delete(&self, id: Uuid, origin: &MutationOrigin) -> Result<Contact> {
		let tombstone = self.log.delete(id).await?;
		self.announce(ContactEventKind::Deleted, &tombstone, origin);
		Ok(tombstone)
	}

	pub async fn get(&self, id: Uuid) -> Result<Contact> {
		self.log.find(id).await
	}

	pub async fn search(&self, query: &ContactQuery) -> Result<Page<Contact>> {
		self.log.search(query).await
	}

	pub async fn stats(&self) -> Result<ContactStats> {
		self.log.stats().await
	}

	/// Live contacts matching the search filters, without paging
	pub async fn export(&self, filters: &ContactQuery) -> Result<Vec<Contact>> {
		self.log.export(filters).await
	}

	pub async fn bulk_import(
		&self,
		rows: Vec<NewContact>,
		origin: &MutationOrigin,
	) -> Result<BulkImportReport> {
		let total = rows.len();
		let mut valid = Vec::with_capacity(total);
		let mut errors = Vec::new();

		for (index, fields) in rows.into_iter().enumerate() {
			match fields.validate() {
				Ok(()) => valid.push(fields.sanitized()),
				Err(Error::Validation(messages)) => errors.push(BulkRowError {
					row: index + 1,
					error: messages.to_string(),
				}),
				Err(e) => return Err(e),
			}
		}

		let created = self.log.bulk_create(valid, &origin.agent_code).await?;
		for contact in &created {
			self.announce(ContactEventKind::Created, contact, origin);
		}

		if !errors.is_empty() {
			warn!(
				agent_code = %origin.agent_code,
				failed = errors.len(),
				"Bulk import rejected rows"
			);
		}
		info!(
			agent_code = %origin.agent_code,
			total,
			success = created.len(),
			"Bulk import completed"
		);

		Ok(BulkImportReport {
			total,
			success: created.len(),
			failed: errors.len(),
			errors,
		})
	}

	fn announce(&self, kind: ContactEventKind, contact: &Contact, origin: &MutationOrigin) {
		self.events.emit(ContactEvent {
			kind,
			contact: contact.clone(),
			version: contact.version,
			actor: origin.agent_code.clone(),
			origin: origin.connection,
		});
	}
}
