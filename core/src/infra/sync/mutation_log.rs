//! Mutation log for contacts
//!
//! Every write runs in its own transaction whose first statement issues the
//! next version. Rows are never removed: a delete re-stamps the row as a
//! tombstone so devices that sync later still observe it.
//!
//! Inputs are expected to be validated and sanitized already.

use super::version::VersionAuthority;
use crate::domain::{Contact, ContactPatch, NewContact};
use crate::error::{Error, Result};
use crate::infra::db::entities::contact;
use chrono::{DateTime, Utc};
use sea_orm::{
	ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection,
	DatabaseTransaction, EntityTrait, Order, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect,
	Select, Set, Statement, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

pub const DEFAULT_PAGE_SIZE: u64 = 50;
pub const MAX_PAGE_SIZE: u64 = 500;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
	#[default]
	UpdatedAt,
	CreatedAt,
	FirstName,
	LastName,
	Version,
}

impl SortField {
	fn column(self) -> contact::Column {
		match self {
			SortField::UpdatedAt => contact::Column::UpdatedAt,
			SortField::CreatedAt => contact::Column::CreatedAt,
			SortField::FirstName => contact::Column::FirstName,
			SortField::LastName => contact::Column::LastName,
			SortField::Version => contact::Column::Version,
		}
	}
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
	Asc,
	#[default]
	Desc,
}

/// Listing parameters for live contacts
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContactQuery {
	/// 1-based
	pub page: Option<u64>,
	pub limit: Option<u64>,
	/// Substring matched against names and phones
	pub query: Option<String>,
	/// Owner filter
	pub agent_code: Option<String>,
	pub created_after: Option<DateTime<Utc>>,
	pub created_before: Option<DateTime<Utc>>,
	#[serde(default)]
	pub sort_by: SortField,
	#[serde(default)]
	pub sort_order: SortOrder,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
	pub page: u64,
	pub limit: u64,
	pub total: u64,
	pub total_pages: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
	pub data: Vec<T>,
	pub pagination: Pagination,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactStats {
	pub total_active: i64,
	pub total_deleted: i64,
	pub total_agents: i64,
	pub latest_version: i64,
}

#[derive(Clone)]
pub struct MutationLog {
	conn: DatabaseConnection,
}

impl MutationLog {
	pub fn new(conn: DatabaseConnection) -> Self {
		Self { conn }
	}

	pub async fn create(&self, fields: NewContact, owner: &str) -> Result<Contact> {
		let txn = self.conn.begin().await?;
		let contact = insert_contact(&txn, fields, owner).await?;
		txn.commit().await?;

		info!(
			contact_id = %contact.id,
			version = contact.version,
			agent_code = %owner,
			"Contact created"
		);

		Ok(contact)
	}

	/// Inserts all rows in one transaction, one version per row
	pub async fn bulk_create(&self, rows: Vec<NewContact>, owner: &str) -> Result<Vec<Contact>> {
		if rows.is_empty() {
			return Ok(Vec::new());
		}

		let txn = self.conn.begin().await?;
		let mut created = Vec::with_capacity(rows.len());
		for fields in rows {
			created.push(insert_contact(&txn, fields, owner).await?);
		}
		txn.commit().await?;

		info!(
			count = created.len(),
			first_version = created.first().map(|c| c.version),
			last_version = created.last().map(|c| c.version),
			agent_code = %owner,
			"Contacts bulk created"
		);

		Ok(created)
	}

	/// Applies the supplied fields and re-stamps the row, even when nothing
	/// actually differs
	pub async fn update(&self, id: Uuid, patch: ContactPatch) -> Result<Contact> {
		let txn = self.conn.begin().await?;
		let version = VersionAuthority::next_version(&txn).await?;
		let existing = find_live(&txn, id).await?;

		let mut active: contact::ActiveModel = existing.into();
		if let Some(first_name) = patch.first_name {
			active.first_name = Set(first_name);
		}
		if let Some(last_name) = patch.last_name {
			active.last_name = Set(last_name);
		}
		if let Some(phone) = patch.phone_primary {
			active.phone_primary = Set(phone);
		}
		if let Some(phone) = patch.phone_secondary {
			active.phone_secondary = Set(phone);
		}
		active.version = Set(version);
		active.updated_at = Set(Utc::now());

		let updated = active.update(&txn).await?;
		txn.commit().await?;

		info!(contact_id = %id, version, "Contact updated");

		Ok(updated.into())
	}

	/// Tombstones the row and returns it
	pub async fn delete(&self, id: Uuid) -> Result<Contact> {
		let txn = self.conn.begin().await?;
		let version = VersionAuthority::next_version(&txn).await?;
		let existing = find_live(&txn, id).await?;

		let now = Utc::now();
		let mut active: contact::ActiveModel = existing.into();
		active.is_deleted = Set(true);
		active.deleted_at = Set(Some(now));
		active.updated_at = Set(now);
		active.version = Set(version);

		let tombstone = active.update(&txn).await?;
		txn.commit().await?;

		info!(contact_id = %id, version, "Contact deleted");

		Ok(tombstone.into())
	}

	/// Live contact by id; tombstones are not found
	pub async fn find(&self, id: Uuid) -> Result<Contact> {
		Ok(find_live(&self.conn, id).await?.into())
	}

	/// Every live contact matching the filters of `params`, oldest first.
	/// Paging and sort fields are ignored.
	pub async fn export(&self, params: &ContactQuery) -> Result<Vec<Contact>> {
		Ok(live_matching(params)
			.order_by_asc(contact::Column::CreatedAt)
			.all(&self.conn)
			.await?
			.into_iter()
			.map(Contact::from)
			.collect())
	}

	pub async fn changes_since(&self, version: i64, limit: u64) -> Result<Vec<Contact>> {
		Self::changes_since_in(&self.conn, version, limit).await
	}

	/// Rows with `version > version`, ascending, at most `limit` of them,
	/// tombstones included
	pub async fn changes_since_in<C: ConnectionTrait>(
		conn: &C,
		version: i64,
		limit: u64,
	) -> Result<Vec<Contact>> {
		let rows = contact::Entity::find()
			.filter(contact::Column::Version.gt(version))
			.order_by_asc(contact::Column::Version)
			.limit(limit)
			.all(conn)
			.await?;

		debug!(since = version, limit, returned = rows.len(), "Fetched changes");

		Ok(rows.into_iter().map(Contact::from).collect())
	}

	pub async fn search(&self, params: &ContactQuery) -> Result<Page<Contact>> {
		let page = params.page.unwrap_or(1).max(1);
		let limit = params
			.limit
			.unwrap_or(DEFAULT_PAGE_SIZE)
			.clamp(1, MAX_PAGE_SIZE);

		// The paginator computes the offset as `page * limit` and SQLite binds it as i64
		let in_range = (page - 1)
			.checked_mul(limit)
			.is_some_and(|offset| offset <= i64::MAX as u64);
		if !in_range {
			return Err(Error::validation(format!("page {page} is out of range")));
		}

		let select = live_matching(params);
		let order = match params.sort_order {
			SortOrder::Asc => Order::Asc,
			SortOrder::Desc => Order::Desc,
		};
		let paginator = select
			.order_by(params.sort_by.column(), order)
			.paginate(&self.conn, limit);

		let total = paginator.num_items().await?;
		let data = paginator.fetch_page(page - 1).await?;

		Ok(Page {
			data: data.into_iter().map(Contact::from).collect(),
			pagination: Pagination {
				page,
				limit,
				total,
				total_pages: total.div_ceil(limit),
			},
		})
	}

	pub async fn stats(&self) -> Result<ContactStats> {
		let row = self
			.conn
			.query_one(Statement::from_string(
				self.conn.get_database_backend(),
				r#"
				SELECT
					COALESCE(SUM(CASE WHEN is_deleted = 0 THEN 1 ELSE 0 END), 0) AS total_active,
					COALESCE(SUM(CASE WHEN is_deleted = 1 THEN 1 ELSE 0 END), 0) AS total_deleted,
					COUNT(DISTINCT created_by) AS total_agents,
					COALESCE(MAX(version), 0) AS latest_version
				FROM contacts
				"#,
			))
			.await?;

		let Some(row) = row else {
			return Ok(ContactStats {
				total_active: 0,
				total_deleted: 0,
				total_agents: 0,
				latest_version: 0,
			});
		};

		Ok(ContactStats {
			total_active: row.try_get("", "total_active")?,
			total_deleted: row.try_get("", "total_deleted")?,
			total_agents: row.try_get("", "total_agents")?,
			latest_version: row.try_get("", "latest_version")?,
		})
	}
}

/// Live rows narrowed by the text, owner and creation-window filters
fn live_matching(params: &ContactQuery) -> Select<contact::Entity> {
	let mut select = contact::Entity::find().filter(contact::Column::IsDeleted.eq(false));

	if let Some(query) = params.query.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
		let pattern = format!("%{query}%");
		select = select.filter(
			Condition::any()
				.add(contact::Column::FirstName.like(pattern.as_str()))
				.add(contact::Column::LastName.like(pattern.as_str()))
				.add(contact::Column::PhonePrimary.like(pattern.as_str()))
				.add(contact::Column::PhoneSecondary.like(pattern.as_str())),
		);
	}
	if let Some(agent_code) = &params.agent_code {
		select = select.filter(contact::Column::CreatedBy.eq(agent_code.as_str()));
	}
	if let Some(after) = params.created_after {
		select = select.filter(contact::Column::CreatedAt.gte(after));
	}
	if let Some(before) = params.created_before {
		select = select.filter(contact::Column::CreatedAt.lte(before));
	}
	select
}

async fn insert_contact(txn: &DatabaseTransaction, fields: NewContact, owner: &str) -> Result<Contact> {
	let version = VersionAuthority::next_version(txn).await?;
	let now = Utc::now();

	let model = contact::ActiveModel {
		id: Set(Uuid::new_v4()),
		first_name: Set(fields.first_name),
		last_name: Set(fields.last_name),
		phone_primary: Set(fields.phone_primary),
		phone_secondary: Set(fields.phone_secondary),
		created_by: Set(owner.to_string()),
		created_at: Set(now),
		updated_at: Set(now),
		version: Set(version),
		is_deleted: Set(false),
		deleted_at: Set(None),
	}
	.insert(txn)
	.await?;

	Ok(model.into())
}

async fn find_live<C: ConnectionTrait>(conn: &C, id: Uuid) -> Result<contact::Model> {
	contact::Entity::find_by_id(id)
		.filter(contact::Column::IsDeleted.eq(false))
		.one(conn)
		.await?
		.ok_or_else(|| Error::not_found("Contact", id))
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::infra::db::test_database;

	fn jane() -> NewContact {
		NewContact::new("Jane", "Doe").with_phone("+1 555 123 4567")
	}

	#[tokio::test]
	async fn test_create_stamps_fresh_version() {
		let (_dir, db) = test_database().await;
		let log = MutationLog::new(db.conn().clone());

		let first = log.create(jane(), "AG001").await.unwrap();
		let second = log.create(NewContact::new("John", "Roe"), "AG001").await.unwrap();

		assert_eq!(first.version, 1);
		assert_eq!(second.version, 2);
		assert!(!first.is_deleted);
		assert_eq!(first.created_by, "AG001");
	}

	#[tokio::test]
	async fn test_update_always_advances_version() {
		let (_dir, db) = test_database().await;
		let log = MutationLog::new(db.conn().clone());
		let created = log.create(jane(), "AG001").await.unwrap();

		let unchanged = log
			.update(
				created.id,
				ContactPatch {
					first_name: Some("Jane".into()),
					..Default::default()
				},
			)
			.await
			.unwrap();
		assert!(unchanged.version > created.version);

		let cleared = log
			.update(
				created.id,
				ContactPatch {
					phone_primary: Some(None),
					..Default::default()
				},
			)
			.await
			.unwrap();
		assert_eq!(cleared.phone_primary, None);
		assert_eq!(cleared.first_name, "Jane");
		assert!(cleared.version > unchanged.version);
	}

	#[tokio::test]
	async fn test_delete_keeps_tombstone() {
		let (_dir, db) = test_database().await;
		let log = MutationLog::new(db.conn().clone());
		let created = log.create(jane(), "AG001").await.unwrap();

		let tombstone = log.delete(created.id).await.unwrap();
		assert!(tombstone.is_deleted);
		assert!(tombstone.deleted_at.is_some());
		assert_eq!(tombstone.version, created.version + 1);

		assert!(matches!(log.find(created.id).await, Err(Error::NotFound { .. })));
		assert!(matches!(log.delete(created.id).await, Err(Error::NotFound { .. })));
		assert!(matches!(
			log.update(created.id, ContactPatch::default()).await,
			Err(Error::NotFound { .. })
		));

		let changes = log.changes_since(0, 100).await.unwrap();
		assert_eq!(changes.len(), 1);
		assert!(changes[0].is_deleted);
	}

	#[tokio::test]
	async fn test_missing_contact_does_not_consume_version() {
		let (_dir, db) = test_database().await;
		let log = MutationLog::new(db.conn().clone());

		assert!(log.delete(Uuid::new_v4()).await.is_err());
		let created = log.create(jane(), "AG001").await.unwrap();
		assert_eq!(created.version, 1);
	}

	#[tokio::test]
	async fn test_changes_since_is_ordered_and_bounded() {
		let (_dir, db) = test_database().await;
		let log = MutationLog::new(db.conn().clone());

		let rows = (0..5)
			.map(|i| NewContact::new(format!("First{i}"), "Last"))
			.collect();
		log.bulk_create(rows, "AG001").await.unwrap();

		let changes = log.changes_since(1, 3).await.unwrap();
		let versions: Vec<_> = changes.iter().map(|c| c.version).collect();
		assert_eq!(versions, vec![2, 3, 4]);

		assert!(log.changes_since(5, 10).await.unwrap().is_empty());
	}

	#[tokio::test]
	async fn test_search_filters_and_paginates() {
		let (_dir, db) = test_database().await;
		let log = MutationLog::new(db.conn().clone());

		log.create(jane(), "AG001").await.unwrap();
		log.create(NewContact::new("Janet", "Smith"), "AG002").await.unwrap();
		let gone = log.create(NewContact::new("Jan", "Gone"), "AG001").await.unwrap();
		log.delete(gone.id).await.unwrap();
		for i in 0..3 {
			log.create(NewContact::new(format!("Zed{i}"), "Z"), "AG003")
				.await
				.unwrap();
		}

		let page = log
			.search(&ContactQuery {
				query: Some("jan".into()),
				sort_by: SortField::FirstName,
				sort_order: SortOrder::Asc,
				..Default::default()
			})
			.await
			.unwrap();
		let names: Vec<_> = page.data.iter().map(|c| c.first_name.as_str()).collect();
		assert_eq!(names, vec!["Jane", "Janet"]);

		let by_owner = log
			.search(&ContactQuery {
				agent_code: Some("AG003".into()),
				limit: Some(2),
				page: Some(2),
				..Default::default()
			})
			.await
			.unwrap();
		assert_eq!(by_owner.pagination.total, 3);
		assert_eq!(by_owner.pagination.total_pages, 2);
		assert_eq!(by_owner.data.len(), 1);
	}

	#[tokio::test]
	async fn test_stats() {
		let (_dir, db) = test_database().await;
		let log = MutationLog::new(db.conn().clone());

		assert_eq!(log.stats().await.unwrap().latest_version, 0);

		let a = log.create(jane(), "AG001").await.unwrap();
		log.create(NewContact::new("John", "Roe"), "AG002").await.unwrap();
		log.delete(a.id).await.unwrap();

		let stats = log.stats().await.unwrap();
		assert_eq!(stats.total_active, 1);
		assert_eq!(stats.total_deleted, 1);
		assert_eq!(stats.total_agents, 2);
		assert_eq!(stats.latest_version, 3);

		let exported = log.export(&ContactQuery::default()).await.unwrap();
		assert_eq!(exported.len(), 1);
		assert_eq!(exported[0].first_name, "John");
	}

	#[tokio::test]
	async fn test_export_applies_filters_without_paging() {
		let (_dir, db) = test_database().await;
		let log = MutationLog::new(db.conn().clone());

		log.create(jane(), "AG001").await.unwrap();
		log.create(NewContact::new("John", "Roe"), "AG002").await.unwrap();
		log.create(NewContact::new("Janet", "Major"), "AG002").await.unwrap();

		let by_owner = ContactQuery {
			agent_code: Some("AG002".into()),
			limit: Some(1),
			page: Some(5),
			..Default::default()
		};
		let names: Vec<_> = log
			.export(&by_owner)
			.await
			.unwrap()
			.into_iter()
			.map(|c| c.first_name)
			.collect();
		assert_eq!(names, vec!["John", "Janet"]);

		let by_text = ContactQuery {
			query: Some("jan".into()),
			..Default::default()
		};
		assert_eq!(log.export(&by_text).await.unwrap().len(), 2);
	}

	#[tokio::test]
	async fn test_search_rejects_page_past_offset_range() {
		let (_dir, db) = test_database().await;
		let log = MutationLog::new(db.conn().clone());
		log.create(jane(), "AG001").await.unwrap();

		let query = ContactQuery {
			page: Some(u64::MAX),
			limit: Some(50),
			..Default::default()
		};
		assert!(matches!(log.search(&query).await, Err(Error::Validation(_))));

		// far past the end but representable: just an empty page
		let query = ContactQuery {
			page: Some(1_000_000),
			limit: Some(50),
			..Default::default()
		};
		let page = log.search(&query).await.unwrap();
		assert!(page.data.is_empty());
		assert_eq!(page.pagination.total, 1);
	}
}
