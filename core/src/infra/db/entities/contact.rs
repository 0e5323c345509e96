//! Contact entity
//!
//! Current-state rows, each stamped with the version of its last mutation.
//! Deleted rows are kept as tombstones.

use crate::domain;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "contacts")]
pub struct Model {
	#[sea_orm(primary_key, auto_increment = false)]
	pub id: Uuid,

	pub first_name: String,

	pub last_name: String,

	pub phone_primary: Option<String>,

	pub phone_secondary: Option<String>,

	/// Owning agent code
	pub created_by: String,

	pub created_at: DateTimeUtc,

	pub updated_at: DateTimeUtc,

	/// Issued by the version authority; unique across all rows
	#[sea_orm(unique)]
	pub version: i64,

	pub is_deleted: bool,

	pub deleted_at: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for domain::Contact {
	fn from(model: Model) -> Self {
		Self {
			id: model.id,
			first_name: model.first_name,
			last_name: model.last_name,
			phone_primary: model.phone_primary,
			phone_secondary: model.phone_secondary,
			created_by: model.created_by,
			created_at: model.created_at,
			updated_at: model.updated_at,
			version: model.version,
			is_deleted: model.is_deleted,
			deleted_at: model.deleted_at,
		}
	}
}
