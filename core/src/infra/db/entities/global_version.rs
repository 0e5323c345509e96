//! Single-row table holding the last issued version

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "global_version")]
pub struct Model {
	/// Always 1
	#[sea_orm(primary_key, auto_increment = false)]
	pub id: i32,

	pub current_version: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
