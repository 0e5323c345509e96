//! Global version authority
//!
//! A single counter row, bumped as the first statement of every mutation
//! transaction. Taking the write lock there serialises concurrent mutations,
//! so versions are issued in commit order. An aborted transaction rolls the
//! increment back with it.

use crate::infra::db::entities::GlobalVersion;
use sea_orm::{ConnectionTrait, DatabaseTransaction, DbErr, EntityTrait, Statement};

const COUNTER_ID: i32 = 1;

pub struct VersionAuthority;

impl VersionAuthority {
	/// Issue the next version inside the caller's transaction
	pub async fn next_version(txn: &DatabaseTransaction) -> Result<i64, DbErr> {
		let row = txn
			.query_one(Statement::from_sql_and_values(
				txn.get_database_backend(),
				r#"
				UPDATE global_version
				SET current_version = current_version + 1
				WHERE id = ?
				RETURNING current_version
				"#,
				[COUNTER_ID.into()],
			))
			.await?
			.ok_or_else(|| DbErr::RecordNotFound("global_version counter row".to_string()))?;

		row.try_get("", "current_version")
	}

	/// Latest issued version, as visible to `conn`
	pub async fn current_version<C: ConnectionTrait>(conn: &C) -> Result<i64, DbErr> {
		GlobalVersion::find_by_id(COUNTER_ID)
			.one(conn)
			.await?
			.map(|row| row.current_version)
			.ok_or_else(|| DbErr::RecordNotFound("global_version counter row".to_string()))
	}
}
