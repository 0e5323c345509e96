//! Database infrastructure using SeaORM

use sea_orm::{
	ConnectOptions, ConnectionTrait, Database as SeaDatabase, DatabaseConnection, DbErr,
};
use sea_orm_migration::MigratorTrait;
use std::path::Path;
use std::time::Duration;
use tracing::info;

pub mod entities;
pub mod migration;

/// Database wrapper for the roster store
pub struct Database {
	conn: DatabaseConnection,
}

impl Database {
	/// Create (or open) a database at the specified path
	pub async fn create(path: &Path) -> Result<Self, DbErr> {
		if let Some(parent) = path.parent() {
			std::fs::create_dir_all(parent)
				.map_err(|e| DbErr::Custom(format!("Failed to create directory: {}", e)))?;
		}

		let conn = Self::connect(format!("sqlite://{}?mode=rwc", path.display())).await?;

		info!("Created database at {:?}", path);

		Ok(Self { conn })
	}

	async fn connect(db_url: String) -> Result<DatabaseConnection, DbErr> {
		let mut opt = ConnectOptions::new(db_url);
		opt.max_connections(10)
			.min_connections(1)
			.connect_timeout(Duration::from_secs(8))
			.acquire_timeout(Duration::from_secs(8))
			.sqlx_logging(false);

		let conn = SeaDatabase::connect(opt).await?;

		// WAL lets delta reads proceed while a mutation holds the write lock
		conn.execute_unprepared("PRAGMA journal_mode = WAL").await?;

		Ok(conn)
	}

	/// Run migrations
	pub async fn migrate(&self) -> Result<(), DbErr> {
		migration::Migrator::up(&self.conn, None).await?;
		info!("Database migrations completed successfully");
		Ok(())
	}

	/// Cheap reachability probe used by the health endpoint
	pub async fn ping(&self) -> Result<(), DbErr> {
		self.conn.ping().await
	}

	pub fn conn(&self) -> &DatabaseConnection {
		&self.conn
	}
}

#[cfg(test)]
pub(crate) async fn test_database() -> (tempfile::TempDir, Database) {
	let dir = tempfile::tempdir().unwrap();
	let db = Database::create(&dir.path().join("roster.db")).await.unwrap();
	db.migrate().await.unwrap();
	(dir, db)
}
