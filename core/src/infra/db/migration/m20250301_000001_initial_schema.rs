use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
	async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
		manager
			.create_table(
				Table::create()
					.table(Contacts::Table)
					.if_not_exists()
					.col(ColumnDef::new(Contacts::Id).uuid().not_null().primary_key())
					.col(ColumnDef::new(Contacts::FirstName).string().not_null())
					.col(ColumnDef::new(Contacts::LastName).string().not_null())
					.col(ColumnDef::new(Contacts::PhonePrimary).string())
					.col(ColumnDef::new(Contacts::PhoneSecondary).string())
					.col(ColumnDef::new(Contacts::CreatedBy).string().not_null())
					.col(
						ColumnDef::new(Contacts::CreatedAt)
							.timestamp_with_time_zone()
							.not_null(),
					)
					.col(
						ColumnDef::new(Contacts::UpdatedAt)
							.timestamp_with_time_zone()
							.not_null(),
					)
					.col(
						ColumnDef::new(Contacts::Version)
							.big_integer()
							.not_null()
							.unique_key(),
					)
					.col(
						ColumnDef::new(Contacts::IsDeleted)
							.boolean()
							.not_null()
							.default(false),
					)
					.col(ColumnDef::new(Contacts::DeletedAt).timestamp_with_time_zone())
					.to_owned(),
			)
			.await?;

		manager
			.create_index(
				Index::create()
					.name("idx_contacts_created_by")
					.table(Contacts::Table)
					.col(Contacts::CreatedBy)
					.if_not_exists()
					.to_owned(),
			)
			.await?;

		manager
			.create_index(
				Index::create()
					.name("idx_contacts_is_deleted")
					.table(Contacts::Table)
					.col(Contacts::IsDeleted)
					.if_not_exists()
					.to_owned(),
			)
			.await?;

		manager
			.create_table(
				Table::create()
					.table(GlobalVersion::Table)
					.if_not_exists()
					.col(
						ColumnDef::new(GlobalVersion::Id)
							.integer()
							.not_null()
							.primary_key(),
					)
					.col(
						ColumnDef::new(GlobalVersion::CurrentVersion)
							.big_integer()
							.not_null()
							.default(0),
					)
					.to_owned(),
			)
			.await?;

		manager
			.get_connection()
			.execute_unprepared(
				"INSERT OR IGNORE INTO global_version (id, current_version) VALUES (1, 0)",
			)
			.await?;

		manager
			.create_table(
				Table::create()
					.table(Agents::Table)
					.if_not_exists()
					.col(
						ColumnDef::new(Agents::AgentCode)
							.string()
							.not_null()
							.primary_key(),
					)
					.col(ColumnDef::new(Agents::AgentName).string().not_null())
					.col(
						ColumnDef::new(Agents::ApiKeyHash)
							.string()
							.not_null()
							.unique_key(),
					)
					.col(
						ColumnDef::new(Agents::IsActive)
							.boolean()
							.not_null()
							.default(true),
					)
					.col(
						ColumnDef::new(Agents::CreatedAt)
							.timestamp_with_time_zone()
							.not_null(),
					)
					.col(ColumnDef::new(Agents::LastSeen).timestamp_with_time_zone())
					.to_owned(),
			)
			.await?;

		manager
			.create_table(
				Table::create()
					.table(SyncLedger::Table)
					.if_not_exists()
					.col(ColumnDef::new(SyncLedger::DeviceId).string().not_null())
					.col(ColumnDef::new(SyncLedger::AgentCode).string().not_null())
					.col(
						ColumnDef::new(SyncLedger::LastSyncVersion)
							.big_integer()
							.not_null()
							.default(0),
					)
					.col(
						ColumnDef::new(SyncLedger::LastSyncAt)
							.timestamp_with_time_zone()
							.not_null(),
					)
					.col(
						ColumnDef::new(SyncLedger::SyncStatus)
							.string()
							.not_null()
							.default("success"),
					)
					.col(
						ColumnDef::new(SyncLedger::ChangesCount)
							.big_integer()
							.not_null()
							.default(0),
					)
					.primary_key(
						Index::create()
							.col(SyncLedger::DeviceId)
							.col(SyncLedger::AgentCode),
					)
					.to_owned(),
			)
			.await?;

		manager
			.create_index(
				Index::create()
					.name("idx_sync_ledger_agent_code")
					.table(SyncLedger::Table)
					.col(SyncLedger::AgentCode)
					.if_not_exists()
					.to_owned(),
			)
			.await?;

		Ok(())
	}

	async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
		manager
			.drop_table(Table::drop().table(SyncLedger::Table).to_owned())
			.await?;
		manager
			.drop_table(Table::drop().table(Agents::Table).to_owned())
			.await?;
		manager
			.drop_table(Table::drop().table(GlobalVersion::Table).to_owned())
			.await?;
		manager
			.drop_table(Table::drop().table(Contacts::Table).to_owned())
			.await?;
		Ok(())
	}
}

#[derive(DeriveIden)]
enum Contacts {
	Table,
	Id,
	FirstName,
	LastName,
	PhonePrimary,
	PhoneSecondary,
	CreatedBy,
	CreatedAt,
	UpdatedAt,
	Version,
	IsDeleted,
	DeletedAt,
}

#[derive(DeriveIden)]
enum GlobalVersion {
	Table,
	Id,
	CurrentVersion,
}

#[derive(DeriveIden)]
enum Agents {
	Table,
	AgentCode,
	AgentName,
	ApiKeyHash,
	IsActive,
	CreatedAt,
	LastSeen,
}

#[derive(DeriveIden)]
enum SyncLedger {
	Table,
	DeviceId,
	AgentCode,
	LastSyncVersion,
	LastSyncAt,
	SyncStatus,
	ChangesCount,
}
