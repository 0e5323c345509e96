//! SeaORM entities for the roster store

pub mod agent;
pub mod contact;
pub mod global_version;
pub mod sync_ledger;

pub use agent::Entity as Agent;
pub use contact::Entity as Contact;
pub use global_version::Entity as GlobalVersion;
pub use sync_ledger::Entity as SyncLedger;
