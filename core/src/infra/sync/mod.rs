//! Versioned synchronization engine
//!
//! - Version authority: one global counter, bumped inside each mutation
//! - Mutation log: version-stamped contact rows with tombstones
//! - Delta resolver: pull-based catch-up from a device's last version
//! - Sync ledger: latest pull attempt per device
//! - Event bus: post-commit notifications for the push channel

pub mod delta;
pub mod event_bus;
pub mod ledger;
pub mod mutation_log;
pub mod version;

pub use delta::{ChangeAction, ContactChange, DeltaResolver, SyncRequest, SyncResponse};
pub use event_bus::{ContactEvent, ContactEventKind, SyncEventBus};
pub use ledger::SyncLedger;
pub use mutation_log::{
	ContactQuery, ContactStats, MutationLog, Page, Pagination, SortField, SortOrder,
};
pub use version::VersionAuthority;
