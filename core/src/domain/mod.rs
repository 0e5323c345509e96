//! Domain types shared by the engine, its services and adapters

pub mod agent;
pub mod connection;
pub mod contact;
pub mod device;

pub use agent::{Agent, RegisteredAgent};
pub use connection::ConnectionId;
pub use contact::{Contact, ContactPatch, NewContact};
pub use device::{
	ConnectionStatus, DeviceStatus, HealthSummary, LedgerEntry, LivenessThresholds, SyncOutcome,
	SyncStatistics,
};
