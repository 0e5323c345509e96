//! Services built on top of the sync engine

pub mod agents;
pub mod contacts;
pub mod devices;
pub mod realtime;

pub use agents::AgentService;
pub use contacts::{BulkImportReport, BulkRowError, ContactService, MutationOrigin};
pub use devices::DeviceMonitor;
