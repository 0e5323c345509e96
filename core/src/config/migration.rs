//! Config schema migrations

use anyhow::Result;

/// A persisted structure with a versioned schema
pub trait Migrate {
	fn current_version(&self) -> u32;

	fn target_version() -> u32;

	/// Brings `self` up to [`Migrate::target_version`], one step at a time
	fn migrate(&mut self) -> Result<()>;

	fn needs_migration(&self) -> bool {
		self.current_version() < Self::target_version()
	}
}
