//! Error taxonomy for engine operations
//!
//! Validation, not-found and authentication failures never change state.
//! Storage failures roll back the whole transaction, including the version
//! issuance, and are safe to retry.

use sea_orm::DbErr;
use serde::Serialize;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
	#[error("Validation failed: {0}")]
	Validation(ValidationErrors),

	#[error("{entity} not found: {id}")]
	NotFound { entity: &'static str, id: String },

	#[error("{0}")]
	Authentication(String),

	#[error("Agent is inactive: {0}")]
	AgentInactive(String),

	#[error("Conflict: {0}")]
	Conflict(String),

	#[error("Storage error: {0}")]
	Storage(#[from] DbErr),

	#[error("Sync request timed out after {0:?}")]
	Timeout(Duration),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
	pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
		Self::NotFound {
			entity,
			id: id.to_string(),
		}
	}

	pub fn validation(message: impl Into<String>) -> Self {
		Self::Validation(ValidationErrors::single(message))
	}

	/// Storage and timeout failures leave no partial state behind, so the
	/// caller may simply try again.
	pub fn is_retryable(&self) -> bool {
		matches!(self, Self::Storage(_) | Self::Timeout(_))
	}
}

/// Field-level validation messages collected for one input
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors(Vec<String>);

impl ValidationErrors {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn single(message: impl Into<String>) -> Self {
		Self(vec![message.into()])
	}

	pub fn push(&mut self, message: impl Into<String>) {
		self.0.push(message.into());
	}

	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	pub fn messages(&self) -> &[String] {
		&self.0
	}

	/// `Ok(())` when nothing was collected
	pub fn into_result(self) -> Result<()> {
		if self.is_empty() {
			Ok(())
		} else {
			Err(Error::Validation(self))
		}
	}
}

impl fmt::Display for ValidationErrors {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0.join(", "))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_validation_errors_join() {
		let mut errors = ValidationErrors::new();
		assert!(errors.clone().into_result().is_ok());

		errors.push("first_name is required");
		errors.push("phone_primary has invalid format");

		let err = errors.into_result().unwrap_err();
		assert_eq!(
			err.to_string(),
			"Validation failed: first_name is required, phone_primary has invalid format"
		);
		assert!(!err.is_retryable());
	}

	#[test]
	fn test_retryable_classification() {
		assert!(Error::Storage(DbErr::Custom("disk full".into())).is_retryable());
		assert!(Error::Timeout(Duration::from_secs(1)).is_retryable());
		assert!(!Error::not_found("contact", "abc").is_retryable());
		assert!(!Error::AgentInactive("AG1".into()).is_retryable());
	}
}
