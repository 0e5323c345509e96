//! Contact records and the inputs that mutate them

use crate::error::{Result, ValidationErrors};
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

static PHONE_PATTERN: Lazy<Regex> =
	Lazy::new(|| Regex::new(r"^[\d\s\-()+]+$").expect("phone pattern is a valid regex"));

const MIN_PHONE_DIGITS: usize = 10;

/// A contact as seen by devices
///
/// `version` is the value issued by the version authority in the same
/// transaction as the last mutation of this row. Deleted contacts stay
/// around as tombstones so late devices still learn about the deletion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
	pub id: Uuid,
	pub first_name: String,
	pub last_name: String,
	pub phone_primary: Option<String>,
	pub phone_secondary: Option<String>,
	/// Agent code of the owner
	pub created_by: String,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
	pub version: i64,
	pub is_deleted: bool,
	pub deleted_at: Option<DateTime<Utc>>,
}

/// Fields required to create a contact
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewContact {
	#[serde(default)]
	pub first_name: String,
	#[serde(default)]
	pub last_name: String,
	#[serde(default)]
	pub phone_primary: Option<String>,
	#[serde(default)]
	pub phone_secondary: Option<String>,
}

impl NewContact {
	pub fn new(first_name: impl Into<String>, last_name: impl Into<String>) -> Self {
		Self {
			first_name: first_name.into(),
			last_name: last_name.into(),
			..Default::default()
		}
	}

	pub fn with_phone(mut self, phone: impl Into<String>) -> Self {
		self.phone_primary = Some(phone.into());
		self
	}

	pub fn validate(&self) -> Result<()> {
		let mut errors = ValidationErrors::new();
		check_name(&mut errors, "first_name", &self.first_name);
		check_name(&mut errors, "last_name", &self.last_name);
		check_phone(&mut errors, "phone_primary", self.phone_primary.as_deref());
		check_phone(&mut errors, "phone_secondary", self.phone_secondary.as_deref());
		errors.into_result()
	}

	/// Collapses whitespace in names and turns blank phones into `None`
	pub fn sanitized(self) -> Self {
		Self {
			first_name: sanitize_name(&self.first_name),
			last_name: sanitize_name(&self.last_name),
			phone_primary: normalize_phone(self.phone_primary),
			phone_secondary: normalize_phone(self.phone_secondary),
		}
	}
}

/// Partial update of a contact
///
/// Absent fields are left untouched. For the phone fields `Some(None)`
/// (an explicit JSON `null`) clears the stored number.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactPatch {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub first_name: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub last_name: Option<String>,
	#[serde(
		default,
		deserialize_with = "present_or_null",
		skip_serializing_if = "Option::is_none"
	)]
	pub phone_primary: Option<Option<String>>,
	#[serde(
		default,
		deserialize_with = "present_or_null",
		skip_serializing_if = "Option::is_none"
	)]
	pub phone_secondary: Option<Option<String>>,
}

impl ContactPatch {
	pub fn validate(&self) -> Result<()> {
		let mut errors = ValidationErrors::new();
		if let Some(first_name) = &self.first_name {
			check_name(&mut errors, "first_name", first_name);
		}
		if let Some(last_name) = &self.last_name {
			check_name(&mut errors, "last_name", last_name);
		}
		if let Some(phone) = &self.phone_primary {
			check_phone(&mut errors, "phone_primary", phone.as_deref());
		}
		if let Some(phone) = &self.phone_secondary {
			check_phone(&mut errors, "phone_secondary", phone.as_deref());
		}
		errors.into_result()
	}

	pub fn sanitized(self) -> Self {
		Self {
			first_name: self.first_name.map(|name| sanitize_name(&name)),
			last_name: self.last_name.map(|name| sanitize_name(&name)),
			phone_primary: self.phone_primary.map(normalize_phone),
			phone_secondary: self.phone_secondary.map(normalize_phone),
		}
	}
}

fn present_or_null<'de, D, T>(deserializer: D) -> std::result::Result<Option<Option<T>>, D::Error>
where
	D: Deserializer<'de>,
	T: Deserialize<'de>,
{
	Option::<T>::deserialize(deserializer).map(Some)
}

fn check_name(errors: &mut ValidationErrors, field: &str, value: &str) {
	if value.trim().is_empty() {
		errors.push(format!("{field} is required and must be a non-empty string"));
	}
}

fn check_phone(errors: &mut ValidationErrors, field: &str, value: Option<&str>) {
	match value {
		Some(phone) if !phone.trim().is_empty() && !is_valid_phone(phone) => {
			errors.push(format!("{field} has invalid format"));
		}
		_ => {}
	}
}

/// Digits, spaces, dashes, parentheses and `+`, with at least ten digits
pub fn is_valid_phone(phone: &str) -> bool {
	PHONE_PATTERN.is_match(phone)
		&& phone.chars().filter(char::is_ascii_digit).count() >= MIN_PHONE_DIGITS
}

pub fn sanitize_name(name: &str) -> String {
	name.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn normalize_phone(phone: Option<String>) -> Option<String> {
	phone
		.map(|p| p.trim().to_string())
		.filter(|p| !p.is_empty())
}
