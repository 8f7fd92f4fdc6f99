//! Field-level validation
//!
//! Validators collect every violation of a payload before anything is
//! mutated, so callers can report all of them at once.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

static EMAIL_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email pattern is a valid regex")
});

pub const NOT_BLANK: &str = "This value should not be blank.";
pub const ALREADY_USED: &str = "This value is already used.";
pub const INVALID_EMAIL: &str = "This value is not a valid email address.";

/// A single failed constraint on one field
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Violation {
    pub property_path: String,
    pub message: String,
}

/// Ordered collection of violations
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Violations(Vec<Violation>);

impl Violations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, property_path: &str, message: impl Into<String>) {
        self.0.push(Violation {
            property_path: property_path.to_string(),
            message: message.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Violation> {
        self.0.iter()
    }

    /// True if some violation concerns `property_path`
    pub fn has(&self, property_path: &str) -> bool {
        self.0.iter().any(|v| v.property_path == property_path)
    }

    /// `Ok(())` when nothing was violated
    pub fn into_result(self) -> Result<(), Violations> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }

    /// Value must contain something other than whitespace. Returns whether it
    /// passed so length checks can be skipped for blank values.
    pub fn not_blank(&mut self, property_path: &str, value: &str) -> bool {
        if value.trim().is_empty() {
            self.add(property_path, NOT_BLANK);
            false
        } else {
            true
        }
    }

    pub fn min_length(&mut self, property_path: &str, value: &str, min: usize) {
        if value.chars().count() < min {
            self.add(
                property_path,
                format!("This value is too short. It should have {} characters or more.", min),
            );
        }
    }

    pub fn max_length(&mut self, property_path: &str, value: &str, max: usize) {
        if value.chars().count() > max {
            self.add(
                property_path,
                format!("This value is too long. It should have {} characters or less.", max),
            );
        }
    }

    pub fn email(&mut self, property_path: &str, value: &str) {
        if !EMAIL_REGEX.is_match(value) {
            self.add(property_path, INVALID_EMAIL);
        }
    }
}

impl std::fmt::Display for Violations {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parts: Vec<String> = self
            .0
            .iter()
            .map(|v| format!("{}: {}", v.property_path, v.message))
            .collect();
        f.write_str(&parts.join("; "))
    }
}
