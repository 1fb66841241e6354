//! Field-level validation shared by Task and UserStory construction.
//!
//! Validation is all-or-nothing: a record with any invalid field is rejected
//! in full, and the error lists every violated field with a machine-readable
//! kind. Business-logic conditions (not-found etc.) are never reported here.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use ts_rs::TS;

/// Machine-readable classification of a single field violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    Missing,
    TooLong,
    NotAMember,
    OutOfRange,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
pub struct FieldError {
    pub field: String,
    pub message: String,
    pub kind: ViolationKind,
}

/// Every violation found in a single record.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize, TS)]
#[error("validation failed on {} field(s)", .errors.len())]
pub struct ValidationErrors {
    pub errors: Vec<FieldError>,
}

/// Accumulates violations while a draft is checked field by field.
#[derive(Debug, Default)]
pub struct Violations {
    errors: Vec<FieldError>,
}

impl Violations {
    pub fn push(&mut self, field: &str, message: impl Into<String>, kind: ViolationKind) {
        self.errors.push(FieldError {
            field: field.to_string(),
            message: message.into(),
            kind,
        });
    }

    pub fn missing(&mut self, field: &str) {
        self.push(field, "field is required", ViolationKind::Missing);
    }

    pub fn too_long(&mut self, field: &str, max: usize) {
        self.push(
            field,
            format!("cannot be longer than {max} characters"),
            ViolationKind::TooLong,
        );
    }

    pub fn not_a_member(&mut self, field: &str, value: &str) {
        self.push(
            field,
            format!("'{value}' is not a member of the {field} enumeration"),
            ViolationKind::NotAMember,
        );
    }

    pub fn out_of_range(&mut self, field: &str, message: impl Into<String>) {
        self.push(field, message, ViolationKind::OutOfRange);
    }

    /// Check a string ceiling. Limits are in characters, not bytes.
    pub fn check_len(&mut self, field: &str, value: &str, max: usize) {
        if value.chars().count() > max {
            self.too_long(field, max);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn into_errors(self) -> ValidationErrors {
        ValidationErrors {
            errors: self.errors,
        }
    }
}

/// Round to one decimal place, ties to even. Fixed here so the stored
/// rounding of effort hours stays consistent across construction paths.
pub fn round_to_tenth(value: f64) -> f64 {
    (value * 10.0).round_ties_even() / 10.0
}
