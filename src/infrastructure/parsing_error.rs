//! Field-level extraction error types
//!
//! A `FieldError` describes why one attribute of a detail page could not be
//! read. These errors never abort an extraction; they are collected next to
//! the record so that callers can log them.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FieldError {
    #[error("Field '{field}' not found on page")]
    NotFound { field: &'static str },

    #[error("Field '{field}' is present but empty")]
    Empty { field: &'static str },

    #[error("Lookup of field '{field}' failed: {reason}")]
    Lookup { field: &'static str, reason: String },

    #[error("Field '{field}' value '{value}' could not be parsed: {reason}")]
    Parse {
        field: &'static str,
        value: String,
        reason: String,
    },
}

impl FieldError {
    pub fn parse(field: &'static str, value: &str, reason: impl Into<String>) -> Self {
        Self::Parse {
            field,
            value: value.to_string(),
            reason: reason.into(),
        }
    }

    pub fn lookup(field: &'static str, reason: impl ToString) -> Self {
        Self::Lookup {
            field,
            reason: reason.to_string(),
        }
    }

    /// Name of the field this error belongs to
    pub const fn field(&self) -> &'static str {
        match self {
            Self::NotFound { field }
            | Self::Empty { field }
            | Self::Lookup { field, .. }
            | Self::Parse { field, .. } => field,
        }
    }

    /// Absent or empty fields are routine on this site; parse and lookup
    /// failures usually point at a markup change.
    pub const fn is_routine(&self) -> bool {
        matches!(self, Self::NotFound { .. } | Self::Empty { .. })
    }
}

pub type FieldResult<T> = Result<T, FieldError>;
