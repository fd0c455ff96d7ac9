//! Record domain model.
//!
//! # Responsibility
//! - Define the persisted `records` row shape and its write input.
//! - Validate field invariants shared by write and read paths.
//!
//! # Invariants
//! - `id` is positive once assigned by the store.
//! - `name` is never blank.
//! - `category`, when present, is never blank.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Primary key of a stored record.
pub type RecordId = i64;

/// One persisted row of the `records` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub id: RecordId,
    pub name: String,
    pub category: Option<String>,
    /// Unix epoch milliseconds, assigned by the store on insert.
    pub created_at: i64,
}

impl Record {
    /// Checks a row read back from storage.
    pub fn validate(&self) -> Result<(), RecordValidationError> {
        if self.id <= 0 {
            return Err(RecordValidationError::InvalidId(self.id));
        }
        validate_fields(&self.name, self.category.as_deref())?;
        if self.created_at < 0 {
            return Err(RecordValidationError::InvalidCreatedAt(self.created_at));
        }
        Ok(())
    }
}

/// Write input for one record.
///
/// Leaving `id` unset lets the store assign the next rowid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRecord {
    pub id: Option<RecordId>,
    pub name: String,
    pub category: Option<String>,
}

impl NewRecord {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            category: None,
        }
    }

    pub fn with_id(mut self, id: RecordId) -> Self {
        self.id = Some(id);
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn validate(&self) -> Result<(), RecordValidationError> {
        if let Some(id) = self.id {
            if id <= 0 {
                return Err(RecordValidationError::InvalidId(id));
            }
        }
        validate_fields(&self.name, self.category.as_deref())
    }
}

/// Field-level validation failure for records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordValidationError {
    InvalidId(RecordId),
    EmptyName,
    EmptyCategory,
    InvalidCreatedAt(i64),
}

impl Display for RecordValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidId(id) => write!(f, "record id must be positive, got {id}"),
            Self::EmptyName => write!(f, "record name cannot be empty"),
            Self::EmptyCategory => write!(f, "record category cannot be blank when set"),
            Self::InvalidCreatedAt(value) => {
                write!(f, "record created_at must not be negative, got {value}")
            }
        }
    }
}

impl Error for RecordValidationError {}

fn validate_fields(name: &str, category: Option<&str>) -> Result<(), RecordValidationError> {
    if name.trim().is_empty() {
        return Err(RecordValidationError::EmptyName);
    }
    if category.is_some_and(|value| value.trim().is_empty()) {
        return Err(RecordValidationError::EmptyCategory);
    }
    Ok(())
}
