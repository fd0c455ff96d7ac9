//! Execution context carried from a caller into every partition task.
//!
//! The correlation id is passed explicitly to store callbacks instead of
//! living in per-thread state, so a worker that picks up a partition always
//! reports the logical operation that produced it.

use std::fmt::{Display, Formatter};
use std::sync::Arc;
use uuid::Uuid;

/// Correlation metadata for one logical repository operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecContext {
    correlation_id: Arc<str>,
    partition: Option<usize>,
}

impl ExecContext {
    /// Creates a context for an operation with a caller-supplied id.
    pub fn new(correlation_id: impl Into<String>) -> Self {
        Self {
            correlation_id: Arc::from(correlation_id.into()),
            partition: None,
        }
    }

    /// Creates a context with a fresh random correlation id.
    pub fn generate() -> Self {
        Self::new(Uuid::new_v4().to_string())
    }

    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }

    /// Partition index when running inside a split task, `None` for the
    /// top-level operation.
    pub fn partition(&self) -> Option<usize> {
        self.partition
    }

    pub(crate) fn for_partition(&self, index: usize) -> Self {
        Self {
            correlation_id: Arc::clone(&self.correlation_id),
            partition: Some(index),
        }
    }
}

impl Default for ExecContext {
    fn default() -> Self {
        Self::generate()
    }
}

impl Display for ExecContext {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "correlation_id={}", self.correlation_id)?;
        if let Some(index) = self.partition {
            write!(f, " partition={index}")?;
        }
        Ok(())
    }
}
