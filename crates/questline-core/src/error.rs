//! Persistence boundary error types.

use thiserror::Error;

/// Errors reported by a [`ProgressRepository`](crate::repository::ProgressRepository).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// The store could not be reached or the query failed.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// A row was read but could not be decoded.
    #[error("corrupt row: {0}")]
    Corrupt(String),
}
