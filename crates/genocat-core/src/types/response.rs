//! Typed result envelope for manager-level operations.
//!
//! The REST collaborator serializes this envelope into its wire format; the
//! core only fills in the typed fields.

use serde::{Deserialize, Serialize};

/// Result envelope carrying zero or more typed results plus bookkeeping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResult<T> {
    /// Short operation label.
    pub id: String,
    /// Milliseconds spent in the metadata store.
    pub db_time: i64,
    /// Number of results returned.
    pub num_results: i64,
    /// Total matching results (may exceed `num_results` when paginated).
    pub num_total_results: i64,
    /// Warning message, empty when none.
    pub warning_msg: String,
    /// Error message, empty on success.
    pub error_msg: String,
    /// The results.
    pub result: Vec<T>,
}

impl<T> QueryResult<T> {
    /// Successful envelope over a list of results.
    pub fn new(id: impl Into<String>, result: Vec<T>) -> Self {
        let n = result.len() as i64;
        Self {
            id: id.into(),
            db_time: 0,
            num_results: n,
            num_total_results: n,
            warning_msg: String::new(),
            error_msg: String::new(),
            result,
        }
    }

    /// Empty successful envelope.
    pub fn empty(id: impl Into<String>) -> Self {
        Self::new(id, Vec::new())
    }

    /// Envelope carrying a per-item error (silent bulk mode).
    pub fn error(id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            db_time: 0,
            num_results: 0,
            num_total_results: 0,
            warning_msg: String::new(),
            error_msg: message.into(),
            result: Vec::new(),
        }
    }

    /// First result, if any.
    pub fn first(&self) -> Option<&T> {
        self.result.first()
    }

    /// Consume the envelope and return the first result, if any.
    pub fn into_first(self) -> Option<T> {
        self.result.into_iter().next()
    }

    /// Whether this envelope carries a per-item error.
    pub fn is_error(&self) -> bool {
        !self.error_msg.is_empty()
    }
}
