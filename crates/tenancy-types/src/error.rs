use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("hour of week out of range: {0} (expected 0..=167)")]
    InvalidHourOfWeek(u32),

    #[error("malformed revision token: {0}")]
    InvalidRevision(String),
}
