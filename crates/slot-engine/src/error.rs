//! Error types for slot-engine operations.

use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum SlotError {
    #[error("Invalid range: {0}")]
    InvalidRange(String),

    #[error("Invalid duration: {0} minutes")]
    InvalidDuration(i64),

    #[error("Invalid recurrence rule: {0}")]
    InvalidRule(String),

    #[error("Expansion error: {0}")]
    Expansion(String),
}

pub type Result<T> = std::result::Result<T, SlotError>;
