//! The module contains the error the engine can throw.
//!
//! The errors are:
//!
//! - [`KeyNotFound`] thrown when an account, entry, recurring transaction or
//!   reminder does not exist.
//! - [`NotEditable`] thrown when an entry is updated after its editable
//!   window, or after it was voided.
//! - [`AlreadyVoided`] thrown when voiding an entry twice.
//! - [`Conflict`] and [`Database`] are persistence failures: nothing of the
//!   failed operation is visible.
//!
//!  [`KeyNotFound`]: EngineError::KeyNotFound
//!  [`NotEditable`]: EngineError::NotEditable
//!  [`AlreadyVoided`]: EngineError::AlreadyVoided
//!  [`Conflict`]: EngineError::Conflict
//!  [`Database`]: EngineError::Database
use sea_orm::DbErr;
use thiserror::Error;

/// Engine custom errors.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("\"{0}\" key not found!")]
    KeyNotFound(String),
    #[error("Entry no longer editable: {0}")]
    NotEditable(String),
    #[error("Entry already voided: {0}")]
    AlreadyVoided(String),
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
    #[error("Invalid id: {0}")]
    InvalidId(String),
    #[error("Invalid schedule: {0}")]
    InvalidSchedule(String),
    #[error("Invalid state: {0}")]
    InvalidState(String),
    #[error("Currency mismatch: {0}")]
    CurrencyMismatch(String),
    #[error("Concurrent modification: {0}")]
    Conflict(String),
    #[error("Scheduling failure: {0}")]
    Scheduling(String),
    #[error(transparent)]
    Database(#[from] DbErr),
}

impl EngineError {
    /// `true` for failures of the storage layer. The caller may retry them;
    /// the engine never does.
    #[must_use]
    pub fn is_persistence_failure(&self) -> bool {
        matches!(self, Self::Conflict(_) | Self::Database(_))
    }
}

impl PartialEq for EngineError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::KeyNotFound(a), Self::KeyNotFound(b)) => a == b,
            (Self::NotEditable(a), Self::NotEditable(b)) => a == b,
            (Self::AlreadyVoided(a), Self::AlreadyVoided(b)) => a == b,
            (Self::InvalidAmount(a), Self::InvalidAmount(b)) => a == b,
            (Self::InvalidId(a), Self::InvalidId(b)) => a == b,
            (Self::InvalidSchedule(a), Self::InvalidSchedule(b)) => a == b,
            (Self::InvalidState(a), Self::InvalidState(b)) => a == b,
            (Self::CurrencyMismatch(a), Self::CurrencyMismatch(b)) => a == b,
            (Self::Conflict(a), Self::Conflict(b)) => a == b,
            (Self::Scheduling(a), Self::Scheduling(b)) => a == b,
            (Self::Database(a), Self::Database(b)) => a.to_string() == b.to_string(),
            _ => false,
        }
    }
}
