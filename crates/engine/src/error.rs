//! The module contains the errors the engine can return.
//!
//! Policy rejections are the variants a caller can fix by resubmitting with
//! different input:
//!
//! - [`BelowMinimum`] when a donation is under the pool floor.
//! - [`NotAdmin`] when a privileged action is attempted by anyone else.
//! - [`ExceedsSingleLimit`] when a withdrawal is over the per-call ceiling.
//! - [`ExceedsRemainingAllocation`] when a withdrawal is over
//!   `allocated - withdrawn`.
//! - [`InsufficientPoolBalance`] when the pool cannot cover a withdrawal.
//! - [`AlreadyFinalized`] when a funding request is decided twice.
//!
//! None of them leaves the ledger mutated.
//!
//!  [`BelowMinimum`]: EngineError::BelowMinimum
//!  [`NotAdmin`]: EngineError::NotAdmin
//!  [`ExceedsSingleLimit`]: EngineError::ExceedsSingleLimit
//!  [`ExceedsRemainingAllocation`]: EngineError::ExceedsRemainingAllocation
//!  [`InsufficientPoolBalance`]: EngineError::InsufficientPoolBalance
//!  [`AlreadyFinalized`]: EngineError::AlreadyFinalized
use sea_orm::DbErr;
use thiserror::Error;

/// Engine custom errors.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Donation below minimum: {0}")]
    BelowMinimum(String),
    #[error("Caller is not the admin: {0}")]
    NotAdmin(String),
    #[error("Exceeds single withdrawal limit: {0}")]
    ExceedsSingleLimit(String),
    #[error("Insufficient remaining allocation: {0}")]
    ExceedsRemainingAllocation(String),
    #[error("Insufficient pool balance: {0}")]
    InsufficientPoolBalance(String),
    #[error("Request already finalized: {0}")]
    AlreadyFinalized(String),
    #[error("Auto withdrawal cooldown active: {0}")]
    CooldownActive(String),
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Invalid cursor: {0}")]
    InvalidCursor(String),
    #[error("\"{0}\" key not found!")]
    KeyNotFound(String),
    #[error("\"{0}\" already present!")]
    ExistingKey(String),
    #[error("Pool not initialized")]
    NotInitialized,
    #[error(transparent)]
    Database(#[from] DbErr),
}

impl EngineError {
    /// Returns `true` for rejections decided by the authorization policy.
    pub fn is_policy_rejection(&self) -> bool {
        matches!(
            self,
            Self::BelowMinimum(_)
                | Self::NotAdmin(_)
                | Self::ExceedsSingleLimit(_)
                | Self::ExceedsRemainingAllocation(_)
                | Self::InsufficientPoolBalance(_)
                | Self::CooldownActive(_)
        )
    }
}

impl PartialEq for EngineError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::BelowMinimum(a), Self::BelowMinimum(b)) => a == b,
            (Self::NotAdmin(a), Self::NotAdmin(b)) => a == b,
            (Self::ExceedsSingleLimit(a), Self::ExceedsSingleLimit(b)) => a == b,
            (Self::ExceedsRemainingAllocation(a), Self::ExceedsRemainingAllocation(b)) => a == b,
            (Self::InsufficientPoolBalance(a), Self::InsufficientPoolBalance(b)) => a == b,
            (Self::AlreadyFinalized(a), Self::AlreadyFinalized(b)) => a == b,
            (Self::CooldownActive(a), Self::CooldownActive(b)) => a == b,
            (Self::InvalidAmount(a), Self::InvalidAmount(b)) => a == b,
            (Self::InvalidInput(a), Self::InvalidInput(b)) => a == b,
            (Self::InvalidCursor(a), Self::InvalidCursor(b)) => a == b,
            (Self::KeyNotFound(a), Self::KeyNotFound(b)) => a == b,
            (Self::ExistingKey(a), Self::ExistingKey(b)) => a == b,
            (Self::NotInitialized, Self::NotInitialized) => true,
            (Self::Database(a), Self::Database(b)) => a.to_string() == b.to_string(),
            _ => false,
        }
    }
}
