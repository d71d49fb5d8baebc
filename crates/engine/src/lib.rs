//! Fund ledger and withdrawal authorization engine.
//!
//! The [`Engine`] is the single point of mutation for the relief pool:
//! donations, allocation grants and withdrawals are validated by the pure
//! [`policy`] functions against a snapshot read inside the same database
//! transaction, then committed all-or-nothing. The [`RequestBridge`] sits on
//! top and turns an administrator's decision on a queued funding request into
//! exactly one allocation grant.

pub use allocations::RecipientAllocation;
pub use amount::Amount;
pub use bridge::{
    FundingRequest, ReconcileReport, RequestBridge, RequestBridgeBuilder, RequestFilter,
    RequestStatus,
};
pub use commands::{DonateCmd, IncreaseAllocationCmd, WithdrawCmd};
pub use donations::Donation;
pub use donors::Donor;
pub use error::EngineError;
pub use grants::AllocationGrant;
pub use ops::{AuditReport, Engine, EngineBuilder, WithdrawalListFilter};
pub use pool::{DEFAULT_AUTO_CEILING, Pool, PoolConfig};
pub use withdrawals::{WithdrawalEvent, WithdrawalKind};

mod allocations;
mod amount;
mod bridge;
mod commands;
mod donations;
mod donors;
mod error;
mod grants;
mod ops;
pub mod policy;
mod pool;
mod withdrawals;

type ResultEngine<T> = Result<T, EngineError>;
