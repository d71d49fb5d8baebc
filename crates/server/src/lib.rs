use axum::{Json, http::StatusCode, response::IntoResponse};
use engine::{Amount, EngineError};

use serde::Serialize;
pub use server::{ServerState, router, run_with_listener};

mod allocations;
mod audit;
mod donations;
mod pool;
mod requests;
mod server;
pub mod user;
mod withdrawals;

pub mod types {
    pub use api_types::Created;

    pub mod pool {
        pub use api_types::pool::PoolView;
    }

    pub mod donation {
        pub use api_types::donation::{DonateNew, DonorView};
    }

    pub mod allocation {
        pub use api_types::allocation::{AllocationNew, AllocationView};
    }

    pub mod withdrawal {
        pub use api_types::withdrawal::{
            WithdrawNew, WithdrawalCreated, WithdrawalKind, WithdrawalList, WithdrawalPage,
            WithdrawalView,
        };
    }

    pub mod request {
        pub use api_types::request::{
            ReconcileView, RequestList, RequestListResponse, RequestNew, RequestStatus,
            RequestView,
        };
    }

    pub mod audit {
        pub use api_types::audit::AuditView;
    }
}

pub enum ServerError {
    Engine(EngineError),
    Generic(String),
}

#[derive(Serialize)]
struct Error {
    error: String,
}

fn status_for_engine_error(err: &EngineError) -> StatusCode {
    match err {
        EngineError::NotAdmin(_) => StatusCode::FORBIDDEN,
        EngineError::KeyNotFound(_) | EngineError::NotInitialized => StatusCode::NOT_FOUND,
        EngineError::AlreadyFinalized(_) | EngineError::ExistingKey(_) => StatusCode::CONFLICT,
        EngineError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        EngineError::InvalidCursor(_) | EngineError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        EngineError::BelowMinimum(_)
        | EngineError::ExceedsSingleLimit(_)
        | EngineError::ExceedsRemainingAllocation(_)
        | EngineError::InsufficientPoolBalance(_)
        | EngineError::CooldownActive(_)
        | EngineError::InvalidAmount(_) => StatusCode::UNPROCESSABLE_ENTITY,
    }
}

fn message_for_engine_error(err: EngineError) -> String {
    match err {
        EngineError::Database(db_err) => {
            tracing::error!("database error: {db_err}");
            "internal server error".to_string()
        }
        other => other.to_string(),
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> axum::response::Response {
        let (status, error) = match self {
            ServerError::Engine(err) => (status_for_engine_error(&err), message_for_engine_error(err)),
            ServerError::Generic(err) => (StatusCode::BAD_REQUEST, err),
        };

        (status, Json(Error { error })).into_response()
    }
}

impl From<EngineError> for ServerError {
    fn from(value: EngineError) -> Self {
        Self::Engine(value)
    }
}

/// Parses a wire amount; malformed input is a 400, a parsed but
/// non-positive amount is left for the engine to reject.
pub(crate) fn parse_amount(raw: &str) -> Result<Amount, ServerError> {
    raw.parse::<Amount>()
        .map_err(|err| ServerError::Generic(err.to_string()))
}
