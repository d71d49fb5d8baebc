//! Allocation API endpoints

use api_types::{
    Created,
    allocation::{AllocationNew, AllocationView},
};
use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};
use chrono::Utc;
use engine::IncreaseAllocationCmd;

use crate::{ServerError, parse_amount, server::ServerState, user};

/// Handle an allocation increase; only the pool admin gets past the engine.
pub async fn increase(
    Extension(user): Extension<user::Model>,
    State(state): State<ServerState>,
    Json(payload): Json<AllocationNew>,
) -> Result<(StatusCode, Json<Created>), ServerError> {
    let amount = parse_amount(&payload.amount)?;
    let mut cmd = IncreaseAllocationCmd::new(user.username, payload.recipient, amount, Utc::now());
    if let Some(note) = payload.note {
        cmd = cmd.note(note);
    }
    let grant = state.engine.increase_allocation(cmd).await?;

    Ok((StatusCode::CREATED, Json(Created { id: grant.id })))
}

pub async fn get(
    _: Extension<user::Model>,
    State(state): State<ServerState>,
    Path(recipient): Path<String>,
) -> Result<Json<AllocationView>, ServerError> {
    let allocation = state.engine.recipient(&recipient).await?;
    Ok(Json(AllocationView {
        available: allocation.available().to_string(),
        recipient: allocation.recipient,
        allocated: allocation.allocated.to_string(),
        withdrawn: allocation.withdrawn.to_string(),
    }))
}
