//! Donation API endpoints

use api_types::{
    Created,
    donation::{DonateNew, DonorView},
};
use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};
use chrono::Utc;

use crate::{ServerError, parse_amount, server::ServerState, user};

/// Handle a donation from the authenticated user
pub async fn donate(
    Extension(user): Extension<user::Model>,
    State(state): State<ServerState>,
    Json(payload): Json<DonateNew>,
) -> Result<(StatusCode, Json<Created>), ServerError> {
    let amount = parse_amount(&payload.amount)?;
    let donation = state
        .engine
        .donate(engine::DonateCmd::new(user.username, amount, Utc::now()))
        .await?;

    Ok((StatusCode::CREATED, Json(Created { id: donation.id })))
}

pub async fn get(
    _: Extension<user::Model>,
    State(state): State<ServerState>,
    Path(donor): Path<String>,
) -> Result<Json<DonorView>, ServerError> {
    let total_donated = state.engine.donation_of(&donor).await?;
    Ok(Json(DonorView {
        donor,
        total_donated: total_donated.to_string(),
    }))
}
