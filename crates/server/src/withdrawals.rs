//! Withdrawal API endpoints

use api_types::withdrawal::{
    WithdrawNew, WithdrawalCreated, WithdrawalKind as ApiKind, WithdrawalList, WithdrawalPage,
    WithdrawalView,
};
use axum::{
    Extension, Json,
    extract::{Query, State},
    http::StatusCode,
};
use chrono::Utc;
use engine::{WithdrawCmd, WithdrawalKind, WithdrawalListFilter};

use crate::{ServerError, parse_amount, server::ServerState, user};

const DEFAULT_PAGE: u64 = 50;
const MAX_PAGE: u64 = 500;

fn map_kind(kind: WithdrawalKind) -> ApiKind {
    match kind {
        WithdrawalKind::Auto => ApiKind::Auto,
        WithdrawalKind::Approved => ApiKind::Approved,
    }
}

/// Handle a withdrawal against the authenticated user's own allocation
pub async fn withdraw(
    Extension(user): Extension<user::Model>,
    State(state): State<ServerState>,
    Json(payload): Json<WithdrawNew>,
) -> Result<(StatusCode, Json<WithdrawalCreated>), ServerError> {
    let amount = parse_amount(&payload.amount)?;
    let event = state
        .engine
        .withdraw(WithdrawCmd::new(user.username, amount, Utc::now()))
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(WithdrawalCreated {
            id: event.id,
            kind: map_kind(event.kind),
        }),
    ))
}

pub async fn list(
    _: Extension<user::Model>,
    State(state): State<ServerState>,
    Query(query): Query<WithdrawalList>,
) -> Result<Json<WithdrawalPage>, ServerError> {
    let limit = query.limit.unwrap_or(DEFAULT_PAGE).clamp(1, MAX_PAGE);
    let filter = WithdrawalListFilter {
        recipient: query.recipient,
        ..Default::default()
    };
    let (events, next_cursor) = state
        .engine
        .list_withdrawals_page(&filter, limit, query.cursor.as_deref())
        .await?;

    let withdrawals = events
        .into_iter()
        .map(|event| WithdrawalView {
            id: event.id,
            recipient: event.recipient,
            amount: event.amount.to_string(),
            kind: map_kind(event.kind),
            occurred_at: event.occurred_at,
        })
        .collect();

    Ok(Json(WithdrawalPage {
        withdrawals,
        next_cursor,
    }))
}
