//! Funding request API endpoints

use api_types::{
    Created,
    request::{
        ReconcileView, RequestList, RequestListResponse, RequestNew, RequestStatus as ApiStatus,
        RequestView,
    },
};
use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use engine::{FundingRequest, RequestFilter, RequestStatus};
use uuid::Uuid;

use crate::{ServerError, parse_amount, server::ServerState, user};

fn map_status(status: RequestStatus) -> ApiStatus {
    match status {
        RequestStatus::Pending => ApiStatus::Pending,
        RequestStatus::Approved => ApiStatus::Approved,
        RequestStatus::Rejected => ApiStatus::Rejected,
    }
}

fn map_api_status(status: ApiStatus) -> RequestStatus {
    match status {
        ApiStatus::Pending => RequestStatus::Pending,
        ApiStatus::Approved => RequestStatus::Approved,
        ApiStatus::Rejected => RequestStatus::Rejected,
    }
}

fn request_view(request: FundingRequest) -> RequestView {
    RequestView {
        id: request.id,
        requester: request.requester,
        amount: request.amount.to_string(),
        note: request.note,
        status: map_status(request.status),
        created_at: request.created_at,
        decided_at: request.decided_at,
        decided_by: request.decided_by,
        grant_id: request.grant_id,
    }
}

/// Queue a funding request on behalf of the authenticated user
pub async fn submit(
    Extension(user): Extension<user::Model>,
    State(state): State<ServerState>,
    Json(payload): Json<RequestNew>,
) -> Result<(StatusCode, Json<Created>), ServerError> {
    let amount = parse_amount(&payload.amount)?;
    let request = state
        .bridge
        .submit_request(&user.username, amount, payload.note.as_deref())
        .await?;

    Ok((StatusCode::CREATED, Json(Created { id: request.id })))
}

pub async fn list(
    _: Extension<user::Model>,
    State(state): State<ServerState>,
    Query(query): Query<RequestList>,
) -> Result<Json<RequestListResponse>, ServerError> {
    let filter = RequestFilter {
        status: query.status.map(map_api_status),
        requester: query.requester,
    };
    let requests = state
        .bridge
        .list_requests(&filter)
        .await?
        .into_iter()
        .map(request_view)
        .collect();

    Ok(Json(RequestListResponse { requests }))
}

pub async fn get(
    _: Extension<user::Model>,
    State(state): State<ServerState>,
    Path(id): Path<Uuid>,
) -> Result<Json<RequestView>, ServerError> {
    let request = state.bridge.request(id).await?;
    Ok(Json(request_view(request)))
}

pub async fn approve(
    Extension(user): Extension<user::Model>,
    State(state): State<ServerState>,
    Path(id): Path<Uuid>,
) -> Result<Json<RequestView>, ServerError> {
    let request = state.bridge.approve(id, &user.username).await?;
    Ok(Json(request_view(request)))
}

pub async fn reject(
    Extension(user): Extension<user::Model>,
    State(state): State<ServerState>,
    Path(id): Path<Uuid>,
) -> Result<Json<RequestView>, ServerError> {
    let request = state.bridge.reject(id, &user.username).await?;
    Ok(Json(request_view(request)))
}

pub async fn reconcile(
    Extension(user): Extension<user::Model>,
    State(state): State<ServerState>,
) -> Result<Json<ReconcileView>, ServerError> {
    let report = state.bridge.reconcile(&user.username).await?;
    Ok(Json(ReconcileView {
        checked: report.checked,
        approved: report.approved,
        regranted: report.regranted,
    }))
}
