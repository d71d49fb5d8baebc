use axum::{
    Router,
    extract::{Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Basic},
};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};

use std::sync::Arc;

use crate::{allocations, audit, donations, pool, requests, user, withdrawals};
use engine::{Engine, RequestBridge};

#[derive(Clone)]
pub struct ServerState {
    pub engine: Arc<Engine>,
    pub bridge: Arc<RequestBridge>,
    /// Holds the `users` table.
    pub db: DatabaseConnection,
}

/// Resolves the Basic credentials to a user; the authenticated username is
/// the caller identity for every ledger operation.
async fn auth(
    auth_header: TypedHeader<Authorization<Basic>>,
    State(state): State<ServerState>,
    mut request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    if auth_header.username().is_empty() || auth_header.password().is_empty() {
        return Err(StatusCode::UNAUTHORIZED);
    }

    let user: Option<user::Model> = user::Entity::find()
        .filter(user::Column::Username.eq(auth_header.username()))
        .filter(user::Column::Password.eq(auth_header.password()))
        .one(&state.db)
        .await
        .map_err(|_| StatusCode::UNAUTHORIZED)?;

    let Some(user) = user else {
        tracing::debug!(username = auth_header.username(), "authentication failed");
        return Err(StatusCode::UNAUTHORIZED);
    };

    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}

pub fn router(state: ServerState) -> Router {
    Router::new()
        .route("/pool", get(pool::get))
        .route("/donate", post(donations::donate))
        .route("/donations/{donor}", get(donations::get))
        .route("/allocations", post(allocations::increase))
        .route("/allocations/{recipient}", get(allocations::get))
        .route("/withdraw", post(withdrawals::withdraw))
        .route("/withdrawals", get(withdrawals::list))
        .route("/requests", post(requests::submit).get(requests::list))
        .route("/requests/reconcile", post(requests::reconcile))
        .route("/requests/{id}", get(requests::get))
        .route("/requests/{id}/approve", post(requests::approve))
        .route("/requests/{id}/reject", post(requests::reject))
        .route("/audit", get(audit::get))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth))
        .with_state(state)
}

/// Serves the router on an already bound listener until the server stops.
pub async fn run_with_listener(
    state: ServerState,
    listener: tokio::net::TcpListener,
) -> Result<(), std::io::Error> {
    let addr = listener.local_addr()?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, router(state)).await
}
