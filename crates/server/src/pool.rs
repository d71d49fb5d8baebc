//! Pool API endpoints

use api_types::pool::PoolView;
use axum::{Extension, Json, extract::State};
use engine::Pool;

use crate::{ServerError, server::ServerState, user};

fn pool_view(pool: Pool) -> PoolView {
    PoolView {
        admin: pool.admin,
        total_balance: pool.total_balance.to_string(),
        total_donated: pool.total_donated.to_string(),
        total_withdrawn: pool.total_withdrawn.to_string(),
        min_donation: pool.min_donation.to_string(),
        withdrawal_limit: pool.withdrawal_limit.to_string(),
        auto_ceiling: pool.auto_ceiling.to_string(),
        auto_cooldown_secs: pool.auto_cooldown.map(|d| d.num_seconds()),
        created_at: pool.created_at,
    }
}

/// Handle requests for the pool snapshot
pub async fn get(
    _: Extension<user::Model>,
    State(state): State<ServerState>,
) -> Result<Json<PoolView>, ServerError> {
    let pool = state.engine.pool().await?;
    Ok(Json(pool_view(pool)))
}
