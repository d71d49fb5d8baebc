use api_types::audit::AuditView;
use axum::{Extension, Json, extract::State};

use crate::{ServerError, server::ServerState, user};

/// Replays the ledger logs; any authenticated user may read the outcome.
pub async fn get(
    _: Extension<user::Model>,
    State(state): State<ServerState>,
) -> Result<Json<AuditView>, ServerError> {
    let report = state.engine.audit().await?;
    Ok(Json(AuditView {
        consistent: report.is_consistent(),
        total_balance: report.total_balance.to_string(),
        replayed_balance: report.replayed_balance.to_string(),
        donors: report.donors,
        recipients: report.recipients,
        mismatches: report.mismatches,
    }))
}
