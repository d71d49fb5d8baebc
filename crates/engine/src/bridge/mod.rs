//! Bridge between the off-ledger funding-request queue and the ledger.
//!
//! A recipient submits a request, the admin approves or rejects it. Approval
//! calls [`Engine::increase_allocation`] keyed by the request id, then marks
//! the request `Approved` in this bridge's own store. The two writes are not
//! atomic with each other; [`RequestBridge::reconcile`] closes both gaps a
//! crash between them can leave behind.

use std::sync::Arc;

use chrono::Utc;
use sea_orm::{
    DatabaseConnection, QueryFilter, QueryOrder, TransactionTrait, prelude::*,
    sea_query::Expr,
};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::{
    AllocationGrant, Amount, Engine, EngineError, IncreaseAllocationCmd, ResultEngine,
    ops::{normalize_identity, normalize_optional_text, with_tx},
};

mod requests;

pub use requests::{FundingRequest, RequestFilter, RequestStatus};

/// What a [`RequestBridge::reconcile`] pass repaired.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Requests examined.
    pub checked: usize,
    /// Pending requests whose grant was already on the ledger; now `Approved`.
    pub approved: Vec<Uuid>,
    /// Approved requests with no grant on the ledger; the grant was re-issued.
    pub regranted: Vec<Uuid>,
}

impl ReconcileReport {
    pub fn is_clean(&self) -> bool {
        self.approved.is_empty() && self.regranted.is_empty()
    }
}

/// Funding-request queue with its own connection and its own lock.
///
/// The bridge never holds one of its transactions open across a ledger call,
/// so the ledger and the queue may share a single SQLite connection.
#[derive(Debug)]
pub struct RequestBridge {
    engine: Arc<Engine>,
    database: DatabaseConnection,
    lock: Mutex<()>,
}

impl RequestBridge {
    pub fn builder() -> RequestBridgeBuilder {
        RequestBridgeBuilder::default()
    }

    pub fn engine(&self) -> &Arc<Engine> {
        &self.engine
    }

    /// Queues a request for `amount` on behalf of `requester`.
    ///
    /// Nothing is checked against the pool here; the ledger decides at
    /// approval time.
    pub async fn submit_request(
        &self,
        requester: &str,
        amount: Amount,
        note: Option<&str>,
    ) -> ResultEngine<FundingRequest> {
        let requester = normalize_identity(requester, "requester")?;
        if !amount.is_positive() {
            return Err(EngineError::InvalidAmount(format!(
                "requested amount must be > 0, got {amount}"
            )));
        }
        let request = FundingRequest::new(
            requester,
            amount,
            normalize_optional_text(note),
            Utc::now(),
        );

        let _guard = self.lock.lock().await;
        let inserted: ResultEngine<()> = with_tx!(self, |db_tx| {
            requests::ActiveModel::from(&request).insert(&db_tx).await?;
            Ok(())
        });
        inserted?;

        tracing::info!(
            request_id = %request.id,
            requester = %request.requester,
            amount = %request.amount,
            "funding request submitted"
        );
        Ok(request)
    }

    /// Return a request from DB.
    pub async fn request(&self, id: Uuid) -> ResultEngine<FundingRequest> {
        with_tx!(self, |db_tx| {
            requests::Entity::find_by_id(id.to_string())
                .one(&db_tx)
                .await?
                .ok_or_else(|| EngineError::KeyNotFound(format!("request {id} not exists")))
                .and_then(FundingRequest::try_from)
        })
    }

    /// Requests matching `filter`, newest first.
    pub async fn list_requests(&self, filter: &RequestFilter) -> ResultEngine<Vec<FundingRequest>> {
        with_tx!(self, |db_tx| {
            let mut query = requests::Entity::find()
                .order_by_desc(requests::Column::CreatedAt)
                .order_by_desc(requests::Column::Id);
            if let Some(status) = filter.status {
                query = query.filter(requests::Column::Status.eq(status.as_str()));
            }
            if let Some(requester) = filter.requester.as_deref() {
                query = query.filter(requests::Column::Requester.eq(requester.trim().to_string()));
            }
            query
                .all(&db_tx)
                .await?
                .into_iter()
                .map(FundingRequest::try_from)
                .collect::<ResultEngine<Vec<_>>>()
        })
    }

    /// Approves a pending request: one allocation grant of the requested
    /// amount to the requester, recorded against the request id.
    ///
    /// Any ledger rejection (`NotAdmin`, `NotInitialized`, ...) leaves the
    /// request `Pending`. A request that is no longer pending fails with
    /// `AlreadyFinalized` and the ledger is not called.
    pub async fn approve(&self, id: Uuid, caller: &str) -> ResultEngine<FundingRequest> {
        let _guard = self.lock.lock().await;
        let request = self.request(id).await?;
        if request.status.is_final() {
            return Err(EngineError::AlreadyFinalized(format!(
                "request {id} is already {}",
                request.status.as_str()
            )));
        }

        let grant = match self.grant(&request, caller).await {
            Ok(grant) => grant,
            Err(err) => {
                tracing::warn!(
                    request_id = %id,
                    caller = %caller.trim(),
                    "approval failed, request stays pending: {err}"
                );
                return Err(err);
            }
        };

        let approved = self.mark_approved(&request, &grant).await?;
        tracing::info!(
            request_id = %id,
            grant_id = %grant.id,
            requester = %approved.requester,
            amount = %approved.amount,
            "funding request approved"
        );
        Ok(approved)
    }

    /// Rejects a pending request. The ledger is not touched.
    pub async fn reject(&self, id: Uuid, caller: &str) -> ResultEngine<FundingRequest> {
        let caller = caller.trim();
        let _guard = self.lock.lock().await;
        let request = self.request(id).await?;
        if request.status.is_final() {
            return Err(EngineError::AlreadyFinalized(format!(
                "request {id} is already {}",
                request.status.as_str()
            )));
        }
        if !self.engine.pool().await?.is_admin(caller) {
            tracing::warn!(request_id = %id, caller = %caller, "rejection refused: not the admin");
            return Err(EngineError::NotAdmin(caller.to_string()));
        }

        let now = Utc::now();
        let updated: ResultEngine<u64> = with_tx!(self, |db_tx| {
            let res = requests::Entity::update_many()
                .col_expr(
                    requests::Column::Status,
                    Expr::value(RequestStatus::Rejected.as_str()),
                )
                .col_expr(requests::Column::DecidedAt, Expr::value(now))
                .col_expr(requests::Column::DecidedBy, Expr::value(caller.to_string()))
                .filter(requests::Column::Id.eq(id.to_string()))
                .filter(requests::Column::Status.eq(RequestStatus::Pending.as_str()))
                .exec(&db_tx)
                .await?;
            Ok(res.rows_affected)
        });
        if updated? == 0 {
            return Err(EngineError::AlreadyFinalized(format!(
                "request {id} is already decided"
            )));
        }

        tracing::info!(request_id = %id, caller = %caller, "funding request rejected");
        self.request(id).await
    }

    /// Repairs requests whose ledger grant and queue status disagree.
    ///
    /// A `Pending` request whose grant is on the ledger is marked `Approved`.
    /// An `Approved` request without a grant gets it re-issued under the same
    /// request id, which the ledger applies at most once. Admin only.
    pub async fn reconcile(&self, caller: &str) -> ResultEngine<ReconcileReport> {
        let caller = caller.trim();
        let _guard = self.lock.lock().await;
        if !self.engine.pool().await?.is_admin(caller) {
            return Err(EngineError::NotAdmin(caller.to_string()));
        }

        let open = self
            .list_requests(&RequestFilter::default().status(RequestStatus::Pending))
            .await?;
        let approved = self
            .list_requests(&RequestFilter::default().status(RequestStatus::Approved))
            .await?;

        let mut report = ReconcileReport {
            checked: open.len() + approved.len(),
            ..Default::default()
        };

        for request in open {
            if let Some(grant) = self.engine.grant_for_request(request.id).await? {
                self.mark_approved(&request, &grant).await?;
                report.approved.push(request.id);
            }
        }

        for request in approved {
            if self.engine.grant_for_request(request.id).await?.is_some() {
                continue;
            }
            let grant = self.grant(&request, caller).await?;
            self.set_grant_id(request.id, grant.id).await?;
            report.regranted.push(request.id);
        }

        if report.is_clean() {
            tracing::debug!(checked = report.checked, "funding requests reconciled, nothing to repair");
        } else {
            tracing::warn!(
                approved = report.approved.len(),
                regranted = report.regranted.len(),
                "funding requests reconciled with repairs"
            );
        }
        Ok(report)
    }

    async fn grant(&self, request: &FundingRequest, caller: &str) -> ResultEngine<AllocationGrant> {
        let mut cmd = IncreaseAllocationCmd::new(
            caller,
            request.requester.clone(),
            request.amount,
            Utc::now(),
        )
        .request_id(request.id);
        if let Some(note) = request.note.as_deref() {
            cmd = cmd.note(note);
        }
        self.engine.increase_allocation(cmd).await
    }

    async fn mark_approved(
        &self,
        request: &FundingRequest,
        grant: &AllocationGrant,
    ) -> ResultEngine<FundingRequest> {
        let id = request.id;
        let updated: ResultEngine<u64> = with_tx!(self, |db_tx| {
            let res = requests::Entity::update_many()
                .col_expr(
                    requests::Column::Status,
                    Expr::value(RequestStatus::Approved.as_str()),
                )
                .col_expr(requests::Column::DecidedAt, Expr::value(grant.occurred_at))
                .col_expr(requests::Column::DecidedBy, Expr::value(grant.granted_by.clone()))
                .col_expr(requests::Column::GrantId, Expr::value(grant.id.to_string()))
                .filter(requests::Column::Id.eq(id.to_string()))
                .filter(requests::Column::Status.eq(RequestStatus::Pending.as_str()))
                .exec(&db_tx)
                .await?;
            Ok(res.rows_affected)
        });
        if updated? == 0 {
            return Err(EngineError::AlreadyFinalized(format!(
                "request {id} is already decided"
            )));
        }
        self.request(id).await
    }

    async fn set_grant_id(&self, id: Uuid, grant_id: Uuid) -> ResultEngine<()> {
        with_tx!(self, |db_tx| {
            requests::Entity::update_many()
                .col_expr(requests::Column::GrantId, Expr::value(grant_id.to_string()))
                .filter(requests::Column::Id.eq(id.to_string()))
                .exec(&db_tx)
                .await?;
            Ok(())
        })
    }
}

/// The builder for `RequestBridge`
#[derive(Default)]
pub struct RequestBridgeBuilder {
    engine: Option<Arc<Engine>>,
    database: DatabaseConnection,
}

impl RequestBridgeBuilder {
    /// The ledger approvals are committed to.
    pub fn engine(mut self, engine: Arc<Engine>) -> Self {
        self.engine = Some(engine);
        self
    }

    /// The connection holding the `funding_requests` table.
    pub fn database(mut self, db: DatabaseConnection) -> Self {
        self.database = db;
        self
    }

    pub async fn build(self) -> ResultEngine<RequestBridge> {
        let engine = self
            .engine
            .ok_or_else(|| EngineError::KeyNotFound("engine not set".to_string()))?;
        Ok(RequestBridge {
            engine,
            database: self.database,
            lock: Mutex::new(()),
        })
    }
}
