use crate::{
    auth::AuthUser,
    db::DbPool,
    entities::item::{self, ItemStatus},
    entities::request::{self, Entity as RequestEntity, RequestKind, RequestStatus},
    entities::request_item::{self, Entity as RequestItemEntity},
    errors::{ServiceError, StockShortage},
    events::{Event, EventSender},
};
use chrono::{DateTime, Utc};
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, EntityTrait, FromQueryResult, JoinType,
    LoaderTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, RelationTrait, Set,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

/// One line of a new supply request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRequestLine {
    pub item_id: Uuid,
    pub quantity: i32,
}

/// Input for submitting a new supply request
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct CreateRequestInput {
    #[validate(length(min = 1, message = "Requester name is required"))]
    pub requester_name: String,
    #[validate(email(message = "Invalid requester email"))]
    pub requester_email: String,
    #[validate(length(min = 1, message = "Division is required"))]
    pub division: String,
    #[validate(length(min = 1, message = "Section is required"))]
    pub section: String,
    pub kind: RequestKind,
    pub notes: Option<String>,
    #[validate(length(min = 1, message = "At least one line item is required"))]
    pub items: Vec<CreateRequestLine>,
}

/// The action an approver takes on a pending request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Decision {
    Approve,
    Reject,
}

/// Result of a decision: the request's new state
#[derive(Debug, Serialize, Deserialize)]
pub struct DecisionOutcome {
    pub id: Uuid,
    pub status: RequestStatus,
    pub approver_id: Uuid,
}

/// Result of a receipt confirmation
#[derive(Debug, Serialize, Deserialize)]
pub struct ReceiptOutcome {
    pub id: Uuid,
    pub is_received: bool,
    pub received_at: Option<DateTime<Utc>>,
}

/// A request together with its line items (itemized read model)
#[derive(Debug, Serialize, Deserialize)]
pub struct RequestWithItems {
    #[serde(flatten)]
    pub request: request::Model,
    pub items: Vec<request_item::Model>,
}

/// Per-item aggregation over approved requests (summary read model)
#[derive(Debug, Serialize, Deserialize)]
pub struct RequestSummaryRow {
    pub item_id: Uuid,
    pub item_name: String,
    pub total_requested: i64,
    pub request_count: i64,
}

#[derive(Debug, FromQueryResult)]
struct RawSummaryRow {
    item_id: Uuid,
    total_requested: i64,
    request_count: i64,
}

/// Filters for the itemized listing
#[derive(Debug, Default)]
pub struct RequestFilter {
    pub status: Option<RequestStatus>,
    pub kind: Option<RequestKind>,
}

/// Service for the supply request lifecycle: submit, decide, receive.
#[derive(Clone)]
pub struct RequestService {
    db_pool: Arc<DbPool>,
    event_sender: EventSender,
}

impl RequestService {
    /// Creates a new request service instance
    pub fn new(db_pool: Arc<DbPool>, event_sender: EventSender) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    /// Submits a new request with its line items.
    #[instrument(skip(self, input), fields(requester = %input.requester_email, kind = ?input.kind))]
    pub async fn create_request(
        &self,
        input: CreateRequestInput,
    ) -> Result<RequestWithItems, ServiceError> {
        input
            .validate()
            .map_err(|e| ServiceError::ValidationError(e.to_string()))?;
        if let Some(line) = input.items.iter().find(|line| line.quantity <= 0) {
            return Err(ServiceError::ValidationError(format!(
                "Requested quantity for item {} must be positive",
                line.item_id
            )));
        }

        let db = &*self.db_pool;
        let now = Utc::now();
        let request_id = Uuid::new_v4();

        let txn = db.begin().await.map_err(|e| {
            error!(error = %e, "Failed to start transaction for request creation");
            ServiceError::DatabaseError(e)
        })?;

        // Every referenced item must exist and still be orderable.
        for line in &input.items {
            let stocked = item::Entity::find_by_id(line.item_id)
                .one(&txn)
                .await
                .map_err(ServiceError::DatabaseError)?
                .ok_or_else(|| {
                    ServiceError::NotFound(format!("Item {} not found", line.item_id))
                })?;
            if stocked.is_archived {
                return Err(ServiceError::ValidationError(format!(
                    "Item '{}' is archived and cannot be requested",
                    stocked.name
                )));
            }
        }

        let request_model = request::ActiveModel {
            id: Set(request_id),
            requester_name: Set(input.requester_name.clone()),
            requester_email: Set(input.requester_email.clone()),
            division: Set(input.division.clone()),
            section: Set(input.section.clone()),
            kind: Set(input.kind),
            status: Set(RequestStatus::Pending),
            is_received: Set(false),
            received_at: Set(None),
            approver_id: Set(None),
            notes: Set(input.notes.clone()),
            created_at: Set(now),
            updated_at: Set(Some(now)),
        }
        .insert(&txn)
        .await
        .map_err(|e| {
            error!(error = %e, request_id = %request_id, "Failed to create request");
            ServiceError::DatabaseError(e)
        })?;

        let mut lines = Vec::with_capacity(input.items.len());
        for line in &input.items {
            let inserted = request_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                request_id: Set(request_id),
                item_id: Set(line.item_id),
                quantity: Set(line.quantity),
            }
            .insert(&txn)
            .await
            .map_err(ServiceError::DatabaseError)?;
            lines.push(inserted);
        }

        txn.commit().await.map_err(|e| {
            error!(error = %e, request_id = %request_id, "Failed to commit request creation");
            ServiceError::DatabaseError(e)
        })?;

        info!(request_id = %request_id, lines = lines.len(), "Supply request submitted");

        if let Err(e) = self.event_sender.send(Event::RequestSubmitted(request_id)).await {
            warn!(error = %e, request_id = %request_id, "Failed to send request submitted event");
        }

        Ok(RequestWithItems {
            request: request_model,
            items: lines,
        })
    }

    /// Retrieves a request with its line items.
    #[instrument(skip(self), fields(request_id = %request_id))]
    pub async fn get_request(
        &self,
        request_id: Uuid,
    ) -> Result<Option<RequestWithItems>, ServiceError> {
        let db = &*self.db_pool;

        let Some(found) = RequestEntity::find_by_id(request_id)
            .one(db)
            .await
            .map_err(ServiceError::DatabaseError)?
        else {
            return Ok(None);
        };

        let items = RequestItemEntity::find()
            .filter(request_item::Column::RequestId.eq(request_id))
            .all(db)
            .await
            .map_err(ServiceError::DatabaseError)?;

        Ok(Some(RequestWithItems {
            request: found,
            items,
        }))
    }

    /// Lists requests with their line items, newest first.
    #[instrument(skip(self))]
    pub async fn list_requests(
        &self,
        filter: RequestFilter,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<RequestWithItems>, u64), ServiceError> {
        let db = &*self.db_pool;

        let mut query = RequestEntity::find().order_by_desc(request::Column::CreatedAt);
        if let Some(status) = filter.status {
            query = query.filter(request::Column::Status.eq(status));
        }
        if let Some(kind) = filter.kind {
            query = query.filter(request::Column::Kind.eq(kind));
        }

        let paginator = query.paginate(db, limit);
        let total = paginator
            .num_items()
            .await
            .map_err(ServiceError::DatabaseError)?;
        let requests = paginator
            .fetch_page(page - 1)
            .await
            .map_err(ServiceError::DatabaseError)?;

        let lines = requests
            .load_many(RequestItemEntity, db)
            .await
            .map_err(ServiceError::DatabaseError)?;

        let rows = requests
            .into_iter()
            .zip(lines)
            .map(|(request, items)| RequestWithItems { request, items })
            .collect();

        Ok((rows, total))
    }

    /// Per-item totals over approved requests, optionally restricted to one
    /// direction. Served as its own projection rather than a reshaping of the
    /// itemized listing.
    #[instrument(skip(self))]
    pub async fn summarize_approved(
        &self,
        kind: Option<RequestKind>,
    ) -> Result<Vec<RequestSummaryRow>, ServiceError> {
        let db = &*self.db_pool;

        let mut query = RequestItemEntity::find()
            .select_only()
            .column(request_item::Column::ItemId)
            .column_as(
                Expr::col((RequestItemEntity, request_item::Column::Quantity)).sum(),
                "total_requested",
            )
            .column_as(
                Expr::col((RequestItemEntity, request_item::Column::RequestId)).count(),
                "request_count",
            )
            .join(JoinType::InnerJoin, request_item::Relation::Request.def())
            .filter(request::Column::Status.eq(RequestStatus::Approved))
            .group_by(request_item::Column::ItemId);
        if let Some(kind) = kind {
            query = query.filter(request::Column::Kind.eq(kind));
        }

        let raw = query
            .into_model::<RawSummaryRow>()
            .all(db)
            .await
            .map_err(ServiceError::DatabaseError)?;

        // Resolve item names in one lookup.
        let ids: Vec<Uuid> = raw.iter().map(|r| r.item_id).collect();
        let names: std::collections::HashMap<Uuid, String> = item::Entity::find()
            .filter(item::Column::Id.is_in(ids))
            .all(db)
            .await
            .map_err(ServiceError::DatabaseError)?
            .into_iter()
            .map(|i| (i.id, i.name))
            .collect();

        Ok(raw
            .into_iter()
            .map(|r| RequestSummaryRow {
                item_id: r.item_id,
                item_name: names.get(&r.item_id).cloned().unwrap_or_default(),
                total_requested: r.total_requested,
                request_count: r.request_count,
            })
            .collect())
    }

    /// Transitions a pending request to APPROVED or REJECTED.
    ///
    /// The pending check is re-run inside the transaction so that of two
    /// racing approvers exactly one wins; the loser sees InvalidState. On
    /// approval every line item's stock is adjusted and its status
    /// recomputed in the same transaction; if any supply-out line would go
    /// negative the whole operation aborts and nothing is written.
    #[instrument(skip(self, actor), fields(request_id = %request_id, decision = ?decision, approver = %actor.user_id))]
    pub async fn decide(
        &self,
        request_id: Uuid,
        decision: Decision,
        actor: &AuthUser,
    ) -> Result<DecisionOutcome, ServiceError> {
        let approver_id = actor
            .uuid()
            .map_err(|_| ServiceError::Unauthorized("Invalid approver identity".to_string()))?;

        let db = &*self.db_pool;
        let now = Utc::now();

        let txn = db.begin().await.map_err(|e| {
            error!(error = %e, request_id = %request_id, "Failed to start decision transaction");
            ServiceError::DatabaseError(e)
        })?;

        let pending = RequestEntity::find_by_id(request_id)
            .one(&txn)
            .await
            .map_err(ServiceError::DatabaseError)?
            .ok_or_else(|| ServiceError::NotFound(format!("Request {} not found", request_id)))?;

        if pending.status != RequestStatus::Pending {
            warn!(
                request_id = %request_id,
                status = pending.status.as_str(),
                "Decision attempted on a request that is no longer pending"
            );
            return Err(ServiceError::InvalidState(format!(
                "Request {} is already {}; refresh and retry",
                request_id,
                pending.status.as_str()
            )));
        }

        let kind = pending.kind;
        let (new_status, event) = match decision {
            Decision::Reject => (
                RequestStatus::Rejected,
                Event::RequestRejected {
                    request_id,
                    approver_id,
                },
            ),
            Decision::Approve => (
                RequestStatus::Approved,
                Event::RequestApproved {
                    request_id,
                    approver_id,
                },
            ),
        };

        let mut low_stock: Vec<(Uuid, i32, i32)> = Vec::new();

        if decision == Decision::Approve {
            let lines = RequestItemEntity::find()
                .filter(request_item::Column::RequestId.eq(request_id))
                .all(&txn)
                .await
                .map_err(ServiceError::DatabaseError)?;

            // Plan all adjustments before writing any of them.
            let mut planned: Vec<(item::Model, i32)> = Vec::with_capacity(lines.len());
            let mut shortages: Vec<StockShortage> = Vec::new();
            for line in &lines {
                let stocked = item::Entity::find_by_id(line.item_id)
                    .one(&txn)
                    .await
                    .map_err(ServiceError::DatabaseError)?
                    .ok_or_else(|| {
                        ServiceError::NotFound(format!("Item {} not found", line.item_id))
                    })?;

                let new_quantity = match kind {
                    RequestKind::SupplyIn => stocked.quantity + line.quantity,
                    RequestKind::SupplyOut => stocked.quantity - line.quantity,
                };

                if new_quantity < 0 {
                    shortages.push(StockShortage {
                        item_id: stocked.id,
                        item_name: stocked.name.clone(),
                        requested: line.quantity,
                        available: stocked.quantity,
                    });
                } else {
                    planned.push((stocked, new_quantity));
                }
            }

            if !shortages.is_empty() {
                // Dropping the transaction rolls back; no partial mutation.
                info!(
                    request_id = %request_id,
                    offending = shortages.len(),
                    "Approval rejected: insufficient stock"
                );
                return Err(ServiceError::InsufficientStock(shortages));
            }

            for (stocked, new_quantity) in planned {
                let reorder_point = stocked.reorder_point;
                let item_id = stocked.id;
                let status =
                    ItemStatus::derive(new_quantity, stocked.reorder_point, stocked.is_archived);

                let mut active: item::ActiveModel = stocked.into();
                active.quantity = Set(new_quantity);
                active.status = Set(status);
                active.updated_at = Set(Some(now));
                active.update(&txn).await.map_err(|e| {
                    error!(error = %e, item_id = %item_id, "Failed to write stock adjustment");
                    ServiceError::DatabaseError(e)
                })?;

                if new_quantity <= reorder_point {
                    low_stock.push((item_id, new_quantity, reorder_point));
                }
            }
        }

        // Compare-and-swap on the status column: the transition only lands
        // if the request is still pending at write time.
        let transition = request::ActiveModel {
            status: Set(new_status),
            approver_id: Set(Some(approver_id)),
            updated_at: Set(Some(now)),
            ..Default::default()
        };
        let written = RequestEntity::update_many()
            .set(transition)
            .filter(request::Column::Id.eq(request_id))
            .filter(request::Column::Status.eq(RequestStatus::Pending))
            .exec(&txn)
            .await
            .map_err(|e| {
                error!(error = %e, request_id = %request_id, "Failed to write request decision");
                ServiceError::DatabaseError(e)
            })?;

        if written.rows_affected == 0 {
            // A concurrent approver won the race after our initial read.
            return Err(ServiceError::InvalidState(format!(
                "Request {} is no longer pending; refresh and retry",
                request_id
            )));
        }

        txn.commit().await.map_err(|e| {
            error!(error = %e, request_id = %request_id, "Failed to commit decision transaction");
            ServiceError::DatabaseError(e)
        })?;

        info!(
            request_id = %request_id,
            status = new_status.as_str(),
            approver_id = %approver_id,
            "Request decided"
        );

        if let Err(e) = self.event_sender.send(event).await {
            warn!(error = %e, request_id = %request_id, "Failed to send decision event");
        }
        for (item_id, quantity, reorder_point) in low_stock {
            if let Err(e) = self
                .event_sender
                .send(Event::LowStock {
                    item_id,
                    quantity,
                    reorder_point,
                })
                .await
            {
                warn!(error = %e, item_id = %item_id, "Failed to send low stock event");
            }
        }

        Ok(DecisionOutcome {
            id: request_id,
            status: new_status,
            approver_id,
        })
    }

    /// Confirms that physical goods changed hands after approval.
    ///
    /// For supply-out requests only the original requester may confirm; for
    /// supply-in only the recording approver. Confirming an already-received
    /// request is a no-op.
    #[instrument(skip(self, actor), fields(request_id = %request_id, actor = %actor.user_id))]
    pub async fn mark_received(
        &self,
        request_id: Uuid,
        actor: &AuthUser,
    ) -> Result<ReceiptOutcome, ServiceError> {
        let db = &*self.db_pool;

        let found = RequestEntity::find_by_id(request_id)
            .one(db)
            .await
            .map_err(ServiceError::DatabaseError)?
            .ok_or_else(|| ServiceError::NotFound(format!("Request {} not found", request_id)))?;

        if found.status != RequestStatus::Approved {
            return Err(ServiceError::InvalidState(format!(
                "Request {} is not yet approved",
                request_id
            )));
        }

        match found.kind {
            RequestKind::SupplyOut => {
                let actor_email = actor.email.as_deref().unwrap_or_default();
                if !actor_email.eq_ignore_ascii_case(&found.requester_email) {
                    return Err(ServiceError::PermissionDenied(
                        "Only the original requester may confirm receipt".to_string(),
                    ));
                }
            }
            RequestKind::SupplyIn => {
                let actor_id = actor.uuid().map_err(|_| {
                    ServiceError::Unauthorized("Invalid actor identity".to_string())
                })?;
                if found.approver_id != Some(actor_id) {
                    return Err(ServiceError::PermissionDenied(
                        "Only the recording approver may confirm receipt".to_string(),
                    ));
                }
            }
        }

        if found.is_received {
            return Ok(ReceiptOutcome {
                id: found.id,
                is_received: true,
                received_at: found.received_at,
            });
        }

        let now = Utc::now();
        let mut active: request::ActiveModel = found.into();
        active.is_received = Set(true);
        active.received_at = Set(Some(now));
        active.updated_at = Set(Some(now));
        let updated = active.update(db).await.map_err(|e| {
            error!(error = %e, request_id = %request_id, "Failed to mark request received");
            ServiceError::DatabaseError(e)
        })?;

        info!(request_id = %request_id, "Receipt confirmed");

        if let Err(e) = self.event_sender.send(Event::RequestReceived(request_id)).await {
            warn!(error = %e, request_id = %request_id, "Failed to send receipt event");
        }

        Ok(ReceiptOutcome {
            id: updated.id,
            is_received: updated.is_received,
            received_at: updated.received_at,
        })
    }
}
