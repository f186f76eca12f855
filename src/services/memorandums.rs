use crate::{
    db::DbPool,
    entities::memorandum::{self, Entity as MemorandumEntity, Model as MemorandumModel},
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::{NaiveDate, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, ModelTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

/// Input for filing a new memorandum
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct CreateMemorandumInput {
    #[validate(length(min = 1, max = 255, message = "Title is required"))]
    pub title: String,
    #[validate(length(min = 1, max = 100, message = "Reference number is required"))]
    pub reference_no: String,
    #[validate(length(max = 5000, message = "Body too long"))]
    pub body: Option<String>,
    pub attachment_url: Option<String>,
    pub issued_on: NaiveDate,
}

/// Input for editing a memorandum; absent fields are left unchanged
#[derive(Debug, Default, Serialize, Deserialize, Validate)]
pub struct UpdateMemorandumInput {
    #[validate(length(min = 1, max = 255, message = "Title is required"))]
    pub title: Option<String>,
    #[validate(length(max = 5000, message = "Body too long"))]
    pub body: Option<String>,
    pub attachment_url: Option<String>,
    pub issued_on: Option<NaiveDate>,
}

/// Service for managing memorandums and official references
#[derive(Clone)]
pub struct MemorandumService {
    db_pool: Arc<DbPool>,
    event_sender: EventSender,
}

impl MemorandumService {
    /// Creates a new memorandum service instance
    pub fn new(db_pool: Arc<DbPool>, event_sender: EventSender) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    /// Files a new memorandum; reference numbers are unique.
    #[instrument(skip(self, input), fields(reference_no = %input.reference_no))]
    pub async fn create_memorandum(
        &self,
        input: CreateMemorandumInput,
        created_by: Uuid,
    ) -> Result<MemorandumModel, ServiceError> {
        input
            .validate()
            .map_err(|e| ServiceError::ValidationError(e.to_string()))?;

        let db = &*self.db_pool;

        let duplicate = MemorandumEntity::find()
            .filter(memorandum::Column::ReferenceNo.eq(input.reference_no.clone()))
            .one(db)
            .await
            .map_err(ServiceError::DatabaseError)?;
        if duplicate.is_some() {
            return Err(ServiceError::Conflict(format!(
                "Reference number '{}' already exists",
                input.reference_no
            )));
        }

        let now = Utc::now();
        let memo_id = Uuid::new_v4();

        let created = memorandum::ActiveModel {
            id: Set(memo_id),
            title: Set(input.title),
            reference_no: Set(input.reference_no),
            body: Set(input.body),
            attachment_url: Set(input.attachment_url),
            issued_on: Set(input.issued_on),
            created_by: Set(created_by),
            created_at: Set(now),
            updated_at: Set(Some(now)),
        }
        .insert(db)
        .await
        .map_err(|e| {
            error!(error = %e, memo_id = %memo_id, "Failed to create memorandum");
            ServiceError::DatabaseError(e)
        })?;

        info!(memo_id = %memo_id, "Memorandum filed");
        if let Err(e) = self.event_sender.send(Event::MemorandumCreated(memo_id)).await {
            warn!(error = %e, memo_id = %memo_id, "Failed to send memorandum event");
        }

        Ok(created)
    }

    /// Retrieves a memorandum by ID.
    #[instrument(skip(self), fields(memo_id = %memo_id))]
    pub async fn get_memorandum(
        &self,
        memo_id: Uuid,
    ) -> Result<Option<MemorandumModel>, ServiceError> {
        MemorandumEntity::find_by_id(memo_id)
            .one(&*self.db_pool)
            .await
            .map_err(ServiceError::DatabaseError)
    }

    /// Edits a memorandum's mutable fields.
    #[instrument(skip(self, input), fields(memo_id = %memo_id))]
    pub async fn update_memorandum(
        &self,
        memo_id: Uuid,
        input: UpdateMemorandumInput,
    ) -> Result<MemorandumModel, ServiceError> {
        input
            .validate()
            .map_err(|e| ServiceError::ValidationError(e.to_string()))?;

        let db = &*self.db_pool;
        let existing = MemorandumEntity::find_by_id(memo_id)
            .one(db)
            .await
            .map_err(ServiceError::DatabaseError)?
            .ok_or_else(|| ServiceError::NotFound(format!("Memorandum {} not found", memo_id)))?;

        let mut active: memorandum::ActiveModel = existing.into();
        if let Some(title) = input.title {
            active.title = Set(title);
        }
        if let Some(body) = input.body {
            active.body = Set(Some(body));
        }
        if let Some(attachment_url) = input.attachment_url {
            active.attachment_url = Set(Some(attachment_url));
        }
        if let Some(issued_on) = input.issued_on {
            active.issued_on = Set(issued_on);
        }
        active.updated_at = Set(Some(Utc::now()));

        let updated = active.update(db).await.map_err(|e| {
            error!(error = %e, memo_id = %memo_id, "Failed to update memorandum");
            ServiceError::DatabaseError(e)
        })?;

        info!(memo_id = %memo_id, "Memorandum updated");
        Ok(updated)
    }

    /// Deletes a memorandum. Memorandums are documents, not stock; unlike
    /// items they may be removed outright.
    #[instrument(skip(self), fields(memo_id = %memo_id))]
    pub async fn delete_memorandum(&self, memo_id: Uuid) -> Result<(), ServiceError> {
        let db = &*self.db_pool;
        let existing = MemorandumEntity::find_by_id(memo_id)
            .one(db)
            .await
            .map_err(ServiceError::DatabaseError)?
            .ok_or_else(|| ServiceError::NotFound(format!("Memorandum {} not found", memo_id)))?;

        existing
            .delete(db)
            .await
            .map_err(ServiceError::DatabaseError)?;

        info!(memo_id = %memo_id, "Memorandum deleted");
        if let Err(e) = self.event_sender.send(Event::MemorandumDeleted(memo_id)).await {
            warn!(error = %e, memo_id = %memo_id, "Failed to send memorandum event");
        }

        Ok(())
    }

    /// Lists memorandums, newest issue first, searching title and reference.
    #[instrument(skip(self))]
    pub async fn list_memorandums(
        &self,
        search: Option<&str>,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<MemorandumModel>, u64), ServiceError> {
        let db = &*self.db_pool;

        let mut query = MemorandumEntity::find().order_by_desc(memorandum::Column::IssuedOn);
        if let Some(search) = search {
            if !search.is_empty() {
                query = query.filter(
                    Condition::any()
                        .add(memorandum::Column::Title.contains(search))
                        .add(memorandum::Column::ReferenceNo.contains(search)),
                );
            }
        }

        let paginator = query.paginate(db, limit);
        let total = paginator
            .num_items()
            .await
            .map_err(ServiceError::DatabaseError)?;
        let memorandums = paginator
            .fetch_page(page - 1)
            .await
            .map_err(ServiceError::DatabaseError)?;

        Ok((memorandums, total))
    }
}
