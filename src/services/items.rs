use crate::{
    db::DbPool,
    entities::item::{self, Entity as ItemEntity, ItemStatus, Model as ItemModel},
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

/// Input for registering a new item
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct CreateItemInput {
    #[validate(length(min = 1, max = 255, message = "Item name is required"))]
    pub name: String,
    #[validate(range(min = 0, message = "Quantity cannot be negative"))]
    pub quantity: i32,
    #[validate(length(min = 1, max = 50, message = "Unit is required"))]
    pub unit: String,
    #[validate(range(min = 0, message = "Reorder point cannot be negative"))]
    pub reorder_point: i32,
    pub image_url: Option<String>,
}

/// Input for editing an existing item; absent fields are left unchanged
#[derive(Debug, Default, Serialize, Deserialize, Validate)]
pub struct UpdateItemInput {
    #[validate(length(min = 1, max = 255, message = "Item name is required"))]
    pub name: Option<String>,
    #[validate(range(min = 0, message = "Quantity cannot be negative"))]
    pub quantity: Option<i32>,
    #[validate(length(min = 1, max = 50, message = "Unit is required"))]
    pub unit: Option<String>,
    #[validate(range(min = 0, message = "Reorder point cannot be negative"))]
    pub reorder_point: Option<i32>,
    pub image_url: Option<String>,
}

/// Filters for the item listing
#[derive(Debug, Default)]
pub struct ItemFilter {
    pub search: Option<String>,
    pub status: Option<ItemStatus>,
    pub include_archived: bool,
}

/// Service for managing stocked items
#[derive(Clone)]
pub struct ItemService {
    db_pool: Arc<DbPool>,
    event_sender: EventSender,
}

impl ItemService {
    /// Creates a new item service instance
    pub fn new(db_pool: Arc<DbPool>, event_sender: EventSender) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    /// Registers a new item; status is derived, never supplied.
    #[instrument(skip(self, input), fields(name = %input.name))]
    pub async fn create_item(&self, input: CreateItemInput) -> Result<ItemModel, ServiceError> {
        input
            .validate()
            .map_err(|e| ServiceError::ValidationError(e.to_string()))?;

        let db = &*self.db_pool;
        let now = Utc::now();
        let item_id = Uuid::new_v4();
        let status = ItemStatus::derive(input.quantity, input.reorder_point, false);

        let created = item::ActiveModel {
            id: Set(item_id),
            name: Set(input.name),
            quantity: Set(input.quantity),
            unit: Set(input.unit),
            reorder_point: Set(input.reorder_point),
            status: Set(status),
            is_archived: Set(false),
            image_url: Set(input.image_url),
            created_at: Set(now),
            updated_at: Set(Some(now)),
        }
        .insert(db)
        .await
        .map_err(|e| {
            error!(error = %e, item_id = %item_id, "Failed to create item");
            ServiceError::DatabaseError(e)
        })?;

        info!(item_id = %item_id, "Item created");
        self.publish(Event::ItemCreated(item_id)).await;
        self.warn_if_low(&created).await;

        Ok(created)
    }

    /// Retrieves an item by ID.
    #[instrument(skip(self), fields(item_id = %item_id))]
    pub async fn get_item(&self, item_id: Uuid) -> Result<Option<ItemModel>, ServiceError> {
        ItemEntity::find_by_id(item_id)
            .one(&*self.db_pool)
            .await
            .map_err(ServiceError::DatabaseError)
    }

    /// Edits an item. Status is recomputed whenever quantity, reorder point,
    /// or the archived flag changes.
    #[instrument(skip(self, input), fields(item_id = %item_id))]
    pub async fn update_item(
        &self,
        item_id: Uuid,
        input: UpdateItemInput,
    ) -> Result<ItemModel, ServiceError> {
        input
            .validate()
            .map_err(|e| ServiceError::ValidationError(e.to_string()))?;

        let db = &*self.db_pool;
        let now = Utc::now();

        let existing = ItemEntity::find_by_id(item_id)
            .one(db)
            .await
            .map_err(ServiceError::DatabaseError)?
            .ok_or_else(|| ServiceError::NotFound(format!("Item {} not found", item_id)))?;

        let quantity = input.quantity.unwrap_or(existing.quantity);
        let reorder_point = input.reorder_point.unwrap_or(existing.reorder_point);
        let status = ItemStatus::derive(quantity, reorder_point, existing.is_archived);

        let mut active: item::ActiveModel = existing.into();
        if let Some(name) = input.name {
            active.name = Set(name);
        }
        if let Some(unit) = input.unit {
            active.unit = Set(unit);
        }
        if let Some(image_url) = input.image_url {
            active.image_url = Set(Some(image_url));
        }
        active.quantity = Set(quantity);
        active.reorder_point = Set(reorder_point);
        active.status = Set(status);
        active.updated_at = Set(Some(now));

        let updated = active.update(db).await.map_err(|e| {
            error!(error = %e, item_id = %item_id, "Failed to update item");
            ServiceError::DatabaseError(e)
        })?;

        info!(item_id = %item_id, status = updated.status.as_str(), "Item updated");
        self.publish(Event::ItemUpdated(item_id)).await;
        self.warn_if_low(&updated).await;

        Ok(updated)
    }

    /// Archives an item. Items referenced by requests are never deleted;
    /// archiving recomputes status to PHASED_OUT or DISCONTINUED.
    #[instrument(skip(self), fields(item_id = %item_id))]
    pub async fn archive_item(&self, item_id: Uuid) -> Result<ItemModel, ServiceError> {
        let db = &*self.db_pool;
        let now = Utc::now();

        let existing = ItemEntity::find_by_id(item_id)
            .one(db)
            .await
            .map_err(ServiceError::DatabaseError)?
            .ok_or_else(|| ServiceError::NotFound(format!("Item {} not found", item_id)))?;

        if existing.is_archived {
            return Err(ServiceError::InvalidState(format!(
                "Item {} is already archived",
                item_id
            )));
        }

        let status = ItemStatus::derive(existing.quantity, existing.reorder_point, true);

        let mut active: item::ActiveModel = existing.into();
        active.is_archived = Set(true);
        active.status = Set(status);
        active.updated_at = Set(Some(now));

        let archived = active.update(db).await.map_err(|e| {
            error!(error = %e, item_id = %item_id, "Failed to archive item");
            ServiceError::DatabaseError(e)
        })?;

        info!(item_id = %item_id, status = archived.status.as_str(), "Item archived");
        self.publish(Event::ItemArchived(item_id)).await;

        Ok(archived)
    }

    /// Lists items with search, status filter, and pagination, newest first.
    #[instrument(skip(self))]
    pub async fn list_items(
        &self,
        filter: ItemFilter,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<ItemModel>, u64), ServiceError> {
        let db = &*self.db_pool;

        let mut query = ItemEntity::find().order_by_desc(item::Column::CreatedAt);
        if !filter.include_archived {
            query = query.filter(item::Column::IsArchived.eq(false));
        }
        if let Some(search) = filter.search.as_deref() {
            if !search.is_empty() {
                query = query.filter(item::Column::Name.contains(search));
            }
        }
        if let Some(status) = filter.status {
            query = query.filter(item::Column::Status.eq(status));
        }

        let paginator = query.paginate(db, limit);
        let total = paginator
            .num_items()
            .await
            .map_err(ServiceError::DatabaseError)?;
        let items = paginator
            .fetch_page(page - 1)
            .await
            .map_err(ServiceError::DatabaseError)?;

        Ok((items, total))
    }

    /// All items matching a filter, unpaginated; used by the CSV export.
    #[instrument(skip(self))]
    pub async fn all_items(&self, filter: ItemFilter) -> Result<Vec<ItemModel>, ServiceError> {
        let db = &*self.db_pool;

        let mut query = ItemEntity::find().order_by_asc(item::Column::Name);
        if !filter.include_archived {
            query = query.filter(item::Column::IsArchived.eq(false));
        }
        if let Some(search) = filter.search.as_deref() {
            if !search.is_empty() {
                query = query.filter(item::Column::Name.contains(search));
            }
        }
        if let Some(status) = filter.status {
            query = query.filter(item::Column::Status.eq(status));
        }

        query.all(db).await.map_err(ServiceError::DatabaseError)
    }

    async fn publish(&self, event: Event) {
        if let Err(e) = self.event_sender.send(event).await {
            warn!(error = %e, "Failed to send item event");
        }
    }

    async fn warn_if_low(&self, item: &ItemModel) {
        if !item.is_archived && item.quantity <= item.reorder_point {
            self.publish(Event::LowStock {
                item_id: item.id,
                quantity: item.quantity,
                reorder_point: item.reorder_point,
            })
            .await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn negative_quantity_is_rejected() {
        let (sender, _rx) = crate::events::channel(1);
        let service = ItemService::new(
            Arc::new(sea_orm::DatabaseConnection::Disconnected),
            sender,
        );
        let err = service
            .create_item(CreateItemInput {
                name: "Bond paper".into(),
                quantity: -1,
                unit: "ream".into(),
                reorder_point: 5,
                image_url: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::ValidationError(_)));
    }
}
