use crate::{
    auth::{self, user, Role},
    db::DbPool,
    errors::ServiceError,
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument};
use uuid::Uuid;
use validator::Validate;

/// Input for registering a user account
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct CreateUserInput {
    #[validate(length(min = 1, max = 255, message = "Name is required"))]
    pub name: String,
    #[validate(email(message = "Invalid email"))]
    pub email: String,
    #[validate(length(min = 12, message = "Password must be at least 12 characters"))]
    pub password: String,
    pub role: Role,
}

/// Service for administering user accounts
#[derive(Clone)]
pub struct UserService {
    db_pool: Arc<DbPool>,
}

impl UserService {
    /// Creates a new user service instance
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    /// Registers a user account with a hashed password.
    #[instrument(skip(self, input), fields(email = %input.email, role = ?input.role))]
    pub async fn create_user(&self, input: CreateUserInput) -> Result<user::Model, ServiceError> {
        input
            .validate()
            .map_err(|e| ServiceError::ValidationError(e.to_string()))?;

        let db = &*self.db_pool;

        let duplicate = user::Entity::find()
            .filter(user::Column::Email.eq(input.email.clone()))
            .one(db)
            .await
            .map_err(ServiceError::DatabaseError)?;
        if duplicate.is_some() {
            return Err(ServiceError::Conflict(format!(
                "A user with email '{}' already exists",
                input.email
            )));
        }

        let password_hash = auth::hash_password(&input.password)
            .map_err(|e| ServiceError::InternalError(e.to_string()))?;

        let now = Utc::now();
        let user_id = Uuid::new_v4();

        let created = user::ActiveModel {
            id: Set(user_id),
            name: Set(input.name),
            email: Set(input.email),
            password_hash: Set(password_hash),
            role: Set(input.role),
            active: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(db)
        .await
        .map_err(|e| {
            error!(error = %e, user_id = %user_id, "Failed to create user");
            ServiceError::DatabaseError(e)
        })?;

        info!(user_id = %user_id, "User account created");
        Ok(created)
    }

    /// Lists user accounts, newest first.
    #[instrument(skip(self))]
    pub async fn list_users(
        &self,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<user::Model>, u64), ServiceError> {
        let db = &*self.db_pool;

        let paginator = user::Entity::find()
            .order_by_desc(user::Column::CreatedAt)
            .paginate(db, limit);
        let total = paginator
            .num_items()
            .await
            .map_err(ServiceError::DatabaseError)?;
        let users = paginator
            .fetch_page(page - 1)
            .await
            .map_err(ServiceError::DatabaseError)?;

        Ok((users, total))
    }

    /// Changes a user's role.
    #[instrument(skip(self), fields(user_id = %user_id, role = ?role))]
    pub async fn change_role(&self, user_id: Uuid, role: Role) -> Result<user::Model, ServiceError> {
        let db = &*self.db_pool;
        let existing = user::Entity::find_by_id(user_id)
            .one(db)
            .await
            .map_err(ServiceError::DatabaseError)?
            .ok_or_else(|| ServiceError::NotFound(format!("User {} not found", user_id)))?;

        let mut active: user::ActiveModel = existing.into();
        active.role = Set(role);
        active.updated_at = Set(Utc::now());

        let updated = active.update(db).await.map_err(|e| {
            error!(error = %e, user_id = %user_id, "Failed to change user role");
            ServiceError::DatabaseError(e)
        })?;

        info!(user_id = %user_id, "User role changed");
        Ok(updated)
    }

    /// Deactivates a user account. Deactivated accounts cannot log in or
    /// refresh tokens; accounts are never deleted.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn deactivate_user(&self, user_id: Uuid) -> Result<user::Model, ServiceError> {
        let db = &*self.db_pool;
        let existing = user::Entity::find_by_id(user_id)
            .one(db)
            .await
            .map_err(ServiceError::DatabaseError)?
            .ok_or_else(|| ServiceError::NotFound(format!("User {} not found", user_id)))?;

        if !existing.active {
            return Err(ServiceError::InvalidState(format!(
                "User {} is already deactivated",
                user_id
            )));
        }

        let mut active: user::ActiveModel = existing.into();
        active.active = Set(false);
        active.updated_at = Set(Utc::now());

        let updated = active.update(db).await.map_err(|e| {
            error!(error = %e, user_id = %user_id, "Failed to deactivate user");
            ServiceError::DatabaseError(e)
        })?;

        info!(user_id = %user_id, "User deactivated");
        Ok(updated)
    }
}
