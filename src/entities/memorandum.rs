use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// The `memorandums` table: official references and circulars tracked by the
/// office, optionally carrying an uploaded document.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize, Validate)]
#[sea_orm(table_name = "memorandums")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    #[validate(length(min = 1, max = 255, message = "Title is required"))]
    pub title: String,

    /// Office reference number; unique across memorandums.
    #[sea_orm(unique)]
    #[validate(length(min = 1, max = 100, message = "Reference number is required"))]
    pub reference_no: String,

    #[validate(length(max = 5000, message = "Body too long"))]
    pub body: Option<String>,

    pub attachment_url: Option<String>,

    pub issued_on: NaiveDate,

    pub created_by: Uuid,

    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
