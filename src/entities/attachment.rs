use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The `attachments` table: metadata for every object written to the storage
/// backend through the upload endpoint.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "attachments")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Key of the object within the bucket.
    #[sea_orm(unique)]
    pub object_key: String,

    /// Public URL serving the object.
    pub url: String,

    pub content_type: String,

    pub size_bytes: i64,

    pub uploaded_by: Uuid,

    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
