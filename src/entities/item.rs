use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Enum representing the derived stock status of an item.
///
/// Status is a pure function of (quantity, reorder point, archived); it is
/// recomputed and rewritten on every mutation of those inputs, never edited
/// on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
pub enum ItemStatus {
    #[sea_orm(string_value = "AVAILABLE")]
    Available,
    #[sea_orm(string_value = "OUT_OF_STOCK")]
    OutOfStock,
    #[sea_orm(string_value = "FOR_REORDER")]
    ForReorder,
    #[sea_orm(string_value = "PHASED_OUT")]
    PhasedOut,
    #[sea_orm(string_value = "DISCONTINUED")]
    Discontinued,
}

impl ItemStatus {
    /// Derive the status from its inputs.
    pub fn derive(quantity: i32, reorder_point: i32, archived: bool) -> Self {
        match (archived, quantity) {
            (true, 0) => ItemStatus::Discontinued,
            (true, _) => ItemStatus::PhasedOut,
            (false, 0) => ItemStatus::OutOfStock,
            (false, q) if q <= reorder_point => ItemStatus::ForReorder,
            _ => ItemStatus::Available,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ItemStatus::Available => "AVAILABLE",
            ItemStatus::OutOfStock => "OUT_OF_STOCK",
            ItemStatus::ForReorder => "FOR_REORDER",
            ItemStatus::PhasedOut => "PHASED_OUT",
            ItemStatus::Discontinued => "DISCONTINUED",
        }
    }
}

/// The `items` table: one row per stocked good.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize, Validate)]
#[sea_orm(table_name = "items")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    #[validate(length(min = 1, max = 255, message = "Item name must be between 1 and 255 characters"))]
    pub name: String,

    /// Current stock on hand; never negative.
    pub quantity: i32,

    #[validate(length(min = 1, max = 50, message = "Unit must be between 1 and 50 characters"))]
    pub unit: String,

    /// Threshold at or below which the item is flagged for reorder.
    pub reorder_point: i32,

    pub status: ItemStatus,

    /// Items referenced by requests are archived, never deleted.
    pub is_archived: bool,

    pub image_url: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::request_item::Entity")]
    RequestItems,
}

impl Related<super::request_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::RequestItems.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_derivation_table() {
        assert_eq!(ItemStatus::derive(0, 5, false), ItemStatus::OutOfStock);
        assert_eq!(ItemStatus::derive(3, 5, false), ItemStatus::ForReorder);
        assert_eq!(ItemStatus::derive(5, 5, false), ItemStatus::ForReorder);
        assert_eq!(ItemStatus::derive(10, 5, false), ItemStatus::Available);
        assert_eq!(ItemStatus::derive(0, 5, true), ItemStatus::Discontinued);
        assert_eq!(ItemStatus::derive(2, 5, true), ItemStatus::PhasedOut);
    }

    #[test]
    fn zero_reorder_point_still_flags_empty_stock() {
        assert_eq!(ItemStatus::derive(0, 0, false), ItemStatus::OutOfStock);
        assert_eq!(ItemStatus::derive(1, 0, false), ItemStatus::Available);
    }

    #[test]
    fn item_name_validation() {
        let item = Model {
            id: Uuid::new_v4(),
            name: "".to_string(),
            quantity: 1,
            unit: "box".to_string(),
            reorder_point: 0,
            status: ItemStatus::Available,
            is_archived: false,
            image_url: None,
            created_at: Utc::now(),
            updated_at: None,
        };
        assert!(item.validate().is_err());
    }
}
