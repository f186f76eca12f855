use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Enum representing the possible statuses of a supply request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
pub enum RequestStatus {
    #[sea_orm(string_value = "PENDING")]
    Pending,
    #[sea_orm(string_value = "APPROVED")]
    Approved,
    #[sea_orm(string_value = "REJECTED")]
    Rejected,
}

impl RequestStatus {
    /// A request leaves PENDING exactly once and never returns.
    pub fn is_final(&self) -> bool {
        matches!(self, RequestStatus::Approved | RequestStatus::Rejected)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "PENDING",
            RequestStatus::Approved => "APPROVED",
            RequestStatus::Rejected => "REJECTED",
        }
    }
}

/// Direction of the stock movement a request proposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
pub enum RequestKind {
    /// Stock-increasing transaction (returning/restocking goods).
    #[sea_orm(string_value = "SUPPLY_IN")]
    SupplyIn,
    /// Stock-decreasing transaction (issuing goods to a requester).
    #[sea_orm(string_value = "SUPPLY_OUT")]
    SupplyOut,
}

impl RequestKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestKind::SupplyIn => "SUPPLY_IN",
            RequestKind::SupplyOut => "SUPPLY_OUT",
        }
    }
}

/// The `requests` table: one row per proposed stock movement.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize, Validate)]
#[sea_orm(table_name = "requests")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    #[validate(length(min = 1, max = 255, message = "Requester name is required"))]
    pub requester_name: String,

    #[validate(email(message = "Invalid requester email"))]
    pub requester_email: String,

    #[validate(length(min = 1, max = 255, message = "Division is required"))]
    pub division: String,

    #[validate(length(min = 1, max = 255, message = "Section is required"))]
    pub section: String,

    pub kind: RequestKind,

    pub status: RequestStatus,

    /// Second-phase confirmation that physical goods changed hands.
    pub is_received: bool,
    pub received_at: Option<DateTime<Utc>>,

    /// Set exactly once, when the request leaves PENDING.
    pub approver_id: Option<Uuid>,

    #[validate(length(max = 2000, message = "Notes too long"))]
    pub notes: Option<String>,

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
    fn pending_is_not_final() {
        assert!(!RequestStatus::Pending.is_final());
        assert!(RequestStatus::Approved.is_final());
        assert!(RequestStatus::Rejected.is_final());
    }

    #[test]
    fn requester_email_is_validated() {
        let request = Model {
            id: Uuid::new_v4(),
            requester_name: "J. Cruz".to_string(),
            requester_email: "not-an-email".to_string(),
            division: "HRDO".to_string(),
            section: "Records".to_string(),
            kind: RequestKind::SupplyOut,
            status: RequestStatus::Pending,
            is_received: false,
            received_at: None,
            approver_id: None,
            notes: None,
            created_at: Utc::now(),
            updated_at: None,
        };
        let validation = request.validate();
        assert!(validation.is_err());
        if let Err(e) = validation {
            assert!(e.field_errors().contains_key("requester_email"));
        }
    }
}
