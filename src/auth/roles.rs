use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Permission name constants, grouped per resource
pub mod consts {
    // Items
    pub const ITEMS_READ: &str = "items:read";
    pub const ITEMS_MANAGE: &str = "items:manage";

    // Supply requests
    pub const REQUESTS_READ: &str = "requests:read";
    pub const REQUESTS_CREATE: &str = "requests:create";
    pub const REQUESTS_APPROVE: &str = "requests:approve";
    pub const REQUESTS_RECEIVE: &str = "requests:receive";

    // Memorandums
    pub const MEMOS_READ: &str = "memorandums:read";
    pub const MEMOS_MANAGE: &str = "memorandums:manage";

    // Reports / CSV export
    pub const REPORTS_EXPORT: &str = "reports:export";

    // Uploads
    pub const UPLOADS_CREATE: &str = "uploads:create";

    // User administration
    pub const USERS_MANAGE: &str = "users:manage";
}

/// Role assigned to a user account. A user holds exactly one role; roles map
/// to static permission sets, and admins pass every permission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
pub enum Role {
    #[sea_orm(string_value = "USER")]
    User,
    #[sea_orm(string_value = "APPROVER")]
    Approver,
    #[sea_orm(string_value = "ADMIN")]
    Admin,
}

impl Role {
    /// Role name as carried in token claims.
    pub fn as_claim(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Approver => "approver",
            Role::Admin => "admin",
        }
    }

    pub fn from_claim(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "user" => Some(Role::User),
            "approver" => Some(Role::Approver),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }

    /// Static permission set implied by this role.
    pub fn permissions(&self) -> Vec<String> {
        use consts::*;
        let perms: &[&str] = match self {
            Role::User => &[
                ITEMS_READ,
                REQUESTS_READ,
                REQUESTS_CREATE,
                REQUESTS_RECEIVE,
                MEMOS_READ,
                UPLOADS_CREATE,
            ],
            Role::Approver => &[
                ITEMS_READ,
                REQUESTS_READ,
                REQUESTS_CREATE,
                REQUESTS_APPROVE,
                REQUESTS_RECEIVE,
                MEMOS_READ,
                REPORTS_EXPORT,
                UPLOADS_CREATE,
            ],
            // Admins bypass permission checks in the middleware; the
            // explicit set exists so tokens are self-describing.
            Role::Admin => &[
                ITEMS_READ,
                ITEMS_MANAGE,
                REQUESTS_READ,
                REQUESTS_CREATE,
                REQUESTS_APPROVE,
                REQUESTS_RECEIVE,
                MEMOS_READ,
                MEMOS_MANAGE,
                REPORTS_EXPORT,
                UPLOADS_CREATE,
                USERS_MANAGE,
            ],
        };
        perms.iter().map(|p| ToString::to_string(p)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn approver_can_decide_but_not_manage_items() {
        let perms = Role::Approver.permissions();
        assert!(perms.iter().any(|p| p == consts::REQUESTS_APPROVE));
        assert!(!perms.iter().any(|p| p == consts::ITEMS_MANAGE));
    }

    #[test]
    fn claim_roundtrip() {
        for role in [Role::User, Role::Approver, Role::Admin] {
            assert_eq!(Role::from_claim(role.as_claim()), Some(role));
        }
        assert_eq!(Role::from_claim("AUDITOR"), None);
    }
}
