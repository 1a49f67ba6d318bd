use uuid::Uuid;

use crate::catalog::RoleKey;

/// The authenticated identity a permission check is evaluated against.
///
/// Produced by the bearer-token extractor; the engine never sees raw
/// credentials. `company_id` is `None` only for the platform super-role
/// acting outside any tenant scope — for every other role a missing company
/// scope resolves to deny.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub user_id: Uuid,
    pub role: RoleKey,
    pub company_id: Option<Uuid>,
}

impl Actor {
    pub fn new(user_id: Uuid, role: RoleKey, company_id: Option<Uuid>) -> Self {
        Self { user_id, role, company_id }
    }

    pub fn is_super_admin(&self) -> bool {
        self.role.is_super_admin()
    }
}
