use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Closed role catalog. `super_admin` is the platform-scoped role; the rest
/// are tenant roles evaluated against company-scoped rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum RoleKey {
    Requester,
    Manager,
    Marketing,
    TenantAdmin,
    SuperAdmin,
}

/// Metadata for one catalog role.
///
/// `assignable_by` lists the roles allowed to grant this role to a user;
/// `is_default` marks the single role granted to new tenant members.
#[derive(Debug, Clone, Serialize)]
pub struct RoleDefinition {
    pub key: RoleKey,
    pub label: &'static str,
    pub assignable_by: &'static [RoleKey],
    pub is_default: bool,
}

const DEFINITIONS: &[RoleDefinition] = &[
    RoleDefinition {
        key: RoleKey::Requester,
        label: "Requester",
        assignable_by: &[RoleKey::Manager, RoleKey::TenantAdmin, RoleKey::SuperAdmin],
        is_default: true,
    },
    RoleDefinition {
        key: RoleKey::Manager,
        label: "Manager",
        assignable_by: &[RoleKey::TenantAdmin, RoleKey::SuperAdmin],
        is_default: false,
    },
    RoleDefinition {
        key: RoleKey::Marketing,
        label: "Marketing",
        assignable_by: &[RoleKey::TenantAdmin, RoleKey::SuperAdmin],
        is_default: false,
    },
    RoleDefinition {
        key: RoleKey::TenantAdmin,
        label: "Company administrator",
        assignable_by: &[RoleKey::SuperAdmin],
        is_default: false,
    },
    RoleDefinition {
        key: RoleKey::SuperAdmin,
        label: "Platform administrator",
        assignable_by: &[RoleKey::SuperAdmin],
        is_default: false,
    },
];

impl RoleKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoleKey::Requester => "requester",
            RoleKey::Manager => "manager",
            RoleKey::Marketing => "marketing",
            RoleKey::TenantAdmin => "tenant_admin",
            RoleKey::SuperAdmin => "super_admin",
        }
    }

    /// Unknown keys yield `None`; callers treat that as "cannot manage".
    pub fn parse(value: &str) -> Option<RoleKey> {
        match value {
            "requester" => Some(RoleKey::Requester),
            "manager" => Some(RoleKey::Manager),
            "marketing" => Some(RoleKey::Marketing),
            "tenant_admin" => Some(RoleKey::TenantAdmin),
            "super_admin" => Some(RoleKey::SuperAdmin),
            _ => None,
        }
    }

    pub fn definition(&self) -> &'static RoleDefinition {
        DEFINITIONS
            .iter()
            .find(|def| def.key == *self)
            .unwrap_or_else(|| unreachable!("every RoleKey has a definition"))
    }

    pub fn is_super_admin(&self) -> bool {
        *self == RoleKey::SuperAdmin
    }
}

/// The role granted to new tenant members.
pub fn default_role() -> &'static RoleDefinition {
    DEFINITIONS
        .iter()
        .find(|def| def.is_default)
        .unwrap_or_else(|| unreachable!("catalog declares a default role"))
}

pub fn all_roles() -> &'static [RoleDefinition] {
    DEFINITIONS
}

/// Roles the acting role may grant, in catalog order.
pub fn assignable_roles(acting: RoleKey) -> Vec<&'static RoleDefinition> {
    DEFINITIONS
        .iter()
        .filter(|def| def.assignable_by.contains(&acting))
        .collect()
}

/// `true` when the acting role appears in the target's `assignable_by` set.
/// Unknown target keys are unmanageable rather than an error.
pub fn can_manage_role(acting: RoleKey, target: &str) -> bool {
    match RoleKey::parse(target) {
        Some(role) => role.definition().assignable_by.contains(&acting),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requester_is_the_default_role() {
        assert_eq!(default_role().key, RoleKey::Requester);
        assert_eq!(
            DEFINITIONS.iter().filter(|d| d.is_default).count(),
            1,
            "exactly one default role"
        );
    }

    #[test]
    fn parse_round_trips_every_role() {
        for def in all_roles() {
            assert_eq!(RoleKey::parse(def.key.as_str()), Some(def.key));
        }
        assert_eq!(RoleKey::parse("intern"), None);
    }

    #[test]
    fn tenant_admin_assigns_tenant_roles_but_not_itself() {
        let keys: Vec<RoleKey> = assignable_roles(RoleKey::TenantAdmin)
            .iter()
            .map(|d| d.key)
            .collect();
        assert!(keys.contains(&RoleKey::Requester));
        assert!(keys.contains(&RoleKey::Manager));
        assert!(keys.contains(&RoleKey::Marketing));
        assert!(!keys.contains(&RoleKey::TenantAdmin));
        assert!(!keys.contains(&RoleKey::SuperAdmin));
    }

    #[test]
    fn unknown_role_cannot_be_managed() {
        assert!(!can_manage_role(RoleKey::SuperAdmin, "intern"));
        assert!(can_manage_role(RoleKey::SuperAdmin, "tenant_admin"));
        assert!(!can_manage_role(RoleKey::Requester, "manager"));
    }
}
