use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Grouping used by editing UIs when rendering the permission matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Pages,
    Creation,
    Approvals,
    Management,
    Integrations,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Pages => "pages",
            Category::Creation => "creation",
            Category::Approvals => "approvals",
            Category::Management => "management",
            Category::Integrations => "integrations",
        }
    }
}

/// The fixed permission enumeration. Keys follow a `resource.action`
/// convention and are the only keys the resolution engine evaluates; the
/// sync operation mirrors this set into the `dyn_permissions` table so the
/// two surfaces can never drift apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PermissionKey {
    ViewDashboard,
    ViewTickets,
    ViewHardwareRequests,
    ViewMarketingRequests,
    ViewNewsletters,
    ViewDirectory,
    ViewReports,
    CreateTicket,
    CreateHardwareRequest,
    CreateMarketingRequest,
    SubmitNewsletter,
    ApproveHardwareRequests,
    ApproveMarketingRequests,
    ApproveNewsletters,
    ManageUsers,
    ManageRoles,
    ManagePermissions,
    ManageFeatures,
    ManageMenu,
    ManageDirectorySync,
    ExportReports,
}

pub struct PermissionDefinition {
    pub key: PermissionKey,
    pub name: &'static str,
    pub label: &'static str,
    pub category: Category,
}

macro_rules! permission_table {
    ($(($variant:ident, $name:literal, $label:literal, $category:ident)),+ $(,)?) => {
        pub const ALL: &[PermissionDefinition] = &[
            $(PermissionDefinition {
                key: PermissionKey::$variant,
                name: $name,
                label: $label,
                category: Category::$category,
            }),+
        ];

        impl PermissionKey {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(PermissionKey::$variant => $name),+
                }
            }

            /// Unknown keys yield `None`; the engine resolves them to deny.
            pub fn parse(value: &str) -> Option<PermissionKey> {
                match value {
                    $($name => Some(PermissionKey::$variant)),+,
                    _ => None,
                }
            }
        }
    };
}

permission_table![
    (ViewDashboard, "pages.view_dashboard", "View dashboard", Pages),
    (ViewTickets, "pages.view_tickets", "View tickets", Pages),
    (ViewHardwareRequests, "pages.view_hardware_requests", "View hardware requests", Pages),
    (ViewMarketingRequests, "pages.view_marketing_requests", "View marketing requests", Pages),
    (ViewNewsletters, "pages.view_newsletters", "View newsletters", Pages),
    (ViewDirectory, "pages.view_directory", "View employee directory", Pages),
    (ViewReports, "pages.view_reports", "View reports", Pages),
    (CreateTicket, "tickets.create", "Create tickets", Creation),
    (CreateHardwareRequest, "hardware_requests.create", "Create hardware requests", Creation),
    (CreateMarketingRequest, "marketing_requests.create", "Create marketing requests", Creation),
    (SubmitNewsletter, "newsletters.submit", "Submit newsletter entries", Creation),
    (ApproveHardwareRequests, "hardware_requests.approve", "Approve hardware requests", Approvals),
    (ApproveMarketingRequests, "marketing_requests.approve", "Approve marketing requests", Approvals),
    (ApproveNewsletters, "newsletters.approve", "Approve newsletters", Approvals),
    (ManageUsers, "users.manage", "Manage users", Management),
    (ManageRoles, "roles.manage", "Manage roles", Management),
    (ManagePermissions, "permissions.manage", "Manage permission rules", Management),
    (ManageFeatures, "features.manage", "Manage feature flags", Management),
    (ManageMenu, "menu.manage", "Manage navigation", Management),
    (ManageDirectorySync, "directory.manage_sync", "Manage directory sync", Integrations),
    (ExportReports, "reports.export", "Export reports", Integrations),
];

/// Synthetic key reported for the super-role by `granted_permissions`. It is
/// deliberately outside the catalog so no rule row can ever grant it.
pub const MANAGE_EVERYTHING: &str = "manage.everything";

impl PermissionKey {
    pub fn definition(&self) -> &'static PermissionDefinition {
        ALL.iter()
            .find(|def| def.key == *self)
            .unwrap_or_else(|| unreachable!("every PermissionKey has a definition"))
    }

    /// The `resource` half of the `resource.action` key.
    pub fn resource(&self) -> &'static str {
        self.as_str().split_once('.').map(|(r, _)| r).unwrap_or("")
    }

    /// The `action` half of the `resource.action` key.
    pub fn action(&self) -> &'static str {
        self.as_str().split_once('.').map(|(_, a)| a).unwrap_or("")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_key_round_trips() {
        for def in ALL {
            assert_eq!(PermissionKey::parse(def.key.as_str()), Some(def.key));
            assert_eq!(def.name, def.key.as_str());
        }
        assert_eq!(PermissionKey::parse("tickets.reticulate"), None);
    }

    #[test]
    fn sentinel_is_outside_the_catalog() {
        assert_eq!(PermissionKey::parse(MANAGE_EVERYTHING), None);
    }

    #[test]
    fn every_category_has_at_least_one_key() {
        for category in [
            Category::Pages,
            Category::Creation,
            Category::Approvals,
            Category::Management,
            Category::Integrations,
        ] {
            assert!(ALL.iter().any(|d| d.category == category));
        }
    }

    #[test]
    fn keys_split_into_resource_and_action() {
        assert_eq!(PermissionKey::ApproveHardwareRequests.resource(), "hardware_requests");
        assert_eq!(PermissionKey::ApproveHardwareRequests.action(), "approve");
    }

    #[test]
    fn definitions_carry_labels_and_categories() {
        let def = PermissionKey::SubmitNewsletter.definition();
        assert_eq!(def.label, "Submit newsletter entries");
        assert_eq!(def.category, Category::Creation);
        assert_eq!(Category::Creation.as_str(), "creation");
    }
}
