use serde::Serialize;

/// One navigation item. Visibility rules reference items by `key`; items
/// without a rule row are visible to every role.
#[derive(Debug, Clone, Serialize)]
pub struct MenuItem {
    pub key: &'static str,
    pub label: &'static str,
    pub icon: &'static str,
    pub heading_group: Option<&'static str>,
    pub default_order: i64,
}

pub const DASHBOARD: &str = "dashboard";
pub const TICKETS: &str = "tickets";
pub const HARDWARE_REQUESTS: &str = "hardware_requests";
pub const MARKETING_REQUESTS: &str = "marketing_requests";
pub const NEWSLETTERS: &str = "newsletters";
pub const DIRECTORY: &str = "directory";
pub const REPORTS: &str = "reports";
pub const ADMIN: &str = "admin";

pub const ITEMS: &[MenuItem] = &[
    MenuItem { key: DASHBOARD, label: "Dashboard", icon: "home", heading_group: None, default_order: 0 },
    MenuItem { key: TICKETS, label: "Tickets", icon: "inbox", heading_group: Some("Work"), default_order: 10 },
    MenuItem { key: HARDWARE_REQUESTS, label: "Hardware requests", icon: "cpu", heading_group: Some("Work"), default_order: 20 },
    MenuItem { key: MARKETING_REQUESTS, label: "Marketing requests", icon: "megaphone", heading_group: Some("Work"), default_order: 30 },
    MenuItem { key: NEWSLETTERS, label: "Newsletters", icon: "mail", heading_group: Some("Work"), default_order: 40 },
    MenuItem { key: DIRECTORY, label: "Directory", icon: "users", heading_group: Some("Company"), default_order: 50 },
    MenuItem { key: REPORTS, label: "Reports", icon: "bar-chart", heading_group: Some("Company"), default_order: 60 },
    MenuItem { key: ADMIN, label: "Administration", icon: "settings", heading_group: Some("Company"), default_order: 70 },
];

pub fn item(key: &str) -> Option<&'static MenuItem> {
    ITEMS.iter().find(|i| i.key == key)
}
