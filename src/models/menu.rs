use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::events::{Loggable, Severity};

/// Persisted visibility rule for one (role, item) pair. Items without a row
/// are visible: navigation is opt-out, permissions are opt-in.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct MenuRule {
    pub role: String,
    pub item_key: String,
    pub is_visible: bool,
    pub sort_order: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_icon: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub heading_group: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Loggable for MenuRule {
    fn entity_type() -> &'static str { "menu_rule" }
    fn subject_id(&self) -> Uuid { Uuid::nil() }
    fn severity(&self) -> Severity { Severity::Important }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct MenuRuleUpsertRequest {
    #[schema(example = "requester")]
    pub role: String,
    #[schema(example = "reports")]
    pub item_key: String,
    pub is_visible: bool,
    #[serde(default)]
    pub sort_order: Option<i64>,
    pub custom_label: Option<String>,
    pub custom_icon: Option<String>,
    pub heading_group: Option<String>,
}

/// One resolved navigation entry for a role, after rules are applied.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MenuEntry {
    pub key: String,
    pub label: String,
    pub icon: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub heading_group: Option<String>,
    pub sort_order: i64,
}
