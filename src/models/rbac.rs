use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::events::{Loggable, Severity};

// =============================================================================
// BOOLEAN TENANT ROLE RULES
// =============================================================================

/// One cell of the coarse per-company grid: (company, role, permission) ->
/// enabled. Unique on the triple; absence means "not granted".
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct RoleRule {
    #[sqlx(try_from = "String")]
    pub company_id: Uuid,
    pub role: String,
    pub permission: String,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Loggable for RoleRule {
    fn entity_type() -> &'static str { "role_rule" }
    fn subject_id(&self) -> Uuid { self.company_id }
    fn severity(&self) -> Severity { Severity::Critical }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RoleRuleUpsertRequest {
    /// Required for super_admin callers acting outside a company scope;
    /// tenant callers always write to their own company.
    pub company_id: Option<Uuid>,
    #[schema(example = "manager")]
    pub role: String,
    #[schema(example = "hardware_requests.approve")]
    pub permission: String,
    pub enabled: bool,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RoleRuleClearRequest {
    pub company_id: Option<Uuid>,
    pub role: String,
    pub permission: String,
}

// =============================================================================
// PLATFORM RULES
// =============================================================================

/// Platform-scoped rule, consulted only for the super_admin role.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct PlatformRule {
    pub role: String,
    pub permission: String,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Loggable for PlatformRule {
    fn entity_type() -> &'static str { "platform_rule" }
    // Platform rules have no entity id; the nil UUID stands in for the
    // platform scope in the activity log.
    fn subject_id(&self) -> Uuid { Uuid::nil() }
    fn severity(&self) -> Severity { Severity::Critical }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct PlatformRuleUpsertRequest {
    #[schema(example = "super_admin")]
    pub role: String,
    #[schema(example = "reports.export")]
    pub permission: String,
    pub enabled: bool,
}

// =============================================================================
// USER OVERRIDES
// =============================================================================

/// Per-user override; when present it fully determines the outcome for its
/// permission key, never blended with role rules.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct UserOverride {
    #[sqlx(try_from = "String")]
    pub user_id: Uuid,
    #[sqlx(try_from = "String")]
    pub company_id: Uuid,
    pub permission: String,
    pub granted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Loggable for UserOverride {
    fn entity_type() -> &'static str { "user_override" }
    fn subject_id(&self) -> Uuid { self.user_id }
    fn severity(&self) -> Severity { Severity::Critical }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct OverrideUpsertRequest {
    pub user_id: Uuid,
    pub company_id: Option<Uuid>,
    #[schema(example = "newsletters.submit")]
    pub permission: String,
    pub granted: bool,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct OverrideClearRequest {
    pub user_id: Uuid,
    pub company_id: Option<Uuid>,
    pub permission: String,
}

// =============================================================================
// FEATURE FLAGS
// =============================================================================

/// Company-level capability switch, orthogonal to the permission graph.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct FeatureFlag {
    #[sqlx(try_from = "String")]
    pub company_id: Uuid,
    pub feature: String,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Loggable for FeatureFlag {
    fn entity_type() -> &'static str { "feature_flag" }
    fn subject_id(&self) -> Uuid { self.company_id }
    fn severity(&self) -> Severity { Severity::Critical }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct FeatureUpsertRequest {
    pub company_id: Option<Uuid>,
    #[schema(example = "monthly_newsletter")]
    pub feature: String,
    pub enabled: bool,
}

// =============================================================================
// DECISION RESPONSES
// =============================================================================

#[derive(Debug, Serialize, ToSchema)]
pub struct CheckResponse {
    pub permission: String,
    pub allowed: bool,
    /// The rule layer that produced the decision, for admin debugging.
    #[schema(example = "tenant_rule")]
    pub layer: crate::authz::DecisionLayer,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct GrantedPermissionsResponse {
    pub user_id: Uuid,
    pub role: String,
    pub permissions: Vec<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct FeatureResponse {
    pub feature: String,
    pub enabled: bool,
}

/// One catalog role the calling actor is allowed to grant.
#[derive(Debug, Serialize, ToSchema)]
pub struct AssignableRole {
    #[schema(example = "requester")]
    pub key: String,
    pub label: String,
    pub is_default: bool,
}
