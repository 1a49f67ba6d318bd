use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::collections::HashMap;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::authz::Effect;
use crate::events::{Loggable, Severity};

// =============================================================================
// DYNAMIC ROLES
// =============================================================================

/// Tenant-owned role record for the fine-grained surface. Unlike the static
/// catalog these are ordinary rows: created by administrators, deleted with
/// cascade to their rule cells and user assignments.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct DynRole {
    #[sqlx(try_from = "String")]
    pub id: Uuid,
    #[sqlx(try_from = "String")]
    pub company_id: Uuid,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Number of users currently holding the role.
    pub user_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Loggable for DynRole {
    fn entity_type() -> &'static str { "dyn_role" }
    fn subject_id(&self) -> Uuid { self.id }
    fn severity(&self) -> Severity { Severity::Critical }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct DynRoleCreateRequest {
    pub company_id: Option<Uuid>,
    #[schema(example = "hardware_approver")]
    pub name: String,
    #[schema(example = "Can approve hardware purchases for the office")]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct DynRoleAssignRequest {
    pub user_id: Uuid,
}

// =============================================================================
// DYNAMIC PERMISSION CATALOG
// =============================================================================

/// System-seeded permission row, read-only to tenants. Kept in lockstep with
/// the static enumeration by the catalog sync operation.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct DynPermission {
    #[sqlx(try_from = "String")]
    pub id: Uuid,
    pub key: String,
    pub resource: String,
    pub action: String,
    pub label: String,
    pub category: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Loggable for DynPermission {
    fn entity_type() -> &'static str { "dyn_permission" }
    fn subject_id(&self) -> Uuid { self.id }
    fn severity(&self) -> Severity { Severity::Critical }
}

// =============================================================================
// MATRIX EDITING
// =============================================================================

/// One row of the matrix as presented to the editing surface.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MatrixCell {
    pub permission_id: Uuid,
    pub key: String,
    pub label: String,
    pub category: String,
    pub effect: Effect,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MatrixResponse {
    pub role_id: Uuid,
    pub cells: Vec<MatrixCell>,
}

/// Batch of staged changes to persist in one commit. Keys are permission
/// ids; `unset` deletes the cell's row.
#[derive(Debug, Deserialize, ToSchema)]
pub struct MatrixCommitRequest {
    #[schema(value_type = Object)]
    pub changes: HashMap<Uuid, Effect>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SyncResponse {
    /// Permission keys newly inserted into the catalog table.
    pub seeded: Vec<String>,
    /// Admin-default rule rows created, when a company was given.
    pub admin_defaults: u64,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SyncRequest {
    /// When set, also seeds the company-administrator defaults for this
    /// company.
    pub company_id: Option<Uuid>,
}

/// Activity-log payload for a committed matrix batch.
#[derive(Debug, Serialize)]
pub struct MatrixBatch {
    pub role_id: Uuid,
    pub applied: usize,
    pub failed: usize,
}

impl Loggable for MatrixBatch {
    fn entity_type() -> &'static str { "matrix" }
    fn subject_id(&self) -> Uuid { self.role_id }
    fn severity(&self) -> Severity { Severity::Critical }
}

/// Activity-log payload for a catalog synchronization run.
#[derive(Debug, Serialize)]
pub struct CatalogSync {
    pub seeded: usize,
    pub admin_defaults: u64,
}

impl Loggable for CatalogSync {
    fn entity_type() -> &'static str { "catalog" }
    fn subject_id(&self) -> Uuid { Uuid::nil() }
    fn severity(&self) -> Severity { Severity::Critical }
}
