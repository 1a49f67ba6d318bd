//! The fine-grained RBAC surface: tenant-owned roles, the read-only
//! permission catalog, tri-state matrix editing, and catalog sync.
//!
//! Matrix commits run through `MatrixEditor`: the request body carries the
//! staged target values, each row is persisted independently, and the
//! response reports exactly which cells failed. Succeeded rows stay
//! persisted; the client reloads the matrix rather than trusting its
//! pending state.

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde::Deserialize;
use utoipa::IntoParams;
use uuid::Uuid;

use super::{require, resolve_company};
use crate::app::AppState;
use crate::authz::Actor;
use crate::catalog::PermissionKey;
use crate::editor::{CommitReport, MatrixEditor};
use crate::errors::{AppError, AppResult};
use crate::events::{log_activity_with_context, RequestContext};
use crate::jwt::AuthUser;
use crate::models::dynamic::*;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/roles", get(list_roles).post(create_role))
        .route("/roles/:role_id", get(get_role).delete(delete_role))
        .route("/roles/:role_id/assignments", post(assign_role))
        .route("/roles/:role_id/assignments/:user_id", delete(revoke_role))
        .route("/roles/:role_id/matrix", get(get_matrix).post(commit_matrix))
        .route("/permissions", get(list_permissions))
        .route("/sync", post(sync_catalog))
}

/// Loads the role and checks the actor may act on its company.
async fn owned_role(state: &AppState, actor: &Actor, role_id: Uuid) -> AppResult<DynRole> {
    let role = state
        .store
        .get_dyn_role(role_id)
        .await?
        .ok_or_else(|| AppError::not_found("role not found"))?;

    if !actor.is_super_admin() && actor.company_id != Some(role.company_id) {
        return Err(AppError::forbidden("role belongs to another company"));
    }
    Ok(role)
}

// =============================================================================
// ROLES
// =============================================================================

#[derive(Debug, Deserialize, IntoParams)]
pub struct RoleListQuery {
    pub company_id: Option<Uuid>,
}

/// List a company's roles with their user counts
#[utoipa::path(
    get,
    path = "/rbac/roles",
    tag = "Roles",
    params(RoleListQuery),
    responses((status = 200, description = "Roles with user counts", body = Vec<DynRole>)),
    security(("bearerAuth" = []))
)]
async fn list_roles(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<RoleListQuery>,
) -> AppResult<Json<Vec<DynRole>>> {
    require(&state.authz, &auth.actor, PermissionKey::ManageRoles.as_str()).await?;
    let company_id = resolve_company(&auth.actor, query.company_id)?;

    let roles = state.store.list_dyn_roles(company_id).await?;
    Ok(Json(roles))
}

/// Create a role
#[utoipa::path(
    post,
    path = "/rbac/roles",
    tag = "Roles",
    request_body = DynRoleCreateRequest,
    responses(
        (status = 201, description = "Role created", body = DynRole),
        (status = 409, description = "Role name already exists"),
    ),
    security(("bearerAuth" = []))
)]
async fn create_role(
    State(state): State<AppState>,
    auth: AuthUser,
    headers: HeaderMap,
    Json(req): Json<DynRoleCreateRequest>,
) -> AppResult<(StatusCode, Json<DynRole>)> {
    require(&state.authz, &auth.actor, PermissionKey::ManageRoles.as_str()).await?;
    let company_id = resolve_company(&auth.actor, req.company_id)?;

    let role = state
        .store
        .create_dyn_role(company_id, &req.name, req.description.as_deref())
        .await?;

    log_activity_with_context(
        &state.event_bus,
        "created",
        Some(auth.actor.user_id),
        &role,
        None,
        Some(RequestContext::from_headers(&headers)),
    );

    Ok((StatusCode::CREATED, Json(role)))
}

/// Get a role by ID
#[utoipa::path(
    get,
    path = "/rbac/roles/{role_id}",
    tag = "Roles",
    params(("role_id" = Uuid, Path, description = "Role ID")),
    responses(
        (status = 200, description = "Role details", body = DynRole),
        (status = 404, description = "Role not found"),
    ),
    security(("bearerAuth" = []))
)]
async fn get_role(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(role_id): Path<Uuid>,
) -> AppResult<Json<DynRole>> {
    require(&state.authz, &auth.actor, PermissionKey::ManageRoles.as_str()).await?;
    let role = owned_role(&state, &auth.actor, role_id).await?;
    Ok(Json(role))
}

/// Delete a role; its rule cells and user assignments go with it
#[utoipa::path(
    delete,
    path = "/rbac/roles/{role_id}",
    tag = "Roles",
    params(("role_id" = Uuid, Path, description = "Role ID")),
    responses(
        (status = 204, description = "Role deleted"),
        (status = 404, description = "Role not found"),
    ),
    security(("bearerAuth" = []))
)]
async fn delete_role(
    State(state): State<AppState>,
    auth: AuthUser,
    headers: HeaderMap,
    Path(role_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    require(&state.authz, &auth.actor, PermissionKey::ManageRoles.as_str()).await?;
    let role = owned_role(&state, &auth.actor, role_id).await?;

    state.store.delete_dyn_role(role_id).await?;

    log_activity_with_context(
        &state.event_bus,
        "deleted",
        Some(auth.actor.user_id),
        &role,
        None,
        Some(RequestContext::from_headers(&headers)),
    );

    Ok(StatusCode::NO_CONTENT)
}

/// Assign the role to a user
#[utoipa::path(
    post,
    path = "/rbac/roles/{role_id}/assignments",
    tag = "Roles",
    params(("role_id" = Uuid, Path, description = "Role ID")),
    request_body = DynRoleAssignRequest,
    responses((status = 201, description = "Role assigned")),
    security(("bearerAuth" = []))
)]
async fn assign_role(
    State(state): State<AppState>,
    auth: AuthUser,
    headers: HeaderMap,
    Path(role_id): Path<Uuid>,
    Json(req): Json<DynRoleAssignRequest>,
) -> AppResult<StatusCode> {
    require(&state.authz, &auth.actor, PermissionKey::ManageRoles.as_str()).await?;
    let role = owned_role(&state, &auth.actor, role_id).await?;

    state.store.assign_dyn_role(req.user_id, role_id).await?;

    log_activity_with_context(
        &state.event_bus,
        "assigned",
        Some(auth.actor.user_id),
        &role,
        None,
        Some(RequestContext::from_headers(&headers)),
    );

    Ok(StatusCode::CREATED)
}

/// Revoke the role from a user
#[utoipa::path(
    delete,
    path = "/rbac/roles/{role_id}/assignments/{user_id}",
    tag = "Roles",
    params(
        ("role_id" = Uuid, Path, description = "Role ID"),
        ("user_id" = Uuid, Path, description = "User ID"),
    ),
    responses((status = 204, description = "Role revoked")),
    security(("bearerAuth" = []))
)]
async fn revoke_role(
    State(state): State<AppState>,
    auth: AuthUser,
    headers: HeaderMap,
    Path((role_id, user_id)): Path<(Uuid, Uuid)>,
) -> AppResult<StatusCode> {
    require(&state.authz, &auth.actor, PermissionKey::ManageRoles.as_str()).await?;
    let role = owned_role(&state, &auth.actor, role_id).await?;

    state.store.revoke_dyn_role(user_id, role_id).await?;

    log_activity_with_context(
        &state.event_bus,
        "revoked",
        Some(auth.actor.user_id),
        &role,
        None,
        Some(RequestContext::from_headers(&headers)),
    );

    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// PERMISSION CATALOG
// =============================================================================

/// List the seeded permission catalog (read-only)
#[utoipa::path(
    get,
    path = "/rbac/permissions",
    tag = "Roles",
    responses((status = 200, description = "Catalog rows", body = Vec<DynPermission>)),
    security(("bearerAuth" = []))
)]
async fn list_permissions(
    State(state): State<AppState>,
    auth: AuthUser,
) -> AppResult<Json<Vec<DynPermission>>> {
    require(&state.authz, &auth.actor, PermissionKey::ManageRoles.as_str()).await?;

    let permissions = state.store.list_dyn_permissions().await?;
    Ok(Json(permissions))
}

// =============================================================================
// MATRIX
// =============================================================================

/// The full matrix for a role: every catalog permission with its stance
#[utoipa::path(
    get,
    path = "/rbac/roles/{role_id}/matrix",
    tag = "Roles",
    params(("role_id" = Uuid, Path, description = "Role ID")),
    responses((status = 200, description = "Matrix cells", body = MatrixResponse)),
    security(("bearerAuth" = []))
)]
async fn get_matrix(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(role_id): Path<Uuid>,
) -> AppResult<Json<MatrixResponse>> {
    require(&state.authz, &auth.actor, PermissionKey::ManagePermissions.as_str()).await?;
    owned_role(&state, &auth.actor, role_id).await?;

    let cells = state.store.matrix_cells(role_id).await?;
    Ok(Json(MatrixResponse { role_id, cells }))
}

/// Commit a batch of staged matrix changes
#[utoipa::path(
    post,
    path = "/rbac/roles/{role_id}/matrix",
    tag = "Roles",
    params(("role_id" = Uuid, Path, description = "Role ID")),
    request_body = MatrixCommitRequest,
    responses(
        (status = 200, description = "Per-cell outcome; failed cells are listed", body = CommitReport),
    ),
    security(("bearerAuth" = []))
)]
async fn commit_matrix(
    State(state): State<AppState>,
    auth: AuthUser,
    headers: HeaderMap,
    Path(role_id): Path<Uuid>,
    Json(req): Json<MatrixCommitRequest>,
) -> AppResult<Json<CommitReport>> {
    require(&state.authz, &auth.actor, PermissionKey::ManagePermissions.as_str()).await?;
    owned_role(&state, &auth.actor, role_id).await?;

    let mut editor = MatrixEditor::load(&state.store, role_id).await?;
    for (permission_id, effect) in req.changes {
        editor.stage(permission_id, effect);
    }
    let report = editor.commit(&state.store).await?;

    log_activity_with_context(
        &state.event_bus,
        "committed",
        Some(auth.actor.user_id),
        &MatrixBatch {
            role_id,
            applied: report.applied.len(),
            failed: report.failed.len(),
        },
        None,
        Some(RequestContext::from_headers(&headers)),
    );

    Ok(Json(report))
}

// =============================================================================
// CATALOG SYNC
// =============================================================================

/// Mirror the static permission enumeration into the catalog table
#[utoipa::path(
    post,
    path = "/rbac/sync",
    tag = "Roles",
    request_body = SyncRequest,
    responses((status = 200, description = "Sync outcome", body = SyncResponse)),
    security(("bearerAuth" = []))
)]
async fn sync_catalog(
    State(state): State<AppState>,
    auth: AuthUser,
    headers: HeaderMap,
    Json(req): Json<SyncRequest>,
) -> AppResult<Json<SyncResponse>> {
    if !auth.actor.is_super_admin() {
        return Err(AppError::forbidden("catalog sync is super_admin only"));
    }
    require(&state.authz, &auth.actor, PermissionKey::ManagePermissions.as_str()).await?;

    let outcome = state.store.sync_permission_catalog(req.company_id).await?;

    log_activity_with_context(
        &state.event_bus,
        "synced",
        Some(auth.actor.user_id),
        &CatalogSync {
            seeded: outcome.seeded.len(),
            admin_defaults: outcome.admin_defaults,
        },
        None,
        Some(RequestContext::from_headers(&headers)),
    );

    Ok(Json(SyncResponse {
        seeded: outcome.seeded,
        admin_defaults: outcome.admin_defaults,
    }))
}
