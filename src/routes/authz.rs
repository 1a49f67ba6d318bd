//! Read-only decision endpoints.
//!
//! Route guards and navigation renderers call these before rendering; a
//! `false`/hidden answer is a hard deny. None of these endpoints mutate
//! anything, and a feature check is never implied by a permission check.

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use utoipa::IntoParams;

use crate::app::AppState;
use crate::authz::PolicyResolver;
use crate::errors::AppResult;
use crate::jwt::AuthUser;
use crate::catalog::roles as role_catalog;
use crate::models::menu::MenuEntry;
use crate::models::rbac::{
    AssignableRole, CheckResponse, FeatureResponse, GrantedPermissionsResponse,
};

#[derive(Debug, Deserialize, IntoParams)]
pub struct CheckQuery {
    /// Permission key, e.g. `hardware_requests.approve`.
    pub permission: String,
}

/// May the calling actor perform the named action?
#[utoipa::path(
    get,
    path = "/authz/check",
    tag = "Authz",
    params(CheckQuery),
    responses(
        (status = 200, description = "Decision with the layer that produced it", body = CheckResponse),
    ),
    security(("bearerAuth" = []))
)]
pub async fn check(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<CheckQuery>,
) -> AppResult<Json<CheckResponse>> {
    let decision = state.authz.decide(Some(&auth.actor), &query.permission).await?;

    Ok(Json(CheckResponse {
        permission: query.permission,
        allowed: decision.allowed,
        layer: decision.layer,
    }))
}

/// Every permission key currently granted to the calling actor.
#[utoipa::path(
    get,
    path = "/authz/permissions",
    tag = "Authz",
    responses(
        (status = 200, description = "Granted permission keys", body = GrantedPermissionsResponse),
    ),
    security(("bearerAuth" = []))
)]
pub async fn granted_permissions(
    State(state): State<AppState>,
    auth: AuthUser,
) -> AppResult<Json<GrantedPermissionsResponse>> {
    let granted = state.authz.granted_permissions(&auth.actor).await?;

    Ok(Json(GrantedPermissionsResponse {
        user_id: auth.actor.user_id,
        role: auth.actor.role.as_str().to_string(),
        permissions: granted.into_iter().collect(),
    }))
}

/// Is a company-level capability switched on for the caller's company?
#[utoipa::path(
    get,
    path = "/authz/features/{feature}",
    tag = "Authz",
    params(("feature" = String, Path, description = "Feature key")),
    responses(
        (status = 200, description = "Flag state, false when unconfigured", body = FeatureResponse),
    ),
    security(("bearerAuth" = []))
)]
pub async fn feature(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(feature): Path<String>,
) -> AppResult<Json<FeatureResponse>> {
    let enabled = state.authz.has_feature(&auth.actor, &feature).await?;

    Ok(Json(FeatureResponse { feature, enabled }))
}

/// Roles the calling actor may grant, used to populate assignment pickers.
#[utoipa::path(
    get,
    path = "/authz/assignable-roles",
    tag = "Authz",
    responses(
        (status = 200, description = "Grantable roles in catalog order", body = Vec<AssignableRole>),
    ),
    security(("bearerAuth" = []))
)]
pub async fn assignable_roles(auth: AuthUser) -> AppResult<Json<Vec<AssignableRole>>> {
    let roles = role_catalog::assignable_roles(auth.actor.role)
        .into_iter()
        .map(|def| AssignableRole {
            key: def.key.as_str().to_string(),
            label: def.label.to_string(),
            is_default: def.is_default,
        })
        .collect();

    Ok(Json(roles))
}

/// The resolved navigation for the calling actor's role.
#[utoipa::path(
    get,
    path = "/authz/menu",
    tag = "Authz",
    responses(
        (status = 200, description = "Visible menu entries in display order", body = Vec<MenuEntry>),
    ),
    security(("bearerAuth" = []))
)]
pub async fn menu(
    State(state): State<AppState>,
    auth: AuthUser,
) -> AppResult<Json<Vec<MenuEntry>>> {
    let entries = state.authz.menu_for_role(auth.actor.role).await?;
    Ok(Json(entries))
}
