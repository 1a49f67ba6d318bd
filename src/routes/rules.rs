//! Admin surface for the coarse rule entities: boolean role rules, platform
//! rules, user overrides, and feature flags.
//!
//! Every write here commits immediately (feature flags by design; the rest
//! are single-cell edits). The staged batch model lives in
//! `routes::dynamic_rbac`. All mutations are activity-logged at Critical.

use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use utoipa::IntoParams;
use uuid::Uuid;

use super::{require, resolve_company};
use crate::app::AppState;
use crate::catalog::{features as feature_catalog, PermissionKey, RoleKey};
use crate::errors::{AppError, AppResult};
use crate::events::{log_activity_with_context, RequestContext};
use crate::jwt::AuthUser;
use crate::models::rbac::*;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/rules", get(list_rules).put(upsert_rule).delete(clear_rule))
        .route("/platform-rules", get(list_platform_rules).put(upsert_platform_rule))
        .route("/overrides", get(list_overrides).put(upsert_override).delete(clear_override))
        .route("/features", get(list_features).put(upsert_feature))
}

fn parse_role(role: &str) -> AppResult<RoleKey> {
    RoleKey::parse(role).ok_or_else(|| AppError::bad_request(format!("unknown role: {role}")))
}

/// Admin writes validate keys against the catalog so a typo can never
/// create an always-false rule; the engine itself stays tolerant of
/// retired keys that are already persisted.
fn parse_permission(permission: &str) -> AppResult<&str> {
    PermissionKey::parse(permission)
        .map(|key| key.as_str())
        .ok_or_else(|| AppError::bad_request(format!("unknown permission: {permission}")))
}

// =============================================================================
// BOOLEAN TENANT RULES
// =============================================================================

#[derive(Debug, Deserialize, IntoParams)]
pub struct RuleListQuery {
    pub company_id: Option<Uuid>,
    pub role: Option<String>,
}

/// List the boolean grid for a company, optionally narrowed to one role
#[utoipa::path(
    get,
    path = "/rbac/rules",
    tag = "Rules",
    params(RuleListQuery),
    responses((status = 200, description = "Rule rows", body = Vec<RoleRule>)),
    security(("bearerAuth" = []))
)]
async fn list_rules(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<RuleListQuery>,
) -> AppResult<Json<Vec<RoleRule>>> {
    require(&state.authz, &auth.actor, PermissionKey::ManagePermissions.as_str()).await?;
    let company_id = resolve_company(&auth.actor, query.company_id)?;
    let role = query.role.as_deref().map(parse_role).transpose()?;

    let rules = state.store.list_role_rules(company_id, role).await?;
    Ok(Json(rules))
}

/// Upsert one cell of the boolean grid
#[utoipa::path(
    put,
    path = "/rbac/rules",
    tag = "Rules",
    request_body = RoleRuleUpsertRequest,
    responses(
        (status = 200, description = "Persisted rule", body = RoleRule),
        (status = 400, description = "Unknown role or permission key"),
    ),
    security(("bearerAuth" = []))
)]
async fn upsert_rule(
    State(state): State<AppState>,
    auth: AuthUser,
    headers: HeaderMap,
    Json(req): Json<RoleRuleUpsertRequest>,
) -> AppResult<Json<RoleRule>> {
    require(&state.authz, &auth.actor, PermissionKey::ManagePermissions.as_str()).await?;
    let company_id = resolve_company(&auth.actor, req.company_id)?;
    let role = parse_role(&req.role)?;
    let permission = parse_permission(&req.permission)?;

    let rule = state
        .store
        .set_role_rule(company_id, role, permission, req.enabled)
        .await?;

    log_activity_with_context(
        &state.event_bus,
        "updated",
        Some(auth.actor.user_id),
        &rule,
        None,
        Some(RequestContext::from_headers(&headers)),
    );

    Ok(Json(rule))
}

/// Remove one cell of the boolean grid outright
#[utoipa::path(
    delete,
    path = "/rbac/rules",
    tag = "Rules",
    params(RoleRuleClearQuery),
    responses(
        (status = 204, description = "Rule cleared"),
        (status = 404, description = "No such rule row"),
    ),
    security(("bearerAuth" = []))
)]
async fn clear_rule(
    State(state): State<AppState>,
    auth: AuthUser,
    headers: HeaderMap,
    Query(query): Query<RoleRuleClearQuery>,
) -> AppResult<StatusCode> {
    require(&state.authz, &auth.actor, PermissionKey::ManagePermissions.as_str()).await?;
    let company_id = resolve_company(&auth.actor, query.company_id)?;
    let role = parse_role(&query.role)?;

    let existing = state
        .store
        .list_role_rules(company_id, Some(role))
        .await?
        .into_iter()
        .find(|r| r.permission == query.permission)
        .ok_or_else(|| AppError::not_found("rule not found"))?;

    state
        .store
        .clear_role_rule(company_id, role, &query.permission)
        .await?;

    log_activity_with_context(
        &state.event_bus,
        "cleared",
        Some(auth.actor.user_id),
        &existing,
        None,
        Some(RequestContext::from_headers(&headers)),
    );

    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct RoleRuleClearQuery {
    pub company_id: Option<Uuid>,
    pub role: String,
    pub permission: String,
}

// =============================================================================
// PLATFORM RULES
// =============================================================================

/// List the platform-scoped rules
#[utoipa::path(
    get,
    path = "/rbac/platform-rules",
    tag = "Rules",
    responses((status = 200, description = "Platform rule rows", body = Vec<PlatformRule>)),
    security(("bearerAuth" = []))
)]
async fn list_platform_rules(
    State(state): State<AppState>,
    auth: AuthUser,
) -> AppResult<Json<Vec<PlatformRule>>> {
    if !auth.actor.is_super_admin() {
        return Err(AppError::forbidden("platform rules are super_admin only"));
    }
    require(&state.authz, &auth.actor, PermissionKey::ManagePermissions.as_str()).await?;

    let rules = state.store.list_platform_rules().await?;
    Ok(Json(rules))
}

/// Upsert a platform-scoped rule
#[utoipa::path(
    put,
    path = "/rbac/platform-rules",
    tag = "Rules",
    request_body = PlatformRuleUpsertRequest,
    responses((status = 200, description = "Persisted rule", body = PlatformRule)),
    security(("bearerAuth" = []))
)]
async fn upsert_platform_rule(
    State(state): State<AppState>,
    auth: AuthUser,
    headers: HeaderMap,
    Json(req): Json<PlatformRuleUpsertRequest>,
) -> AppResult<Json<PlatformRule>> {
    if !auth.actor.is_super_admin() {
        return Err(AppError::forbidden("platform rules are super_admin only"));
    }
    require(&state.authz, &auth.actor, PermissionKey::ManagePermissions.as_str()).await?;
    let role = parse_role(&req.role)?;
    let permission = parse_permission(&req.permission)?;

    let rule = state.store.set_platform_rule(role, permission, req.enabled).await?;

    log_activity_with_context(
        &state.event_bus,
        "updated",
        Some(auth.actor.user_id),
        &rule,
        None,
        Some(RequestContext::from_headers(&headers)),
    );

    Ok(Json(rule))
}

// =============================================================================
// USER OVERRIDES
// =============================================================================

#[derive(Debug, Deserialize, IntoParams)]
pub struct OverrideListQuery {
    pub company_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
}

/// List overrides for a company, optionally narrowed to one user
#[utoipa::path(
    get,
    path = "/rbac/overrides",
    tag = "Rules",
    params(OverrideListQuery),
    responses((status = 200, description = "Override rows", body = Vec<UserOverride>)),
    security(("bearerAuth" = []))
)]
async fn list_overrides(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<OverrideListQuery>,
) -> AppResult<Json<Vec<UserOverride>>> {
    require(&state.authz, &auth.actor, PermissionKey::ManagePermissions.as_str()).await?;
    let company_id = resolve_company(&auth.actor, query.company_id)?;

    let overrides = state.store.list_overrides(company_id, query.user_id).await?;
    Ok(Json(overrides))
}

/// Set a per-user override; it fully determines the outcome for its key
#[utoipa::path(
    put,
    path = "/rbac/overrides",
    tag = "Rules",
    request_body = OverrideUpsertRequest,
    responses((status = 200, description = "Persisted override", body = UserOverride)),
    security(("bearerAuth" = []))
)]
async fn upsert_override(
    State(state): State<AppState>,
    auth: AuthUser,
    headers: HeaderMap,
    Json(req): Json<OverrideUpsertRequest>,
) -> AppResult<Json<UserOverride>> {
    require(&state.authz, &auth.actor, PermissionKey::ManagePermissions.as_str()).await?;
    let company_id = resolve_company(&auth.actor, req.company_id)?;
    let permission = parse_permission(&req.permission)?;

    let row = state
        .store
        .set_override(req.user_id, company_id, permission, req.granted)
        .await?;

    log_activity_with_context(
        &state.event_bus,
        "updated",
        Some(auth.actor.user_id),
        &row,
        None,
        Some(RequestContext::from_headers(&headers)),
    );

    Ok(Json(row))
}

/// Remove a per-user override, restoring role-derived resolution
#[utoipa::path(
    delete,
    path = "/rbac/overrides",
    tag = "Rules",
    params(OverrideClearQuery),
    responses(
        (status = 204, description = "Override removed"),
        (status = 404, description = "No such override"),
    ),
    security(("bearerAuth" = []))
)]
async fn clear_override(
    State(state): State<AppState>,
    auth: AuthUser,
    headers: HeaderMap,
    Query(query): Query<OverrideClearQuery>,
) -> AppResult<StatusCode> {
    require(&state.authz, &auth.actor, PermissionKey::ManagePermissions.as_str()).await?;
    let company_id = resolve_company(&auth.actor, query.company_id)?;

    let existing = state
        .store
        .list_overrides(company_id, Some(query.user_id))
        .await?
        .into_iter()
        .find(|o| o.permission == query.permission)
        .ok_or_else(|| AppError::not_found("override not found"))?;

    state
        .store
        .clear_override(query.user_id, company_id, &query.permission)
        .await?;

    log_activity_with_context(
        &state.event_bus,
        "revoked",
        Some(auth.actor.user_id),
        &existing,
        None,
        Some(RequestContext::from_headers(&headers)),
    );

    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct OverrideClearQuery {
    pub company_id: Option<Uuid>,
    pub user_id: Uuid,
    pub permission: String,
}

// =============================================================================
// FEATURE FLAGS
// =============================================================================

#[derive(Debug, Deserialize, IntoParams)]
pub struct FeatureListQuery {
    pub company_id: Option<Uuid>,
}

/// List feature flags for a company
#[utoipa::path(
    get,
    path = "/rbac/features",
    tag = "Rules",
    params(FeatureListQuery),
    responses((status = 200, description = "Flag rows", body = Vec<FeatureFlag>)),
    security(("bearerAuth" = []))
)]
async fn list_features(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<FeatureListQuery>,
) -> AppResult<Json<Vec<FeatureFlag>>> {
    require(&state.authz, &auth.actor, PermissionKey::ManageFeatures.as_str()).await?;
    let company_id = resolve_company(&auth.actor, query.company_id)?;

    let flags = state.store.list_features(company_id).await?;
    Ok(Json(flags))
}

/// Flip a feature flag; committed immediately, no staging
#[utoipa::path(
    put,
    path = "/rbac/features",
    tag = "Rules",
    request_body = FeatureUpsertRequest,
    responses(
        (status = 200, description = "Persisted flag", body = FeatureFlag),
        (status = 400, description = "Unknown feature key"),
    ),
    security(("bearerAuth" = []))
)]
async fn upsert_feature(
    State(state): State<AppState>,
    auth: AuthUser,
    headers: HeaderMap,
    Json(req): Json<FeatureUpsertRequest>,
) -> AppResult<Json<FeatureFlag>> {
    require(&state.authz, &auth.actor, PermissionKey::ManageFeatures.as_str()).await?;
    let company_id = resolve_company(&auth.actor, req.company_id)?;
    if !feature_catalog::ALL.contains(&req.feature.as_str()) {
        return Err(AppError::bad_request(format!("unknown feature: {}", req.feature)));
    }

    let flag = state.store.set_feature(company_id, &req.feature, req.enabled).await?;

    log_activity_with_context(
        &state.event_bus,
        "updated",
        Some(auth.actor.user_id),
        &flag,
        None,
        Some(RequestContext::from_headers(&headers)),
    );

    Ok(Json(flag))
}
