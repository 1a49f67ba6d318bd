//! Admin surface for menu visibility rules.
//!
//! Items default to visible; a rule row is only created on the first edit
//! for a (role, item) pair and is deleted outright when cleared.

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::get;
use axum::{Json, Router};

use super::require;
use crate::app::AppState;
use crate::catalog::{menu as menu_catalog, PermissionKey, RoleKey};
use crate::errors::{AppError, AppResult};
use crate::events::{log_activity_with_context, RequestContext};
use crate::jwt::AuthUser;
use crate::models::menu::{MenuRule, MenuRuleUpsertRequest};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/menu", get(list_menu_rules).put(upsert_menu_rule))
        .route("/menu/:role/:item_key", axum::routing::delete(clear_menu_rule))
}

fn parse_role(role: &str) -> AppResult<RoleKey> {
    RoleKey::parse(role).ok_or_else(|| AppError::bad_request(format!("unknown role: {role}")))
}

/// List the configured visibility rules for one role
#[utoipa::path(
    get,
    path = "/rbac/menu",
    tag = "Menu",
    params(("role" = String, Query, description = "Role key")),
    responses((status = 200, description = "Configured rules", body = Vec<MenuRule>)),
    security(("bearerAuth" = []))
)]
async fn list_menu_rules(
    State(state): State<AppState>,
    auth: AuthUser,
    axum::extract::Query(query): axum::extract::Query<MenuListQuery>,
) -> AppResult<Json<Vec<MenuRule>>> {
    require(&state.authz, &auth.actor, PermissionKey::ManageMenu.as_str()).await?;
    let role = parse_role(&query.role)?;

    let rules = state.store.menu_rules_for_role(role).await?;
    Ok(Json(rules))
}

#[derive(Debug, serde::Deserialize)]
pub struct MenuListQuery {
    pub role: String,
}

/// Upsert a visibility rule for a (role, item) pair
#[utoipa::path(
    put,
    path = "/rbac/menu",
    tag = "Menu",
    request_body = MenuRuleUpsertRequest,
    responses(
        (status = 200, description = "Persisted rule", body = MenuRule),
        (status = 400, description = "Unknown role or item key"),
    ),
    security(("bearerAuth" = []))
)]
async fn upsert_menu_rule(
    State(state): State<AppState>,
    auth: AuthUser,
    headers: HeaderMap,
    Json(req): Json<MenuRuleUpsertRequest>,
) -> AppResult<Json<MenuRule>> {
    require(&state.authz, &auth.actor, PermissionKey::ManageMenu.as_str()).await?;
    let role = parse_role(&req.role)?;
    let item = menu_catalog::item(&req.item_key)
        .ok_or_else(|| AppError::bad_request(format!("unknown menu item: {}", req.item_key)))?;

    let rule = state
        .store
        .set_menu_rule(
            role,
            item.key,
            req.is_visible,
            req.sort_order.unwrap_or(item.default_order),
            req.custom_label.as_deref(),
            req.custom_icon.as_deref(),
            req.heading_group.as_deref(),
        )
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

/// Remove a rule, restoring the default-visible state
#[utoipa::path(
    delete,
    path = "/rbac/menu/{role}/{item_key}",
    tag = "Menu",
    params(
        ("role" = String, Path, description = "Role key"),
        ("item_key" = String, Path, description = "Menu item key"),
    ),
    responses(
        (status = 204, description = "Rule removed"),
        (status = 404, description = "No such rule"),
    ),
    security(("bearerAuth" = []))
)]
async fn clear_menu_rule(
    State(state): State<AppState>,
    auth: AuthUser,
    headers: HeaderMap,
    Path((role, item_key)): Path<(String, String)>,
) -> AppResult<StatusCode> {
    require(&state.authz, &auth.actor, PermissionKey::ManageMenu.as_str()).await?;
    let role = parse_role(&role)?;

    let existing = state
        .store
        .menu_rule(role, &item_key)
        .await?
        .ok_or_else(|| AppError::not_found("menu rule not found"))?;

    state.store.clear_menu_rule(role, &item_key).await?;

    log_activity_with_context(
        &state.event_bus,
        "deleted",
        Some(auth.actor.user_id),
        &existing,
        None,
        Some(RequestContext::from_headers(&headers)),
    );

    Ok(StatusCode::NO_CONTENT)
}
