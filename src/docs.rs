use std::sync::Arc;

use axum::{routing::get, Json, Router};
use serde_json::json;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::editor;
use crate::models;
use crate::routes;

#[derive(OpenApi)]
#[openapi(
    paths(
        routes::health::health,
        routes::authz::check,
        routes::authz::granted_permissions,
        routes::authz::feature,
        routes::authz::assignable_roles,
        routes::authz::menu,
    ),
    components(
        schemas(
            routes::health::HealthResponse,
            models::rbac::RoleRule,
            models::rbac::RoleRuleUpsertRequest,
            models::rbac::PlatformRule,
            models::rbac::PlatformRuleUpsertRequest,
            models::rbac::UserOverride,
            models::rbac::OverrideUpsertRequest,
            models::rbac::FeatureFlag,
            models::rbac::FeatureUpsertRequest,
            models::rbac::CheckResponse,
            models::rbac::GrantedPermissionsResponse,
            models::rbac::FeatureResponse,
            models::rbac::AssignableRole,
            models::menu::MenuRule,
            models::menu::MenuRuleUpsertRequest,
            models::menu::MenuEntry,
            models::dynamic::DynRole,
            models::dynamic::DynRoleCreateRequest,
            models::dynamic::DynRoleAssignRequest,
            models::dynamic::DynPermission,
            models::dynamic::MatrixCell,
            models::dynamic::MatrixResponse,
            models::dynamic::MatrixCommitRequest,
            models::dynamic::SyncRequest,
            models::dynamic::SyncResponse,
            editor::CommitReport,
            editor::FailedCell,
        )
    ),
    tags(
        (name = "Health", description = "Service health"),
        (name = "Authz", description = "Permission, feature, and menu decisions"),
        (name = "Rules", description = "Boolean rules, overrides, and feature flags"),
        (name = "Menu", description = "Menu visibility administration"),
        (name = "Roles", description = "Dynamic roles and the permission matrix"),
    )
)]
pub struct ApiDoc;

/// Generated document plus the bearer scheme and server entry the derive
/// does not emit on its own.
pub fn build_openapi(port: u16) -> anyhow::Result<utoipa::openapi::OpenApi> {
    let mut doc = serde_json::to_value(ApiDoc::openapi())?;

    if let Some(components) = doc.get_mut("components").and_then(|c| c.as_object_mut()) {
        components.entry("securitySchemes").or_insert_with(|| {
            json!({
                "bearerAuth": {
                    "type": "http",
                    "scheme": "bearer",
                    "bearerFormat": "JWT"
                }
            })
        });
    }

    if doc.get("security").is_none() {
        doc["security"] = json!([{ "bearerAuth": [] }]);
    }

    if doc.get("servers").is_none() {
        doc["servers"] = json!([{ "url": format!("http://localhost:{port}") }]);
    }

    Ok(serde_json::from_value(doc)?)
}

pub fn swagger_routes(doc: utoipa::openapi::OpenApi) -> anyhow::Result<Router> {
    let swagger_config = utoipa_swagger_ui::Config::new(["/api-docs/openapi.json"])
        .try_it_out_enabled(true)
        .with_credentials(true)
        .persist_authorization(true);

    let doc_json = Arc::new(serde_json::to_value(&doc)?);

    let json_route = {
        let doc_json = Arc::clone(&doc_json);
        get(move || {
            let doc_json = Arc::clone(&doc_json);
            async move { Json((*doc_json).clone()) }
        })
    };

    Ok(Router::new()
        .route("/api-docs/openapi.json", json_route)
        .merge(SwaggerUi::new("/docs").config(swagger_config)))
}
