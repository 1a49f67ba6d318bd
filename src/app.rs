use std::sync::Arc;

use axum::http::Method;
use axum::routing::get;
use axum::Router;
use sqlx::SqlitePool;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::authz::AuthzEngine;
use crate::errors::AppError;
use crate::events::EventBus;
use crate::jwt::JwtConfig;
use crate::routes::{authz, dynamic_rbac, health, menu, rules};
use crate::store::RuleStore;

#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub jwt: Arc<JwtConfig>,
    pub event_bus: EventBus,
    pub store: RuleStore,
    pub authz: AuthzEngine,
}

impl AppState {
    pub fn new(pool: SqlitePool, jwt: JwtConfig, event_bus: EventBus) -> Self {
        let store = RuleStore::new(pool.clone());
        Self {
            pool,
            jwt: Arc::new(jwt),
            event_bus,
            authz: AuthzEngine::new(store.clone()),
            store,
        }
    }
}

pub async fn create_app(pool: SqlitePool, event_bus: EventBus) -> Result<Router, AppError> {
    let jwt_config = JwtConfig::from_env()?;
    let state = AppState::new(pool, jwt_config, event_bus);

    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_origin(Any)
        .allow_headers(Any);

    // Read-only decision endpoints for route guards and nav renderers.
    let authz_routes = Router::new()
        .route("/check", get(authz::check))
        .route("/permissions", get(authz::granted_permissions))
        .route("/features/:feature", get(authz::feature))
        .route("/assignable-roles", get(authz::assignable_roles))
        .route("/menu", get(authz::menu));

    // Editing surfaces. Each handler enforces its own manage.* permission.
    let rbac_routes = Router::new()
        .merge(rules::routes())
        .merge(menu::routes())
        .merge(dynamic_rbac::routes());

    let router = Router::new()
        .route("/api/health", get(health::health))
        .nest("/authz", authz_routes)
        .nest("/rbac", rbac_routes)
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    Ok(router)
}
