//! Rule store: sqlx-backed persistence for every rule entity, fronted by a
//! snapshot cache.
//!
//! Reads used by the resolution engine go through immutable snapshots,
//! loaded per scope (platform, or one company) and shared via `Arc` so
//! concurrent evaluations never lock. Every write invalidates its scope
//! synchronously; the next read reloads. Writes are row-keyed upserts —
//! there is no full-table replace anywhere, so concurrent editors can only
//! collide per row (last writer wins), never erase each other's rows.

mod dynamic;
mod features;
mod menu;
mod overrides;
mod platform;
mod role_rules;

pub use dynamic::SyncOutcome;

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::authz::Effect;
use crate::catalog::RoleKey;
use crate::errors::AppResult;

/// Cache invalidation scope. Platform rules live outside any company.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScopeKey {
    Platform,
    Company(Uuid),
}

#[derive(Clone)]
pub struct RuleStore {
    pool: SqlitePool,
    cache: Arc<SnapshotCache>,
}

impl RuleStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            cache: Arc::new(SnapshotCache::default()),
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Drop the cached snapshot for a scope. Called synchronously after
    /// every successful write; the next read reloads from the database.
    pub fn invalidate(&self, scope: ScopeKey) {
        match scope {
            ScopeKey::Platform => {
                if let Ok(mut guard) = self.cache.platform.write() {
                    *guard = None;
                }
            }
            ScopeKey::Company(company_id) => {
                if let Ok(mut guard) = self.cache.companies.write() {
                    guard.remove(&company_id);
                }
            }
        }
    }

    pub async fn platform_snapshot(&self) -> AppResult<Arc<PlatformSnapshot>> {
        if let Ok(guard) = self.cache.platform.read() {
            if let Some(snapshot) = guard.as_ref() {
                return Ok(Arc::clone(snapshot));
            }
        }

        let snapshot = Arc::new(PlatformSnapshot::load(&self.pool).await?);
        if let Ok(mut guard) = self.cache.platform.write() {
            *guard = Some(Arc::clone(&snapshot));
        }
        Ok(snapshot)
    }

    pub async fn company_snapshot(&self, company_id: Uuid) -> AppResult<Arc<CompanySnapshot>> {
        if let Ok(guard) = self.cache.companies.read() {
            if let Some(snapshot) = guard.get(&company_id) {
                return Ok(Arc::clone(snapshot));
            }
        }

        let snapshot = Arc::new(CompanySnapshot::load(&self.pool, company_id).await?);
        if let Ok(mut guard) = self.cache.companies.write() {
            guard.insert(company_id, Arc::clone(&snapshot));
        }
        Ok(snapshot)
    }
}

#[derive(Default)]
struct SnapshotCache {
    platform: RwLock<Option<Arc<PlatformSnapshot>>>,
    companies: RwLock<HashMap<Uuid, Arc<CompanySnapshot>>>,
}

/// Immutable view of the platform-scoped rules.
pub struct PlatformSnapshot {
    rules: HashMap<(String, String), bool>,
}

impl PlatformSnapshot {
    async fn load(pool: &SqlitePool) -> AppResult<Self> {
        let rows = sqlx::query("SELECT role, permission, enabled FROM platform_permission_rules")
            .fetch_all(pool)
            .await?;

        let mut rules = HashMap::new();
        for row in rows {
            rules.insert(
                (row.get::<String, _>("role"), row.get::<String, _>("permission")),
                row.get::<bool, _>("enabled"),
            );
        }
        Ok(Self { rules })
    }

    pub fn rule(&self, role: RoleKey, permission: &str) -> Option<bool> {
        self.rules
            .get(&(role.as_str().to_string(), permission.to_string()))
            .copied()
    }

    /// Permission keys with an enabled rule for the given role.
    pub fn granted_keys(&self, role: RoleKey) -> Vec<&str> {
        self.rules
            .iter()
            .filter(|((r, _), enabled)| r == role.as_str() && **enabled)
            .map(|((_, key), _)| key.as_str())
            .collect()
    }
}

/// Immutable view of one company's rules: the boolean grid, user overrides,
/// feature flags, and the folded tri-state stances of the dynamic surface.
pub struct CompanySnapshot {
    role_rules: HashMap<(String, String), bool>,
    overrides: HashMap<(Uuid, String), bool>,
    features: HashMap<String, bool>,
    dynamic: HashMap<(Uuid, String), Effect>,
}

impl CompanySnapshot {
    async fn load(pool: &SqlitePool, company_id: Uuid) -> AppResult<Self> {
        let company = company_id.to_string();

        let rule_rows = sqlx::query(
            "SELECT role, permission, enabled FROM role_permission_rules WHERE company_id = ?",
        )
        .bind(&company)
        .fetch_all(pool)
        .await?;

        let override_rows = sqlx::query(
            "SELECT user_id, permission, granted FROM user_permission_overrides WHERE company_id = ?",
        )
        .bind(&company)
        .fetch_all(pool)
        .await?;

        let feature_rows =
            sqlx::query("SELECT feature, enabled FROM feature_flags WHERE company_id = ?")
                .bind(&company)
                .fetch_all(pool)
                .await?;

        let dynamic_rows = sqlx::query(
            r#"
            SELECT ur.user_id, p.key AS permission, rp.effect
            FROM dyn_user_roles ur
            INNER JOIN dyn_roles r ON r.id = ur.role_id
            INNER JOIN dyn_role_permissions rp ON rp.role_id = ur.role_id
            INNER JOIN dyn_permissions p ON p.id = rp.permission_id
            WHERE r.company_id = ?
            "#,
        )
        .bind(&company)
        .fetch_all(pool)
        .await?;

        let mut role_rules = HashMap::new();
        for row in rule_rows {
            role_rules.insert(
                (row.get::<String, _>("role"), row.get::<String, _>("permission")),
                row.get::<bool, _>("enabled"),
            );
        }

        let mut overrides = HashMap::new();
        for row in override_rows {
            overrides.insert(
                (parse_uuid(&row, "user_id"), row.get::<String, _>("permission")),
                row.get::<bool, _>("granted"),
            );
        }

        let mut features = HashMap::new();
        for row in feature_rows {
            features.insert(row.get::<String, _>("feature"), row.get::<bool, _>("enabled"));
        }

        // Fold stances across every dynamic role a user holds. Deny wins
        // regardless of row order, so a Deny is never displaced by an Allow.
        let mut dynamic: HashMap<(Uuid, String), Effect> = HashMap::new();
        for row in dynamic_rows {
            let key = (parse_uuid(&row, "user_id"), row.get::<String, _>("permission"));
            let effect = Effect::from_db(row.get::<&str, _>("effect"));
            let existing = dynamic.get(&key).copied();
            if existing != Some(Effect::Deny) && effect != Effect::Unset {
                dynamic.insert(key, effect);
            }
        }

        Ok(Self { role_rules, overrides, features, dynamic })
    }

    pub fn role_rule(&self, role: RoleKey, permission: &str) -> Option<bool> {
        self.role_rules
            .get(&(role.as_str().to_string(), permission.to_string()))
            .copied()
    }

    pub fn override_for(&self, user_id: Uuid, permission: &str) -> Option<bool> {
        self.overrides.get(&(user_id, permission.to_string())).copied()
    }

    pub fn feature(&self, feature: &str) -> Option<bool> {
        self.features.get(feature).copied()
    }

    /// The folded stance of every dynamic role the user holds; Unset when no
    /// held role has an opinion.
    pub fn dynamic_stance(&self, user_id: Uuid, permission: &str) -> Effect {
        self.dynamic
            .get(&(user_id, permission.to_string()))
            .copied()
            .unwrap_or(Effect::Unset)
    }

    pub fn enabled_keys(&self, role: RoleKey) -> Vec<&str> {
        self.role_rules
            .iter()
            .filter(|((r, _), enabled)| r == role.as_str() && **enabled)
            .map(|((_, key), _)| key.as_str())
            .collect()
    }

    pub fn overrides_for(&self, user_id: Uuid) -> impl Iterator<Item = (&str, bool)> {
        self.overrides
            .iter()
            .filter(move |((u, _), _)| *u == user_id)
            .map(|((_, key), granted)| (key.as_str(), *granted))
    }

    pub fn dynamic_stances_for(&self, user_id: Uuid) -> impl Iterator<Item = (&str, Effect)> {
        self.dynamic
            .iter()
            .filter(move |((u, _), _)| *u == user_id)
            .map(|((_, key), effect)| (key.as_str(), *effect))
    }
}

fn parse_uuid(row: &SqliteRow, column: &str) -> Uuid {
    Uuid::parse_str(row.get::<&str, _>(column)).unwrap_or_default()
}
