use chrono::Utc;
use std::collections::HashMap;
use uuid::Uuid;

use super::{RuleStore, ScopeKey};
use crate::authz::Effect;
use crate::catalog::{permissions, RoleKey};
use crate::errors::{AppError, AppResult};
use crate::models::dynamic::{DynPermission, DynRole, MatrixCell};

/// Result of a catalog synchronization run.
#[derive(Debug, Default)]
pub struct SyncOutcome {
    pub seeded: Vec<String>,
    pub admin_defaults: u64,
}

impl RuleStore {
    // =========================================================================
    // ROLES
    // =========================================================================

    pub async fn create_dyn_role(
        &self,
        company_id: Uuid,
        name: &str,
        description: Option<&str>,
    ) -> AppResult<DynRole> {
        let id = Uuid::new_v4();
        let now = Utc::now();

        let result = sqlx::query(
            r#"
            INSERT INTO dyn_roles (id, company_id, name, description, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(id.to_string())
        .bind(company_id.to_string())
        .bind(name)
        .bind(description)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await;

        if let Err(err) = result {
            if err
                .as_database_error()
                .map(|db| db.is_unique_violation())
                .unwrap_or(false)
            {
                return Err(AppError::conflict(format!("role name already exists: {name}")));
            }
            return Err(err.into());
        }

        Ok(DynRole {
            id,
            company_id,
            name: name.to_string(),
            description: description.map(String::from),
            user_count: 0,
            created_at: now,
            updated_at: now,
        })
    }

    pub async fn get_dyn_role(&self, role_id: Uuid) -> AppResult<Option<DynRole>> {
        let role = sqlx::query_as::<_, DynRole>(
            r#"
            SELECT r.id, r.company_id, r.name, r.description,
                   COUNT(ur.user_id) AS user_count,
                   r.created_at, r.updated_at
            FROM dyn_roles r
            LEFT JOIN dyn_user_roles ur ON ur.role_id = r.id
            WHERE r.id = ?
            GROUP BY r.id
            "#,
        )
        .bind(role_id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        Ok(role)
    }

    pub async fn list_dyn_roles(&self, company_id: Uuid) -> AppResult<Vec<DynRole>> {
        let roles = sqlx::query_as::<_, DynRole>(
            r#"
            SELECT r.id, r.company_id, r.name, r.description,
                   COUNT(ur.user_id) AS user_count,
                   r.created_at, r.updated_at
            FROM dyn_roles r
            LEFT JOIN dyn_user_roles ur ON ur.role_id = r.id
            WHERE r.company_id = ?
            GROUP BY r.id
            ORDER BY r.name
            "#,
        )
        .bind(company_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        Ok(roles)
    }

    /// Delete a role together with its rule cells and user assignments.
    /// The cascade runs in one transaction so a role can never linger with
    /// orphaned cells.
    pub async fn delete_dyn_role(&self, role_id: Uuid) -> AppResult<bool> {
        let company_id = self.company_of_role(role_id).await?;

        let mut tx = self.pool.begin().await?;
        let id = role_id.to_string();

        sqlx::query("DELETE FROM dyn_role_permissions WHERE role_id = ?")
            .bind(&id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM dyn_user_roles WHERE role_id = ?")
            .bind(&id)
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM dyn_roles WHERE id = ?")
            .bind(&id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        if let Some(company_id) = company_id {
            self.invalidate(ScopeKey::Company(company_id));
        }
        Ok(result.rows_affected() > 0)
    }

    pub async fn assign_dyn_role(&self, user_id: Uuid, role_id: Uuid) -> AppResult<()> {
        sqlx::query(
            "INSERT OR IGNORE INTO dyn_user_roles (user_id, role_id, created_at) VALUES (?, ?, ?)",
        )
        .bind(user_id.to_string())
        .bind(role_id.to_string())
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if let Some(company_id) = self.company_of_role(role_id).await? {
            self.invalidate(ScopeKey::Company(company_id));
        }
        Ok(())
    }

    pub async fn revoke_dyn_role(&self, user_id: Uuid, role_id: Uuid) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM dyn_user_roles WHERE user_id = ? AND role_id = ?")
            .bind(user_id.to_string())
            .bind(role_id.to_string())
            .execute(&self.pool)
            .await?;

        if let Some(company_id) = self.company_of_role(role_id).await? {
            self.invalidate(ScopeKey::Company(company_id));
        }
        Ok(result.rows_affected() > 0)
    }

    pub async fn company_of_role(&self, role_id: Uuid) -> AppResult<Option<Uuid>> {
        let company: Option<String> =
            sqlx::query_scalar("SELECT company_id FROM dyn_roles WHERE id = ?")
                .bind(role_id.to_string())
                .fetch_optional(&self.pool)
                .await?;

        Ok(company.and_then(|c| Uuid::parse_str(&c).ok()))
    }

    // =========================================================================
    // PERMISSION CATALOG
    // =========================================================================

    pub async fn list_dyn_permissions(&self) -> AppResult<Vec<DynPermission>> {
        let permissions = sqlx::query_as::<_, DynPermission>(
            r#"
            SELECT id, key, resource, action, label, category, description, created_at, updated_at
            FROM dyn_permissions
            ORDER BY category, key
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(permissions)
    }

    /// Mirror the static permission enumeration into `dyn_permissions`.
    ///
    /// Idempotent: existing rows are left untouched, so re-running after a
    /// release that added keys only inserts the new ones. When `company_id`
    /// is given, the company-administrator role is also granted every
    /// catalog key it does not yet have a rule for — absence elsewhere means
    /// "not granted", but the admin role starts from a full grant.
    pub async fn sync_permission_catalog(
        &self,
        company_id: Option<Uuid>,
    ) -> AppResult<SyncOutcome> {
        let mut outcome = SyncOutcome::default();
        let now = Utc::now();

        for def in permissions::ALL {
            let result = sqlx::query(
                r#"
                INSERT OR IGNORE INTO dyn_permissions
                    (id, key, resource, action, label, category, description, created_at, updated_at)
                VALUES (?, ?, ?, ?, ?, ?, NULL, ?, ?)
                "#,
            )
            .bind(Uuid::new_v4().to_string())
            .bind(def.name)
            .bind(def.key.resource())
            .bind(def.key.action())
            .bind(def.label)
            .bind(def.category.as_str())
            .bind(now)
            .bind(now)
            .execute(&self.pool)
            .await?;

            if result.rows_affected() > 0 {
                outcome.seeded.push(def.name.to_string());
            }
        }

        if let Some(company_id) = company_id {
            for def in permissions::ALL {
                let result = sqlx::query(
                    r#"
                    INSERT OR IGNORE INTO role_permission_rules
                        (company_id, role, permission, enabled, created_at, updated_at)
                    VALUES (?, ?, ?, 1, ?, ?)
                    "#,
                )
                .bind(company_id.to_string())
                .bind(RoleKey::TenantAdmin.as_str())
                .bind(def.name)
                .bind(now)
                .bind(now)
                .execute(&self.pool)
                .await?;

                outcome.admin_defaults += result.rows_affected();
            }
            self.invalidate(ScopeKey::Company(company_id));
        }

        Ok(outcome)
    }

    // =========================================================================
    // MATRIX CELLS
    // =========================================================================

    /// The committed tri-state cells of one role. Absent pairs are Unset.
    pub async fn matrix_for_role(&self, role_id: Uuid) -> AppResult<HashMap<Uuid, Effect>> {
        let rows: Vec<(String, String)> = sqlx::query_as(
            "SELECT permission_id, effect FROM dyn_role_permissions WHERE role_id = ?",
        )
        .bind(role_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        let mut matrix = HashMap::new();
        for (permission_id, effect) in rows {
            if let Ok(id) = Uuid::parse_str(&permission_id) {
                matrix.insert(id, Effect::from_db(&effect));
            }
        }
        Ok(matrix)
    }

    /// Full matrix joined against the permission catalog, for display.
    pub async fn matrix_cells(&self, role_id: Uuid) -> AppResult<Vec<MatrixCell>> {
        let rows: Vec<(String, String, String, String, Option<String>)> = sqlx::query_as(
            r#"
            SELECT p.id, p.key, p.label, p.category, rp.effect
            FROM dyn_permissions p
            LEFT JOIN dyn_role_permissions rp
                ON rp.permission_id = p.id AND rp.role_id = ?
            ORDER BY p.category, p.key
            "#,
        )
        .bind(role_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        let cells = rows
            .into_iter()
            .map(|(id, key, label, category, effect)| MatrixCell {
                permission_id: Uuid::parse_str(&id).unwrap_or_default(),
                key,
                label,
                category,
                effect: effect.as_deref().map(Effect::from_db).unwrap_or(Effect::Unset),
            })
            .collect();

        Ok(cells)
    }

    /// Upsert one explicit stance. Unset is not a persistable value; cells
    /// returning to Unset are removed via `clear_matrix_cell`.
    pub async fn set_matrix_cell(
        &self,
        role_id: Uuid,
        permission_id: Uuid,
        effect: Effect,
    ) -> AppResult<()> {
        if effect == Effect::Unset {
            return Err(AppError::bad_request("unset is stored as row absence"));
        }

        let now = Utc::now();
        sqlx::query(
            r#"
            INSERT INTO dyn_role_permissions (role_id, permission_id, effect, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT (role_id, permission_id)
            DO UPDATE SET effect = excluded.effect, updated_at = excluded.updated_at
            "#,
        )
        .bind(role_id.to_string())
        .bind(permission_id.to_string())
        .bind(effect.as_str())
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if let Some(company_id) = self.company_of_role(role_id).await? {
            self.invalidate(ScopeKey::Company(company_id));
        }
        Ok(())
    }

    pub async fn clear_matrix_cell(&self, role_id: Uuid, permission_id: Uuid) -> AppResult<bool> {
        let result = sqlx::query(
            "DELETE FROM dyn_role_permissions WHERE role_id = ? AND permission_id = ?",
        )
        .bind(role_id.to_string())
        .bind(permission_id.to_string())
        .execute(&self.pool)
        .await?;

        if let Some(company_id) = self.company_of_role(role_id).await? {
            self.invalidate(ScopeKey::Company(company_id));
        }
        Ok(result.rows_affected() > 0)
    }
}
