use chrono::Utc;
use uuid::Uuid;

use super::{RuleStore, ScopeKey};
use crate::catalog::RoleKey;
use crate::errors::AppResult;
use crate::models::rbac::RoleRule;

impl RuleStore {
    /// Upsert one cell of the boolean grid, keyed on the full triple.
    pub async fn set_role_rule(
        &self,
        company_id: Uuid,
        role: RoleKey,
        permission: &str,
        enabled: bool,
    ) -> AppResult<RoleRule> {
        let now = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO role_permission_rules (company_id, role, permission, enabled, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT (company_id, role, permission)
            DO UPDATE SET enabled = excluded.enabled, updated_at = excluded.updated_at
            "#,
        )
        .bind(company_id.to_string())
        .bind(role.as_str())
        .bind(permission)
        .bind(enabled)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        let rule = sqlx::query_as::<_, RoleRule>(
            r#"
            SELECT company_id, role, permission, enabled, created_at, updated_at
            FROM role_permission_rules
            WHERE company_id = ? AND role = ? AND permission = ?
            "#,
        )
        .bind(company_id.to_string())
        .bind(role.as_str())
        .bind(permission)
        .fetch_one(&self.pool)
        .await?;

        self.invalidate(ScopeKey::Company(company_id));
        Ok(rule)
    }

    /// Remove a cell outright. Returns whether a row existed.
    pub async fn clear_role_rule(
        &self,
        company_id: Uuid,
        role: RoleKey,
        permission: &str,
    ) -> AppResult<bool> {
        let result = sqlx::query(
            "DELETE FROM role_permission_rules WHERE company_id = ? AND role = ? AND permission = ?",
        )
        .bind(company_id.to_string())
        .bind(role.as_str())
        .bind(permission)
        .execute(&self.pool)
        .await?;

        self.invalidate(ScopeKey::Company(company_id));
        Ok(result.rows_affected() > 0)
    }

    pub async fn list_role_rules(
        &self,
        company_id: Uuid,
        role: Option<RoleKey>,
    ) -> AppResult<Vec<RoleRule>> {
        let rules = match role {
            Some(role) => {
                sqlx::query_as::<_, RoleRule>(
                    r#"
                    SELECT company_id, role, permission, enabled, created_at, updated_at
                    FROM role_permission_rules
                    WHERE company_id = ? AND role = ?
                    ORDER BY permission
                    "#,
                )
                .bind(company_id.to_string())
                .bind(role.as_str())
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, RoleRule>(
                    r#"
                    SELECT company_id, role, permission, enabled, created_at, updated_at
                    FROM role_permission_rules
                    WHERE company_id = ?
                    ORDER BY role, permission
                    "#,
                )
                .bind(company_id.to_string())
                .fetch_all(&self.pool)
                .await?
            }
        };

        Ok(rules)
    }
}
