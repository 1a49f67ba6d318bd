use chrono::Utc;

use super::{RuleStore, ScopeKey};
use crate::catalog::RoleKey;
use crate::errors::AppResult;
use crate::models::rbac::PlatformRule;

impl RuleStore {
    pub async fn set_platform_rule(
        &self,
        role: RoleKey,
        permission: &str,
        enabled: bool,
    ) -> AppResult<PlatformRule> {
        let now = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO platform_permission_rules (role, permission, enabled, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT (role, permission)
            DO UPDATE SET enabled = excluded.enabled, updated_at = excluded.updated_at
            "#,
        )
        .bind(role.as_str())
        .bind(permission)
        .bind(enabled)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        let rule = sqlx::query_as::<_, PlatformRule>(
            r#"
            SELECT role, permission, enabled, created_at, updated_at
            FROM platform_permission_rules
            WHERE role = ? AND permission = ?
            "#,
        )
        .bind(role.as_str())
        .bind(permission)
        .fetch_one(&self.pool)
        .await?;

        self.invalidate(ScopeKey::Platform);
        Ok(rule)
    }

    pub async fn clear_platform_rule(&self, role: RoleKey, permission: &str) -> AppResult<bool> {
        let result =
            sqlx::query("DELETE FROM platform_permission_rules WHERE role = ? AND permission = ?")
                .bind(role.as_str())
                .bind(permission)
                .execute(&self.pool)
                .await?;

        self.invalidate(ScopeKey::Platform);
        Ok(result.rows_affected() > 0)
    }

    pub async fn list_platform_rules(&self) -> AppResult<Vec<PlatformRule>> {
        let rules = sqlx::query_as::<_, PlatformRule>(
            r#"
            SELECT role, permission, enabled, created_at, updated_at
            FROM platform_permission_rules
            ORDER BY role, permission
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rules)
    }
}
