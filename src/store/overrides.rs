use chrono::Utc;
use uuid::Uuid;

use super::{RuleStore, ScopeKey};
use crate::errors::AppResult;
use crate::models::rbac::UserOverride;

impl RuleStore {
    pub async fn set_override(
        &self,
        user_id: Uuid,
        company_id: Uuid,
        permission: &str,
        granted: bool,
    ) -> AppResult<UserOverride> {
        let now = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO user_permission_overrides (user_id, company_id, permission, granted, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT (user_id, company_id, permission)
            DO UPDATE SET granted = excluded.granted, updated_at = excluded.updated_at
            "#,
        )
        .bind(user_id.to_string())
        .bind(company_id.to_string())
        .bind(permission)
        .bind(granted)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        let row = sqlx::query_as::<_, UserOverride>(
            r#"
            SELECT user_id, company_id, permission, granted, created_at, updated_at
            FROM user_permission_overrides
            WHERE user_id = ? AND company_id = ? AND permission = ?
            "#,
        )
        .bind(user_id.to_string())
        .bind(company_id.to_string())
        .bind(permission)
        .fetch_one(&self.pool)
        .await?;

        self.invalidate(ScopeKey::Company(company_id));
        Ok(row)
    }

    pub async fn clear_override(
        &self,
        user_id: Uuid,
        company_id: Uuid,
        permission: &str,
    ) -> AppResult<bool> {
        let result = sqlx::query(
            "DELETE FROM user_permission_overrides WHERE user_id = ? AND company_id = ? AND permission = ?",
        )
        .bind(user_id.to_string())
        .bind(company_id.to_string())
        .bind(permission)
        .execute(&self.pool)
        .await?;

        self.invalidate(ScopeKey::Company(company_id));
        Ok(result.rows_affected() > 0)
    }

    /// Overrides for one company, optionally narrowed to one user.
    pub async fn list_overrides(
        &self,
        company_id: Uuid,
        user_id: Option<Uuid>,
    ) -> AppResult<Vec<UserOverride>> {
        let rows = match user_id {
            Some(user_id) => {
                sqlx::query_as::<_, UserOverride>(
                    r#"
                    SELECT user_id, company_id, permission, granted, created_at, updated_at
                    FROM user_permission_overrides
                    WHERE company_id = ? AND user_id = ?
                    ORDER BY permission
                    "#,
                )
                .bind(company_id.to_string())
                .bind(user_id.to_string())
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, UserOverride>(
                    r#"
                    SELECT user_id, company_id, permission, granted, created_at, updated_at
                    FROM user_permission_overrides
                    WHERE company_id = ?
                    ORDER BY user_id, permission
                    "#,
                )
                .bind(company_id.to_string())
                .fetch_all(&self.pool)
                .await?
            }
        };

        Ok(rows)
    }
}
