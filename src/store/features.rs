use chrono::Utc;
use uuid::Uuid;

use super::{RuleStore, ScopeKey};
use crate::errors::AppResult;
use crate::models::rbac::FeatureFlag;

impl RuleStore {
    /// Feature toggles commit immediately; there is no staged editing for
    /// them. Rare, high-impact, single-cell edits keep the simpler model.
    pub async fn set_feature(
        &self,
        company_id: Uuid,
        feature: &str,
        enabled: bool,
    ) -> AppResult<FeatureFlag> {
        let now = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO feature_flags (company_id, feature, enabled, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT (company_id, feature)
            DO UPDATE SET enabled = excluded.enabled, updated_at = excluded.updated_at
            "#,
        )
        .bind(company_id.to_string())
        .bind(feature)
        .bind(enabled)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        let flag = sqlx::query_as::<_, FeatureFlag>(
            r#"
            SELECT company_id, feature, enabled, created_at, updated_at
            FROM feature_flags
            WHERE company_id = ? AND feature = ?
            "#,
        )
        .bind(company_id.to_string())
        .bind(feature)
        .fetch_one(&self.pool)
        .await?;

        self.invalidate(ScopeKey::Company(company_id));
        Ok(flag)
    }

    pub async fn list_features(&self, company_id: Uuid) -> AppResult<Vec<FeatureFlag>> {
        let flags = sqlx::query_as::<_, FeatureFlag>(
            r#"
            SELECT company_id, feature, enabled, created_at, updated_at
            FROM feature_flags
            WHERE company_id = ?
            ORDER BY feature
            "#,
        )
        .bind(company_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        Ok(flags)
    }
}
