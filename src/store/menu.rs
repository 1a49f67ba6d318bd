use chrono::Utc;

use super::RuleStore;
use crate::catalog::RoleKey;
use crate::errors::AppResult;
use crate::models::menu::MenuRule;

// Menu rules are platform-wide per (role, item) and are read directly
// rather than through the company snapshots, so no invalidation is needed.
impl RuleStore {
    pub async fn set_menu_rule(
        &self,
        role: RoleKey,
        item_key: &str,
        is_visible: bool,
        sort_order: i64,
        custom_label: Option<&str>,
        custom_icon: Option<&str>,
        heading_group: Option<&str>,
    ) -> AppResult<MenuRule> {
        let now = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO menu_visibility_rules
                (role, item_key, is_visible, sort_order, custom_label, custom_icon, heading_group, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (role, item_key)
            DO UPDATE SET
                is_visible = excluded.is_visible,
                sort_order = excluded.sort_order,
                custom_label = excluded.custom_label,
                custom_icon = excluded.custom_icon,
                heading_group = excluded.heading_group,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(role.as_str())
        .bind(item_key)
        .bind(is_visible)
        .bind(sort_order)
        .bind(custom_label)
        .bind(custom_icon)
        .bind(heading_group)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        let rule = sqlx::query_as::<_, MenuRule>(
            r#"
            SELECT role, item_key, is_visible, sort_order, custom_label, custom_icon, heading_group, created_at, updated_at
            FROM menu_visibility_rules
            WHERE role = ? AND item_key = ?
            "#,
        )
        .bind(role.as_str())
        .bind(item_key)
        .fetch_one(&self.pool)
        .await?;

        Ok(rule)
    }

    pub async fn clear_menu_rule(&self, role: RoleKey, item_key: &str) -> AppResult<bool> {
        let result =
            sqlx::query("DELETE FROM menu_visibility_rules WHERE role = ? AND item_key = ?")
                .bind(role.as_str())
                .bind(item_key)
                .execute(&self.pool)
                .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn menu_rule(&self, role: RoleKey, item_key: &str) -> AppResult<Option<MenuRule>> {
        let rule = sqlx::query_as::<_, MenuRule>(
            r#"
            SELECT role, item_key, is_visible, sort_order, custom_label, custom_icon, heading_group, created_at, updated_at
            FROM menu_visibility_rules
            WHERE role = ? AND item_key = ?
            "#,
        )
        .bind(role.as_str())
        .bind(item_key)
        .fetch_optional(&self.pool)
        .await?;

        Ok(rule)
    }

    pub async fn menu_rules_for_role(&self, role: RoleKey) -> AppResult<Vec<MenuRule>> {
        let rules = sqlx::query_as::<_, MenuRule>(
            r#"
            SELECT role, item_key, is_visible, sort_order, custom_label, custom_icon, heading_group, created_at, updated_at
            FROM menu_visibility_rules
            WHERE role = ?
            ORDER BY sort_order, item_key
            "#,
        )
        .bind(role.as_str())
        .fetch_all(&self.pool)
        .await?;

        Ok(rules)
    }
}
