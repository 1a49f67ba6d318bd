use async_trait::async_trait;
use serde::Serialize;
use std::collections::BTreeSet;
use utoipa::ToSchema;

use super::{Actor, Effect};
use crate::catalog::menu as menu_catalog;
use crate::catalog::permissions::MANAGE_EVERYTHING;
use crate::catalog::RoleKey;
use crate::errors::AppResult;
use crate::models::menu::MenuEntry;
use crate::store::RuleStore;

/// The rule layer that settled a permission check. Returned alongside the
/// boolean so admin tooling can explain a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum DecisionLayer {
    Unauthenticated,
    MissingCompany,
    PlatformRule,
    TenantRule,
    DynamicRule,
    Override,
    SuperDefault,
    DefaultDeny,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub allowed: bool,
    pub layer: DecisionLayer,
}

impl Decision {
    fn allow(layer: DecisionLayer) -> Self {
        Self { allowed: true, layer }
    }

    fn deny(layer: DecisionLayer) -> Self {
        Self { allowed: false, layer }
    }

    fn from_rule(enabled: bool, layer: DecisionLayer) -> Self {
        Self { allowed: enabled, layer }
    }
}

/// Seam for callers that only need yes/no decisions (route guards, tests).
#[async_trait]
pub trait PolicyResolver: Send + Sync {
    async fn decide(&self, actor: Option<&Actor>, permission: &str) -> AppResult<Decision>;
}

/// Resolution engine.
///
/// Evaluation order, short-circuiting on the first definitive answer:
/// 1. no identity -> deny
/// 2. super_admin: platform rule -> tenant rule (when company-scoped) ->
///    allow by default
/// 3. tenant actor without company scope -> deny
/// 4. user override -> its boolean, final
/// 5. dynamic tri-state stance across held dynamic roles (Deny wins over
///    Allow; Unset falls through)
/// 6. boolean tenant role rule -> its boolean
/// 7. deny
///
/// The super-role is permissive by default so an incomplete catalog sync can
/// never lock out platform operations; tenant roles are default-deny so an
/// unconfigured gap never grants capability. Feature flags are a separate
/// axis: callers gating a feature-scoped action must check `has_feature`
/// themselves, the engine performs no implicit AND.
#[derive(Clone)]
pub struct AuthzEngine {
    store: RuleStore,
}

impl AuthzEngine {
    pub fn new(store: RuleStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &RuleStore {
        &self.store
    }

    pub async fn has_permission(&self, actor: &Actor, permission: &str) -> AppResult<bool> {
        Ok(self.decide(Some(actor), permission).await?.allowed)
    }

    /// AND/OR fold over `has_permission`. An empty key list is false in
    /// either mode.
    pub async fn has_any_permission(
        &self,
        actor: &Actor,
        permissions: &[&str],
        require_all: bool,
    ) -> AppResult<bool> {
        if permissions.is_empty() {
            return Ok(false);
        }

        for permission in permissions {
            let allowed = self.has_permission(actor, permission).await?;
            match (require_all, allowed) {
                (true, false) => return Ok(false),
                (false, true) => return Ok(true),
                _ => {}
            }
        }
        Ok(require_all)
    }

    /// Whether a company-level capability is switched on. The super-role is
    /// never feature-gated.
    pub async fn has_feature(&self, actor: &Actor, feature: &str) -> AppResult<bool> {
        if actor.is_super_admin() {
            return Ok(true);
        }
        let Some(company_id) = actor.company_id else {
            return Ok(false);
        };

        let snapshot = self.store.company_snapshot(company_id).await?;
        Ok(snapshot.feature(feature).unwrap_or(false))
    }

    /// Every permission key currently granted to the actor.
    ///
    /// For tenant actors the set starts from enabled role rules, folds in
    /// dynamic stances, then applies overrides as a final pass — an override
    /// adds its key when granted and removes it when revoked, so overrides
    /// win regardless of iteration order.
    pub async fn granted_permissions(&self, actor: &Actor) -> AppResult<BTreeSet<String>> {
        let mut granted = BTreeSet::new();

        if actor.is_super_admin() {
            let platform = self.store.platform_snapshot().await?;
            for key in platform.granted_keys(actor.role) {
                granted.insert(key.to_string());
            }
            if let Some(company_id) = actor.company_id {
                let snapshot = self.store.company_snapshot(company_id).await?;
                for key in snapshot.enabled_keys(actor.role) {
                    granted.insert(key.to_string());
                }
            }
            granted.insert(MANAGE_EVERYTHING.to_string());
            return Ok(granted);
        }

        let Some(company_id) = actor.company_id else {
            return Ok(granted);
        };
        let snapshot = self.store.company_snapshot(company_id).await?;

        for key in snapshot.enabled_keys(actor.role) {
            granted.insert(key.to_string());
        }

        for (key, effect) in snapshot.dynamic_stances_for(actor.user_id) {
            match effect {
                Effect::Allow => {
                    granted.insert(key.to_string());
                }
                Effect::Deny => {
                    granted.remove(key);
                }
                Effect::Unset => {}
            }
        }

        for (key, is_granted) in snapshot.overrides_for(actor.user_id) {
            if is_granted {
                granted.insert(key.to_string());
            } else {
                granted.remove(key);
            }
        }

        Ok(granted)
    }

    /// Menu gate: opt-out, the opposite default from permissions. An
    /// unconfigured item is visible; the super-role sees everything.
    pub async fn is_visible(&self, role: RoleKey, item_key: &str) -> AppResult<bool> {
        if role.is_super_admin() {
            return Ok(true);
        }

        let rule = self.store.menu_rule(role, item_key).await?;
        Ok(rule.map(|r| r.is_visible).unwrap_or(true))
    }

    /// The resolved navigation for a role: catalog items with visibility
    /// rules applied, hidden entries dropped, custom labels and ordering
    /// honored.
    pub async fn menu_for_role(&self, role: RoleKey) -> AppResult<Vec<MenuEntry>> {
        let rules = self.store.menu_rules_for_role(role).await?;

        let mut entries = Vec::new();
        for item in menu_catalog::ITEMS {
            let rule = rules.iter().find(|r| r.item_key == item.key);

            if !role.is_super_admin() {
                if let Some(rule) = rule {
                    if !rule.is_visible {
                        continue;
                    }
                }
            }

            let label = rule
                .and_then(|r| r.custom_label.clone())
                .unwrap_or_else(|| item.label.to_string());
            let icon = rule
                .and_then(|r| r.custom_icon.clone())
                .unwrap_or_else(|| item.icon.to_string());
            let heading_group = rule
                .and_then(|r| r.heading_group.clone())
                .or_else(|| item.heading_group.map(String::from));
            let sort_order = rule.map(|r| r.sort_order).unwrap_or(item.default_order);

            entries.push(MenuEntry {
                key: item.key.to_string(),
                label,
                icon,
                heading_group,
                sort_order,
            });
        }

        entries.sort_by(|a, b| a.sort_order.cmp(&b.sort_order).then_with(|| a.key.cmp(&b.key)));
        Ok(entries)
    }

    async fn resolve(&self, actor: Option<&Actor>, permission: &str) -> AppResult<Decision> {
        let Some(actor) = actor else {
            return Ok(Decision::deny(DecisionLayer::Unauthenticated));
        };

        if actor.is_super_admin() {
            let platform = self.store.platform_snapshot().await?;
            if let Some(enabled) = platform.rule(actor.role, permission) {
                return Ok(Decision::from_rule(enabled, DecisionLayer::PlatformRule));
            }

            if let Some(company_id) = actor.company_id {
                let snapshot = self.store.company_snapshot(company_id).await?;
                if let Some(enabled) = snapshot.role_rule(actor.role, permission) {
                    return Ok(Decision::from_rule(enabled, DecisionLayer::TenantRule));
                }
            }

            return Ok(Decision::allow(DecisionLayer::SuperDefault));
        }

        let Some(company_id) = actor.company_id else {
            return Ok(Decision::deny(DecisionLayer::MissingCompany));
        };
        let snapshot = self.store.company_snapshot(company_id).await?;

        if let Some(granted) = snapshot.override_for(actor.user_id, permission) {
            return Ok(Decision::from_rule(granted, DecisionLayer::Override));
        }

        match snapshot.dynamic_stance(actor.user_id, permission) {
            Effect::Allow => return Ok(Decision::allow(DecisionLayer::DynamicRule)),
            Effect::Deny => return Ok(Decision::deny(DecisionLayer::DynamicRule)),
            Effect::Unset => {}
        }

        if let Some(enabled) = snapshot.role_rule(actor.role, permission) {
            return Ok(Decision::from_rule(enabled, DecisionLayer::TenantRule));
        }

        Ok(Decision::deny(DecisionLayer::DefaultDeny))
    }
}

#[async_trait]
impl PolicyResolver for AuthzEngine {
    async fn decide(&self, actor: Option<&Actor>, permission: &str) -> AppResult<Decision> {
        let decision = self.resolve(actor, permission).await?;
        tracing::debug!(
            user_id = ?actor.map(|a| a.user_id),
            permission = %permission,
            allowed = decision.allowed,
            layer = ?decision.layer,
            "permission decision"
        );
        Ok(decision)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::features;
    use sqlx::sqlite::SqlitePoolOptions;
    use uuid::Uuid;

    const APPROVE_HW: &str = "hardware_requests.approve";
    const SUBMIT_NEWSLETTER: &str = "newsletters.submit";

    async fn engine() -> AuthzEngine {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("in-memory sqlite");
        sqlx::migrate!().run(&pool).await.expect("migrations");
        AuthzEngine::new(RuleStore::new(pool))
    }

    fn tenant(role: RoleKey, company: Uuid) -> Actor {
        Actor::new(Uuid::new_v4(), role, Some(company))
    }

    #[tokio::test]
    async fn unauthenticated_is_denied() {
        let engine = engine().await;
        let decision = engine.decide(None, APPROVE_HW).await.unwrap();
        assert!(!decision.allowed);
        assert_eq!(decision.layer, DecisionLayer::Unauthenticated);
    }

    #[tokio::test]
    async fn tenant_roles_default_to_deny() {
        let engine = engine().await;
        let actor = tenant(RoleKey::Manager, Uuid::new_v4());

        let decision = engine.decide(Some(&actor), APPROVE_HW).await.unwrap();
        assert!(!decision.allowed);
        assert_eq!(decision.layer, DecisionLayer::DefaultDeny);
    }

    #[tokio::test]
    async fn super_admin_defaults_to_allow() {
        let engine = engine().await;
        let actor = Actor::new(Uuid::new_v4(), RoleKey::SuperAdmin, None);

        let decision = engine.decide(Some(&actor), APPROVE_HW).await.unwrap();
        assert!(decision.allowed);
        assert_eq!(decision.layer, DecisionLayer::SuperDefault);
    }

    #[tokio::test]
    async fn platform_rule_can_restrict_super_admin() {
        let engine = engine().await;
        let actor = Actor::new(Uuid::new_v4(), RoleKey::SuperAdmin, None);

        engine
            .store()
            .set_platform_rule(RoleKey::SuperAdmin, APPROVE_HW, false)
            .await
            .unwrap();

        let decision = engine.decide(Some(&actor), APPROVE_HW).await.unwrap();
        assert!(!decision.allowed);
        assert_eq!(decision.layer, DecisionLayer::PlatformRule);
    }

    #[tokio::test]
    async fn super_admin_falls_back_to_tenant_rule_in_company_scope() {
        let engine = engine().await;
        let company = Uuid::new_v4();
        let actor = Actor::new(Uuid::new_v4(), RoleKey::SuperAdmin, Some(company));

        engine
            .store()
            .set_role_rule(company, RoleKey::SuperAdmin, APPROVE_HW, false)
            .await
            .unwrap();

        let decision = engine.decide(Some(&actor), APPROVE_HW).await.unwrap();
        assert!(!decision.allowed);
        assert_eq!(decision.layer, DecisionLayer::TenantRule);
    }

    #[tokio::test]
    async fn tenant_actor_without_company_is_denied() {
        let engine = engine().await;
        let actor = Actor::new(Uuid::new_v4(), RoleKey::Manager, None);

        let decision = engine.decide(Some(&actor), APPROVE_HW).await.unwrap();
        assert!(!decision.allowed);
        assert_eq!(decision.layer, DecisionLayer::MissingCompany);
    }

    #[tokio::test]
    async fn role_rule_grants_and_override_wins() {
        let engine = engine().await;
        let company = Uuid::new_v4();
        let actor = tenant(RoleKey::Manager, company);

        engine
            .store()
            .set_role_rule(company, RoleKey::Manager, APPROVE_HW, true)
            .await
            .unwrap();
        assert!(engine.has_permission(&actor, APPROVE_HW).await.unwrap());

        // A revoking override beats the enabled role rule; the rule row
        // itself is untouched.
        engine
            .store()
            .set_override(actor.user_id, company, APPROVE_HW, false)
            .await
            .unwrap();
        let decision = engine.decide(Some(&actor), APPROVE_HW).await.unwrap();
        assert!(!decision.allowed);
        assert_eq!(decision.layer, DecisionLayer::Override);

        let rules = engine
            .store()
            .list_role_rules(company, Some(RoleKey::Manager))
            .await
            .unwrap();
        assert!(rules.iter().any(|r| r.permission == APPROVE_HW && r.enabled));
    }

    #[tokio::test]
    async fn granting_override_beats_disabled_role_rule() {
        let engine = engine().await;
        let company = Uuid::new_v4();
        let actor = tenant(RoleKey::Requester, company);

        engine
            .store()
            .set_role_rule(company, RoleKey::Requester, SUBMIT_NEWSLETTER, false)
            .await
            .unwrap();
        engine
            .store()
            .set_override(actor.user_id, company, SUBMIT_NEWSLETTER, true)
            .await
            .unwrap();

        let decision = engine.decide(Some(&actor), SUBMIT_NEWSLETTER).await.unwrap();
        assert!(decision.allowed);
        assert_eq!(decision.layer, DecisionLayer::Override);
    }

    #[tokio::test]
    async fn feature_gating_is_independent_of_permissions() {
        let engine = engine().await;
        let company = Uuid::new_v4();
        let actor = tenant(RoleKey::Marketing, company);

        engine
            .store()
            .set_role_rule(company, RoleKey::Marketing, SUBMIT_NEWSLETTER, true)
            .await
            .unwrap();
        engine
            .store()
            .set_feature(company, features::MONTHLY_NEWSLETTER, false)
            .await
            .unwrap();

        // The permission stays granted even though the owning feature is
        // off; combining the two checks is the caller's contract.
        assert!(engine.has_permission(&actor, SUBMIT_NEWSLETTER).await.unwrap());
        assert!(!engine
            .has_feature(&actor, features::MONTHLY_NEWSLETTER)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn features_default_off_and_super_admin_bypasses() {
        let engine = engine().await;
        let company = Uuid::new_v4();
        let actor = tenant(RoleKey::Manager, company);

        assert!(!engine.has_feature(&actor, features::DIRECTORY_SYNC).await.unwrap());

        engine
            .store()
            .set_feature(company, features::DIRECTORY_SYNC, true)
            .await
            .unwrap();
        assert!(engine.has_feature(&actor, features::DIRECTORY_SYNC).await.unwrap());

        let root = Actor::new(Uuid::new_v4(), RoleKey::SuperAdmin, None);
        assert!(engine.has_feature(&root, features::DIRECTORY_SYNC).await.unwrap());
    }

    #[tokio::test]
    async fn has_any_permission_folds_correctly() {
        let engine = engine().await;
        let company = Uuid::new_v4();
        let actor = tenant(RoleKey::Manager, company);

        engine
            .store()
            .set_role_rule(company, RoleKey::Manager, APPROVE_HW, true)
            .await
            .unwrap();

        assert!(!engine.has_any_permission(&actor, &[], false).await.unwrap());
        assert!(!engine.has_any_permission(&actor, &[], true).await.unwrap());
        assert!(engine
            .has_any_permission(&actor, &[APPROVE_HW, SUBMIT_NEWSLETTER], false)
            .await
            .unwrap());
        assert!(!engine
            .has_any_permission(&actor, &[APPROVE_HW, SUBMIT_NEWSLETTER], true)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn unknown_permission_key_resolves_to_deny() {
        let engine = engine().await;
        let actor = tenant(RoleKey::Manager, Uuid::new_v4());

        assert!(!engine.has_permission(&actor, "tickets.reticulate").await.unwrap());
    }

    #[tokio::test]
    async fn granted_permissions_applies_overrides_last() {
        let engine = engine().await;
        let company = Uuid::new_v4();
        let actor = tenant(RoleKey::Manager, company);

        engine
            .store()
            .set_role_rule(company, RoleKey::Manager, APPROVE_HW, true)
            .await
            .unwrap();
        engine
            .store()
            .set_role_rule(company, RoleKey::Manager, "pages.view_reports", true)
            .await
            .unwrap();
        engine
            .store()
            .set_override(actor.user_id, company, APPROVE_HW, false)
            .await
            .unwrap();
        engine
            .store()
            .set_override(actor.user_id, company, SUBMIT_NEWSLETTER, true)
            .await
            .unwrap();

        let granted = engine.granted_permissions(&actor).await.unwrap();
        assert!(!granted.contains(APPROVE_HW));
        assert!(granted.contains("pages.view_reports"));
        assert!(granted.contains(SUBMIT_NEWSLETTER));
    }

    #[tokio::test]
    async fn super_admin_grant_set_carries_the_sentinel() {
        let engine = engine().await;
        let actor = Actor::new(Uuid::new_v4(), RoleKey::SuperAdmin, None);

        engine
            .store()
            .set_platform_rule(RoleKey::SuperAdmin, "reports.export", true)
            .await
            .unwrap();

        let granted = engine.granted_permissions(&actor).await.unwrap();
        assert!(granted.contains("reports.export"));
        assert!(granted.contains(crate::catalog::permissions::MANAGE_EVERYTHING));
    }

    #[tokio::test]
    async fn dynamic_deny_wins_across_held_roles() {
        let engine = engine().await;
        let company = Uuid::new_v4();
        let actor = tenant(RoleKey::Manager, company);
        let store = engine.store();

        store.sync_permission_catalog(None).await.unwrap();
        let permissions = store.list_dyn_permissions().await.unwrap();
        let approve = permissions.iter().find(|p| p.key == APPROVE_HW).unwrap();

        let allower = store.create_dyn_role(company, "approvers", None).await.unwrap();
        let denier = store.create_dyn_role(company, "contractors", None).await.unwrap();
        store.set_matrix_cell(allower.id, approve.id, Effect::Allow).await.unwrap();
        store.set_matrix_cell(denier.id, approve.id, Effect::Deny).await.unwrap();

        store.assign_dyn_role(actor.user_id, allower.id).await.unwrap();
        let decision = engine.decide(Some(&actor), APPROVE_HW).await.unwrap();
        assert!(decision.allowed);
        assert_eq!(decision.layer, DecisionLayer::DynamicRule);

        // Holding a second, denying role flips the stance: Deny beats Allow
        // regardless of which assignment came first.
        store.assign_dyn_role(actor.user_id, denier.id).await.unwrap();
        let decision = engine.decide(Some(&actor), APPROVE_HW).await.unwrap();
        assert!(!decision.allowed);
        assert_eq!(decision.layer, DecisionLayer::DynamicRule);
    }

    #[tokio::test]
    async fn dynamic_stance_outranks_role_rule_but_yields_to_override() {
        let engine = engine().await;
        let company = Uuid::new_v4();
        let actor = tenant(RoleKey::Manager, company);
        let store = engine.store();

        store.sync_permission_catalog(None).await.unwrap();
        let permissions = store.list_dyn_permissions().await.unwrap();
        let approve = permissions.iter().find(|p| p.key == APPROVE_HW).unwrap();

        store
            .set_role_rule(company, RoleKey::Manager, APPROVE_HW, true)
            .await
            .unwrap();
        let denier = store.create_dyn_role(company, "frozen", None).await.unwrap();
        store.set_matrix_cell(denier.id, approve.id, Effect::Deny).await.unwrap();
        store.assign_dyn_role(actor.user_id, denier.id).await.unwrap();

        let decision = engine.decide(Some(&actor), APPROVE_HW).await.unwrap();
        assert!(!decision.allowed);
        assert_eq!(decision.layer, DecisionLayer::DynamicRule);

        store
            .set_override(actor.user_id, company, APPROVE_HW, true)
            .await
            .unwrap();
        let decision = engine.decide(Some(&actor), APPROVE_HW).await.unwrap();
        assert!(decision.allowed);
        assert_eq!(decision.layer, DecisionLayer::Override);
    }

    #[tokio::test]
    async fn menu_items_default_to_visible_and_rules_hide_them() {
        let engine = engine().await;

        assert!(engine.is_visible(RoleKey::Requester, "reports").await.unwrap());

        engine
            .store()
            .set_menu_rule(RoleKey::Requester, "reports", false, 60, None, None, None)
            .await
            .unwrap();
        assert!(!engine.is_visible(RoleKey::Requester, "reports").await.unwrap());

        // The super-role ignores visibility rules.
        engine
            .store()
            .set_menu_rule(RoleKey::SuperAdmin, "reports", false, 60, None, None, None)
            .await
            .unwrap();
        assert!(engine.is_visible(RoleKey::SuperAdmin, "reports").await.unwrap());

        // Unknown item keys fall back to the default too.
        assert!(engine.is_visible(RoleKey::Requester, "time_machine").await.unwrap());
    }

    #[tokio::test]
    async fn menu_honors_custom_labels_and_ordering() {
        let engine = engine().await;

        engine
            .store()
            .set_menu_rule(
                RoleKey::Requester,
                "reports",
                true,
                -1,
                Some("Insights"),
                None,
                None,
            )
            .await
            .unwrap();
        engine
            .store()
            .set_menu_rule(RoleKey::Requester, "tickets", false, 10, None, None, None)
            .await
            .unwrap();

        let entries = engine.menu_for_role(RoleKey::Requester).await.unwrap();
        assert_eq!(entries[0].key, "reports");
        assert_eq!(entries[0].label, "Insights");
        assert!(entries.iter().all(|e| e.key != "tickets"));
    }

    #[tokio::test]
    async fn unset_dynamic_stance_falls_through_to_role_rule() {
        let engine = engine().await;
        let company = Uuid::new_v4();
        let actor = tenant(RoleKey::Manager, company);
        let store = engine.store();

        store.sync_permission_catalog(None).await.unwrap();
        let permissions = store.list_dyn_permissions().await.unwrap();
        let approve = permissions.iter().find(|p| p.key == APPROVE_HW).unwrap();

        let role = store.create_dyn_role(company, "floaters", None).await.unwrap();
        store.set_matrix_cell(role.id, approve.id, Effect::Allow).await.unwrap();
        store.clear_matrix_cell(role.id, approve.id).await.unwrap();
        store.assign_dyn_role(actor.user_id, role.id).await.unwrap();

        store
            .set_role_rule(company, RoleKey::Manager, APPROVE_HW, true)
            .await
            .unwrap();

        let decision = engine.decide(Some(&actor), APPROVE_HW).await.unwrap();
        assert!(decision.allowed);
        assert_eq!(decision.layer, DecisionLayer::TenantRule);
    }
}
