pub mod authz;
pub mod dynamic_rbac;
pub mod health;
pub mod menu;
pub mod rules;

use uuid::Uuid;

use crate::authz::{Actor, PolicyResolver};
use crate::errors::{AppError, AppResult};

/// 403 unless the actor holds the permission. Callers treat a deny as
/// hard-deny; there is no fallback rendering.
pub(crate) async fn require<P: PolicyResolver>(
    resolver: &P,
    actor: &Actor,
    permission: &str,
) -> AppResult<()> {
    let decision = resolver.decide(Some(actor), permission).await?;
    if decision.allowed {
        Ok(())
    } else {
        Err(AppError::forbidden(format!("requires {permission}")))
    }
}

/// The company a tenant-scoped operation applies to.
///
/// Tenant actors always operate on their own company; naming another one is
/// rejected. super_admin may name any company, and must name one when acting
/// outside a company scope.
pub(crate) fn resolve_company(actor: &Actor, explicit: Option<Uuid>) -> AppResult<Uuid> {
    if actor.is_super_admin() {
        return explicit
            .or(actor.company_id)
            .ok_or_else(|| AppError::bad_request("company_id is required outside a company scope"));
    }

    let own = actor
        .company_id
        .ok_or_else(|| AppError::forbidden("tenant operations require a company scope"))?;
    match explicit {
        Some(requested) if requested != own => {
            Err(AppError::forbidden("cannot operate on another company"))
        }
        _ => Ok(own),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::RoleKey;

    #[test]
    fn tenant_actor_is_pinned_to_its_own_company() {
        let company = Uuid::new_v4();
        let actor = Actor::new(Uuid::new_v4(), RoleKey::TenantAdmin, Some(company));

        assert_eq!(resolve_company(&actor, None).unwrap(), company);
        assert_eq!(resolve_company(&actor, Some(company)).unwrap(), company);
        assert!(resolve_company(&actor, Some(Uuid::new_v4())).is_err());
    }

    #[test]
    fn super_admin_must_name_a_company_outside_tenant_scope() {
        let actor = Actor::new(Uuid::new_v4(), RoleKey::SuperAdmin, None);
        assert!(resolve_company(&actor, None).is_err());

        let company = Uuid::new_v4();
        assert_eq!(resolve_company(&actor, Some(company)).unwrap(), company);
    }
}
