//! CRUD gate registrar: the five-ability convention per resource.

use super::ability::{is_valid_resource, Ability, CrudAction};
use super::error::{AuthzError, AuthzResult};
use super::registry::GateRegistry;
use super::rules::permission_check;
use crate::models::rbac::Permission;
use crate::store::RbacStore;

pub const DEFAULT_GUARD: &str = "web";

/// `[r.viewAny, r.view, r.create, r.update, r.delete]` for resource `r`.
pub fn crud_abilities(resource: &str) -> AuthzResult<Vec<Ability>> {
    if !is_valid_resource(resource) {
        return Err(AuthzError::MalformedResource(resource.to_string()));
    }
    CrudAction::ALL
        .iter()
        .map(|action| Ability::crud(resource, *action))
        .collect()
}

pub fn permission_names(resource: &str) -> AuthzResult<Vec<String>> {
    Ok(crud_abilities(resource)?
        .into_iter()
        .map(String::from)
        .collect())
}

/// Binds each CRUD ability of `resource` to a check of the same-named
/// permission in `guard`. Re-registering replaces the previous gates.
pub fn register_gates(registry: &mut GateRegistry, resource: &str, guard: &str) -> AuthzResult<()> {
    for ability in crud_abilities(resource)? {
        let permission = ability.as_str().to_string();
        let guard = guard.to_string();
        registry.define(&ability, move |principal, _target| {
            permission_check(principal, &permission, &guard)
        });
    }
    tracing::debug!(resource, guard, "crud gates registered");
    Ok(())
}

/// Creates whichever of the five CRUD permissions of `resource` are missing.
///
/// Returns the five permissions in canonical order, existing or new.
pub async fn ensure_permissions_exist<S>(store: &S, resource: &str, guard: &str) -> AuthzResult<Vec<Permission>>
where
    S: RbacStore + ?Sized,
{
    let mut permissions = Vec::with_capacity(CrudAction::ALL.len());
    for name in permission_names(resource)? {
        let (permission, created) = store.find_or_create_permission(&name, guard).await?;
        if created {
            tracing::info!(permission = %permission.name, guard, "permission created");
        }
        permissions.push(permission);
    }
    Ok(permissions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authz::principal::Principal;
    use crate::authz::{Gate, PolicyEvaluator};
    use uuid::Uuid;

    #[test]
    fn test_permission_names_order() {
        let names = permission_names("plantillas").unwrap();
        assert_eq!(
            names,
            vec![
                "plantillas.viewAny",
                "plantillas.view",
                "plantillas.create",
                "plantillas.update",
                "plantillas.delete",
            ]
        );
    }

    #[test]
    fn test_permission_names_rejects_bad_resource() {
        for bad in ["", "mail.accounts", "with space"] {
            assert!(matches!(permission_names(bad), Err(AuthzError::MalformedResource(_))));
        }
    }

    #[test]
    fn test_register_gates_checks_guard() {
        let mut registry = GateRegistry::new();
        register_gates(&mut registry, "firmas", "web").unwrap();
        register_gates(&mut registry, "firmas", "web").unwrap();
        assert_eq!(registry.len(), 5);

        let gate = Gate::new(registry);
        let view_any = Ability::parse("firmas.viewAny").unwrap();
        let web_user = Principal::new(Uuid::new_v4()).with_permissions(["firmas.viewAny"]);
        assert!(gate.can(&web_user, &view_any, None));

        let api_user = Principal::new(Uuid::new_v4()).with_direct_permissions([
            crate::authz::PermissionRef::new("firmas.viewAny", "api"),
        ]);
        assert!(!gate.can(&api_user, &view_any, None));
    }
}
