//! Evaluator pre-rules and the ability-specific guards layered onto gates.

use super::ability::{Ability, ADMIN_ACCESS};
use super::catalog;
use super::decision::{Decision, DenyReason};
use super::error::AuthzResult;
use super::principal::Principal;
use super::registry::GateRegistry;
use super::roles;
use super::target::Target;

/// A step the evaluator runs before looking up the ability's gate.
///
/// Returning `Some` ends evaluation with that decision; `None` hands over
/// to the next step.
pub trait Rule: Send + Sync {
    fn name(&self) -> &'static str;

    fn apply(&self, principal: &Principal, ability: &Ability, target: Option<&Target>) -> Option<Decision>;
}

/// Inactive accounts fail everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct ActiveAccount;

impl Rule for ActiveAccount {
    fn name(&self) -> &'static str {
        "active_account"
    }

    fn apply(&self, principal: &Principal, _ability: &Ability, _target: Option<&Target>) -> Option<Decision> {
        (!principal.is_active()).then_some(Decision::Deny(DenyReason::AccountInactive))
    }
}

/// Reserved roles are never deleted or renamed, no role may be created
/// under or renamed to a reserved name, and roles still held by users are
/// never deleted. Applies to super-admins as well.
#[derive(Debug, Clone, Copy, Default)]
pub struct RoleIntegrity;

impl Rule for RoleIntegrity {
    fn name(&self) -> &'static str {
        "role_integrity"
    }

    fn apply(&self, _principal: &Principal, ability: &Ability, target: Option<&Target>) -> Option<Decision> {
        let blocked = match (ability.as_str(), target?) {
            (ROLES_DELETE, Target::Role { name, assigned_users }) => {
                roles::is_reserved(name) || *assigned_users > 0
            }
            (ROLES_CREATE, Target::NewRole { name }) => roles::is_reserved(name),
            (ROLES_UPDATE, Target::RoleRename { current, requested }) => {
                current != requested && (roles::is_reserved(current) || roles::is_reserved(requested))
            }
            _ => false,
        };
        blocked.then_some(Decision::Deny(DenyReason::ReferentialIntegrityBlocked))
    }
}

/// Super-admins pass every remaining check, registered or not.
#[derive(Debug, Clone, Copy, Default)]
pub struct SuperAdminBypass;

impl Rule for SuperAdminBypass {
    fn name(&self) -> &'static str {
        "super_admin_bypass"
    }

    fn apply(&self, principal: &Principal, _ability: &Ability, _target: Option<&Target>) -> Option<Decision> {
        principal.is_super_admin().then_some(Decision::Allow)
    }
}

/// Pre-rules in evaluation order.
pub fn default_rules() -> Vec<Box<dyn Rule>> {
    vec![
        Box::new(ActiveAccount),
        Box::new(RoleIntegrity),
        Box::new(SuperAdminBypass),
    ]
}

pub const USERS_ASSIGN_ROLES: &str = "users.assign_roles";
pub const USERS_UPDATE: &str = "users.update";
pub const USERS_DEACTIVATE: &str = "users.deactivate";
pub const USERS_DELETE: &str = "users.delete";
pub const ROLES_CREATE: &str = "roles.create";
pub const ROLES_UPDATE: &str = "roles.update";
pub const ROLES_DELETE: &str = "roles.delete";
pub const PERMISSIONS_DELETE: &str = "permissions.delete";

/// Plain membership check of `permission` in `guard`.
pub fn permission_check(principal: &Principal, permission: &str, guard: &str) -> Decision {
    Decision::from_bool(principal.has_permission(permission, guard))
}

/// Only super-admins may hand out `super-admin`, to others or to themselves.
pub fn role_assignment_guard(principal: &Principal, target: Option<&Target>) -> Decision {
    match target {
        Some(Target::RoleAssignment { requested_roles, .. })
            if requested_roles.contains(roles::SUPER_ADMIN) && !principal.is_super_admin() =>
        {
            Decision::Deny(DenyReason::PrivilegeEscalationBlocked)
        }
        _ => Decision::Allow,
    }
}

/// `admin.access` may only be deleted by a super-admin.
pub fn permission_deletion_guard(principal: &Principal, target: Option<&Target>) -> Decision {
    match target {
        Some(Target::Permission { name, .. }) if name == ADMIN_ACCESS && !principal.is_super_admin() => {
            Decision::Deny(DenyReason::PrivilegeEscalationBlocked)
        }
        _ => Decision::Allow,
    }
}

/// Accounts holding `super-admin` are managed only by super-admins.
pub fn super_admin_protection(principal: &Principal, target: Option<&Target>) -> Decision {
    match target {
        Some(Target::User { roles: held, .. })
            if held.contains(roles::SUPER_ADMIN) && !principal.is_super_admin() =>
        {
            Decision::Deny(DenyReason::PrivilegeEscalationBlocked)
        }
        _ => Decision::Allow,
    }
}

/// Registers a gate for every catalog permission, plus `users.delete`.
///
/// Each gate checks the same-named permission in `guard`; the guarded
/// abilities layer their extra rule after that check. Without a target
/// the extra rules allow.
pub fn register_builtin_gates(registry: &mut GateRegistry, guard: &str) -> AuthzResult<()> {
    for name in catalog::permission_names() {
        let ability = Ability::parse(name)?;
        let permission = name.to_string();
        let guard = guard.to_string();

        match name {
            USERS_ASSIGN_ROLES => registry.define(&ability, move |principal, target| {
                permission_check(principal, &permission, &guard)
                    .and_then(|| role_assignment_guard(principal, target))
            }),
            USERS_UPDATE | USERS_DEACTIVATE => registry.define(&ability, move |principal, target| {
                permission_check(principal, &permission, &guard)
                    .and_then(|| super_admin_protection(principal, target))
            }),
            PERMISSIONS_DELETE => registry.define(&ability, move |principal, target| {
                permission_check(principal, &permission, &guard)
                    .and_then(|| permission_deletion_guard(principal, target))
            }),
            _ => registry.define(&ability, move |principal, _target| {
                permission_check(principal, &permission, &guard)
            }),
        }
    }

    // Deleting a user is gated by the update permission.
    let guard = guard.to_string();
    registry.define(&Ability::parse(USERS_DELETE)?, move |principal, target| {
        permission_check(principal, USERS_UPDATE, &guard)
            .and_then(|| super_admin_protection(principal, target))
    });

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authz::principal::RoleGrant;
    use uuid::Uuid;

    fn ability(name: &str) -> Ability {
        Ability::parse(name).unwrap()
    }

    #[test]
    fn test_active_account_rule() {
        let inactive = Principal::new(Uuid::new_v4()).with_active(false);
        let decision = ActiveAccount.apply(&inactive, &ability("users.view"), None);
        assert_eq!(decision, Some(Decision::Deny(DenyReason::AccountInactive)));

        let active = Principal::new(Uuid::new_v4());
        assert_eq!(ActiveAccount.apply(&active, &ability("users.view"), None), None);
    }

    #[test]
    fn test_role_integrity_blocks_reserved_and_in_use() {
        let anyone = Principal::new(Uuid::new_v4());
        let delete = ability(ROLES_DELETE);

        for target in [Target::role("admin", 0), Target::role("editor", 3)] {
            assert_eq!(
                RoleIntegrity.apply(&anyone, &delete, Some(&target)),
                Some(Decision::Deny(DenyReason::ReferentialIntegrityBlocked))
            );
        }
        assert_eq!(RoleIntegrity.apply(&anyone, &delete, Some(&Target::role("editor", 0))), None);
    }

    #[test]
    fn test_role_integrity_blocks_reserved_renames() {
        let anyone = Principal::new(Uuid::new_v4());
        let update = ability(ROLES_UPDATE);

        let rename = Target::role_rename("manager", "team-lead");
        assert!(RoleIntegrity.apply(&anyone, &update, Some(&rename)).is_some());

        let same = Target::role_rename("manager", "manager");
        assert_eq!(RoleIntegrity.apply(&anyone, &update, Some(&same)), None);

        let custom = Target::role_rename("editor", "writer");
        assert_eq!(RoleIntegrity.apply(&anyone, &update, Some(&custom)), None);

        let takeover = Target::role_rename("editor", "super-admin");
        assert_eq!(
            RoleIntegrity.apply(&anyone, &update, Some(&takeover)),
            Some(Decision::Deny(DenyReason::ReferentialIntegrityBlocked))
        );
    }

    #[test]
    fn test_role_integrity_blocks_reserved_names_on_create() {
        let root = Principal::new(Uuid::new_v4()).with_role(RoleGrant::new(roles::SUPER_ADMIN));
        let create = ability(ROLES_CREATE);

        for name in roles::RESERVED {
            assert_eq!(
                RoleIntegrity.apply(&root, &create, Some(&Target::new_role(name))),
                Some(Decision::Deny(DenyReason::ReferentialIntegrityBlocked)),
                "{name}"
            );
        }
        assert_eq!(RoleIntegrity.apply(&root, &create, Some(&Target::new_role("editor"))), None);
    }

    #[test]
    fn test_super_admin_bypass_rule() {
        let root = Principal::new(Uuid::new_v4()).with_role(RoleGrant::new(roles::SUPER_ADMIN));
        assert_eq!(
            SuperAdminBypass.apply(&root, &ability("any.thing"), None),
            Some(Decision::Allow)
        );
    }

    #[test]
    fn test_role_assignment_guard() {
        let admin = Principal::new(Uuid::new_v4()).with_permissions([USERS_ASSIGN_ROLES]);
        let escalate = Target::role_assignment(Uuid::new_v4(), ["super-admin"]);
        let fine = Target::role_assignment(Uuid::new_v4(), ["manager"]);

        assert_eq!(
            role_assignment_guard(&admin, Some(&escalate)).reason(),
            Some(DenyReason::PrivilegeEscalationBlocked)
        );
        assert!(role_assignment_guard(&admin, Some(&fine)).is_allowed());
    }

    #[test]
    fn test_super_admin_protection() {
        let admin = Principal::new(Uuid::new_v4()).with_permissions([USERS_UPDATE]);
        let root_user = Target::user(Uuid::new_v4(), ["super-admin"]);
        let plain_user = Target::user(Uuid::new_v4(), ["manager"]);

        assert!(!super_admin_protection(&admin, Some(&root_user)).is_allowed());
        assert!(super_admin_protection(&admin, Some(&plain_user)).is_allowed());
    }

    #[test]
    fn test_builtin_gates_cover_catalog() {
        let mut registry = GateRegistry::new();
        register_builtin_gates(&mut registry, "web").unwrap();

        for name in catalog::permission_names() {
            assert!(registry.contains(&ability(name)), "{name} missing");
        }
        assert!(registry.contains(&ability(USERS_DELETE)));
        assert_eq!(registry.len(), catalog::permission_names().count() + 1);
    }
}
