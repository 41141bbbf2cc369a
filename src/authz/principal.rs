use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

use super::registrar::DEFAULT_GUARD;

/// A permission as the evaluator sees it: a name inside a guard scope.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PermissionRef {
    pub name: String,
    pub guard: String,
}

impl PermissionRef {
    pub fn new(name: impl Into<String>, guard: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            guard: guard.into(),
        }
    }

    /// Permission in the default `web` guard.
    pub fn web(name: impl Into<String>) -> Self {
        Self::new(name, DEFAULT_GUARD)
    }
}

/// A role held by the principal, with the permissions it carries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleGrant {
    pub name: String,
    pub guard: String,
    pub permissions: HashSet<PermissionRef>,
}

impl RoleGrant {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            guard: DEFAULT_GUARD.to_string(),
            permissions: HashSet::new(),
        }
    }

    pub fn with_permissions<I, S>(mut self, perms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let guard = self.guard.clone();
        self.permissions
            .extend(perms.into_iter().map(|p| PermissionRef::new(p, guard.clone())));
        self
    }
}

/// Snapshot of the acting user: active flag, roles, and direct grants.
///
/// Nothing is cached: the effective set is recomputed from roles and direct
/// permissions on every lookup, so a snapshot answers the same way for as
/// long as it is held.
///
/// `guard` is the scope the user acts in. Only roles of that guard count
/// for role checks such as [`Principal::is_super_admin`].
#[derive(Debug, Clone)]
pub struct Principal {
    pub user_id: Uuid,
    pub guard: String,
    pub active: bool,
    pub roles: Vec<RoleGrant>,
    pub direct_permissions: HashSet<PermissionRef>,
}

impl Principal {
    pub fn new(user_id: Uuid) -> Self {
        Self {
            user_id,
            guard: DEFAULT_GUARD.to_string(),
            active: true,
            roles: Vec::new(),
            direct_permissions: HashSet::new(),
        }
    }

    pub fn with_guard(mut self, guard: impl Into<String>) -> Self {
        self.guard = guard.into();
        self
    }

    pub fn with_active(mut self, active: bool) -> Self {
        self.active = active;
        self
    }

    pub fn with_roles(mut self, roles: impl IntoIterator<Item = RoleGrant>) -> Self {
        self.roles = roles.into_iter().collect();
        self
    }

    pub fn with_role(mut self, role: RoleGrant) -> Self {
        self.roles.push(role);
        self
    }

    /// Direct grants in the default guard.
    pub fn with_permissions<I, S>(mut self, perms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.direct_permissions = perms.into_iter().map(PermissionRef::web).collect();
        self
    }

    pub fn with_direct_permissions(mut self, perms: impl IntoIterator<Item = PermissionRef>) -> Self {
        self.direct_permissions = perms.into_iter().collect();
        self
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Holds `role` in the principal's own guard.
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r.name == role && r.guard == self.guard)
    }

    pub fn is_super_admin(&self) -> bool {
        self.has_role(super::roles::SUPER_ADMIN)
    }

    /// Membership test against the effective set (role grants ∪ direct grants).
    pub fn has_permission(&self, name: &str, guard: &str) -> bool {
        let wanted = |p: &PermissionRef| p.name == name && p.guard == guard;
        self.direct_permissions.iter().any(wanted)
            || self.roles.iter().any(|r| r.permissions.iter().any(wanted))
    }

    pub fn effective_permissions(&self) -> HashSet<PermissionRef> {
        self.roles
            .iter()
            .flat_map(|r| r.permissions.iter().cloned())
            .chain(self.direct_permissions.iter().cloned())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effective_set_is_union() {
        let principal = Principal::new(Uuid::new_v4())
            .with_role(RoleGrant::new("manager").with_permissions(["users.view"]))
            .with_permissions(["contacts.view", "users.view"]);

        let effective = principal.effective_permissions();
        assert_eq!(effective.len(), 2);
        assert!(principal.has_permission("users.view", "web"));
        assert!(principal.has_permission("contacts.view", "web"));
        assert!(!principal.has_permission("users.view", "api"));
    }

    #[test]
    fn test_super_admin_detection() {
        let principal = Principal::new(Uuid::new_v4()).with_role(RoleGrant::new("super-admin"));
        assert!(principal.is_super_admin());
        assert!(!Principal::new(Uuid::new_v4()).is_super_admin());
    }

    #[test]
    fn test_roles_of_other_guards_do_not_count() {
        let mut foreign = RoleGrant::new("super-admin");
        foreign.guard = "api".to_string();
        let principal = Principal::new(Uuid::new_v4()).with_role(foreign);

        assert!(!principal.has_role("super-admin"));
        assert!(!principal.is_super_admin());
        assert!(principal.clone().with_guard("api").is_super_admin());
    }
}
