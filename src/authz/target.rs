use std::collections::BTreeSet;
use uuid::Uuid;

/// The resource an ability is checked against, as described by the caller.
///
/// The core never loads these itself; whoever holds the store fills in
/// the facts (role holders, requested roles) before asking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// An existing user and the role names they currently hold.
    User { id: Uuid, roles: BTreeSet<String> },
    /// A request to create a role named `name`.
    NewRole { name: String },
    /// An existing role and how many users hold it.
    Role { name: String, assigned_users: u64 },
    /// A request to rename a role.
    RoleRename { current: String, requested: String },
    /// An existing permission.
    Permission { name: String, guard: String },
    /// A request to replace a user's roles with `requested_roles`.
    RoleAssignment { user_id: Uuid, requested_roles: BTreeSet<String> },
}

impl Target {
    pub fn user<I, S>(id: Uuid, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Target::User {
            id,
            roles: roles.into_iter().map(Into::into).collect(),
        }
    }

    pub fn new_role(name: impl Into<String>) -> Self {
        Target::NewRole { name: name.into() }
    }

    pub fn role(name: impl Into<String>, assigned_users: u64) -> Self {
        Target::Role {
            name: name.into(),
            assigned_users,
        }
    }

    pub fn role_rename(current: impl Into<String>, requested: impl Into<String>) -> Self {
        Target::RoleRename {
            current: current.into(),
            requested: requested.into(),
        }
    }

    pub fn permission(name: impl Into<String>, guard: impl Into<String>) -> Self {
        Target::Permission {
            name: name.into(),
            guard: guard.into(),
        }
    }

    pub fn role_assignment<I, S>(user_id: Uuid, requested_roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Target::RoleAssignment {
            user_id,
            requested_roles: requested_roles.into_iter().map(Into::into).collect(),
        }
    }
}
