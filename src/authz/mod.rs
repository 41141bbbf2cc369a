//! Authorization core: permission catalog, gate registry and evaluator.
//!
//! - Role-based permissions plus direct user grants
//! - Super-admin bypass as an explicit evaluation step
//! - Per-resource CRUD gates
//! - Guards for role assignment, role deletion, `admin.access` deletion and
//!   super-admin accounts

pub(crate) mod ability;
pub mod catalog;
mod decision;
mod error;
mod evaluator;
mod principal;
pub mod registrar;
mod registry;
pub mod rules;
mod target;

pub use ability::{Ability, CrudAction, ADMIN_ACCESS};
pub use decision::{Decision, DenyReason};
pub use error::{AuthzError, AuthzResult};
pub use evaluator::{Gate, PolicyEvaluator};
pub use principal::{PermissionRef, Principal, RoleGrant};
pub use registrar::{ensure_permissions_exist, permission_names, register_gates, DEFAULT_GUARD};
pub use registry::{GateRegistry, Predicate};
pub use target::Target;

/// Builds the registry used at startup: CRUD gates for every resource in
/// `resources`, then the built-in gates.
///
/// Built-ins go last so a configured `users` or `permissions` resource can
/// never replace a guarded gate such as `users.delete`.
pub fn build_registry<I, S>(guard: &str, resources: I) -> AuthzResult<GateRegistry>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut registry = GateRegistry::new();
    for resource in resources {
        register_gates(&mut registry, resource.as_ref(), guard)?;
    }
    rules::register_builtin_gates(&mut registry, guard)?;
    Ok(registry)
}

/// Well-known role names
pub mod roles {
    pub const SUPER_ADMIN: &str = "super-admin";
    pub const ADMIN: &str = "admin";
    pub const MANAGER: &str = "manager";

    pub const RESERVED: [&str; 3] = [SUPER_ADMIN, ADMIN, MANAGER];

    /// Reserved roles can be neither deleted nor renamed.
    pub fn is_reserved(name: &str) -> bool {
        RESERVED.contains(&name)
    }
}
