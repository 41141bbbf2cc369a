//! Idempotent seeding of the permission catalog, the reserved roles and
//! the initial super-admin account.

use uuid::Uuid;

use crate::authz::roles::{ADMIN, MANAGER, SUPER_ADMIN};
use crate::authz::{catalog, permission_names, AuthzError, AuthzResult, ADMIN_ACCESS};
use crate::models::user::{NewUser, User};
use crate::store::RbacStore;

/// CRUD resources whose permissions exist from the first deploy.
pub const SEEDED_RESOURCES: [&str; 2] = ["mail-accounts", "contacts"];

const ADMIN_PERMISSIONS: &[&str] = &[
    ADMIN_ACCESS,
    "users.view",
    "users.create",
    "users.update",
    "users.deactivate",
    "users.assign_roles",
    "users.assign_permissions",
    "roles.view",
    "roles.create",
    "roles.update",
    "roles.assign_permissions",
    "permissions.view",
    "permissions.create",
    "permissions.update",
];

const MANAGER_PERMISSIONS: &[&str] = &["users.view"];

/// Creates missing catalog and seeded-resource permissions. Returns how many
/// were created.
pub async fn seed_permissions(store: &dyn RbacStore, guard: &str) -> AuthzResult<usize> {
    let mut names: Vec<String> = catalog::permission_names().map(str::to_string).collect();
    for resource in SEEDED_RESOURCES {
        names.extend(permission_names(resource)?);
    }

    let mut created = 0;
    for name in &names {
        if store.find_or_create_permission(name, guard).await?.1 {
            created += 1;
        }
    }

    tracing::info!(created, guard, "permissions seeded");
    Ok(created)
}

async fn permission_ids(store: &dyn RbacStore, names: &[&str], guard: &str) -> AuthzResult<Vec<Uuid>> {
    let mut ids = Vec::with_capacity(names.len());
    for name in names {
        let permission = store
            .find_permission_by_name(name, guard)
            .await?
            .ok_or_else(|| AuthzError::not_found(format!("permission {name} ({guard})")))?;
        ids.push(permission.id);
    }
    Ok(ids)
}

/// Creates the reserved roles and syncs their permission sets.
///
/// `super-admin` receives every permission of the guard, `admin` the
/// administrative set (no deletions of roles or permissions), `manager`
/// read access to users.
pub async fn seed_roles(store: &dyn RbacStore, guard: &str) -> AuthzResult<()> {
    let all: Vec<Uuid> = store
        .list_permissions()
        .await?
        .into_iter()
        .filter(|p| p.guard == guard)
        .map(|p| p.id)
        .collect();

    let (super_admin, _) = store.find_or_create_role(SUPER_ADMIN, guard).await?;
    store.sync_role_permissions(super_admin.id, &all).await?;

    let (admin, _) = store.find_or_create_role(ADMIN, guard).await?;
    let ids = permission_ids(store, ADMIN_PERMISSIONS, guard).await?;
    store.sync_role_permissions(admin.id, &ids).await?;

    let (manager, _) = store.find_or_create_role(MANAGER, guard).await?;
    let ids = permission_ids(store, MANAGER_PERMISSIONS, guard).await?;
    store.sync_role_permissions(manager.id, &ids).await?;

    tracing::info!(guard, "reserved roles seeded");
    Ok(())
}

pub async fn run(store: &dyn RbacStore, guard: &str) -> AuthzResult<()> {
    seed_permissions(store, guard).await?;
    seed_roles(store, guard).await
}

/// Creates or updates the account for `email`, activates it and grants it
/// `super-admin`. The role must already exist.
pub async fn setup_super_admin(
    store: &dyn RbacStore,
    guard: &str,
    email: &str,
    name: &str,
    password_hash: String,
) -> AuthzResult<User> {
    let role = store
        .find_role_by_name(SUPER_ADMIN, guard)
        .await?
        .ok_or_else(|| AuthzError::not_found(format!("role {SUPER_ADMIN}; run the seeder first")))?;

    let user_id = match store.find_user_by_email(email).await? {
        Some(existing) => {
            store
                .update_user_credentials(existing.user.id, name, &password_hash)
                .await?;
            store.set_user_active(existing.user.id, true).await?;
            existing.user.id
        }
        None => {
            store
                .create_user(NewUser {
                    name: name.to_string(),
                    email: email.to_string(),
                    password_hash,
                    is_active: true,
                })
                .await?
                .id
        }
    };

    store.assign_role(user_id, role.id).await?;
    tracing::info!(%user_id, email, "super-admin account ready");

    store
        .find_user(user_id)
        .await?
        .ok_or_else(|| AuthzError::not_found(format!("user {user_id}")))
}
