//! Administrative operations over roles, permissions and user access.
//!
//! Every operation authorizes the acting [`Principal`] through the gate
//! first, describing the affected resource as a [`Target`], then mutates
//! the store and publishes an audit event. Blocked attempts are logged at
//! `warn`.

use std::sync::Arc;

use uuid::Uuid;

use crate::authz::rules::{
    PERMISSIONS_DELETE, ROLES_CREATE, ROLES_DELETE, ROLES_UPDATE, USERS_ASSIGN_ROLES, USERS_DEACTIVATE,
    USERS_DELETE, USERS_UPDATE,
};
use crate::authz::{
    Ability, AuthzError, AuthzResult, Gate, PolicyEvaluator, Principal, Target,
};
use crate::events::{log_activity, EventBus};
use crate::models::rbac::{
    CanResponse, EffectivePermissions, Permission, PermissionView, Role, RolePermissionSync,
    UserAccessSync,
};
use crate::models::user::{NewUser, User, UserFilter};
use crate::store::RbacStore;

const ROLES_VIEW: &str = "roles.view";
const ROLES_ASSIGN_PERMISSIONS: &str = "roles.assign_permissions";
const PERMISSIONS_VIEW: &str = "permissions.view";
const PERMISSIONS_CREATE: &str = "permissions.create";
const USERS_VIEW: &str = "users.view";
const USERS_CREATE: &str = "users.create";
const USERS_ASSIGN_PERMISSIONS: &str = "users.assign_permissions";

const MAX_FIELD_LENGTH: usize = 255;

/// Trimmed name and email, or a validation error.
fn user_profile(name: &str, email: &str) -> AuthzResult<(String, String)> {
    let name = name.trim();
    let email = email.trim();

    if name.is_empty() || name.chars().count() > MAX_FIELD_LENGTH {
        return Err(AuthzError::validation(format!("name must be 1 to {MAX_FIELD_LENGTH} characters")));
    }
    let well_formed = matches!(
        email.split_once('@'),
        Some((local, domain)) if !local.is_empty() && domain.contains('.') && !domain.contains('@')
    );
    if !well_formed || email.chars().count() > MAX_FIELD_LENGTH {
        return Err(AuthzError::validation(format!("`{email}` is not a valid email address")));
    }

    Ok((name.to_string(), email.to_string()))
}

pub struct AdminService {
    store: Arc<dyn RbacStore>,
    gate: Arc<Gate>,
    events: EventBus,
    guard: String,
}

impl AdminService {
    pub fn new(store: Arc<dyn RbacStore>, gate: Arc<Gate>, events: EventBus, guard: impl Into<String>) -> Self {
        Self {
            store,
            gate,
            events,
            guard: guard.into(),
        }
    }

    fn authorize(&self, actor: &Principal, ability: &str, target: Option<&Target>) -> AuthzResult<()> {
        let ability = Ability::parse(ability)?;
        self.gate.authorize(actor, &ability, target).map_err(|err| {
            if let Some(reason) = err.deny_reason() {
                tracing::warn!(
                    user_id = %actor.user_id,
                    ability = %ability,
                    reason = %reason,
                    "administrative action blocked"
                );
            }
            err
        })
    }

    async fn role(&self, id: Uuid) -> AuthzResult<Role> {
        self.store
            .find_role(id)
            .await?
            .ok_or_else(|| AuthzError::not_found(format!("role {id}")))
    }

    async fn user(&self, id: Uuid) -> AuthzResult<User> {
        self.store
            .find_user(id)
            .await?
            .ok_or_else(|| AuthzError::not_found(format!("user {id}")))
    }

    async fn user_target(&self, user_id: Uuid) -> AuthzResult<Target> {
        let roles = self.store.user_roles(user_id).await?;
        Ok(Target::user(user_id, roles.into_iter().map(|r| r.name)))
    }

    // -- roles ---------------------------------------------------------------

    pub async fn list_roles(&self, actor: &Principal) -> AuthzResult<Vec<Role>> {
        self.authorize(actor, ROLES_VIEW, None)?;
        self.store.list_roles().await
    }

    pub async fn role_permissions(&self, actor: &Principal, role_id: Uuid) -> AuthzResult<Vec<PermissionView>> {
        self.authorize(actor, ROLES_VIEW, None)?;
        self.role(role_id).await?;
        let permissions = self.store.role_permissions(role_id).await?;
        Ok(permissions.into_iter().map(PermissionView::from).collect())
    }

    /// Reserved names are refused in every guard.
    pub async fn create_role(&self, actor: &Principal, name: &str, guard: Option<&str>) -> AuthzResult<Role> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AuthzError::validation("role name must not be empty"));
        }

        self.authorize(actor, ROLES_CREATE, Some(&Target::new_role(name)))?;

        let role = self.store.create_role(name, guard.unwrap_or(&self.guard)).await?;
        tracing::info!(role = %role.name, guard = %role.guard, "role created");
        log_activity(&self.events, "created", Some(actor.user_id), &role);
        Ok(role)
    }

    /// Renaming a reserved role, or renaming any role to a reserved name, is
    /// refused for every caller.
    pub async fn rename_role(&self, actor: &Principal, role_id: Uuid, name: &str) -> AuthzResult<Role> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AuthzError::validation("role name must not be empty"));
        }

        let current = self.role(role_id).await?;
        self.authorize(actor, ROLES_UPDATE, Some(&Target::role_rename(&current.name, name)))?;

        let role = self.store.rename_role(role_id, name).await?;
        tracing::info!(from = %current.name, to = %role.name, "role renamed");
        log_activity(&self.events, "updated", Some(actor.user_id), &role);
        Ok(role)
    }

    /// Reserved roles and roles still held by users cannot be deleted.
    pub async fn delete_role(&self, actor: &Principal, role_id: Uuid) -> AuthzResult<()> {
        let role = self.role(role_id).await?;
        let holders = self.store.role_user_count(role_id).await?;
        self.authorize(actor, ROLES_DELETE, Some(&Target::role(&role.name, holders)))?;

        self.store.delete_role(role_id).await?;
        tracing::info!(role = %role.name, "role deleted");
        log_activity(&self.events, "deleted", Some(actor.user_id), &role);
        Ok(())
    }

    pub async fn sync_role_permissions(
        &self,
        actor: &Principal,
        role_id: Uuid,
        permission_ids: &[Uuid],
    ) -> AuthzResult<RolePermissionSync> {
        self.authorize(actor, ROLES_ASSIGN_PERMISSIONS, None)?;
        let role = self.role(role_id).await?;

        self.store.sync_role_permissions(role_id, permission_ids).await?;

        let permissions = self.store.role_permissions(role_id).await?;
        let sync = RolePermissionSync {
            role_id,
            role_name: role.name,
            permissions: permissions.into_iter().map(|p| p.name).collect(),
        };
        tracing::info!(role = %sync.role_name, count = sync.permissions.len(), "role permissions synced");
        log_activity(&self.events, "synced", Some(actor.user_id), &sync);
        Ok(sync)
    }

    // -- permissions ---------------------------------------------------------

    pub async fn list_permissions(&self, actor: &Principal) -> AuthzResult<Vec<PermissionView>> {
        self.authorize(actor, PERMISSIONS_VIEW, None)?;
        let permissions = self.store.list_permissions().await?;
        Ok(permissions.into_iter().map(PermissionView::from).collect())
    }

    /// The name must be a well-formed `<resource>.<action>` ability.
    pub async fn create_permission(&self, actor: &Principal, name: &str, guard: Option<&str>) -> AuthzResult<Permission> {
        self.authorize(actor, PERMISSIONS_CREATE, None)?;
        let ability = Ability::parse(name.trim())?;

        let permission = self
            .store
            .create_permission(ability.as_str(), guard.unwrap_or(&self.guard))
            .await?;
        tracing::info!(permission = %permission.name, guard = %permission.guard, "permission created");
        log_activity(&self.events, "created", Some(actor.user_id), &permission);
        Ok(permission)
    }

    /// Only a super-admin may delete `admin.access`.
    pub async fn delete_permission(&self, actor: &Principal, permission_id: Uuid) -> AuthzResult<()> {
        let permission = self
            .store
            .find_permission(permission_id)
            .await?
            .ok_or_else(|| AuthzError::not_found(format!("permission {permission_id}")))?;

        let target = Target::permission(&permission.name, &permission.guard);
        self.authorize(actor, PERMISSIONS_DELETE, Some(&target))?;

        self.store.delete_permission(permission_id).await?;
        tracing::info!(permission = %permission.name, "permission deleted");
        log_activity(&self.events, "deleted", Some(actor.user_id), &permission);
        Ok(())
    }

    // -- users ---------------------------------------------------------------

    pub async fn list_users(&self, actor: &Principal, filter: &UserFilter) -> AuthzResult<Vec<User>> {
        self.authorize(actor, USERS_VIEW, None)?;
        self.store.list_users(filter).await
    }

    /// `password_hash` must already be hashed; the account starts without roles.
    pub async fn create_user(
        &self,
        actor: &Principal,
        name: &str,
        email: &str,
        password_hash: String,
        is_active: bool,
    ) -> AuthzResult<User> {
        self.authorize(actor, USERS_CREATE, None)?;
        let (name, email) = user_profile(name, email)?;

        let user = self
            .store
            .create_user(NewUser {
                name,
                email,
                password_hash,
                is_active,
            })
            .await?;
        tracing::info!(user_id = %user.id, email = %user.email, "user created");
        log_activity(&self.events, "created", Some(actor.user_id), &user);
        Ok(user)
    }

    /// Edits name, email and the active flag. Accounts holding `super-admin`
    /// can only be edited by a super-admin.
    pub async fn update_user(
        &self,
        actor: &Principal,
        user_id: Uuid,
        name: &str,
        email: &str,
        is_active: bool,
    ) -> AuthzResult<User> {
        self.user(user_id).await?;
        let target = self.user_target(user_id).await?;
        self.authorize(actor, USERS_UPDATE, Some(&target))?;
        let (name, email) = user_profile(name, email)?;

        let user = self.store.update_user(user_id, &name, &email, is_active).await?;
        tracing::info!(%user_id, email = %user.email, active = user.is_active, "user updated");
        log_activity(&self.events, "updated", Some(actor.user_id), &user);
        Ok(user)
    }

    /// Replaces the user's roles and direct permissions.
    ///
    /// Granting `super-admin` requires the actor to be a super-admin.
    pub async fn sync_user_access(
        &self,
        actor: &Principal,
        user_id: Uuid,
        role_ids: &[Uuid],
        permission_ids: &[Uuid],
    ) -> AuthzResult<UserAccessSync> {
        self.user(user_id).await?;

        let mut requested = Vec::with_capacity(role_ids.len());
        for id in role_ids {
            requested.push(self.role(*id).await?.name);
        }

        let assignment = Target::role_assignment(user_id, requested);
        self.authorize(actor, USERS_ASSIGN_ROLES, Some(&assignment))?;
        self.authorize(actor, USERS_ASSIGN_PERMISSIONS, None)?;

        self.store.sync_user_access(user_id, role_ids, permission_ids).await?;

        let roles = self.store.user_roles(user_id).await?;
        let permissions = self.store.user_direct_permissions(user_id).await?;
        let sync = UserAccessSync {
            user_id,
            roles: roles.into_iter().map(|r| r.name).collect(),
            permissions: permissions.into_iter().map(|p| p.name).collect(),
        };
        tracing::info!(%user_id, roles = ?sync.roles, "user access synced");
        log_activity(&self.events, "synced", Some(actor.user_id), &sync);
        Ok(sync)
    }

    pub async fn set_user_active(&self, actor: &Principal, user_id: Uuid, active: bool) -> AuthzResult<User> {
        self.user(user_id).await?;
        let target = self.user_target(user_id).await?;
        self.authorize(actor, USERS_DEACTIVATE, Some(&target))?;

        self.store.set_user_active(user_id, active).await?;
        let user = self.user(user_id).await?;

        let action = if active { "activated" } else { "deactivated" };
        tracing::info!(%user_id, active, "user {action}");
        log_activity(&self.events, action, Some(actor.user_id), &user);
        Ok(user)
    }

    /// Users holding `super-admin` can only be deleted by a super-admin.
    pub async fn delete_user(&self, actor: &Principal, user_id: Uuid) -> AuthzResult<()> {
        let user = self.user(user_id).await?;
        let target = self.user_target(user_id).await?;
        self.authorize(actor, USERS_DELETE, Some(&target))?;

        self.store.delete_user(user_id).await?;
        tracing::info!(%user_id, email = %user.email, "user deleted");
        log_activity(&self.events, "deleted", Some(actor.user_id), &user);
        Ok(())
    }

    pub async fn effective_permissions(&self, actor: &Principal, user_id: Uuid) -> AuthzResult<EffectivePermissions> {
        self.authorize(actor, USERS_VIEW, None)?;
        self.store
            .effective_permissions(user_id)
            .await?
            .ok_or_else(|| AuthzError::not_found(format!("user {user_id}")))
    }

    /// Ad-hoc question: may the actor perform `ability`? A malformed name is
    /// an error; a denial is an answer.
    pub fn check(&self, actor: &Principal, ability: &str) -> AuthzResult<CanResponse> {
        let decision = self.gate.check_str(actor, ability, None)?;
        Ok(CanResponse {
            ability: ability.to_string(),
            allowed: decision.is_allowed(),
            reason: decision.reason(),
        })
    }
}

impl std::fmt::Debug for AdminService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminService")
            .field("gate", &self.gate)
            .field("guard", &self.guard)
            .finish()
    }
}
