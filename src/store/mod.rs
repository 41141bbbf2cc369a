//! Storage contract for the role/permission graph.
//!
//! The evaluator only ever sees [`Principal`] snapshots; everything that
//! reads or mutates persisted roles, permissions and users goes through
//! [`RbacStore`].

use async_trait::async_trait;
use uuid::Uuid;

use crate::authz::{AuthzResult, Principal};
use crate::models::rbac::{EffectivePermissions, Permission, Role};
use crate::models::user::{DbUser, NewUser, User, UserFilter};

mod sqlite;

pub use sqlite::SqliteStore;

#[async_trait]
pub trait RbacStore: Send + Sync {
    // -- permissions ---------------------------------------------------------

    /// Create-if-missing keyed by `(name, guard)`. The flag is `true` when created.
    async fn find_or_create_permission(&self, name: &str, guard: &str) -> AuthzResult<(Permission, bool)>;

    /// Fails with `Conflict` if `(name, guard)` exists.
    async fn create_permission(&self, name: &str, guard: &str) -> AuthzResult<Permission>;

    async fn find_permission(&self, id: Uuid) -> AuthzResult<Option<Permission>>;

    async fn find_permission_by_name(&self, name: &str, guard: &str) -> AuthzResult<Option<Permission>>;

    async fn list_permissions(&self) -> AuthzResult<Vec<Permission>>;

    /// Removes the permission and every role/user grant of it.
    async fn delete_permission(&self, id: Uuid) -> AuthzResult<()>;

    // -- roles ---------------------------------------------------------------

    /// Fails with `Conflict` if a role of that name exists in any guard.
    async fn create_role(&self, name: &str, guard: &str) -> AuthzResult<Role>;

    async fn find_or_create_role(&self, name: &str, guard: &str) -> AuthzResult<(Role, bool)>;

    async fn find_role(&self, id: Uuid) -> AuthzResult<Option<Role>>;

    async fn find_role_by_name(&self, name: &str, guard: &str) -> AuthzResult<Option<Role>>;

    async fn list_roles(&self) -> AuthzResult<Vec<Role>>;

    /// Same cross-guard uniqueness as [`RbacStore::create_role`].
    async fn rename_role(&self, id: Uuid, name: &str) -> AuthzResult<Role>;

    /// Refuses with a `ReferentialIntegrityBlocked` denial while any user
    /// holds the role, checked inside the deleting transaction.
    async fn delete_role(&self, id: Uuid) -> AuthzResult<()>;

    /// Number of users currently holding the role.
    async fn role_user_count(&self, id: Uuid) -> AuthzResult<u64>;

    async fn role_permissions(&self, id: Uuid) -> AuthzResult<Vec<Permission>>;

    /// Replaces the role's permission set atomically. Every permission must
    /// exist and share the role's guard.
    async fn sync_role_permissions(&self, role_id: Uuid, permission_ids: &[Uuid]) -> AuthzResult<()>;

    // -- users ---------------------------------------------------------------

    async fn create_user(&self, user: NewUser) -> AuthzResult<User>;

    async fn find_user(&self, id: Uuid) -> AuthzResult<Option<User>>;

    async fn find_user_by_email(&self, email: &str) -> AuthzResult<Option<DbUser>>;

    /// Newest first. Every filter field is optional.
    async fn list_users(&self, filter: &UserFilter) -> AuthzResult<Vec<User>>;

    /// Fails with `Conflict` when another user already has `email`.
    async fn update_user(&self, id: Uuid, name: &str, email: &str, is_active: bool) -> AuthzResult<User>;

    async fn update_user_credentials(&self, id: Uuid, name: &str, password_hash: &str) -> AuthzResult<()>;

    async fn set_user_active(&self, id: Uuid, active: bool) -> AuthzResult<()>;

    async fn delete_user(&self, id: Uuid) -> AuthzResult<()>;

    async fn user_roles(&self, user_id: Uuid) -> AuthzResult<Vec<Role>>;

    async fn user_direct_permissions(&self, user_id: Uuid) -> AuthzResult<Vec<Permission>>;

    /// Adds one role to the user, keeping existing ones.
    async fn assign_role(&self, user_id: Uuid, role_id: Uuid) -> AuthzResult<()>;

    /// Replaces the user's roles and direct permissions in one transaction.
    async fn sync_user_access(&self, user_id: Uuid, role_ids: &[Uuid], permission_ids: &[Uuid]) -> AuthzResult<()>;

    /// Snapshot used for authorization, acting in `guard`; `None` when the
    /// user does not exist.
    async fn load_principal(&self, user_id: Uuid, guard: &str) -> AuthzResult<Option<Principal>>;

    async fn effective_permissions(&self, user_id: Uuid) -> AuthzResult<Option<EffectivePermissions>>;
}
