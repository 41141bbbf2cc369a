use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::authz::{catalog, PermissionRef};
use crate::events::{Loggable, Severity};

// =============================================================================
// ROLE
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Role {
    pub id: Uuid,
    pub name: String,
    pub guard: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Loggable for Role {
    fn entity_type() -> &'static str { "role" }
    fn subject_id(&self) -> Uuid { self.id }
    fn severity(&self) -> Severity { Severity::Critical }
}

#[derive(Debug, Deserialize)]
pub struct RoleCreateRequest {
    pub name: String,
    #[serde(default)]
    pub guard: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RoleRenameRequest {
    pub name: String,
}

/// Replaces the full permission set of a role.
#[derive(Debug, Deserialize)]
pub struct SyncRolePermissionsRequest {
    pub permission_ids: Vec<Uuid>,
}

// =============================================================================
// PERMISSION
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Permission {
    pub id: Uuid,
    pub name: String,
    pub guard: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Permission {
    pub fn to_ref(&self) -> PermissionRef {
        PermissionRef::new(self.name.clone(), self.guard.clone())
    }
}

impl Loggable for Permission {
    fn entity_type() -> &'static str { "permission" }
    fn subject_id(&self) -> Uuid { self.id }
    fn severity(&self) -> Severity { Severity::Critical }
}

#[derive(Debug, Deserialize)]
pub struct PermissionCreateRequest {
    pub name: String,
    #[serde(default)]
    pub guard: Option<String>,
}

/// Permission with its catalog label and group, for listings.
#[derive(Debug, Serialize)]
pub struct PermissionView {
    #[serde(flatten)]
    pub permission: Permission,
    pub label: String,
    pub group: &'static str,
}

impl From<Permission> for PermissionView {
    fn from(permission: Permission) -> Self {
        let label = catalog::label_for(&permission.name);
        let group = catalog::group_for(&permission.name);
        Self {
            permission,
            label,
            group,
        }
    }
}

// =============================================================================
// CATALOG
// =============================================================================

#[derive(Debug, Serialize)]
pub struct CatalogGroup {
    pub name: &'static str,
    pub permissions: Vec<CatalogPermission>,
}

#[derive(Debug, Serialize)]
pub struct CatalogPermission {
    pub name: &'static str,
    pub label: &'static str,
}

pub fn catalog_groups() -> Vec<CatalogGroup> {
    catalog::list_groups()
        .iter()
        .map(|&(name, entries)| CatalogGroup {
            name,
            permissions: entries
                .iter()
                .map(|&(name, label)| CatalogPermission { name, label })
                .collect(),
        })
        .collect()
}

// =============================================================================
// ROLE-PERMISSION SYNC
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RolePermissionSync {
    pub role_id: Uuid,
    pub role_name: String,
    pub permissions: Vec<String>,
}

impl Loggable for RolePermissionSync {
    fn entity_type() -> &'static str { "role_permissions" }
    fn subject_id(&self) -> Uuid { self.role_id }
    fn severity(&self) -> Severity { Severity::Critical }
}

// =============================================================================
// USER ACCESS SYNC (roles + direct permissions)
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct UserAccessRequest {
    #[serde(default)]
    pub role_ids: Vec<Uuid>,
    #[serde(default)]
    pub permission_ids: Vec<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserAccessSync {
    pub user_id: Uuid,
    pub roles: Vec<String>,
    pub permissions: Vec<String>,
}

impl Loggable for UserAccessSync {
    fn entity_type() -> &'static str { "user_access" }
    fn subject_id(&self) -> Uuid { self.user_id }
    fn severity(&self) -> Severity { Severity::Critical }
}

// =============================================================================
// EFFECTIVE PERMISSIONS (computed)
// =============================================================================

#[derive(Debug, Serialize)]
pub struct EffectivePermissions {
    pub user_id: Uuid,
    pub active: bool,
    pub roles: Vec<String>,
    pub permissions: Vec<EffectivePermission>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EffectivePermission {
    pub name: String,
    pub guard: String,
    /// Source of the permission: "role" or "direct"
    pub source: String,
    /// Name of the role if source is "role"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role_name: Option<String>,
}

/// Answer to an ad-hoc `can` query.
#[derive(Debug, Serialize)]
pub struct CanResponse {
    pub ability: String,
    pub allowed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<crate::authz::DenyReason>,
}
