use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};
use uuid::Uuid;

use super::RbacStore;
use crate::authz::rules::ROLES_DELETE;
use crate::authz::{AuthzError, AuthzResult, DenyReason, PermissionRef, Principal, RoleGrant};
use crate::models::rbac::{EffectivePermission, EffectivePermissions, Permission, Role};
use crate::models::user::{DbUser, NewUser, User, UserFilter};

/// [`RbacStore`] over the SQLite schema in `migrations/`.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

impl SqliteStore {
    /// Role names are unique across guards.
    async fn role_named(&self, name: &str) -> AuthzResult<Option<Role>> {
        let row = sqlx::query("SELECT id, name, guard_name, created_at, updated_at FROM roles WHERE name = ? LIMIT 1")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(role_from_row).transpose()
    }
}

fn parse_uuid(value: &str) -> AuthzResult<Uuid> {
    Uuid::parse_str(value).map_err(|e| AuthzError::CorruptRow(format!("invalid uuid `{value}`: {e}")))
}

fn permission_from_row(row: &SqliteRow) -> AuthzResult<Permission> {
    Ok(Permission {
        id: parse_uuid(&row.try_get::<String, _>("id")?)?,
        name: row.try_get("name")?,
        guard: row.try_get("guard_name")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn role_from_row(row: &SqliteRow) -> AuthzResult<Role> {
    Ok(Role {
        id: parse_uuid(&row.try_get::<String, _>("id")?)?,
        name: row.try_get("name")?,
        guard: row.try_get("guard_name")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn user_from_row(row: &SqliteRow) -> AuthzResult<User> {
    Ok(User {
        id: parse_uuid(&row.try_get::<String, _>("id")?)?,
        name: row.try_get("name")?,
        email: row.try_get("email")?,
        is_active: row.try_get("is_active")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[async_trait]
impl RbacStore for SqliteStore {
    async fn find_or_create_permission(&self, name: &str, guard: &str) -> AuthzResult<(Permission, bool)> {
        let now = Utc::now();
        let inserted = sqlx::query(
            "INSERT OR IGNORE INTO permissions (id, name, guard_name, created_at, updated_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(name)
        .bind(guard)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?
        .rows_affected();

        let permission = self
            .find_permission_by_name(name, guard)
            .await?
            .ok_or_else(|| AuthzError::not_found(format!("permission {name} ({guard})")))?;

        Ok((permission, inserted == 1))
    }

    async fn create_permission(&self, name: &str, guard: &str) -> AuthzResult<Permission> {
        if self.find_permission_by_name(name, guard).await?.is_some() {
            return Err(AuthzError::conflict(format!("permission `{name}` already exists in guard `{guard}`")));
        }

        let (permission, _) = self.find_or_create_permission(name, guard).await?;
        Ok(permission)
    }

    async fn find_permission(&self, id: Uuid) -> AuthzResult<Option<Permission>> {
        let row = sqlx::query("SELECT id, name, guard_name, created_at, updated_at FROM permissions WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(permission_from_row).transpose()
    }

    async fn find_permission_by_name(&self, name: &str, guard: &str) -> AuthzResult<Option<Permission>> {
        let row = sqlx::query(
            "SELECT id, name, guard_name, created_at, updated_at FROM permissions WHERE name = ? AND guard_name = ?",
        )
        .bind(name)
        .bind(guard)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(permission_from_row).transpose()
    }

    async fn list_permissions(&self) -> AuthzResult<Vec<Permission>> {
        let rows = sqlx::query("SELECT id, name, guard_name, created_at, updated_at FROM permissions ORDER BY name, guard_name")
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(permission_from_row).collect()
    }

    async fn delete_permission(&self, id: Uuid) -> AuthzResult<()> {
        let id = id.to_string();
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM role_permissions WHERE permission_id = ?")
            .bind(&id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM user_permissions WHERE permission_id = ?")
            .bind(&id)
            .execute(&mut *tx)
            .await?;
        let deleted = sqlx::query("DELETE FROM permissions WHERE id = ?")
            .bind(&id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        if deleted == 0 {
            return Err(AuthzError::not_found(format!("permission {id}")));
        }

        tx.commit().await?;
        Ok(())
    }

    async fn create_role(&self, name: &str, guard: &str) -> AuthzResult<Role> {
        if let Some(existing) = self.role_named(name).await? {
            return Err(AuthzError::conflict(format!(
                "role `{name}` already exists in guard `{}`",
                existing.guard
            )));
        }

        let (role, _) = self.find_or_create_role(name, guard).await?;
        Ok(role)
    }

    async fn find_or_create_role(&self, name: &str, guard: &str) -> AuthzResult<(Role, bool)> {
        let now = Utc::now();
        let inserted = sqlx::query(
            "INSERT OR IGNORE INTO roles (id, name, guard_name, created_at, updated_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(name)
        .bind(guard)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?
        .rows_affected();

        let role = self
            .find_role_by_name(name, guard)
            .await?
            .ok_or_else(|| AuthzError::not_found(format!("role {name} ({guard})")))?;

        Ok((role, inserted == 1))
    }

    async fn find_role(&self, id: Uuid) -> AuthzResult<Option<Role>> {
        let row = sqlx::query("SELECT id, name, guard_name, created_at, updated_at FROM roles WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(role_from_row).transpose()
    }

    async fn find_role_by_name(&self, name: &str, guard: &str) -> AuthzResult<Option<Role>> {
        let row = sqlx::query(
            "SELECT id, name, guard_name, created_at, updated_at FROM roles WHERE name = ? AND guard_name = ?",
        )
        .bind(name)
        .bind(guard)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(role_from_row).transpose()
    }

    async fn list_roles(&self) -> AuthzResult<Vec<Role>> {
        let rows = sqlx::query("SELECT id, name, guard_name, created_at, updated_at FROM roles ORDER BY name")
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(role_from_row).collect()
    }

    async fn rename_role(&self, id: Uuid, name: &str) -> AuthzResult<Role> {
        let role = self
            .find_role(id)
            .await?
            .ok_or_else(|| AuthzError::not_found(format!("role {id}")))?;

        if let Some(existing) = self.role_named(name).await? {
            if existing.id != role.id {
                return Err(AuthzError::conflict(format!("role `{name}` already exists")));
            }
        }

        sqlx::query("UPDATE roles SET name = ?, updated_at = ? WHERE id = ?")
            .bind(name)
            .bind(Utc::now())
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        self.find_role(id)
            .await?
            .ok_or_else(|| AuthzError::not_found(format!("role {id}")))
    }

    async fn delete_role(&self, id: Uuid) -> AuthzResult<()> {
        let id = id.to_string();
        let mut tx = self.pool.begin().await?;

        let holders: i64 = sqlx::query_scalar("SELECT COUNT(1) FROM user_roles WHERE role_id = ?")
            .bind(&id)
            .fetch_one(&mut *tx)
            .await?;
        if holders > 0 {
            return Err(AuthzError::denied(ROLES_DELETE, DenyReason::ReferentialIntegrityBlocked));
        }

        sqlx::query("DELETE FROM role_permissions WHERE role_id = ?")
            .bind(&id)
            .execute(&mut *tx)
            .await?;
        let deleted = sqlx::query("DELETE FROM roles WHERE id = ?")
            .bind(&id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        if deleted == 0 {
            return Err(AuthzError::not_found(format!("role {id}")));
        }

        tx.commit().await?;
        Ok(())
    }

    async fn role_user_count(&self, id: Uuid) -> AuthzResult<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(1) FROM user_roles WHERE role_id = ?")
            .bind(id.to_string())
            .fetch_one(&self.pool)
            .await?;

        Ok(count.max(0) as u64)
    }

    async fn role_permissions(&self, id: Uuid) -> AuthzResult<Vec<Permission>> {
        let rows = sqlx::query(
            r#"
            SELECT p.id, p.name, p.guard_name, p.created_at, p.updated_at
            FROM permissions p
            INNER JOIN role_permissions rp ON p.id = rp.permission_id
            WHERE rp.role_id = ?
            ORDER BY p.name
            "#,
        )
        .bind(id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(permission_from_row).collect()
    }

    async fn sync_role_permissions(&self, role_id: Uuid, permission_ids: &[Uuid]) -> AuthzResult<()> {
        let role_key = role_id.to_string();
        let wanted: BTreeSet<Uuid> = permission_ids.iter().copied().collect();
        let mut tx = self.pool.begin().await?;

        let role_guard: String = sqlx::query_scalar("SELECT guard_name FROM roles WHERE id = ?")
            .bind(&role_key)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AuthzError::not_found(format!("role {role_id}")))?;

        for permission_id in &wanted {
            let guard: String = sqlx::query_scalar("SELECT guard_name FROM permissions WHERE id = ?")
                .bind(permission_id.to_string())
                .fetch_optional(&mut *tx)
                .await?
                .ok_or_else(|| AuthzError::not_found(format!("permission {permission_id}")))?;

            if guard != role_guard {
                return Err(AuthzError::validation(format!(
                    "permission {permission_id} belongs to guard `{guard}`, role uses `{role_guard}`"
                )));
            }
        }

        sqlx::query("DELETE FROM role_permissions WHERE role_id = ?")
            .bind(&role_key)
            .execute(&mut *tx)
            .await?;

        let now = Utc::now();
        for permission_id in &wanted {
            sqlx::query("INSERT INTO role_permissions (role_id, permission_id, created_at) VALUES (?, ?, ?)")
                .bind(&role_key)
                .bind(permission_id.to_string())
                .bind(now)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn create_user(&self, user: NewUser) -> AuthzResult<User> {
        if self.find_user_by_email(&user.email).await?.is_some() {
            return Err(AuthzError::conflict(format!("email `{}` already in use", user.email)));
        }

        let id = Uuid::new_v4();
        let now = Utc::now();
        sqlx::query(
            "INSERT INTO users (id, name, email, password_hash, is_active, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(id.to_string())
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.is_active)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(User {
            id,
            name: user.name,
            email: user.email,
            is_active: user.is_active,
            created_at: now,
            updated_at: now,
        })
    }

    async fn find_user(&self, id: Uuid) -> AuthzResult<Option<User>> {
        let row = sqlx::query("SELECT id, name, email, is_active, created_at, updated_at FROM users WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(user_from_row).transpose()
    }

    async fn find_user_by_email(&self, email: &str) -> AuthzResult<Option<DbUser>> {
        let row = sqlx::query(
            "SELECT id, name, email, password_hash, is_active, created_at, updated_at FROM users WHERE email = ?",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(DbUser {
                user: user_from_row(&row)?,
                password_hash: row.try_get("password_hash")?,
            })),
            None => Ok(None),
        }
    }

    async fn list_users(&self, filter: &UserFilter) -> AuthzResult<Vec<User>> {
        let mut query: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT id, name, email, is_active, created_at, updated_at FROM users WHERE 1 = 1");

        if let Some(search) = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            let pattern = format!("%{search}%");
            query
                .push(" AND (name LIKE ")
                .push_bind(pattern.clone())
                .push(" OR email LIKE ")
                .push_bind(pattern)
                .push(")");
        }
        if let Some(active) = filter.is_active {
            query.push(" AND is_active = ").push_bind(active);
        }
        if let Some(role) = filter.role.as_deref().filter(|r| !r.is_empty()) {
            query
                .push(
                    " AND EXISTS (SELECT 1 FROM user_roles ur INNER JOIN roles r ON r.id = ur.role_id \
                     WHERE ur.user_id = users.id AND r.name = ",
                )
                .push_bind(role.to_string())
                .push(")");
        }
        query.push(" ORDER BY created_at DESC, email");

        let rows = query.build().fetch_all(&self.pool).await?;
        rows.iter().map(user_from_row).collect()
    }

    async fn update_user(&self, id: Uuid, name: &str, email: &str, is_active: bool) -> AuthzResult<User> {
        if let Some(existing) = self.find_user_by_email(email).await? {
            if existing.user.id != id {
                return Err(AuthzError::conflict(format!("email `{email}` already in use")));
            }
        }

        let updated = sqlx::query("UPDATE users SET name = ?, email = ?, is_active = ?, updated_at = ? WHERE id = ?")
            .bind(name)
            .bind(email)
            .bind(is_active)
            .bind(Utc::now())
            .bind(id.to_string())
            .execute(&self.pool)
            .await?
            .rows_affected();

        if updated == 0 {
            return Err(AuthzError::not_found(format!("user {id}")));
        }
        self.find_user(id)
            .await?
            .ok_or_else(|| AuthzError::not_found(format!("user {id}")))
    }

    async fn update_user_credentials(&self, id: Uuid, name: &str, password_hash: &str) -> AuthzResult<()> {
        let updated = sqlx::query("UPDATE users SET name = ?, password_hash = ?, updated_at = ? WHERE id = ?")
            .bind(name)
            .bind(password_hash)
            .bind(Utc::now())
            .bind(id.to_string())
            .execute(&self.pool)
            .await?
            .rows_affected();

        if updated == 0 {
            return Err(AuthzError::not_found(format!("user {id}")));
        }
        Ok(())
    }

    async fn set_user_active(&self, id: Uuid, active: bool) -> AuthzResult<()> {
        let updated = sqlx::query("UPDATE users SET is_active = ?, updated_at = ? WHERE id = ?")
            .bind(active)
            .bind(Utc::now())
            .bind(id.to_string())
            .execute(&self.pool)
            .await?
            .rows_affected();

        if updated == 0 {
            return Err(AuthzError::not_found(format!("user {id}")));
        }
        Ok(())
    }

    async fn delete_user(&self, id: Uuid) -> AuthzResult<()> {
        let id = id.to_string();
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM user_roles WHERE user_id = ?")
            .bind(&id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM user_permissions WHERE user_id = ?")
            .bind(&id)
            .execute(&mut *tx)
            .await?;
        let deleted = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(&id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        if deleted == 0 {
            return Err(AuthzError::not_found(format!("user {id}")));
        }

        tx.commit().await?;
        Ok(())
    }

    async fn user_roles(&self, user_id: Uuid) -> AuthzResult<Vec<Role>> {
        let rows = sqlx::query(
            r#"
            SELECT r.id, r.name, r.guard_name, r.created_at, r.updated_at
            FROM roles r
            INNER JOIN user_roles ur ON r.id = ur.role_id
            WHERE ur.user_id = ?
            ORDER BY r.name
            "#,
        )
        .bind(user_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(role_from_row).collect()
    }

    async fn user_direct_permissions(&self, user_id: Uuid) -> AuthzResult<Vec<Permission>> {
        let rows = sqlx::query(
            r#"
            SELECT p.id, p.name, p.guard_name, p.created_at, p.updated_at
            FROM permissions p
            INNER JOIN user_permissions up ON p.id = up.permission_id
            WHERE up.user_id = ?
            ORDER BY p.name
            "#,
        )
        .bind(user_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(permission_from_row).collect()
    }

    async fn assign_role(&self, user_id: Uuid, role_id: Uuid) -> AuthzResult<()> {
        sqlx::query("INSERT OR IGNORE INTO user_roles (user_id, role_id, created_at) VALUES (?, ?, ?)")
            .bind(user_id.to_string())
            .bind(role_id.to_string())
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn sync_user_access(&self, user_id: Uuid, role_ids: &[Uuid], permission_ids: &[Uuid]) -> AuthzResult<()> {
        let user_key = user_id.to_string();
        let roles: BTreeSet<Uuid> = role_ids.iter().copied().collect();
        let permissions: BTreeSet<Uuid> = permission_ids.iter().copied().collect();
        let mut tx = self.pool.begin().await?;

        let user_exists: Option<String> = sqlx::query_scalar("SELECT id FROM users WHERE id = ?")
            .bind(&user_key)
            .fetch_optional(&mut *tx)
            .await?;
        if user_exists.is_none() {
            return Err(AuthzError::not_found(format!("user {user_id}")));
        }

        for role_id in &roles {
            let found: Option<String> = sqlx::query_scalar("SELECT id FROM roles WHERE id = ?")
                .bind(role_id.to_string())
                .fetch_optional(&mut *tx)
                .await?;
            if found.is_none() {
                return Err(AuthzError::not_found(format!("role {role_id}")));
            }
        }
        for permission_id in &permissions {
            let found: Option<String> = sqlx::query_scalar("SELECT id FROM permissions WHERE id = ?")
                .bind(permission_id.to_string())
                .fetch_optional(&mut *tx)
                .await?;
            if found.is_none() {
                return Err(AuthzError::not_found(format!("permission {permission_id}")));
            }
        }

        sqlx::query("DELETE FROM user_roles WHERE user_id = ?")
            .bind(&user_key)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM user_permissions WHERE user_id = ?")
            .bind(&user_key)
            .execute(&mut *tx)
            .await?;

        let now = Utc::now();
        for role_id in &roles {
            sqlx::query("INSERT INTO user_roles (user_id, role_id, created_at) VALUES (?, ?, ?)")
                .bind(&user_key)
                .bind(role_id.to_string())
                .bind(now)
                .execute(&mut *tx)
                .await?;
        }
        for permission_id in &permissions {
            sqlx::query("INSERT INTO user_permissions (user_id, permission_id, created_at) VALUES (?, ?, ?)")
                .bind(&user_key)
                .bind(permission_id.to_string())
                .bind(now)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn load_principal(&self, user_id: Uuid, guard: &str) -> AuthzResult<Option<Principal>> {
        let Some(user) = self.find_user(user_id).await? else {
            return Ok(None);
        };

        let rows = sqlx::query(
            r#"
            SELECT r.name AS role_name, r.guard_name AS role_guard,
                   p.name AS permission_name, p.guard_name AS permission_guard
            FROM user_roles ur
            INNER JOIN roles r ON r.id = ur.role_id
            LEFT JOIN role_permissions rp ON rp.role_id = r.id
            LEFT JOIN permissions p ON p.id = rp.permission_id
            WHERE ur.user_id = ?
            "#,
        )
        .bind(user_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        let mut grants: BTreeMap<(String, String), RoleGrant> = BTreeMap::new();
        for row in &rows {
            let name: String = row.try_get("role_name")?;
            let guard: String = row.try_get("role_guard")?;
            let grant = grants.entry((name.clone(), guard.clone())).or_insert_with(|| RoleGrant {
                name,
                guard,
                permissions: Default::default(),
            });

            let permission_name: Option<String> = row.try_get("permission_name")?;
            let permission_guard: Option<String> = row.try_get("permission_guard")?;
            if let (Some(name), Some(guard)) = (permission_name, permission_guard) {
                grant.permissions.insert(PermissionRef::new(name, guard));
            }
        }

        let direct = self.user_direct_permissions(user_id).await?;

        Ok(Some(
            Principal::new(user.id)
                .with_guard(guard)
                .with_active(user.is_active)
                .with_roles(grants.into_values())
                .with_direct_permissions(direct.iter().map(Permission::to_ref)),
        ))
    }

    async fn effective_permissions(&self, user_id: Uuid) -> AuthzResult<Option<EffectivePermissions>> {
        let Some(user) = self.find_user(user_id).await? else {
            return Ok(None);
        };

        let roles = self.user_roles(user_id).await?;

        let role_rows = sqlx::query(
            r#"
            SELECT p.name AS permission_name, p.guard_name AS permission_guard, r.name AS role_name
            FROM permissions p
            INNER JOIN role_permissions rp ON p.id = rp.permission_id
            INNER JOIN roles r ON r.id = rp.role_id
            INNER JOIN user_roles ur ON r.id = ur.role_id
            WHERE ur.user_id = ?
            ORDER BY p.name, r.name
            "#,
        )
        .bind(user_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        let mut permissions = Vec::with_capacity(role_rows.len());
        for row in &role_rows {
            permissions.push(EffectivePermission {
                name: row.try_get("permission_name")?,
                guard: row.try_get("permission_guard")?,
                source: "role".to_string(),
                role_name: Some(row.try_get("role_name")?),
            });
        }

        for permission in self.user_direct_permissions(user_id).await? {
            permissions.push(EffectivePermission {
                name: permission.name,
                guard: permission.guard,
                source: "direct".to_string(),
                role_name: None,
            });
        }

        Ok(Some(EffectivePermissions {
            user_id,
            active: user.is_active,
            roles: roles.into_iter().map(|r| r.name).collect(),
            permissions,
        }))
    }
}
