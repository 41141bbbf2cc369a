mod common;

use anyhow::Result;

use backoffice_authz::authz::{AuthzError, DenyReason, DEFAULT_GUARD};
use backoffice_authz::models::user::UserFilter;
use backoffice_authz::store::RbacStore;

use common::{principal, seeded_state, user_with_roles};

fn reason(result: Result<impl std::fmt::Debug, AuthzError>) -> Option<DenyReason> {
    result.err().and_then(|err| err.deny_reason())
}

#[tokio::test]
async fn reserved_roles_cannot_be_deleted_even_by_super_admin() -> Result<()> {
    let (_dir, state) = seeded_state().await?;
    let store = state.store.as_ref();
    let root = user_with_roles(store, "root@example.com", &["super-admin"], "x").await?;
    let root = principal(store, &root).await?;

    for name in ["super-admin", "admin", "manager"] {
        let role = store.find_role_by_name(name, DEFAULT_GUARD).await?.unwrap();
        assert_eq!(
            reason(state.admin.delete_role(&root, role.id).await),
            Some(DenyReason::ReferentialIntegrityBlocked),
            "{name}"
        );
        assert!(store.find_role(role.id).await?.is_some());
    }
    Ok(())
}

#[tokio::test]
async fn role_in_use_is_kept_until_released() -> Result<()> {
    let (_dir, state) = seeded_state().await?;
    let store = state.store.as_ref();
    let root = user_with_roles(store, "root@example.com", &["super-admin"], "x").await?;
    let root = principal(store, &root).await?;

    let editor = state.admin.create_role(&root, "editor", None).await?;
    let member = user_with_roles(store, "ed@example.com", &["editor"], "x").await?;

    assert_eq!(
        reason(state.admin.delete_role(&root, editor.id).await),
        Some(DenyReason::ReferentialIntegrityBlocked)
    );

    state.admin.sync_user_access(&root, member.id, &[], &[]).await?;
    state.admin.delete_role(&root, editor.id).await?;
    assert!(store.find_role(editor.id).await?.is_none());
    Ok(())
}

#[tokio::test]
async fn reserved_role_rename_blocked() -> Result<()> {
    let (_dir, state) = seeded_state().await?;
    let store = state.store.as_ref();
    let root = user_with_roles(store, "root@example.com", &["super-admin"], "x").await?;
    let root = principal(store, &root).await?;

    let admin_role = store.find_role_by_name("admin", DEFAULT_GUARD).await?.unwrap();
    assert_eq!(
        reason(state.admin.rename_role(&root, admin_role.id, "owners").await),
        Some(DenyReason::ReferentialIntegrityBlocked)
    );

    let editor = state.admin.create_role(&root, "editor", None).await?;
    let renamed = state.admin.rename_role(&root, editor.id, "writer").await?;
    assert_eq!(renamed.name, "writer");

    assert_eq!(
        reason(state.admin.rename_role(&root, editor.id, "manager").await),
        Some(DenyReason::ReferentialIntegrityBlocked)
    );
    Ok(())
}

#[tokio::test]
async fn reserved_names_refused_in_every_guard() -> Result<()> {
    let (_dir, state) = seeded_state().await?;
    let store = state.store.as_ref();
    let admin_user = user_with_roles(store, "admin@example.com", &["admin"], "x").await?;
    let root_user = user_with_roles(store, "root@example.com", &["super-admin"], "x").await?;
    let admin = principal(store, &admin_user).await?;
    let root = principal(store, &root_user).await?;

    for actor in [&admin, &root] {
        for guard in [None, Some("api")] {
            assert_eq!(
                reason(state.admin.create_role(actor, "super-admin", guard).await),
                Some(DenyReason::ReferentialIntegrityBlocked),
                "{guard:?}"
            );
        }
    }

    let editor = state.admin.create_role(&root, "editor", Some("api")).await?;
    assert_eq!(
        reason(state.admin.rename_role(&root, editor.id, "admin").await),
        Some(DenyReason::ReferentialIntegrityBlocked)
    );
    assert_eq!(store.list_roles().await?.len(), 4);
    Ok(())
}

#[tokio::test]
async fn admin_cannot_become_super_admin_through_foreign_guard_role() -> Result<()> {
    let (_dir, state) = seeded_state().await?;
    let store = state.store.as_ref();
    let admin_user = user_with_roles(store, "admin@example.com", &["admin"], "x").await?;
    let admin = principal(store, &admin_user).await?;
    let admin_role = store.find_role_by_name("admin", DEFAULT_GUARD).await?.unwrap();

    let editor = state.admin.create_role(&admin, "editor", Some("api")).await?;
    state
        .admin
        .sync_user_access(&admin, admin_user.id, &[admin_role.id, editor.id], &[])
        .await?;

    assert_eq!(
        reason(state.admin.rename_role(&admin, editor.id, "super-admin").await),
        Some(DenyReason::ReferentialIntegrityBlocked)
    );
    assert_eq!(store.find_role(editor.id).await?.unwrap().name, "editor");

    let admin = principal(store, &admin_user).await?;
    assert!(!admin.is_super_admin());
    assert!(!state.admin.check(&admin, "roles.delete")?.allowed);
    Ok(())
}

#[tokio::test]
async fn user_management_follows_permissions() -> Result<()> {
    let (_dir, state) = seeded_state().await?;
    let store = state.store.as_ref();
    let admin_user = user_with_roles(store, "admin@example.com", &["admin"], "x").await?;
    let manager_user = user_with_roles(store, "m@example.com", &["manager"], "x").await?;
    let admin = principal(store, &admin_user).await?;
    let manager = principal(store, &manager_user).await?;

    let created = state
        .admin
        .create_user(&admin, " Nadia ", "nadia@example.com", "hash".into(), true)
        .await?;
    assert_eq!(created.name, "Nadia");
    assert!(created.is_active);

    assert!(matches!(
        state.admin.create_user(&admin, "Again", "nadia@example.com", "hash".into(), true).await,
        Err(AuthzError::Conflict(_))
    ));
    assert!(matches!(
        state.admin.create_user(&admin, "Bad", "not-an-email", "hash".into(), true).await,
        Err(AuthzError::Validation(_))
    ));
    assert_eq!(
        reason(state.admin.create_user(&manager, "X", "x@example.com", "hash".into(), true).await),
        Some(DenyReason::PermissionDenied)
    );

    let updated = state
        .admin
        .update_user(&admin, created.id, "Nadia K", "nadia.k@example.com", false)
        .await?;
    assert_eq!(updated.email, "nadia.k@example.com");
    assert!(!updated.is_active);
    assert_eq!(
        reason(state.admin.update_user(&manager, created.id, "N", "n@example.com", true).await),
        Some(DenyReason::PermissionDenied)
    );

    let listed = state.admin.list_users(&manager, &UserFilter::default()).await?;
    assert_eq!(listed.len(), 3);
    let inactive = UserFilter { is_active: Some(false), ..Default::default() };
    let listed = state.admin.list_users(&admin, &inactive).await?;
    assert_eq!(listed.iter().map(|u| u.id).collect::<Vec<_>>(), vec![created.id]);
    Ok(())
}

#[tokio::test]
async fn super_admin_accounts_edited_only_by_super_admin() -> Result<()> {
    let (_dir, state) = seeded_state().await?;
    let store = state.store.as_ref();
    let admin_user = user_with_roles(store, "admin@example.com", &["admin"], "x").await?;
    let root_user = user_with_roles(store, "root@example.com", &["super-admin"], "x").await?;
    let admin = principal(store, &admin_user).await?;
    let root = principal(store, &root_user).await?;

    assert_eq!(
        reason(state.admin.update_user(&admin, root_user.id, "Root", "mine@example.com", true).await),
        Some(DenyReason::PrivilegeEscalationBlocked)
    );
    assert_eq!(
        reason(state.admin.set_user_active(&admin, root_user.id, false).await),
        Some(DenyReason::PrivilegeEscalationBlocked)
    );
    assert_eq!(store.find_user(root_user.id).await?.unwrap().email, "root@example.com");

    let renamed = state
        .admin
        .update_user(&root, root_user.id, "Root", "root@example.com", true)
        .await?;
    assert_eq!(renamed.name, "Root");
    Ok(())
}

#[tokio::test]
async fn only_super_admin_grants_super_admin() -> Result<()> {
    let (_dir, state) = seeded_state().await?;
    let store = state.store.as_ref();
    let admin_user = user_with_roles(store, "admin@example.com", &["admin"], "x").await?;
    let root_user = user_with_roles(store, "root@example.com", &["super-admin"], "x").await?;
    let target = user_with_roles(store, "t@example.com", &[], "x").await?;

    let super_admin = store.find_role_by_name("super-admin", DEFAULT_GUARD).await?.unwrap();
    let manager = store.find_role_by_name("manager", DEFAULT_GUARD).await?.unwrap();

    let admin = principal(store, &admin_user).await?;
    assert_eq!(
        reason(state.admin.sync_user_access(&admin, target.id, &[super_admin.id], &[]).await),
        Some(DenyReason::PrivilegeEscalationBlocked)
    );
    // Admins may not promote themselves either.
    assert_eq!(
        reason(state.admin.sync_user_access(&admin, admin_user.id, &[super_admin.id], &[]).await),
        Some(DenyReason::PrivilegeEscalationBlocked)
    );
    assert!(store.user_roles(target.id).await?.is_empty());

    let synced = state.admin.sync_user_access(&admin, target.id, &[manager.id], &[]).await?;
    assert_eq!(synced.roles, vec!["manager"]);

    let root = principal(store, &root_user).await?;
    let synced = state.admin.sync_user_access(&root, target.id, &[super_admin.id], &[]).await?;
    assert_eq!(synced.roles, vec!["super-admin"]);
    Ok(())
}

#[tokio::test]
async fn super_admin_accounts_protected_from_deletion() -> Result<()> {
    let (_dir, state) = seeded_state().await?;
    let store = state.store.as_ref();
    let admin_user = user_with_roles(store, "admin@example.com", &["admin"], "x").await?;
    let root_user = user_with_roles(store, "root@example.com", &["super-admin"], "x").await?;
    let other_root = user_with_roles(store, "root2@example.com", &["super-admin"], "x").await?;
    let plain = user_with_roles(store, "plain@example.com", &["manager"], "x").await?;

    let admin = principal(store, &admin_user).await?;
    assert_eq!(
        reason(state.admin.delete_user(&admin, root_user.id).await),
        Some(DenyReason::PrivilegeEscalationBlocked)
    );
    state.admin.delete_user(&admin, plain.id).await?;
    assert!(store.find_user(plain.id).await?.is_none());

    let root = principal(store, &root_user).await?;
    state.admin.delete_user(&root, other_root.id).await?;
    assert!(store.find_user(other_root.id).await?.is_none());
    Ok(())
}

#[tokio::test]
async fn admin_access_permission_deletable_only_by_super_admin() -> Result<()> {
    let (_dir, state) = seeded_state().await?;
    let store = state.store.as_ref();
    let root_user = user_with_roles(store, "root@example.com", &["super-admin"], "x").await?;
    let root = principal(store, &root_user).await?;

    // A custom role that does hold permissions.delete.
    let cleaner = state.admin.create_role(&root, "cleaner", None).await?;
    let delete_perm = store.find_permission_by_name("permissions.delete", DEFAULT_GUARD).await?.unwrap();
    state.admin.sync_role_permissions(&root, cleaner.id, &[delete_perm.id]).await?;
    let cleaner_user = user_with_roles(store, "c@example.com", &["cleaner"], "x").await?;
    let cleaner = principal(store, &cleaner_user).await?;

    let admin_access = store.find_permission_by_name("admin.access", DEFAULT_GUARD).await?.unwrap();
    assert_eq!(
        reason(state.admin.delete_permission(&cleaner, admin_access.id).await),
        Some(DenyReason::PrivilegeEscalationBlocked)
    );

    let firmas = state.admin.create_permission(&root, "firmas.view", None).await?;
    state.admin.delete_permission(&cleaner, firmas.id).await?;

    state.admin.delete_permission(&root, admin_access.id).await?;
    assert!(store.find_permission(admin_access.id).await?.is_none());
    Ok(())
}

#[tokio::test]
async fn manager_can_only_view_users() -> Result<()> {
    let (_dir, state) = seeded_state().await?;
    let store = state.store.as_ref();
    let manager_user = user_with_roles(store, "m@example.com", &["manager"], "x").await?;
    let other = user_with_roles(store, "o@example.com", &[], "x").await?;
    let manager = principal(store, &manager_user).await?;

    let report = state.admin.effective_permissions(&manager, other.id).await?;
    assert!(report.permissions.is_empty());

    assert_eq!(
        reason(state.admin.delete_user(&manager, other.id).await),
        Some(DenyReason::PermissionDenied)
    );
    assert_eq!(
        reason(state.admin.list_roles(&manager).await),
        Some(DenyReason::PermissionDenied)
    );
    assert!(!state.admin.check(&manager, "admin.access")?.allowed);
    assert!(state.admin.check(&manager, "users.view")?.allowed);
    Ok(())
}

#[tokio::test]
async fn inactive_actor_refused_everything() -> Result<()> {
    let (_dir, state) = seeded_state().await?;
    let store = state.store.as_ref();
    let root_user = user_with_roles(store, "root@example.com", &["super-admin"], "x").await?;
    store.set_user_active(root_user.id, false).await?;
    let root = principal(store, &root_user).await?;

    assert_eq!(
        reason(state.admin.list_roles(&root).await),
        Some(DenyReason::AccountInactive)
    );
    let answer = state.admin.check(&root, "users.view")?;
    assert!(!answer.allowed);
    assert_eq!(answer.reason, Some(DenyReason::AccountInactive));
    Ok(())
}

#[tokio::test]
async fn deactivation_takes_effect_on_next_load() -> Result<()> {
    let (_dir, state) = seeded_state().await?;
    let store = state.store.as_ref();
    let admin_user = user_with_roles(store, "admin@example.com", &["admin"], "x").await?;
    let manager_user = user_with_roles(store, "m@example.com", &["manager"], "x").await?;

    let admin = principal(store, &admin_user).await?;
    let updated = state.admin.set_user_active(&admin, manager_user.id, false).await?;
    assert!(!updated.is_active);

    let manager = principal(store, &manager_user).await?;
    assert_eq!(
        state.admin.check(&manager, "users.view")?.reason,
        Some(DenyReason::AccountInactive)
    );
    Ok(())
}

#[tokio::test]
async fn malformed_names_are_errors() -> Result<()> {
    let (_dir, state) = seeded_state().await?;
    let store = state.store.as_ref();
    let root_user = user_with_roles(store, "root@example.com", &["super-admin"], "x").await?;
    let root = principal(store, &root_user).await?;

    assert!(matches!(
        state.admin.create_permission(&root, "nodot", None).await,
        Err(AuthzError::MalformedAbility(_))
    ));
    assert!(matches!(state.admin.check(&root, ".view"), Err(AuthzError::MalformedAbility(_))));
    assert!(matches!(
        state.admin.create_role(&root, "   ", None).await,
        Err(AuthzError::Validation(_))
    ));
    Ok(())
}
