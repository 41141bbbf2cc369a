//! Built-in permission catalog.
//!
//! Covers the admin area and user/role/permission management only. CRUD
//! permissions for other resources come from the registrar and are not listed.

/// Fallback group for names the catalog does not know.
pub const OTHER_GROUP: &str = "Other";

pub type CatalogEntry = (&'static str, &'static str);

const GROUPS: &[(&str, &[CatalogEntry])] = &[
    ("Admin", &[("admin.access", "Admin Panel Access")]),
    (
        "Users",
        &[
            ("users.view", "View Users"),
            ("users.create", "Create Users"),
            ("users.update", "Update Users"),
            ("users.deactivate", "Deactivate Users"),
            ("users.assign_roles", "Assign Roles to Users"),
            ("users.assign_permissions", "Assign Direct Permissions to Users"),
        ],
    ),
    (
        "Roles",
        &[
            ("roles.view", "View Roles"),
            ("roles.create", "Create Roles"),
            ("roles.update", "Update Roles"),
            ("roles.delete", "Delete Roles"),
            ("roles.assign_permissions", "Assign Permissions to Roles"),
        ],
    ),
    (
        "Permissions",
        &[
            ("permissions.view", "View Permissions"),
            ("permissions.create", "Create Permissions"),
            ("permissions.update", "Update Permissions"),
            ("permissions.delete", "Delete Permissions"),
        ],
    ),
];

/// Groups in display order, each with its permissions in display order.
pub fn list_groups() -> &'static [(&'static str, &'static [CatalogEntry])] {
    GROUPS
}

/// Every catalog permission name, flattened in display order.
pub fn permission_names() -> impl Iterator<Item = &'static str> {
    GROUPS
        .iter()
        .flat_map(|(_, entries)| entries.iter().map(|(name, _)| *name))
}

fn lookup(permission: &str) -> Option<(&'static str, &'static str)> {
    GROUPS.iter().find_map(|(group, entries)| {
        entries
            .iter()
            .find(|(name, _)| *name == permission)
            .map(|(_, label)| (*group, *label))
    })
}

pub fn label_for(permission: &str) -> String {
    match lookup(permission) {
        Some((_, label)) => label.to_string(),
        None => permission.replace('_', " "),
    }
}

pub fn group_for(permission: &str) -> &'static str {
    lookup(permission).map(|(group, _)| group).unwrap_or(OTHER_GROUP)
}
