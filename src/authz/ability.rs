use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::error::{AuthzError, AuthzResult};

/// The single permission that opens the administrative area.
pub const ADMIN_ACCESS: &str = "admin.access";

/// The five canonical actions every CRUD resource exposes, in registration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CrudAction {
    #[serde(rename = "viewAny")]
    ViewAny,
    #[serde(rename = "view")]
    View,
    #[serde(rename = "create")]
    Create,
    #[serde(rename = "update")]
    Update,
    #[serde(rename = "delete")]
    Delete,
}

impl CrudAction {
    pub const ALL: [CrudAction; 5] = [
        CrudAction::ViewAny,
        CrudAction::View,
        CrudAction::Create,
        CrudAction::Update,
        CrudAction::Delete,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CrudAction::ViewAny => "viewAny",
            CrudAction::View => "view",
            CrudAction::Create => "create",
            CrudAction::Update => "update",
            CrudAction::Delete => "delete",
        }
    }
}

/// A validated `<resource>.<action>` ability name.
///
/// The resource is everything before the first dot, the action everything
/// after it, so `any.random.ability` is resource `any` with action
/// `random.ability`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Ability {
    name: String,
    dot: usize,
}

impl Ability {
    pub fn parse(name: &str) -> AuthzResult<Self> {
        let dot = name
            .find('.')
            .ok_or_else(|| AuthzError::MalformedAbility(name.to_string()))?;

        let (resource, action) = (&name[..dot], &name[dot + 1..]);
        if !is_valid_resource(resource) || !is_valid_segment(action) {
            return Err(AuthzError::MalformedAbility(name.to_string()));
        }

        Ok(Self {
            name: name.to_string(),
            dot,
        })
    }

    pub fn new(resource: &str, action: &str) -> AuthzResult<Self> {
        if !is_valid_resource(resource) {
            return Err(AuthzError::MalformedResource(resource.to_string()));
        }
        Self::parse(&format!("{resource}.{action}"))
    }

    pub fn crud(resource: &str, action: CrudAction) -> AuthzResult<Self> {
        Self::new(resource, action.as_str())
    }

    pub fn resource(&self) -> &str {
        &self.name[..self.dot]
    }

    pub fn action(&self) -> &str {
        &self.name[self.dot + 1..]
    }

    pub fn as_str(&self) -> &str {
        &self.name
    }
}

/// Resource names carry no dot: the first dot always splits resource from action.
pub(crate) fn is_valid_resource(resource: &str) -> bool {
    is_valid_segment(resource) && !resource.contains('.')
}

fn is_valid_segment(segment: &str) -> bool {
    !segment.is_empty()
        && !segment.starts_with('.')
        && !segment.ends_with('.')
        && !segment.contains("..")
        && segment
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'))
}

impl fmt::Display for Ability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

impl FromStr for Ability {
    type Err = AuthzError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Ability {
    type Error = AuthzError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Ability> for String {
    fn from(value: Ability) -> Self {
        value.name
    }
}

impl AsRef<str> for Ability {
    fn as_ref(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_splits_on_first_dot() {
        let ability = Ability::parse("mail-accounts.viewAny").unwrap();
        assert_eq!(ability.resource(), "mail-accounts");
        assert_eq!(ability.action(), "viewAny");

        let nested = Ability::parse("any.random.ability").unwrap();
        assert_eq!(nested.resource(), "any");
        assert_eq!(nested.action(), "random.ability");
    }

    #[test]
    fn test_parse_rejects_malformed_names() {
        for bad in ["", "admin", ".access", "admin.", "users..view", "users.view all", "us ers.view"] {
            assert!(
                matches!(Ability::parse(bad), Err(AuthzError::MalformedAbility(_))),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_crud_builds_canonical_casing() {
        let ability = Ability::crud("contacts", CrudAction::ViewAny).unwrap();
        assert_eq!(ability.as_str(), "contacts.viewAny");

        let err = Ability::crud("bad.resource", CrudAction::View).unwrap_err();
        assert!(matches!(err, AuthzError::MalformedResource(_)));
    }

    #[test]
    fn test_serde_uses_plain_string() {
        let ability: Ability = serde_json::from_str("\"users.assign_roles\"").unwrap();
        assert_eq!(ability.action(), "assign_roles");
        assert_eq!(serde_json::to_string(&ability).unwrap(), "\"users.assign_roles\"");
        assert!(serde_json::from_str::<Ability>("\"nodot\"").is_err());
    }
}
