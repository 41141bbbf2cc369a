use crate::authz::{ability, AuthzError, AuthzResult, DEFAULT_GUARD};

/// Resources whose CRUD gates are registered when `AUTHZ_RESOURCES` is unset.
pub const DEFAULT_RESOURCES: [&str; 4] = ["mail-accounts", "contacts", "plantillas", "firmas"];

/// Authorization settings read from the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthzConfig {
    /// Guard scope for registered gates and newly created roles/permissions.
    pub guard: String,
    pub resources: Vec<String>,
}

impl Default for AuthzConfig {
    fn default() -> Self {
        Self {
            guard: DEFAULT_GUARD.to_string(),
            resources: DEFAULT_RESOURCES.iter().map(|r| r.to_string()).collect(),
        }
    }
}

impl AuthzConfig {
    /// Reads `AUTHZ_GUARD` and `AUTHZ_RESOURCES`.
    pub fn from_env() -> AuthzResult<Self> {
        let guard = std::env::var("AUTHZ_GUARD").ok();
        let resources = std::env::var("AUTHZ_RESOURCES").ok();
        Self::from_values(guard.as_deref(), resources.as_deref())
    }

    pub fn from_values(guard: Option<&str>, resources: Option<&str>) -> AuthzResult<Self> {
        let mut config = Self::default();

        if let Some(guard) = guard.map(str::trim).filter(|g| !g.is_empty()) {
            config.guard = guard.to_string();
        }

        if let Some(list) = resources {
            config.resources = list
                .split(',')
                .map(str::trim)
                .filter(|r| !r.is_empty())
                .map(|r| {
                    if ability::is_valid_resource(r) {
                        Ok(r.to_string())
                    } else {
                        Err(AuthzError::MalformedResource(r.to_string()))
                    }
                })
                .collect::<AuthzResult<_>>()?;
            let mut seen = std::collections::HashSet::new();
            config.resources.retain(|r| seen.insert(r.clone()));
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_when_unset() {
        let config = AuthzConfig::from_values(None, None).unwrap();
        assert_eq!(config, AuthzConfig::default());
        assert_eq!(config.guard, "web");
        assert_eq!(config.resources.len(), 4);
    }

    #[test]
    fn test_resource_list_is_trimmed() {
        let config = AuthzConfig::from_values(Some(" api "), Some("contacts, firmas,,")).unwrap();
        assert_eq!(config.guard, "api");
        assert_eq!(config.resources, vec!["contacts", "firmas"]);
    }

    #[test]
    fn test_dotted_resource_rejected() {
        let err = AuthzConfig::from_values(None, Some("contacts,mail.accounts")).unwrap_err();
        assert!(matches!(err, AuthzError::MalformedResource(r) if r == "mail.accounts"));
    }
}
