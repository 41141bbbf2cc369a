use super::ability::{Ability, ADMIN_ACCESS};
use super::decision::{Decision, DenyReason};
use super::error::{AuthzError, AuthzResult};
use super::principal::Principal;
use super::registry::GateRegistry;
use super::rules::{default_rules, Rule};
use super::target::Target;

/// Policy evaluator trait for pluggable authorization logic
pub trait PolicyEvaluator: Send + Sync {
    /// Decide `ability` for `principal`, optionally against `target`.
    fn check(&self, principal: &Principal, ability: &Ability, target: Option<&Target>) -> Decision;

    fn can(&self, principal: &Principal, ability: &Ability, target: Option<&Target>) -> bool {
        self.check(principal, ability, target).is_allowed()
    }

    /// Like [`check`](Self::check), but turns a denial into [`AuthzError::Denied`].
    fn authorize(&self, principal: &Principal, ability: &Ability, target: Option<&Target>) -> AuthzResult<()> {
        match self.check(principal, ability, target) {
            Decision::Allow => Ok(()),
            Decision::Deny(reason) => Err(AuthzError::denied(ability.as_str(), reason)),
        }
    }
}

/// Default evaluator: ordered pre-rules, then the registered gate.
///
/// Evaluation order:
/// 1. inactive account -> deny
/// 2. reserved / in-use role integrity -> deny
/// 3. super-admin -> allow
/// 4. no gate registered -> deny
/// 5. gate predicate decides
pub struct Gate {
    rules: Vec<Box<dyn Rule>>,
    registry: GateRegistry,
}

impl Gate {
    pub fn new(registry: GateRegistry) -> Self {
        Self {
            rules: default_rules(),
            registry,
        }
    }

    pub fn registry(&self) -> &GateRegistry {
        &self.registry
    }

    /// Parses `ability` first; a malformed name is an error, never a denial.
    pub fn check_str(&self, principal: &Principal, ability: &str, target: Option<&Target>) -> AuthzResult<Decision> {
        let ability = Ability::parse(ability)?;
        Ok(self.check(principal, &ability, target))
    }

    /// Admission to the administrative area.
    pub fn admin_access(&self, principal: &Principal) -> Decision {
        match Ability::parse(ADMIN_ACCESS) {
            Ok(ability) => self.check(principal, &ability, None),
            Err(_) => Decision::Deny(DenyReason::UnknownAbility),
        }
    }
}

impl std::fmt::Debug for Gate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let rules: Vec<&str> = self.rules.iter().map(|r| r.name()).collect();
        f.debug_struct("Gate")
            .field("rules", &rules)
            .field("registry", &self.registry)
            .finish()
    }
}

impl PolicyEvaluator for Gate {
    fn check(&self, principal: &Principal, ability: &Ability, target: Option<&Target>) -> Decision {
        for rule in &self.rules {
            if let Some(decision) = rule.apply(principal, ability, target) {
                tracing::debug!(
                    user_id = %principal.user_id,
                    ability = %ability,
                    rule = rule.name(),
                    allowed = decision.is_allowed(),
                    "decided by rule"
                );
                return decision;
            }
        }

        let Some(predicate) = self.registry.get(ability) else {
            tracing::debug!(
                user_id = %principal.user_id,
                ability = %ability,
                "no gate registered"
            );
            return Decision::Deny(DenyReason::UnknownAbility);
        };

        let decision = predicate(principal, target);
        match decision.reason() {
            None => tracing::debug!(
                user_id = %principal.user_id,
                ability = %ability,
                "gate allowed"
            ),
            Some(reason) => tracing::debug!(
                user_id = %principal.user_id,
                ability = %ability,
                reason = %reason,
                "gate denied"
            ),
        }
        decision
    }
}
