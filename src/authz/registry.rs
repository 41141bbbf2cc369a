use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::ability::Ability;
use super::decision::Decision;
use super::principal::Principal;
use super::target::Target;

/// Gate predicate: decides one ability for a principal and optional target.
pub type Predicate = Arc<dyn Fn(&Principal, Option<&Target>) -> Decision + Send + Sync>;

/// Ability name → predicate table.
///
/// Built once at startup and then handed to the [`Gate`](super::Gate);
/// each test can build its own.
#[derive(Clone, Default)]
pub struct GateRegistry {
    gates: HashMap<String, Predicate>,
}

impl GateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `ability` to `predicate`. A later definition for the same name wins.
    pub fn define<F>(&mut self, ability: &Ability, predicate: F)
    where
        F: Fn(&Principal, Option<&Target>) -> Decision + Send + Sync + 'static,
    {
        let replaced = self
            .gates
            .insert(ability.as_str().to_string(), Arc::new(predicate))
            .is_some();
        if replaced {
            tracing::debug!(ability = %ability, "gate redefined");
        }
    }

    pub fn get(&self, ability: &Ability) -> Option<&Predicate> {
        self.gates.get(ability.as_str())
    }

    pub fn contains(&self, ability: &Ability) -> bool {
        self.gates.contains_key(ability.as_str())
    }

    pub fn len(&self) -> usize {
        self.gates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.gates.is_empty()
    }

    /// Registered ability names, sorted.
    pub fn abilities(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.gates.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl fmt::Debug for GateRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GateRegistry")
            .field("abilities", &self.abilities())
            .finish()
    }
}
