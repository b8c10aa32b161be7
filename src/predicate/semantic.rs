//! The semantic predicate registry (§4.8).
//!
//! Semantic predicates are open-ended — callers bring their own (`count`,
//! string-level checksum predicates, and so on) — so they live behind a
//! trait object rather than the closed match the structural library uses.
//! The registry is built once per evaluation and never mutated afterwards.

use crate::predicate::structural::Arg;
use crate::tree::Tree;
use crate::verdict::Verdict;
use std::collections::BTreeMap;
use std::sync::Arc;

/// A caller-supplied semantic predicate (§4.8). Implementations may return
/// `Undef` for inputs they cannot decide; this is the only place besides
/// the SMT oracle where `Undef` originates.
pub trait SemanticPredicate: Send + Sync {
    fn name(&self) -> &str;
    fn arity(&self) -> usize;
    fn evaluate(&self, args: &[Arg], tree: &Tree) -> Verdict;
}

/// An immutable name -> predicate map, built once from the predicates the
/// caller registers before evaluation starts (§4.8, §5).
#[derive(Clone, Default)]
pub struct SemanticRegistry {
    predicates: BTreeMap<String, Arc<dyn SemanticPredicate>>,
}

impl SemanticRegistry {
    pub fn new() -> Self {
        Self { predicates: BTreeMap::new() }
    }

    pub fn register(mut self, predicate: Arc<dyn SemanticPredicate>) -> Self {
        self.predicates.insert(predicate.name().to_string(), predicate);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn SemanticPredicate>> {
        self.predicates.get(name)
    }

    /// `(name, arity)` pairs for every registered predicate, the shape the
    /// parser's arity check wants (§4.4).
    pub fn signatures(&self) -> Vec<(&str, usize)> {
        self.predicates.values().map(|p| (p.name(), p.arity())).collect()
    }
}

#[cfg(test)]
mod __tests__ {
    use super::*;
    use crate::tree::TreeBuilder;

    struct AlwaysSat;
    impl SemanticPredicate for AlwaysSat {
        fn name(&self) -> &str {
            "always_sat"
        }
        fn arity(&self) -> usize {
            1
        }
        fn evaluate(&self, _args: &[Arg], _tree: &Tree) -> Verdict {
            Verdict::Sat
        }
    }

    #[test]
    fn registered_predicate_is_retrievable_and_signed() {
        let registry = SemanticRegistry::new().register(Arc::new(AlwaysSat));
        assert_eq!(registry.signatures(), vec![("always_sat", 1)]);
        let mut builder = TreeBuilder::new();
        builder.terminal("a");
        let tree = builder.finish();
        let predicate = registry.get("always_sat").unwrap();
        assert_eq!(predicate.evaluate(&[], &tree), Verdict::Sat);
    }
}
