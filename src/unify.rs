//! Unifier / binding engine (C3, §4.3).
//!
//! No persistent data structure is needed here — per §9's design notes, a
//! binding is produced, merged, and consumed entirely within one rule
//! application — so a plain sorted map suffices.

use crate::core::{Fact, Predicate, ID};
use crate::symbols::Symbol;
use std::collections::BTreeMap;

/// A mapping from variable name to the (non-variable) term it's bound to.
pub type Binding = BTreeMap<Symbol, ID>;

/// Matches a single body predicate against a single fact, producing the
/// binding it implies, or `None` if the predicate and fact don't unify.
///
/// Per §4.3: names and arities must match; each position either binds a
/// variable or must be structurally equal to the fact's term there; a
/// variable that appears twice within the same predicate must be bound to
/// the same value both times (checked inline as we accumulate).
pub fn match_predicate(predicate: &Predicate, fact: &Fact) -> Option<Binding> {
    if predicate.name != fact.predicate.name {
        return None;
    }
    if predicate.terms.len() != fact.predicate.terms.len() {
        return None;
    }

    let mut binding = Binding::new();
    for (pattern, value) in predicate.terms.iter().zip(fact.predicate.terms.iter()) {
        match pattern {
            ID::Variable(name) => match binding.get(name) {
                Some(existing) if existing != value => return None,
                Some(_) => {}
                None => {
                    binding.insert(*name, value.clone());
                }
            },
            literal => {
                if literal != value {
                    return None;
                }
            }
        }
    }
    Some(binding)
}

/// Consistent merge of several bindings (§4.3): for each variable, collects
/// the set of values it's bound to across the inputs. If every variable has
/// at most one distinct value, returns the union; otherwise (some variable
/// bound to two different values across the inputs) the tuple is
/// inconsistent and merging fails.
pub fn consistent_merge(bindings: &[Binding]) -> Option<Binding> {
    let mut merged = Binding::new();
    for binding in bindings {
        for (name, value) in binding {
            match merged.get(name) {
                Some(existing) if existing != value => return None,
                Some(_) => {}
                None => {
                    merged.insert(*name, value.clone());
                }
            }
        }
    }
    Some(merged)
}

/// A binding is *complete* with respect to a body iff its key set equals the
/// set of variables occurring anywhere in that body (§4.3).
pub fn is_complete(binding: &Binding, body_variables: &std::collections::BTreeSet<Symbol>) -> bool {
    if binding.len() != body_variables.len() {
        return false;
    }
    binding.keys().all(|k| body_variables.contains(k))
}

/// Joins a newly-computed set of per-predicate bindings (`next`) onto an
/// accumulator of partial bindings built from the predicates seen so far,
/// keeping only consistent merges. This incrementally computes the same
/// result as forming the full Cartesian product up front and discarding
/// inconsistent tuples (§4.2 step 2), just without materializing it.
pub fn join(accumulator: Vec<Binding>, next: &[Binding]) -> Vec<Binding> {
    let mut joined = Vec::with_capacity(accumulator.len() * next.len().max(1));
    for left in &accumulator {
        for right in next {
            if let Some(merged) = consistent_merge(&[left.clone(), right.clone()]) {
                joined.push(merged);
            }
        }
    }
    joined
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Fact, Predicate};
    use crate::symbols::SymbolTable;

    fn sym(table: &mut SymbolTable, name: &str) -> Symbol {
        table.insert(name)
    }

    #[test]
    fn matches_and_binds_variable() {
        let mut symbols = SymbolTable::new();
        let right = sym(&mut symbols, "right");
        let file1 = sym(&mut symbols, "file1");
        let x = sym(&mut symbols, "x");

        let fact = Fact::new(Predicate::new(right, vec![ID::Symbol(file1)]));
        let pattern = Predicate::new(right, vec![ID::Variable(x)]);

        let binding = match_predicate(&pattern, &fact).expect("should match");
        assert_eq!(binding.get(&x), Some(&ID::Symbol(file1)));
    }

    #[test]
    fn repeated_variable_must_be_consistent() {
        let mut symbols = SymbolTable::new();
        let eq = sym(&mut symbols, "eq");
        let a = sym(&mut symbols, "a");
        let b = sym(&mut symbols, "b");
        let x = sym(&mut symbols, "x");

        let fact = Fact::new(Predicate::new(eq, vec![ID::Symbol(a), ID::Symbol(b)]));
        let pattern = Predicate::new(eq, vec![ID::Variable(x), ID::Variable(x)]);

        assert!(match_predicate(&pattern, &fact).is_none());
    }

    #[test]
    fn consistent_merge_rejects_conflicting_bindings() {
        let mut symbols = SymbolTable::new();
        let x = sym(&mut symbols, "x");
        let a = sym(&mut symbols, "a");
        let b = sym(&mut symbols, "b");

        let mut b1 = Binding::new();
        b1.insert(x, ID::Symbol(a));
        let mut b2 = Binding::new();
        b2.insert(x, ID::Symbol(b));

        assert!(consistent_merge(&[b1, b2]).is_none());
    }
}
