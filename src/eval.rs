//! Fixpoint evaluator (C2, §4.2).

use crate::core::{Fact, Predicate, Rule, ID};
use crate::expr::{self, EvalContext};
use crate::limits::{Clock, Deadline, RunLimits};
use crate::symbols::Symbol;
use crate::unify::{self, Binding};
use std::collections::BTreeSet;

/// Computes the bindings under which `predicate` matches some fact in
/// `facts` (§4.2 step 1, "M_k"). Predicates with a different name than a
/// fact never match, so this only scans facts sharing the predicate's name —
/// still a linear scan, which is fine given the fact-count limits that bound
/// this engine's inputs.
fn matches(predicate: &Predicate, facts: &BTreeSet<Fact>) -> Vec<Binding> {
    facts
        .iter()
        .filter(|fact| fact.predicate.name == predicate.name)
        .filter_map(|fact| unify::match_predicate(predicate, fact))
        .collect()
}

/// Computes every complete binding for a rule's body over `facts` (§4.2
/// steps 1-3, shared between rule application and query matching): joins
/// each body predicate's matches in turn, then keeps only bindings that bind
/// every variable occurring in the body.
fn body_bindings(body: &[Predicate], facts: &BTreeSet<Fact>) -> Vec<Binding> {
    let mut accumulator = vec![Binding::new()];
    for predicate in body {
        let next = matches(predicate, facts);
        accumulator = unify::join(accumulator, &next);
        if accumulator.is_empty() {
            return accumulator;
        }
    }
    accumulator
}

/// Applies one rule to the current fact set, producing the facts it derives
/// (§4.2 steps 1-5). Guard failures (type errors, unbound variables, regex
/// disabled, divide-by-zero, overflow) silently reject the offending
/// binding rather than aborting evaluation (§7, §9).
pub fn apply_rule(rule: &Rule, facts: &BTreeSet<Fact>, limits: &RunLimits) -> Vec<Fact> {
    let ctx = EvalContext {
        allow_regexes: limits.allow_regexes,
    };
    let body_vars = rule.body_variables();

    let mut derived = Vec::new();
    for binding in body_bindings(&rule.body, facts) {
        if !unify::is_complete(&binding, &body_vars) {
            continue;
        }
        if !rule
            .expressions
            .iter()
            .all(|expr| expr::guard_passes(expr, &binding, &ctx))
        {
            continue;
        }
        if let Some(fact) = substitute_head(&rule.head, &binding) {
            derived.push(fact);
        }
    }
    derived
}

fn substitute_head(head: &Predicate, binding: &Binding) -> Option<Fact> {
    let mut terms = Vec::with_capacity(head.terms.len());
    for term in &head.terms {
        match term {
            ID::Variable(name) => terms.push(binding.get(name)?.clone()),
            literal => terms.push(literal.clone()),
        }
    }
    Some(Fact::new(Predicate::new(head.name, terms)))
}

/// Whether a query item (a rule's body + guards, ignoring its placeholder
/// head) is satisfied over `facts`: at least one complete binding exists
/// that passes every guard (§3's definition of "query item").
pub fn query_matches(query: &Rule, facts: &BTreeSet<Fact>, limits: &RunLimits) -> bool {
    let ctx = EvalContext {
        allow_regexes: limits.allow_regexes,
    };
    let body_vars = query.body_variables();
    body_bindings(&query.body, facts)
        .into_iter()
        .filter(|binding| unify::is_complete(binding, &body_vars))
        .any(|binding| {
            query
                .expressions
                .iter()
                .all(|expr| expr::guard_passes(expr, &binding, &ctx))
        })
}

/// One fixpoint pass (§4.2 steps 1-4): applies `trusted_rules` and
/// `block_rules` against the current fact set, filters `block_rules`'
/// derivations through I2, and returns the facts newly derived (not yet
/// merged into `facts`).
fn one_pass(
    trusted_rules: &[Rule],
    block_rules: &[Rule],
    facts: &BTreeSet<Fact>,
    limits: &RunLimits,
    authority: Symbol,
    ambient: Symbol,
) -> BTreeSet<Fact> {
    let mut delta = BTreeSet::new();

    for rule in trusted_rules {
        for fact in apply_rule(rule, facts, limits) {
            if !facts.contains(&fact) {
                delta.insert(fact);
            }
        }
    }

    for rule in block_rules {
        for fact in apply_rule(rule, facts, limits) {
            if violates_trust_boundary(&fact, authority, ambient) {
                continue;
            }
            if !facts.contains(&fact) {
                delta.insert(fact);
            }
        }
    }

    delta
}

/// I2: a fact derived from a `block_rules` rule must not carry
/// `Symbol("authority")` or `Symbol("ambient")` anywhere in its term list.
pub fn violates_trust_boundary(fact: &Fact, authority: Symbol, ambient: Symbol) -> bool {
    fact.predicate.terms.iter().any(|term| {
        matches!(term, ID::Symbol(s) if *s == authority || *s == ambient)
    })
}

/// Drives the fixpoint loop to saturation (§4.2), checking limits and the
/// deadline between passes (§4.6, §5). On success, `facts` has been mutated
/// in place to the saturated set; on failure, the caller must not rely on
/// its contents.
pub fn run_to_fixpoint(
    trusted_rules: &[Rule],
    block_rules: &[Rule],
    facts: &mut BTreeSet<Fact>,
    limits: &RunLimits,
    authority: Symbol,
    ambient: Symbol,
    clock: &dyn Clock,
    deadline: &Deadline,
) -> Result<(), crate::error::ExecutionError> {
    use crate::error::ExecutionError;

    let mut remaining = limits.max_iterations;
    loop {
        if deadline.expired(clock) {
            return Err(ExecutionError::Timeout);
        }
        if remaining == 0 {
            return Err(ExecutionError::TooManyIterations);
        }
        remaining -= 1;

        let delta = one_pass(trusted_rules, block_rules, facts, limits, authority, ambient);
        if delta.is_empty() {
            return Ok(());
        }
        facts.extend(delta);
        if facts.len() as u64 >= limits.max_facts {
            return Err(ExecutionError::TooManyFacts);
        }
    }
}
