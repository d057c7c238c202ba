//! Check & policy matcher (C5, §4.5): the final pass over the saturated
//! fact set, run once fixpoint evaluation (C2) has finished.

use crate::core::{Check, Fact, Policy, PolicyKind, Rule};
use crate::error::ResultError;
use crate::eval;
use crate::limits::RunLimits;
use std::collections::BTreeSet;

/// One check that failed to find a satisfying query item, identified well
/// enough to render a human-readable explanation (§6) without keeping the
/// whole check around.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedCheck {
    /// Position of the check in the combined, in-order
    /// verifier-then-authority-then-attenuation-blocks check list (§4.5).
    pub check_index: usize,
    pub check: Check,
}

/// A successful verification outcome: which policy matched, at what
/// position, and the specific query item of that policy that was satisfied
/// (§6: "a matched allow query").
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub matched_policy_index: Option<usize>,
    pub matched_query: Rule,
}

/// Runs every check in order and returns the ones that failed (§4.5 step 1).
/// A check passes iff at least one of its query items matches.
fn failed_checks(checks: &[Check], facts: &BTreeSet<Fact>, limits: &RunLimits) -> Vec<FailedCheck> {
    checks
        .iter()
        .enumerate()
        .filter(|(_, check)| !check_satisfied(check, facts, limits))
        .map(|(check_index, check)| FailedCheck {
            check_index,
            check: check.clone(),
        })
        .collect()
}

fn check_satisfied(check: &Check, facts: &BTreeSet<Fact>, limits: &RunLimits) -> bool {
    check
        .queries
        .iter()
        .any(|query| eval::query_matches(query, facts, limits))
}

/// Finds the first policy (in declaration order) with at least one matching
/// query item (§4.5 step 2).
fn first_matching_policy<'a>(
    policies: &'a [Policy],
    facts: &BTreeSet<Fact>,
    limits: &RunLimits,
) -> Option<(usize, &'a Policy)> {
    policies.iter().enumerate().find(|(_, policy)| {
        policy
            .queries
            .iter()
            .any(|query| eval::query_matches(query, facts, limits))
    })
}

fn matched_query(policy: &Policy, facts: &BTreeSet<Fact>, limits: &RunLimits) -> Rule {
    policy
        .queries
        .iter()
        .find(|query| eval::query_matches(query, facts, limits))
        .cloned()
        .expect("policy matched, so some query item matched")
}

/// Evaluates the combined check list and the policy list against the
/// saturated fact set, producing the verdict table of §4.5:
///
/// | checks   | first match | outcome              |
/// |----------|--------------|----------------------|
/// | all pass | Allow        | `Ok` (Success)       |
/// | all pass | none         | `NoPoliciesMatched`  |
/// | all pass | Deny         | `DenyRuleMatched`    |
/// | any fail | none         | `NoPoliciesMatched`  |
/// | any fail | Deny         | `DenyRuleMatched`    |
/// | any fail | Allow        | `FailedChecks`       |
pub fn check_and_match(
    checks: &[Check],
    policies: &[Policy],
    facts: &BTreeSet<Fact>,
    limits: &RunLimits,
) -> Result<Verdict, ResultError> {
    let failed = failed_checks(checks, facts, limits);

    let (index, policy) = match first_matching_policy(policies, facts, limits) {
        None => return Err(ResultError::NoPoliciesMatched(failed)),
        Some(found) => found,
    };

    match policy.kind {
        PolicyKind::Deny => Err(ResultError::DenyRuleMatched(
            failed,
            matched_query(policy, facts, limits),
        )),
        PolicyKind::Allow if failed.is_empty() => Ok(Verdict {
            matched_policy_index: Some(index),
            matched_query: matched_query(policy, facts, limits),
        }),
        PolicyKind::Allow => Err(ResultError::FailedChecks(failed)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder;
    use crate::symbols::SymbolTable;

    fn fact_set(symbols: &mut SymbolTable, facts: &[(&str, &[builder::Term])]) -> BTreeSet<Fact> {
        facts
            .iter()
            .map(|(name, terms)| builder::fact(name, terms).convert(symbols))
            .collect()
    }

    #[test]
    fn allow_policy_succeeds_when_checks_pass() {
        let mut symbols = SymbolTable::with_defaults();
        let facts = fact_set(
            &mut symbols,
            &[("right", &[builder::string("file1"), builder::s("read")])],
        );
        let check = builder::check(&[builder::pred(
            "right",
            &[builder::string("file1"), builder::s("read")],
        )])
        .convert(&mut symbols);
        let allow = builder::allow_if(&[builder::pred(
            "right",
            &[builder::string("file1"), builder::s("read")],
        )])
        .convert(&mut symbols);
        let limits = RunLimits::default();

        let verdict = check_and_match(&[check], &[allow], &facts, &limits).unwrap();
        assert_eq!(verdict.matched_policy_index, Some(0));
        assert_eq!(verdict.matched_query.head.name, symbols.get("allow").unwrap());
    }

    #[test]
    fn deny_wins_even_when_an_earlier_allow_would_have_matched_later() {
        let mut symbols = SymbolTable::with_defaults();
        let facts = fact_set(
            &mut symbols,
            &[("right", &[builder::string("file1"), builder::s("read")])],
        );
        let deny = builder::deny_if(&[builder::pred(
            "right",
            &[builder::string("file1"), builder::s("read")],
        )])
        .convert(&mut symbols);
        let allow = builder::allow_if(&[builder::pred(
            "right",
            &[builder::string("file1"), builder::s("read")],
        )])
        .convert(&mut symbols);
        let limits = RunLimits::default();

        let err = check_and_match(&[], &[deny, allow], &facts, &limits).unwrap_err();
        assert!(matches!(err, ResultError::DenyRuleMatched(_, _)));
    }

    #[test]
    fn no_policy_matches_reports_no_policies_matched() {
        let mut symbols = SymbolTable::with_defaults();
        let facts = fact_set(&mut symbols, &[]);
        let allow =
            builder::allow_if(&[builder::pred("right", &[builder::string("file1")])]).convert(&mut symbols);
        let limits = RunLimits::default();

        let err = check_and_match(&[], &[allow], &facts, &limits).unwrap_err();
        assert!(matches!(err, ResultError::NoPoliciesMatched(_)));
    }

    #[test]
    fn failing_check_under_a_matching_allow_reports_failed_checks() {
        let mut symbols = SymbolTable::with_defaults();
        let facts = fact_set(&mut symbols, &[]);
        let check =
            builder::check(&[builder::pred("right", &[builder::string("file1")])]).convert(&mut symbols);
        let allow = builder::policy_true(builder::PolicyKind::Allow).convert(&mut symbols);
        let limits = RunLimits::default();

        let err = check_and_match(&[check], &[allow], &facts, &limits).unwrap_err();
        assert!(matches!(err, ResultError::FailedChecks(_)));
    }
}
