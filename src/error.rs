//! Error strata (§7), following the teacher's own layering: a closed,
//! `thiserror`-derived enum per stratum (`error::Token`, `error::Logic`,
//! `error::RunLimit` in the teacher) rather than a single flat error type.

use crate::verdict::FailedCheck;

/// Execution errors abort the call: evaluation didn't produce a verdict at
/// all, regardless of what the facts would eventually have shown.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExecutionError {
    #[error("verification exceeded its deadline")]
    Timeout,
    #[error("fact set exceeded the configured limit")]
    TooManyFacts,
    #[error("fixpoint evaluation exceeded the configured iteration limit")]
    TooManyIterations,
    #[error("attenuation block {0} carries facts or rules but block facts are disabled")]
    FactsInBlocks(u32),
    #[error("block {0} has been revoked")]
    Revoked(u32),
    #[error("revocation check for block {0} failed: {1}")]
    RevocationCheckFailed(u32, String),
    #[error("the symbol table is missing symbols the engine requires (authority/ambient)")]
    MissingSymbols,
    #[error("rule in {0} is not range-restricted: {1}")]
    InvalidRule(String, String),
}

/// Result errors: evaluation completed but the outcome was a negative
/// verdict. These carry enough structure (§6) to render a human-readable
/// explanation via [`crate::symbols::SymbolTable`] printing helpers.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResultError {
    #[error("no policy matched ({} failed check(s))", .0.len())]
    NoPoliciesMatched(Vec<FailedCheck>),
    #[error("{} check(s) failed", .0.len())]
    FailedChecks(Vec<FailedCheck>),
    #[error("an explicit deny policy matched ({} failed check(s))", .0.len())]
    DenyRuleMatched(Vec<FailedCheck>, crate::core::Rule),
}

/// The top-level error `verify()` returns.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Execution(#[from] ExecutionError),
    #[error(transparent)]
    Result(#[from] ResultError),
}
