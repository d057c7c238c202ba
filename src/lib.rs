//! A bounded naive-evaluation Datalog engine for Biscuit-style capability
//! tokens: given an authority block, zero or more attenuation blocks, and a
//! verifier program, derive the saturated fact set those blocks and the
//! verifier together imply, then check it against the verifier's checks and
//! policies.
//!
//! This crate implements the evaluation engine only (§1): parsing token
//! wire format, signature verification, and the revocation-id *derivation*
//! (as opposed to the revocation *check*, which is a caller-supplied
//! collaborator, see [`limits::RevocationChecker`]) are out of scope and
//! expected to live in the layer that calls [`verify`].

pub mod block;
pub mod builder;
pub mod core;
pub mod error;
pub mod eval;
pub mod expr;
pub mod limits;
pub mod symbols;
pub mod unify;
pub mod verdict;
pub mod world;

pub use block::{Block, VerifierProgram};
pub use error::{Error, ExecutionError, ResultError};
pub use limits::{AllowAll, Clock, Deadline, RevocationChecker, RevocationStatus, RunLimits, SystemClock};
pub use symbols::SymbolTable;
pub use verdict::{FailedCheck, Verdict};

/// Verifies a token against a verifier program (§6): the single entry point
/// that wires the six components together.
///
/// `authority` is block 0; `attenuation` is blocks `1..N` in append order.
/// `symbols` must already have interned every name every block and the
/// verifier reference — this engine never invents new names on its own.
///
/// Revocation is checked first (§4.6, §7): any block reported revoked, or
/// whose checker call errors, aborts the whole call before any fact is
/// derived. The world is then assembled (C1), the fixpoint is run to
/// saturation (C2-C4, honoring the deadline and the fact/iteration limits),
/// and finally checks and policies are matched against the saturated set
/// (C5).
pub fn verify(
    verifier: &VerifierProgram,
    authority: &Block,
    attenuation: &[Block],
    symbols: &SymbolTable,
    limits: &RunLimits,
    clock: &dyn Clock,
    revocation_checker: &dyn RevocationChecker,
) -> Result<Verdict, Error> {
    let deadline = Deadline::starting_now(clock, limits.max_time);

    check_revocation(authority, 0, revocation_checker)?;
    for (i, block) in attenuation.iter().enumerate() {
        if deadline.expired(clock) {
            return Err(ExecutionError::Timeout.into());
        }
        check_revocation(block, (i + 1) as u32, revocation_checker)?;
    }

    let assembled = world::assemble(limits, verifier, authority, attenuation, symbols)?;
    let mut facts = assembled.facts;

    let authority_sym = symbols.get("authority").ok_or(ExecutionError::MissingSymbols)?;
    let ambient_sym = symbols.get("ambient").ok_or(ExecutionError::MissingSymbols)?;

    eval::run_to_fixpoint(
        &assembled.trusted_rules,
        &assembled.block_rules,
        &mut facts,
        limits,
        authority_sym,
        ambient_sym,
        clock,
        &deadline,
    )?;

    if deadline.expired(clock) {
        return Err(ExecutionError::Timeout.into());
    }

    let mut checks = verifier.checks.clone();
    checks.extend(authority.checks.iter().cloned());
    for block in attenuation {
        checks.extend(block.checks.iter().cloned());
    }

    verdict::check_and_match(&checks, &verifier.policies, &facts, limits)
        .map_err(Error::from)
}

fn check_revocation(
    block: &Block,
    index: u32,
    checker: &dyn RevocationChecker,
) -> Result<(), ExecutionError> {
    match checker.check(&block.unique_revocation_id) {
        RevocationStatus::NotRevoked => Ok(()),
        RevocationStatus::Revoked => Err(ExecutionError::Revoked(index)),
        RevocationStatus::IoError(message) => {
            Err(ExecutionError::RevocationCheckFailed(index, message))
        }
    }
}
