//! Limits & deadline guard (C6, §4.6) and the collaborator traits the engine
//! needs from the outside world (§5, §6): a clock and a revocation checker.
//!
//! The teacher wraps `std::time::Instant` behind its own `crate::time::Instant`
//! rather than calling the standard type directly throughout `verifier.rs`
//! (`crate::time::Instant::now()`); this module reuses that indirection as a
//! proper trait, so a caller can supply a virtual clock in tests without the
//! engine depending on wall-clock time directly.

use std::time::{Duration, Instant};

/// Runtime limits for one `verify()` call (§4.6). Named `RunLimits` to match
/// `crate::datalog::RunLimits`, which the teacher's `VerifierLimits` converts
/// into via a `From` impl.
#[derive(Debug, Clone, PartialEq)]
pub struct RunLimits {
    /// Hard ceiling on `|facts|` at any point after a fixpoint pass merges
    /// new derivations in.
    pub max_facts: u64,
    /// Maximum number of fixpoint passes.
    pub max_iterations: u64,
    /// Wall-clock deadline for the entire verification call, including
    /// assembly and matching.
    pub max_time: Duration,
    /// Gates the `Regex` expression operator.
    pub allow_regexes: bool,
    /// Gates inclusion of attenuation-block facts and rules.
    pub allow_block_facts: bool,
}

impl Default for RunLimits {
    fn default() -> Self {
        RunLimits {
            max_facts: 1000,
            max_iterations: 100,
            // matches the teacher's own `VerifierLimits::default()`
            max_time: Duration::from_micros(1000),
            allow_regexes: true,
            allow_block_facts: true,
        }
    }
}

/// A source of monotonic time. `std::time::Instant` is used directly as the
/// associated value since it's already a platform-portable opaque instant;
/// only the *source* of it is abstracted, so tests can supply a clock that
/// reports an already-expired deadline without sleeping.
pub trait Clock {
    fn now(&self) -> Instant;
}

/// The default clock: wall time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Tracks the single deadline for a `verify()` call and is consulted at
/// every suspension point (§5): between fixpoint passes, around the
/// revocation check, and before the final check/policy matching pass.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    expires_at: Instant,
}

impl Deadline {
    pub fn starting_now(clock: &dyn Clock, limit: Duration) -> Self {
        Deadline {
            expires_at: clock.now() + limit,
        }
    }

    pub fn expired(&self, clock: &dyn Clock) -> bool {
        clock.now() >= self.expires_at
    }
}

/// Answer from the external revocation-id checker (§6).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RevocationStatus {
    NotRevoked,
    Revoked,
    IoError(String),
}

/// `(bytes) -> {revoked, not_revoked, io_error}` (§6). The engine calls this
/// once per block, before fact derivation begins, and never re-enters itself
/// from inside the callback (§5).
pub trait RevocationChecker {
    fn check(&self, unique_revocation_id: &[u8]) -> RevocationStatus;
}

/// A checker that never reports a block as revoked, useful for tests and for
/// callers that don't maintain a revocation store.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl RevocationChecker for AllowAll {
    fn check(&self, _unique_revocation_id: &[u8]) -> RevocationStatus {
        RevocationStatus::NotRevoked
    }
}
