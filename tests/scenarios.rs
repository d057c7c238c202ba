//! End-to-end `verify()` coverage for the worked scenarios of this engine's
//! design notes: one test per scenario, driving the whole pipeline (world
//! assembly, fixpoint, check/policy matching) rather than a single component.

use biscuit_datalog::block::{Block, VerifierProgram};
use biscuit_datalog::error::{Error, ResultError};
use biscuit_datalog::limits::{AllowAll, Deadline, RunLimits, SystemClock};
use biscuit_datalog::symbols::SymbolTable;
use biscuit_datalog::{builder, eval, verify, world};

fn authority_with_right(symbols: &mut SymbolTable, resource: &str) -> Block {
    let mut block = Block::default();
    block.facts.insert(
        builder::fact(
            "right",
            &[builder::s("authority"), builder::string(resource), builder::s("read")],
        )
        .convert(symbols),
    );
    block
}

#[test]
fn scenario_1_authority_allows_read_of_file1() {
    let mut symbols = SymbolTable::with_defaults();
    let authority = authority_with_right(&mut symbols, "file1");

    let mut verifier = VerifierProgram::default();
    verifier.facts.insert(
        builder::fact("resource", &[builder::s("ambient"), builder::string("file1")]).convert(&mut symbols),
    );
    verifier.facts.insert(
        builder::fact("operation", &[builder::s("ambient"), builder::s("read")]).convert(&mut symbols),
    );
    verifier.policies.push(
        builder::allow_if(&[
            builder::pred("resource", &[builder::s("ambient"), builder::var("f")]),
            builder::pred("operation", &[builder::s("ambient"), builder::s("read")]),
            builder::pred("right", &[builder::s("authority"), builder::var("f"), builder::s("read")]),
        ])
        .convert(&mut symbols),
    );

    let verdict = verify(
        &verifier,
        &authority,
        &[],
        &symbols,
        &RunLimits::default(),
        &SystemClock,
        &AllowAll,
    )
    .unwrap();
    assert_eq!(verdict.matched_policy_index, Some(0));
}

#[test]
fn scenario_2_attenuation_cannot_forge_authority() {
    let mut symbols = SymbolTable::with_defaults();
    let authority = authority_with_right(&mut symbols, "file1");

    let mut attenuation = Block::default();
    attenuation.facts.insert(
        builder::fact(
            "right",
            &[builder::s("authority"), builder::string("file2"), builder::s("read")],
        )
        .convert(&mut symbols),
    );

    let mut verifier = VerifierProgram::default();
    verifier.policies.push(
        builder::allow_if(&[builder::pred(
            "right",
            &[builder::s("authority"), builder::string("file2"), builder::s("read")],
        )])
        .convert(&mut symbols),
    );

    let err = verify(
        &verifier,
        &authority,
        &[attenuation],
        &symbols,
        &RunLimits::default(),
        &SystemClock,
        &AllowAll,
    )
    .unwrap_err();
    assert!(matches!(err, Error::Result(ResultError::NoPoliciesMatched(_))));
}

/// I2/P3, the derivation path distinct from `scenario_2` above: there the
/// forged `authority` fact is planted directly as a *seed fact* in the
/// attenuation block (filtered on ingestion, src/world.rs). Here the
/// attenuation block instead carries a *rule* — `r(#authority, $x) <-
/// seed($x)` — whose derivation would produce an `authority`-tagged fact;
/// that derivation runs through `block_rules` in `eval::one_pass`, a
/// different code path that must independently enforce I2 on what it
/// derives (src/eval.rs's `violates_trust_boundary` check).
#[test]
fn attenuation_block_rule_deriving_an_authority_fact_is_filtered_before_saturation() {
    let mut symbols = SymbolTable::with_defaults();
    let authority = authority_with_right(&mut symbols, "file1");

    let mut attenuation = Block::default();
    attenuation.facts.insert(
        builder::fact("seed", &[builder::string("file3")]).convert(&mut symbols),
    );
    attenuation.rules.push(
        builder::rule(
            "r",
            &[builder::s("authority"), builder::var("x")],
            &[builder::pred("seed", &[builder::var("x")])],
        )
        .convert(&mut symbols),
    );

    let limits = RunLimits::default();

    // Drive C1 (assembly) and C2 (fixpoint) directly so the saturated fact
    // set itself can be inspected, not just the verdict it feeds into.
    let assembled = world::assemble(
        &limits,
        &VerifierProgram::default(),
        &authority,
        &[attenuation.clone()],
        &symbols,
    )
    .unwrap();
    let mut facts = assembled.facts;

    let authority_sym = symbols.get("authority").unwrap();
    let ambient_sym = symbols.get("ambient").unwrap();
    let clock = SystemClock;
    let deadline = Deadline::starting_now(&clock, std::time::Duration::from_secs(5));

    eval::run_to_fixpoint(
        &assembled.trusted_rules,
        &assembled.block_rules,
        &mut facts,
        &limits,
        authority_sym,
        ambient_sym,
        &clock,
        &deadline,
    )
    .unwrap();

    let r_name = symbols.get("r").unwrap();
    assert!(
        !facts.iter().any(|f| f.predicate.name == r_name),
        "a block rule deriving an authority-tagged fact must never reach the saturated set"
    );

    // And end-to-end: no policy that depends on the forged derivation can
    // ever match, since the fact it needs was never admitted.
    let mut verifier = VerifierProgram::default();
    verifier.policies.push(
        builder::allow_if(&[builder::pred(
            "r",
            &[builder::s("authority"), builder::string("file3")],
        )])
        .convert(&mut symbols),
    );

    let err = verify(
        &verifier,
        &authority,
        &[attenuation],
        &symbols,
        &limits,
        &SystemClock,
        &AllowAll,
    )
    .unwrap_err();
    assert!(matches!(err, Error::Result(ResultError::NoPoliciesMatched(_))));
}

#[test]
fn scenario_4_regex_disabled_fails_the_check_not_the_call() {
    let mut symbols = SymbolTable::with_defaults();
    let authority = Block::default();

    let mut verifier = VerifierProgram::default();

    let regex_check = builder::Check {
        queries: vec![builder::constrained_rule(
            "query",
            &Vec::<builder::Term>::new(),
            &[],
            &[builder::Expression {
                ops: vec![
                    builder::Op::Value(builder::string("abc")),
                    builder::Op::Value(builder::string("a.*")),
                    builder::Op::Binary(builder::Binary::Regex),
                ],
            }],
        )],
    };
    verifier.checks.push(regex_check.convert(&mut symbols));
    verifier.policies.push(builder::policy_true(builder::PolicyKind::Allow).convert(&mut symbols));

    let limits = RunLimits {
        allow_regexes: false,
        ..Default::default()
    };
    let err = verify(
        &verifier,
        &authority,
        &[],
        &symbols,
        &limits,
        &SystemClock,
        &AllowAll,
    )
    .unwrap_err();
    assert!(matches!(err, Error::Result(ResultError::FailedChecks(_))));
}

#[test]
fn scenario_5_fact_explosion_trips_too_many_facts() {
    let mut symbols = SymbolTable::with_defaults();
    let mut authority = Block::default();
    for i in 0..100 {
        authority
            .facts
            .insert(builder::fact("seed", &[builder::int(i)]).convert(&mut symbols));
    }
    authority.rules.push(
        builder::rule(
            "r",
            &[builder::var("x"), builder::var("y")],
            &[
                builder::pred("seed", &[builder::var("x")]),
                builder::pred("seed", &[builder::var("y")]),
            ],
        )
        .convert(&mut symbols),
    );

    let verifier = VerifierProgram::default();
    let limits = RunLimits {
        max_facts: 1000,
        ..Default::default()
    };

    let err = verify(
        &verifier,
        &authority,
        &[],
        &symbols,
        &limits,
        &SystemClock,
        &AllowAll,
    )
    .unwrap_err();
    assert!(matches!(err, Error::Execution(biscuit_datalog::error::ExecutionError::TooManyFacts)));
}

#[test]
fn scenario_6_deny_wins_over_allow_when_declared_first() {
    let mut symbols = SymbolTable::with_defaults();
    let authority = Block::default();

    let mut verifier = VerifierProgram::default();
    verifier
        .facts
        .insert(builder::fact("resource", &[builder::s("ambient"), builder::string("file1")]).convert(&mut symbols));
    verifier.policies.push(
        builder::deny_if(&[builder::pred("resource", &[builder::s("ambient"), builder::string("file1")])])
            .convert(&mut symbols),
    );
    verifier
        .policies
        .push(builder::policy_true(builder::PolicyKind::Allow).convert(&mut symbols));

    let err = verify(
        &verifier,
        &authority,
        &[],
        &symbols,
        &RunLimits::default(),
        &SystemClock,
        &AllowAll,
    )
    .unwrap_err();
    assert!(matches!(err, Error::Result(ResultError::DenyRuleMatched(_, _))));
}

#[test]
fn scenario_7_set_membership_is_type_strict() {
    let mut symbols = SymbolTable::with_defaults();
    let authority = Block::default();

    let members: std::collections::BTreeSet<builder::Term> =
        [builder::int(1), builder::int(2)].into_iter().collect();

    let mut verifier = VerifierProgram::default();
    verifier.checks.push(
        builder::Check {
            queries: vec![builder::constrained_rule(
                "query",
                &Vec::<builder::Term>::new(),
                &[],
                &[builder::Expression {
                    ops: vec![
                        builder::Op::Value(builder::set(members)),
                        builder::Op::Value(builder::int(2)),
                        builder::Op::Binary(builder::Binary::Contains),
                    ],
                }],
            )],
        }
        .convert(&mut symbols),
    );
    verifier
        .policies
        .push(builder::policy_true(builder::PolicyKind::Allow).convert(&mut symbols));

    let verdict = verify(
        &verifier,
        &authority,
        &[],
        &symbols,
        &RunLimits::default(),
        &SystemClock,
        &AllowAll,
    )
    .unwrap();
    assert_eq!(verdict.matched_policy_index, Some(0));
}

#[test]
fn scenario_8_date_ordering() {
    let mut symbols = SymbolTable::with_defaults();
    let authority = Block::default();

    let mut verifier = VerifierProgram::default();
    verifier.checks.push(
        builder::Check {
            queries: vec![builder::constrained_rule(
                "query",
                &Vec::<builder::Term>::new(),
                &[],
                &[builder::Expression {
                    ops: vec![
                        builder::Op::Value(builder::Term::Date(1_575_452_801_000_000)),
                        builder::Op::Value(builder::Term::Date(1_607_075_201_000_000)),
                        builder::Op::Binary(builder::Binary::LessThan),
                    ],
                }],
            )],
        }
        .convert(&mut symbols),
    );
    verifier
        .policies
        .push(builder::policy_true(builder::PolicyKind::Allow).convert(&mut symbols));

    let verdict = verify(
        &verifier,
        &authority,
        &[],
        &symbols,
        &RunLimits::default(),
        &SystemClock,
        &AllowAll,
    )
    .unwrap();
    assert_eq!(verdict.matched_policy_index, Some(0));
}
