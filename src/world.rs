//! World assembler (C1, §4.1).

use crate::block::{Block, VerifierProgram};
use crate::core::{Fact, Predicate, Rule, ID};
use crate::error::ExecutionError;
use crate::eval::violates_trust_boundary;
use crate::limits::RunLimits;
use crate::symbols::SymbolTable;
use std::collections::BTreeSet;

/// Three fact/rule sets with provenance kept separate (§3): rules in
/// `trusted_rules` (verifier + authority block) derive facts that are never
/// I2-filtered; rules in `block_rules` (attenuation blocks) have every
/// derivation checked against I2 before it's admitted.
#[derive(Debug, Clone, Default)]
pub struct World {
    pub trusted_rules: Vec<Rule>,
    pub block_rules: Vec<Rule>,
    pub facts: BTreeSet<Fact>,
}

/// Builds a [`World`] from `(limits, verifier, authority_block, attenuation_blocks)`
/// (§4.1). Also performs the range-restriction check (I3) for every rule
/// being admitted, and the `allow_block_facts=false` guard (§7's
/// `FactsInBlocks`).
pub fn assemble(
    limits: &RunLimits,
    verifier: &VerifierProgram,
    authority: &Block,
    attenuation: &[Block],
    symbols: &SymbolTable,
) -> Result<World, ExecutionError> {
    let authority_sym = symbols.get("authority").ok_or(ExecutionError::MissingSymbols)?;
    let ambient_sym = symbols.get("ambient").ok_or(ExecutionError::MissingSymbols)?;
    let revocation_id_sym = symbols
        .get("revocation_id")
        .ok_or(ExecutionError::MissingSymbols)?;
    let unique_revocation_id_sym = symbols
        .get("unique_revocation_id")
        .ok_or(ExecutionError::MissingSymbols)?;

    for rule in &verifier.rules {
        validate_rule(rule, "verifier")?;
    }
    for rule in &authority.rules {
        validate_rule(rule, "authority block")?;
    }

    let mut trusted_rules = Vec::with_capacity(verifier.rules.len() + authority.rules.len());
    trusted_rules.extend(verifier.rules.iter().cloned());
    trusted_rules.extend(authority.rules.iter().cloned());

    let mut facts: BTreeSet<Fact> = BTreeSet::new();
    facts.extend(verifier.facts.iter().cloned());
    facts.extend(authority.facts.iter().cloned());

    let mut block_rules = Vec::new();

    for (i, block) in attenuation.iter().enumerate() {
        let index = (i + 1) as u32;

        if !limits.allow_block_facts {
            if !block.is_empty_of_content() {
                return Err(ExecutionError::FactsInBlocks(index));
            }
            continue;
        }

        for rule in &block.rules {
            validate_rule(rule, &format!("block {}", index))?;
        }
        block_rules.extend(block.rules.iter().cloned());

        for fact in &block.facts {
            // I2: a seed fact from an attenuation block may not forge
            // authority/ambient context either.
            if !violates_trust_boundary(fact, authority_sym, ambient_sym) {
                facts.insert(fact.clone());
            }
        }
    }

    facts.insert(revocation_fact(revocation_id_sym, 0, &authority.generic_revocation_id));
    facts.insert(revocation_fact(
        unique_revocation_id_sym,
        0,
        &authority.unique_revocation_id,
    ));
    for (i, block) in attenuation.iter().enumerate() {
        let index = (i + 1) as i64;
        facts.insert(revocation_fact(revocation_id_sym, index, &block.generic_revocation_id));
        facts.insert(revocation_fact(
            unique_revocation_id_sym,
            index,
            &block.unique_revocation_id,
        ));
    }

    Ok(World {
        trusted_rules,
        block_rules,
        facts,
    })
}

fn validate_rule(rule: &Rule, source: &str) -> Result<(), ExecutionError> {
    if rule.is_range_restricted() {
        Ok(())
    } else {
        Err(ExecutionError::InvalidRule(
            source.to_string(),
            "head/guard variables must all appear in the body".to_string(),
        ))
    }
}

fn revocation_fact(name: crate::symbols::Symbol, index: i64, bytes: &[u8]) -> Fact {
    Fact::new(Predicate::new(
        name,
        vec![ID::Int64(index), ID::Bytes(bytes.to_vec())],
    ))
}
