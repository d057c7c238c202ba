//! The public, string-based AST and its constructor functions.
//!
//! A caller builds values from this module directly — standing in for the
//! output of the Datalog surface-syntax parser, which is out of scope for
//! this engine (§1) — and then `.convert(&mut symbols)`s them into
//! [`crate::core`] before handing them to [`crate::verify`]. The shape and
//! the constructor names (`fact`, `pred`, `rule`, `constrained_rule`, `var`,
//! `s`, `string`, `date`, ...) are the teacher's own: see `verifier.rs`'s
//! `add_resource`/`add_operation`/`revocation_check`, which build values
//! this way by hand.

use crate::core;
use crate::symbols::SymbolTable;
use std::collections::BTreeSet;
use time::OffsetDateTime;

/// Builder-side term: the same sum §3 defines, but with `Symbol` and
/// `Variable` spelled out as plain strings rather than interned indices.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Term {
    Symbol(String),
    Variable(String),
    Int64(i64),
    Str(String),
    /// Microseconds since the Unix epoch, UTC.
    Date(i64),
    Bytes(Vec<u8>),
    Bool(bool),
    Set(BTreeSet<Term>),
}

impl Term {
    pub fn convert(&self, symbols: &mut SymbolTable) -> core::ID {
        match self {
            Term::Symbol(name) => core::ID::Symbol(symbols.insert(name)),
            Term::Variable(name) => core::ID::Variable(symbols.insert(name)),
            Term::Int64(i) => core::ID::Int64(*i),
            Term::Str(s) => core::ID::Str(s.clone()),
            Term::Date(us) => core::ID::Date(*us),
            Term::Bytes(b) => core::ID::Bytes(b.clone()),
            Term::Bool(b) => core::ID::Bool(*b),
            Term::Set(set) => {
                core::ID::Set(set.iter().map(|t| t.convert(symbols)).collect())
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Predicate {
    pub name: String,
    pub terms: Vec<Term>,
}

impl Predicate {
    pub fn convert(&self, symbols: &mut SymbolTable) -> core::Predicate {
        core::Predicate::new(
            symbols.insert(&self.name),
            self.terms.iter().map(|t| t.convert(symbols)).collect(),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fact {
    pub predicate: Predicate,
}

impl Fact {
    pub fn convert(&self, symbols: &mut SymbolTable) -> core::Fact {
        core::Fact::new(self.predicate.convert(symbols))
    }
}

pub use core::{Binary, Unary};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    Value(Term),
    Unary(Unary),
    Binary(Binary),
}

impl Op {
    pub fn convert(&self, symbols: &mut SymbolTable) -> core::Op {
        match self {
            Op::Value(t) => core::Op::Value(t.convert(symbols)),
            Op::Unary(u) => core::Op::Unary(*u),
            Op::Binary(b) => core::Op::Binary(*b),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Expression {
    pub ops: Vec<Op>,
}

impl Expression {
    pub fn convert(&self, symbols: &mut SymbolTable) -> core::Expression {
        core::Expression {
            ops: self.ops.iter().map(|op| op.convert(symbols)).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    pub head: Predicate,
    pub body: Vec<Predicate>,
    pub expressions: Vec<Expression>,
}

impl Rule {
    pub fn new(head: Predicate, body: Vec<Predicate>, expressions: Vec<Expression>) -> Rule {
        Rule {
            head,
            body,
            expressions,
        }
    }

    /// Standalone, opt-in I3 (range restriction) pre-check for callers who
    /// build `builder::Rule` values directly (standing in for a parser) and
    /// want a readable error *before* paying the cost of interning a rule's
    /// symbols into a `SymbolTable` — this never touches a `SymbolTable` and
    /// so can be called on a rule that will ultimately be rejected, with no
    /// side effect on the table a caller reuses across many rules.
    ///
    /// This is not called anywhere on the `verify()` path: `world::assemble`
    /// re-checks I3 on the already-interned `core::Rule` (see its
    /// `validate_rule`), since that is the one place every rule — regardless
    /// of how a caller assembled its `builder::Rule` — is guaranteed to pass
    /// through. Calling this method first is a convenience for callers that
    /// want the same diagnostic earlier and without mutating their table; it
    /// is not required for correctness.
    pub fn validate_variables(&self) -> Result<(), String> {
        use std::collections::HashSet;

        let mut body_vars: HashSet<&str> = HashSet::new();
        for predicate in &self.body {
            for term in &predicate.terms {
                if let Term::Variable(v) = term {
                    body_vars.insert(v.as_str());
                }
            }
        }

        let mut free = Vec::new();
        for term in &self.head.terms {
            if let Term::Variable(v) = term {
                if !body_vars.contains(v.as_str()) {
                    free.push(v.clone());
                }
            }
        }
        for expr in &self.expressions {
            for op in &expr.ops {
                if let Op::Value(Term::Variable(v)) = op {
                    if !body_vars.contains(v.as_str()) {
                        free.push(v.clone());
                    }
                }
            }
        }

        if free.is_empty() {
            Ok(())
        } else {
            free.sort();
            free.dedup();
            Err(format!(
                "rule contains variables not bound by any body predicate: {}",
                free.iter()
                    .map(|v| format!("${}", v))
                    .collect::<Vec<_>>()
                    .join(", ")
            ))
        }
    }

    pub fn convert(&self, symbols: &mut SymbolTable) -> core::Rule {
        core::Rule::new(
            self.head.convert(symbols),
            self.body.iter().map(|p| p.convert(symbols)).collect(),
            self.expressions.iter().map(|e| e.convert(symbols)).collect(),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Check {
    pub queries: Vec<Rule>,
}

impl Check {
    pub fn convert(&self, symbols: &mut SymbolTable) -> core::Check {
        core::Check {
            queries: self.queries.iter().map(|r| r.convert(symbols)).collect(),
        }
    }
}

pub use core::PolicyKind;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Policy {
    pub kind: PolicyKind,
    pub queries: Vec<Rule>,
}

impl Policy {
    pub fn convert(&self, symbols: &mut SymbolTable) -> core::Policy {
        core::Policy {
            kind: self.kind,
            queries: self.queries.iter().map(|r| r.convert(symbols)).collect(),
        }
    }
}

/// creates a predicate
pub fn pred<I: AsRef<Term>>(name: &str, terms: &[I]) -> Predicate {
    Predicate {
        name: name.to_string(),
        terms: terms.iter().map(|t| t.as_ref().clone()).collect(),
    }
}

/// creates a fact
pub fn fact<I: AsRef<Term>>(name: &str, terms: &[I]) -> Fact {
    Fact {
        predicate: pred(name, terms),
    }
}

/// creates a rule with an empty guard list
pub fn rule<T: AsRef<Term>>(head_name: &str, head_terms: &[T], body: &[Predicate]) -> Rule {
    Rule::new(pred(head_name, head_terms), body.to_vec(), Vec::new())
}

/// creates a rule with guard expressions
pub fn constrained_rule<T: AsRef<Term>>(
    head_name: &str,
    head_terms: &[T],
    body: &[Predicate],
    expressions: &[Expression],
) -> Rule {
    Rule::new(
        pred(head_name, head_terms),
        body.to_vec(),
        expressions.to_vec(),
    )
}

/// creates a single-item check: the conjunction `body` must yield at least
/// one complete binding.
pub fn check(body: &[Predicate]) -> Check {
    Check {
        queries: vec![rule("query", &Vec::<Term>::new(), body)],
    }
}

/// creates a check out of several query items (a disjunction: any one of
/// them matching is enough).
pub fn check_any(queries: Vec<Rule>) -> Check {
    Check { queries }
}

/// creates an `allow` policy out of a single query item
pub fn allow_if(body: &[Predicate]) -> Policy {
    Policy {
        kind: PolicyKind::Allow,
        queries: vec![rule("allow", &Vec::<Term>::new(), body)],
    }
}

/// creates a `deny` policy out of a single query item
pub fn deny_if(body: &[Predicate]) -> Policy {
    Policy {
        kind: PolicyKind::Deny,
        queries: vec![rule("deny", &Vec::<Term>::new(), body)],
    }
}

/// an always-true policy, used for a catch-all `allow if true;`/`deny if true;`
pub fn policy_true(kind: PolicyKind) -> Policy {
    Policy {
        kind,
        queries: vec![constrained_rule(
            "policy",
            &Vec::<Term>::new(),
            &[],
            &[Expression {
                ops: vec![Op::Value(Term::Bool(true))],
            }],
        )],
    }
}

/// creates a symbol
pub fn s(name: &str) -> Term {
    Term::Symbol(name.to_string())
}

/// creates a string
pub fn string(s: &str) -> Term {
    Term::Str(s.to_string())
}

/// creates a variable for a rule
pub fn var(name: &str) -> Term {
    Term::Variable(name.to_string())
}

/// creates an integer value
pub fn int(i: i64) -> Term {
    Term::Int64(i)
}

/// creates a date from an RFC3339-formatted instant, internally stored as
/// microseconds since the Unix epoch
pub fn date(t: &OffsetDateTime) -> Term {
    let micros = t.unix_timestamp() as i64 * 1_000_000 + (t.microsecond() as i64);
    Term::Date(micros)
}

/// creates a byte array
pub fn bytes(b: &[u8]) -> Term {
    Term::Bytes(b.to_vec())
}

/// creates a boolean
pub fn boolean(b: bool) -> Term {
    Term::Bool(b)
}

/// creates a set
pub fn set(s: BTreeSet<Term>) -> Term {
    Term::Set(s)
}

impl AsRef<Term> for Term {
    fn as_ref(&self) -> &Term {
        self
    }
}
