//! Symbol interning.
//!
//! The core AST never stores interned names as raw `String`s: a
//! [`SymbolTable`] interns `Symbol` and `Variable` names to small integers,
//! both for compact equality/hash and so that a single table can be shared
//! and printed back from across an entire verification call.

use std::collections::HashMap;

/// An interned name: either a `Symbol` value or a `Variable` name, depending
/// on where it's used in the core AST. Two `Symbol`s compare equal iff they
/// were interned from the same string in the same table.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Symbol(pub(crate) u32);

impl Symbol {
    pub fn index(self) -> u32 {
        self.0
    }
}

/// Interns strings to [`Symbol`]s and resolves them back for printing.
///
/// Insertion order is whatever order the caller interns names in, which in
/// this engine is always driven by block processing order (authority, then
/// attenuation blocks in index order, then the verifier) rather than by
/// hashing, so the resulting indices are deterministic given the same
/// sequence of inputs.
#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    names: Vec<String>,
    index: HashMap<String, u32>,
}

impl SymbolTable {
    pub fn new() -> Self {
        SymbolTable::default()
    }

    /// The default table used by the engine: pre-interns the handful of
    /// names the engine itself references by name (the trust-boundary
    /// symbols `authority`/`ambient`, and the revocation-id predicate
    /// names), mirroring the teacher's own `default_symbol_table()`.
    pub fn with_defaults() -> Self {
        let mut table = SymbolTable::new();
        for name in [
            "authority",
            "ambient",
            "read",
            "write",
            "revocation_id",
            "unique_revocation_id",
        ] {
            table.insert(name);
        }
        table
    }

    /// Interns `name`, returning its `Symbol`. Re-interning the same string
    /// always returns the same `Symbol`.
    pub fn insert(&mut self, name: &str) -> Symbol {
        if let Some(&idx) = self.index.get(name) {
            return Symbol(idx);
        }
        let idx = self.names.len() as u32;
        self.names.push(name.to_string());
        self.index.insert(name.to_string(), idx);
        Symbol(idx)
    }

    /// Looks up an already-interned name without inserting it.
    pub fn get(&self, name: &str) -> Option<Symbol> {
        self.index.get(name).copied().map(Symbol)
    }

    /// Resolves a `Symbol` back to its string form.
    ///
    /// Panics if `symbol` was not produced by this table: that would mean
    /// the engine mixed symbol tables across a single verification call,
    /// which is a caller bug, not a runtime condition to recover from.
    pub fn print(&self, symbol: Symbol) -> &str {
        self.names
            .get(symbol.0 as usize)
            .map(String::as_str)
            .expect("symbol not present in this table")
    }
}

/// Rendering helpers for a human-readable explanation (§6), mirroring the
/// teacher's own `SymbolTable::print_fact`/`print_rule`/`print_check` family.
impl SymbolTable {
    pub fn print_id(&self, id: &crate::core::ID) -> String {
        use crate::core::ID;
        match id {
            ID::Symbol(s) => format!("#{}", self.print(*s)),
            ID::Variable(v) => format!("${}", self.print(*v)),
            ID::Int64(i) => i.to_string(),
            ID::Str(s) => format!("{:?}", s),
            ID::Date(us) => format!("@{}", us),
            ID::Bytes(b) => format!("hex:{}", b.iter().map(|byte| format!("{:02x}", byte)).collect::<String>()),
            ID::Bool(b) => b.to_string(),
            ID::Set(set) => {
                let items: Vec<String> = set.iter().map(|t| self.print_id(t)).collect();
                format!("[{}]", items.join(", "))
            }
        }
    }

    pub fn print_predicate(&self, predicate: &crate::core::Predicate) -> String {
        let terms: Vec<String> = predicate.terms.iter().map(|t| self.print_id(t)).collect();
        format!("{}({})", self.print(predicate.name), terms.join(", "))
    }

    pub fn print_fact(&self, fact: &crate::core::Fact) -> String {
        self.print_predicate(&fact.predicate)
    }

    pub fn print_rule(&self, rule: &crate::core::Rule) -> String {
        let body: Vec<String> = rule.body.iter().map(|p| self.print_predicate(p)).collect();
        format!("{} <- {}", self.print_predicate(&rule.head), body.join(", "))
    }

    pub fn print_check(&self, check: &crate::core::Check) -> String {
        let queries: Vec<String> = check.queries.iter().map(|q| self.print_rule(q)).collect();
        format!("check if {}", queries.join(" or "))
    }

    pub fn print_policy(&self, policy: &crate::core::Policy) -> String {
        let kind = match policy.kind {
            crate::core::PolicyKind::Allow => "allow",
            crate::core::PolicyKind::Deny => "deny",
        };
        let queries: Vec<String> = policy.queries.iter().map(|q| self.print_rule(q)).collect();
        format!("{} if {}", kind, queries.join(" or "))
    }
}
