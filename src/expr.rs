//! Expression interpreter (C4, §4.4).
//!
//! A tree-walking evaluator over the postfix `Op` program the teacher itself
//! builds by hand in `verifier.rs`'s `revocation_check` (`Op::Value`,
//! `Op::Binary(Binary::Contains)`, `Op::Unary(Unary::Negate)`, evaluated
//! against a small evaluation stack). No JIT, no bytecode compilation —
//! per §9, the expression language is small enough that a straightforward
//! recursive-descent-over-a-stack evaluator is the idiomatic choice.

use crate::core::{Binary, Expression, Op, Unary, ID};
use crate::unify::Binding;
use regex::Regex;

/// Guard evaluation errors are deliberately not part of any public error
/// type: per §7/§9, a guard that errors simply fails to prove its
/// proposition, same as a guard that evaluates to `Bool(false)`. This type
/// exists only so the interpreter has something to return; nothing outside
/// this module inspects its variants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardError {
    UnboundVariable,
    TypeError,
    DivideByZero,
    Overflow,
    RegexDisabled,
    MalformedExpression,
    InvalidSetElement,
}

/// Whether regex guards are permitted; threaded through from `RunLimits`
/// rather than imported directly to keep this module decoupled from the
/// limits type.
pub struct EvalContext {
    pub allow_regexes: bool,
}

/// Evaluates `expr` against `binding`. Returns `Ok(term)` on success, or an
/// (internal-only) error if the expression was type-incorrect, referenced an
/// unbound variable, divided by zero, overflowed, or used a disabled
/// operator.
pub fn eval(expr: &Expression, binding: &Binding, ctx: &EvalContext) -> Result<ID, GuardError> {
    let mut stack: Vec<ID> = Vec::with_capacity(expr.ops.len());

    for op in &expr.ops {
        match op {
            Op::Value(ID::Variable(name)) => {
                let value = binding.get(name).ok_or(GuardError::UnboundVariable)?;
                stack.push(value.clone());
            }
            Op::Value(term) => stack.push(term.clone()),
            Op::Unary(op) => {
                let value = stack.pop().ok_or(GuardError::MalformedExpression)?;
                stack.push(eval_unary(*op, value)?);
            }
            Op::Binary(op) => {
                let right = stack.pop().ok_or(GuardError::MalformedExpression)?;
                let left = stack.pop().ok_or(GuardError::MalformedExpression)?;
                stack.push(eval_binary(*op, left, right, ctx)?);
            }
        }
    }

    match stack.len() {
        1 => Ok(stack.pop().unwrap()),
        _ => Err(GuardError::MalformedExpression),
    }
}

/// A guard "passes" iff it evaluates to exactly `Bool(true)`; any error, and
/// any other value including `Bool(false)`, fails the guard.
pub fn guard_passes(expr: &Expression, binding: &Binding, ctx: &EvalContext) -> bool {
    matches!(eval(expr, binding, ctx), Ok(ID::Bool(true)))
}

fn eval_unary(op: Unary, value: ID) -> Result<ID, GuardError> {
    match (op, value) {
        (Unary::Parens, v) => Ok(v),
        (Unary::Negate, ID::Bool(b)) => Ok(ID::Bool(!b)),
        (Unary::Length, ID::Str(s)) => Ok(ID::Int64(s.chars().count() as i64)),
        (Unary::Length, ID::Bytes(b)) => Ok(ID::Int64(b.len() as i64)),
        (Unary::Length, ID::Set(s)) => Ok(ID::Int64(s.len() as i64)),
        _ => Err(GuardError::TypeError),
    }
}

fn eval_binary(op: Binary, left: ID, right: ID, ctx: &EvalContext) -> Result<ID, GuardError> {
    use Binary::*;
    match op {
        Equal => eval_equal(left, right),
        LessThan => compare(left, right, |o| o == std::cmp::Ordering::Less),
        GreaterThan => compare(left, right, |o| o == std::cmp::Ordering::Greater),
        LessOrEqual => compare(left, right, |o| o != std::cmp::Ordering::Greater),
        GreaterOrEqual => compare(left, right, |o| o != std::cmp::Ordering::Less),
        Add => int_op(left, right, i64::checked_add),
        Sub => int_op(left, right, i64::checked_sub),
        Mul => int_op(left, right, i64::checked_mul),
        Div => match (left, right) {
            (ID::Int64(_), ID::Int64(0)) => Err(GuardError::DivideByZero),
            (ID::Int64(a), ID::Int64(b)) => {
                a.checked_div(b).map(ID::Int64).ok_or(GuardError::Overflow)
            }
            _ => Err(GuardError::TypeError),
        },
        Prefix => match (left, right) {
            (ID::Str(a), ID::Str(b)) => Ok(ID::Bool(a.starts_with(&b))),
            _ => Err(GuardError::TypeError),
        },
        Suffix => match (left, right) {
            (ID::Str(a), ID::Str(b)) => Ok(ID::Bool(a.ends_with(&b))),
            _ => Err(GuardError::TypeError),
        },
        Regex => {
            if !ctx.allow_regexes {
                return Err(GuardError::RegexDisabled);
            }
            match (left, right) {
                (ID::Str(subject), ID::Str(pattern)) => {
                    let re = Regex::new(&pattern).map_err(|_| GuardError::TypeError)?;
                    Ok(ID::Bool(re.is_match(&subject)))
                }
                _ => Err(GuardError::TypeError),
            }
        }
        And => match (left, right) {
            (ID::Bool(a), ID::Bool(b)) => Ok(ID::Bool(a && b)),
            _ => Err(GuardError::TypeError),
        },
        Or => match (left, right) {
            (ID::Bool(a), ID::Bool(b)) => Ok(ID::Bool(a || b)),
            _ => Err(GuardError::TypeError),
        },
        Contains => eval_contains(left, right),
        Intersection => match (left, right) {
            (ID::Set(a), ID::Set(b)) => Ok(ID::Set(a.intersection(&b).cloned().collect())),
            _ => Err(GuardError::TypeError),
        },
        Union => match (left, right) {
            (ID::Set(a), ID::Set(b)) => Ok(ID::Set(a.union(&b).cloned().collect())),
            _ => Err(GuardError::TypeError),
        },
    }
}

fn eval_equal(left: ID, right: ID) -> Result<ID, GuardError> {
    match (&left, &right) {
        (ID::Set(_), ID::Set(_)) => Ok(ID::Bool(left == right)),
        (ID::Symbol(_), ID::Symbol(_))
        | (ID::Int64(_), ID::Int64(_))
        | (ID::Str(_), ID::Str(_))
        | (ID::Date(_), ID::Date(_))
        | (ID::Bytes(_), ID::Bytes(_))
        | (ID::Bool(_), ID::Bool(_)) => Ok(ID::Bool(left == right)),
        _ => Err(GuardError::TypeError),
    }
}

fn compare(left: ID, right: ID, accept: impl Fn(std::cmp::Ordering) -> bool) -> Result<ID, GuardError> {
    let ordering = match (&left, &right) {
        (ID::Int64(a), ID::Int64(b)) => a.cmp(b),
        (ID::Date(a), ID::Date(b)) => a.cmp(b),
        _ => return Err(GuardError::TypeError),
    };
    Ok(ID::Bool(accept(ordering)))
}

fn int_op(left: ID, right: ID, op: impl Fn(i64, i64) -> Option<i64>) -> Result<ID, GuardError> {
    match (left, right) {
        (ID::Int64(a), ID::Int64(b)) => op(a, b).map(ID::Int64).ok_or(GuardError::Overflow),
        _ => Err(GuardError::TypeError),
    }
}

fn eval_contains(left: ID, right: ID) -> Result<ID, GuardError> {
    match (left, right) {
        (ID::Set(a), ID::Set(b)) => Ok(ID::Bool(b.is_subset(&a))),
        (ID::Set(a), scalar) => {
            if !scalar.is_valid_set_element() {
                return Err(GuardError::InvalidSetElement);
            }
            Ok(ID::Bool(a.contains(&scalar)))
        }
        _ => Err(GuardError::TypeError),
    }
}
