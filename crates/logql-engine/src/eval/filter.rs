//! WHERE-clause evaluation.
//!
//! Scalar comparison rules: matching types compare, mismatches are false.
//! Integers and floats are one numeric family here (unlike the deep
//! structural equality UPON and AMONGST use). Strings order by Unicode
//! code point. Booleans support only `=` and `!=`. `= null` matches null
//! or missing; `!= null` matches present non-null scalars, so arrays and
//! objects satisfy neither. AND and OR short-circuit left to right.

use super::{eval_value, subquery, Frame};
use crate::plan::Predicate;
use logql_core::{deep_eq, is_scalar, Result, Value};
use logql_lang::{CmpOp, QuantMode};
use std::cmp::Ordering;

pub(crate) fn eval_predicate<'p>(
    predicate: &'p Predicate,
    scopes: &[Frame<'p>],
    frame: &Frame<'p>,
) -> Result<bool> {
    match predicate {
        Predicate::And(lhs, rhs) => Ok(if !eval_predicate(lhs, scopes, frame)? {
            false
        } else {
            eval_predicate(rhs, scopes, frame)?
        }),
        Predicate::Or(lhs, rhs) => Ok(if eval_predicate(lhs, scopes, frame)? {
            true
        } else {
            eval_predicate(rhs, scopes, frame)?
        }),
        Predicate::Compare { op, lhs, rhs } => {
            let left = eval_value(lhs, scopes, frame)?;
            let right = eval_value(rhs, scopes, frame)?;
            Ok(compare_values(*op, &left, &right))
        }
        Predicate::Beholds(table) => {
            let members = subquery::table_values(table, scopes, frame)?;
            Ok(!members.is_empty())
        }
        Predicate::Amongst { value, table } => {
            let needle = eval_value(value, scopes, frame)?;
            let members = subquery::table_values(table, scopes, frame)?;
            Ok(members.iter().any(|member| deep_eq(member, &needle)))
        }
        Predicate::Quantified {
            op,
            value,
            mode,
            table,
        } => {
            let left = eval_value(value, scopes, frame)?;
            let members = subquery::table_values(table, scopes, frame)?;
            Ok(match mode {
                QuantMode::Eitherwise => members
                    .iter()
                    .any(|member| compare_values(*op, &left, member)),
                QuantMode::Everywise => members
                    .iter()
                    .all(|member| compare_values(*op, &left, member)),
            })
        }
    }
}

/// Scalar comparison under the filter rules.
pub fn compare_values(op: CmpOp, a: &Value, b: &Value) -> bool {
    match op {
        CmpOp::Eq => eq_values(a, b),
        CmpOp::Ne => ne_values(a, b),
        CmpOp::Lt | CmpOp::Le | CmpOp::Gt | CmpOp::Ge => order_values(op, a, b),
    }
}

fn numeric_ordering(a: &Value, b: &Value) -> Option<Ordering> {
    let (Value::Number(x), Value::Number(y)) = (a, b) else {
        return None;
    };
    if let (Some(i), Some(j)) = (x.as_i64(), y.as_i64()) {
        return Some(i.cmp(&j));
    }
    if let (Some(i), Some(j)) = (x.as_u64(), y.as_u64()) {
        return Some(i.cmp(&j));
    }
    x.as_f64()?.partial_cmp(&y.as_f64()?)
}

fn eq_values(a: &Value, b: &Value) -> bool {
    if a.is_null() || b.is_null() {
        return a.is_null() && b.is_null();
    }
    if let Some(ordering) = numeric_ordering(a, b) {
        return ordering == Ordering::Equal;
    }
    match (a, b) {
        (Value::String(x), Value::String(y)) => x == y,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        _ => false,
    }
}

fn ne_values(a: &Value, b: &Value) -> bool {
    if a.is_null() || b.is_null() {
        if a.is_null() && b.is_null() {
            return false;
        }
        let present = if a.is_null() { b } else { a };
        return is_scalar(present);
    }
    if let Some(ordering) = numeric_ordering(a, b) {
        return ordering != Ordering::Equal;
    }
    match (a, b) {
        (Value::String(x), Value::String(y)) => x != y,
        (Value::Bool(x), Value::Bool(y)) => x != y,
        _ => false,
    }
}

fn order_values(op: CmpOp, a: &Value, b: &Value) -> bool {
    let ordering = match (a, b) {
        (Value::String(x), Value::String(y)) => x.cmp(y),
        _ => match numeric_ordering(a, b) {
            Some(ordering) => ordering,
            None => return false,
        },
    };
    match op {
        CmpOp::Lt => ordering == Ordering::Less,
        CmpOp::Le => ordering != Ordering::Greater,
        CmpOp::Gt => ordering == Ordering::Greater,
        CmpOp::Ge => ordering != Ordering::Less,
        CmpOp::Eq | CmpOp::Ne => false,
    }
}
