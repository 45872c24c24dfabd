//! Subquery execution.
//!
//! A nested plan runs with the current row pushed onto the frame stack;
//! its own UPTREE references then reach the enclosing rows. Inner plans
//! re-open their sources on every invocation; nothing is memoized.

use super::{exec_plan, Frame};
use crate::plan::QueryPlan;
use logql_core::{Error, Record, Result, Value};

fn run<'p>(plan: &'p QueryPlan, scopes: &[Frame<'p>], frame: &Frame<'p>) -> Result<Vec<Record>> {
    let mut frames = Vec::with_capacity(scopes.len() + 1);
    frames.extend_from_slice(scopes);
    frames.push(frame.clone());
    exec_plan(plan, &frames)
}

/// Scalar `POCKET(...)`: zero rows is null, one row of one column is that
/// value, anything else is a runtime error.
pub(crate) fn scalar_value<'p>(
    plan: &'p QueryPlan,
    scopes: &[Frame<'p>],
    frame: &Frame<'p>,
) -> Result<Value> {
    let mut rows = run(plan, scopes, frame)?;
    match rows.len() {
        0 => Ok(Value::Null),
        1 => single_column(rows.remove(0)),
        n => Err(Error::ScalarCardinality(n)),
    }
}

/// Table `POCKET[...]`: the multiset of the single projected column.
pub(crate) fn table_values<'p>(
    plan: &'p QueryPlan,
    scopes: &[Frame<'p>],
    frame: &Frame<'p>,
) -> Result<Vec<Value>> {
    run(plan, scopes, frame)?
        .into_iter()
        .map(single_column)
        .collect()
}

fn single_column(record: Record) -> Result<Value> {
    if record.len() != 1 {
        return Err(Error::SubqueryWidth(record.len()));
    }
    Ok(record
        .into_iter()
        .next()
        .map(|(_, value)| value)
        .unwrap_or(Value::Null))
}
