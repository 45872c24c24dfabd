//! Canonical-label resolution.
//!
//! Labels resolve lazily at their first reference on a row and are cached
//! on the row afterwards, so STRICT conflict checks fire exactly once per
//! row per label. STRICT evaluates every candidate even when the first
//! already produced a value.

use super::{eval_value, Frame};
use logql_core::{deep_eq, Error, Result, Value};

/// Resolve label `label` of `frame`'s GLOSS block. `scopes` are the frames
/// enclosing `frame` (needed for UPTREE-rooted candidates).
pub(crate) fn resolve<'p>(
    label: usize,
    frame: &Frame<'p>,
    scopes: &[Frame<'p>],
) -> Result<Value> {
    let Some(plan) = frame.gloss else {
        return Ok(Value::Null);
    };
    if let Some(cached) = frame.row.cached_label(label) {
        return Ok(cached);
    }

    let decl = &plan.labels[label];
    let mut values = Vec::with_capacity(decl.candidates.len());
    for candidate in &decl.candidates {
        values.push(eval_value(candidate, scopes, frame)?);
    }

    if plan.strict {
        let mut non_null = values.iter().filter(|value| !value.is_null());
        if let Some(first) = non_null.next() {
            for other in non_null {
                if !deep_eq(first, other) {
                    return Err(Error::StrictConflict(decl.name.clone()));
                }
            }
        }
    }

    let resolved = values
        .into_iter()
        .find(|value| !value.is_null())
        .or_else(|| decl.default.clone())
        .unwrap_or(Value::Null);

    frame.row.cache_label(label, resolved.clone());
    Ok(resolved)
}
