//! Grouping and aggregate reducers.
//!
//! Groups live in an insertion-ordered map, so output order is first-seen
//! order of the group key in the filtered stream. Group keys are scalar
//! tuples; arrays and objects coerce to null before keying.

use super::{eval_value, Frame};
use crate::plan::{AggSpec, ValueExpr};
use indexmap::IndexMap;
use logql_core::{deep_eq, value::as_numeric, GroupKey, GroupScalar, Result, Value};

/// Fold one filtered row into the group table.
pub(crate) fn feed<'p>(
    groups: &mut IndexMap<GroupKey, Vec<AggState>>,
    keys: &'p [ValueExpr],
    aggs: &'p [AggSpec],
    scopes: &[Frame<'p>],
    frame: &Frame<'p>,
) -> Result<()> {
    let mut key = Vec::with_capacity(keys.len());
    for expr in keys {
        let value = eval_value(expr, scopes, frame)?;
        key.push(GroupScalar::from_value(&value));
    }

    let mut inputs = Vec::with_capacity(aggs.len());
    for spec in aggs {
        inputs.push(match spec.argument() {
            Some(expr) => Some(eval_value(expr, scopes, frame)?),
            None => None,
        });
    }

    let states = groups
        .entry(key)
        .or_insert_with(|| aggs.iter().map(AggState::new).collect());
    for (state, input) in states.iter_mut().zip(&inputs) {
        state.update(input.as_ref());
    }
    Ok(())
}

impl AggSpec {
    /// The argument expression, if the reducer consumes one.
    pub fn argument(&self) -> Option<&ValueExpr> {
        match self {
            Self::CountStar => None,
            Self::Count(expr)
            | Self::Sum(expr)
            | Self::Avg(expr)
            | Self::Min(expr)
            | Self::Max(expr)
            | Self::Unique(expr) => Some(expr),
        }
    }
}

/// Per-group mutable accumulator for one aggregate.
#[derive(Clone, Debug)]
pub(crate) enum AggState {
    CountStar(u64),
    Count(u64),
    Sum(SumAcc),
    Avg { sum: f64, count: u64 },
    Min(Extremum),
    Max(Extremum),
    Unique(Vec<Value>),
}

impl AggState {
    pub fn new(spec: &AggSpec) -> Self {
        match spec {
            AggSpec::CountStar => Self::CountStar(0),
            AggSpec::Count(_) => Self::Count(0),
            AggSpec::Sum(_) => Self::Sum(SumAcc::Empty),
            AggSpec::Avg(_) => Self::Avg { sum: 0.0, count: 0 },
            AggSpec::Min(_) => Self::Min(Extremum::default()),
            AggSpec::Max(_) => Self::Max(Extremum::default()),
            AggSpec::Unique(_) => Self::Unique(Vec::new()),
        }
    }

    pub fn update(&mut self, input: Option<&Value>) {
        match self {
            Self::CountStar(n) => *n += 1,
            Self::Count(n) => {
                if let Some(value) = input {
                    if !value.is_null() {
                        *n += 1;
                    }
                }
            }
            Self::Sum(acc) => {
                if let Some(value) = input {
                    acc.add(value);
                }
            }
            Self::Avg { sum, count } => {
                if let Some(f) = input.and_then(as_numeric) {
                    *sum += f;
                    *count += 1;
                }
            }
            Self::Min(extremum) => {
                if let Some(value) = input {
                    extremum.update(value, false);
                }
            }
            Self::Max(extremum) => {
                if let Some(value) = input {
                    extremum.update(value, true);
                }
            }
            Self::Unique(values) => {
                if let Some(value) = input {
                    if !values.iter().any(|seen| deep_eq(seen, value)) {
                        values.push(value.clone());
                    }
                }
            }
        }
    }

    pub fn finalize(&self) -> Value {
        match self {
            Self::CountStar(n) | Self::Count(n) => Value::Number((*n).into()),
            Self::Sum(acc) => acc.finalize(),
            Self::Avg { count: 0, .. } => Value::Null,
            Self::Avg { sum, count } => serde_json::Number::from_f64(sum / *count as f64)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            Self::Min(extremum) | Self::Max(extremum) => extremum.finalize(),
            Self::Unique(values) => Value::Array(values.clone()),
        }
    }
}

/// SUM accumulator: stays integral until a float participates or the
/// integer range overflows.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) enum SumAcc {
    Empty,
    Int(i64),
    Float(f64),
}

impl SumAcc {
    pub fn add(&mut self, value: &Value) {
        let Value::Number(number) = value else {
            return;
        };

        if let Some(i) = number.as_i64() {
            *self = match *self {
                Self::Empty => Self::Int(i),
                Self::Int(n) => match n.checked_add(i) {
                    Some(sum) => Self::Int(sum),
                    None => Self::Float(n as f64 + i as f64),
                },
                Self::Float(f) => Self::Float(f + i as f64),
            };
        } else if let Some(f) = number.as_f64() {
            *self = match *self {
                Self::Empty => Self::Float(f),
                Self::Int(n) => Self::Float(n as f64 + f),
                Self::Float(g) => Self::Float(g + f),
            };
        }
    }

    pub fn finalize(&self) -> Value {
        match self {
            Self::Empty => Value::Null,
            Self::Int(n) => Value::Number((*n).into()),
            Self::Float(f) => serde_json::Number::from_f64(*f)
                .map(Value::Number)
                .unwrap_or(Value::Null),
        }
    }
}

/// MIN/MAX accumulator. Numeric values win over strings whenever any
/// numeric was seen; everything else is ignored. Ties keep the first-seen
/// value, which preserves its original numeric kind.
#[derive(Clone, Debug, Default)]
pub(crate) struct Extremum {
    numeric: Option<Value>,
    string: Option<String>,
}

impl Extremum {
    fn update(&mut self, value: &Value, want_max: bool) {
        if let Some(candidate) = as_numeric(value) {
            match &self.numeric {
                None => self.numeric = Some(value.clone()),
                Some(best) => {
                    let Some(current) = as_numeric(best) else {
                        return;
                    };
                    let better = if want_max {
                        candidate > current
                    } else {
                        candidate < current
                    };
                    if better {
                        self.numeric = Some(value.clone());
                    }
                }
            }
        } else if let Value::String(candidate) = value {
            match &self.string {
                None => self.string = Some(candidate.clone()),
                Some(best) => {
                    let better = if want_max {
                        candidate > best
                    } else {
                        candidate < best
                    };
                    if better {
                        self.string = Some(candidate.clone());
                    }
                }
            }
        }
    }

    fn finalize(&self) -> Value {
        if let Some(numeric) = &self.numeric {
            return numeric.clone();
        }
        if let Some(string) = &self.string {
            return Value::String(string.clone());
        }
        Value::Null
    }
}
