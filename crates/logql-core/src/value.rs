//! JSON value semantics for the query engine.
//!
//! Records and values are plain `serde_json` types; this module pins down
//! the equality and grouping semantics the engine layers on top of them.
//! With the `preserve_order` feature, `serde_json::Map` keeps insertion
//! order for serialization while comparing order-insensitively, and
//! `serde_json::Number` equality is representation-aware (`1` and `1.0`
//! are different numbers). Both properties are load-bearing here.

pub use serde_json::Value;

/// A single NDJSON record: a JSON object with insertion-ordered keys.
pub type Record = serde_json::Map<String, Value>;

/// Deep structural equality over JSON values.
///
/// Object key order is irrelevant; arrays compare element-wise in order;
/// integers and floats are distinct (`1` != `1.0`); `null` equals `null`.
/// This is the equality used by UPON, AMONGST, and UNIQUE membership.
pub fn deep_eq(a: &Value, b: &Value) -> bool {
    a == b
}

/// Whether a value is a scalar (null, bool, number, or string).
pub fn is_scalar(value: &Value) -> bool {
    !matches!(value, Value::Array(_) | Value::Object(_))
}

/// Extract a numeric value as f64 if the value is an integer or float.
pub fn as_numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        _ => None,
    }
}

/// Whether a number is an integer (as opposed to a float) in JSON terms.
pub fn is_integer(value: &Value) -> bool {
    match value {
        Value::Number(n) => n.is_i64() || n.is_u64(),
        _ => false,
    }
}

// ============================================================================
// Group Keys
// ============================================================================

/// A scalar usable as one component of a group key.
///
/// Distinct JSON types produce distinct keys: integer `1`, float `1.0`,
/// boolean `true`, and string `"1"` never collide. Arrays and objects are
/// coerced to [`GroupScalar::Null`] before grouping.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum GroupScalar {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    /// Float keyed by its IEEE-754 bit pattern.
    Float(u64),
    Str(String),
}

impl GroupScalar {
    /// Build a group-key scalar from a JSON value.
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Null | Value::Array(_) | Value::Object(_) => Self::Null,
            Value::Bool(b) => Self::Bool(*b),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Self::Int(i)
                } else if let Some(u) = n.as_u64() {
                    Self::UInt(u)
                } else {
                    Self::Float(n.as_f64().unwrap_or(0.0).to_bits())
                }
            }
            Value::String(s) => Self::Str(s.clone()),
        }
    }

    /// Convert the key scalar back to a JSON value for projection.
    pub fn to_value(&self) -> Value {
        match self {
            Self::Null => Value::Null,
            Self::Bool(b) => Value::Bool(*b),
            Self::Int(i) => Value::Number((*i).into()),
            Self::UInt(u) => Value::Number((*u).into()),
            Self::Float(bits) => serde_json::Number::from_f64(f64::from_bits(*bits))
                .map(Value::Number)
                .unwrap_or(Value::Null),
            Self::Str(s) => Value::String(s.clone()),
        }
    }
}

/// A full group key: one scalar per GROUP BY entry.
pub type GroupKey = Vec<GroupScalar>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_deep_eq_ignores_object_key_order() {
        let a: Value = serde_json::from_str(r#"{"a":1,"b":2}"#).unwrap();
        let b: Value = serde_json::from_str(r#"{"b":2,"a":1}"#).unwrap();
        assert!(deep_eq(&a, &b));
    }

    #[test]
    fn test_deep_eq_arrays_are_ordered() {
        assert!(deep_eq(&json!([1, 2]), &json!([1, 2])));
        assert!(!deep_eq(&json!([1, 2]), &json!([2, 1])));
    }

    #[test]
    fn test_deep_eq_int_float_distinct() {
        let int: Value = serde_json::from_str("1").unwrap();
        let float: Value = serde_json::from_str("1.0").unwrap();
        assert!(!deep_eq(&int, &float));
    }

    #[test]
    fn test_deep_eq_null() {
        assert!(deep_eq(&Value::Null, &Value::Null));
        assert!(!deep_eq(&Value::Null, &json!(0)));
    }

    #[test]
    fn test_deep_eq_nested() {
        let a: Value = serde_json::from_str(r#"{"x":[{"k":1,"v":null}]}"#).unwrap();
        let b: Value = serde_json::from_str(r#"{"x":[{"v":null,"k":1}]}"#).unwrap();
        assert!(deep_eq(&a, &b));
    }

    #[test]
    fn test_group_scalar_type_distinction() {
        let int = GroupScalar::from_value(&serde_json::from_str("1").unwrap());
        let float = GroupScalar::from_value(&serde_json::from_str("1.0").unwrap());
        let string = GroupScalar::from_value(&json!("1"));
        let boolean = GroupScalar::from_value(&json!(true));

        assert_ne!(int, float);
        assert_ne!(int, string);
        assert_ne!(int, boolean);
        assert_ne!(float, string);
    }

    #[test]
    fn test_group_scalar_coerces_containers_to_null() {
        assert_eq!(GroupScalar::from_value(&json!([1])), GroupScalar::Null);
        assert_eq!(GroupScalar::from_value(&json!({"a": 1})), GroupScalar::Null);
        assert_eq!(GroupScalar::from_value(&Value::Null), GroupScalar::Null);
    }

    #[test]
    fn test_group_scalar_round_trip() {
        for raw in ["1", "1.5", "\"x\"", "true", "null", "-3"] {
            let value: Value = serde_json::from_str(raw).unwrap();
            let key = GroupScalar::from_value(&value);
            assert!(deep_eq(&key.to_value(), &value), "round trip for {raw}");
        }
    }

    #[test]
    fn test_is_scalar() {
        assert!(is_scalar(&Value::Null));
        assert!(is_scalar(&json!(1)));
        assert!(is_scalar(&json!("s")));
        assert!(!is_scalar(&json!([])));
        assert!(!is_scalar(&json!({})));
    }

    #[test]
    fn test_as_numeric() {
        assert_eq!(as_numeric(&json!(2)), Some(2.0));
        assert_eq!(as_numeric(&json!(2.5)), Some(2.5));
        assert_eq!(as_numeric(&json!("2")), None);
        assert_eq!(as_numeric(&json!(true)), None);
    }
}
