//! Canonical output rendering.
//!
//! Success is a single JSON array of objects, written once: to stdout by
//! default or to the `--output` file. Record key order is select-list
//! order; integers and floats keep their kinds, and float formatting is
//! shortest-round-trip. Nothing reaches stdout before the full result has
//! been rendered.

use logql_core::{Error, Record, Result};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Render result rows as the canonical JSON array.
pub fn render(rows: &[Record]) -> Result<String> {
    serde_json::to_string(rows).map_err(|err| Error::OutputWrite {
        path: PathBuf::from("<render>"),
        source: err.into(),
    })
}

/// Render and write the result, committing to stdout only on success.
pub fn write_output(rows: &[Record], target: Option<&Path>) -> Result<()> {
    let json = render(rows)?;
    match target {
        Some(path) => std::fs::write(path, json.as_bytes()).map_err(|source| Error::OutputWrite {
            path: path.to_path_buf(),
            source,
        }),
        None => {
            let stdout = std::io::stdout();
            let mut handle = stdout.lock();
            handle
                .write_all(json.as_bytes())
                .and_then(|_| handle.flush())
                .map_err(|source| Error::OutputWrite {
                    path: PathBuf::from("<stdout>"),
                    source,
                })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use logql_core::Value;

    fn record(pairs: &[(&str, Value)]) -> Record {
        let mut record = Record::new();
        for (key, value) in pairs {
            record.insert(key.to_string(), value.clone());
        }
        record
    }

    #[test]
    fn test_render_empty() {
        assert_eq!(render(&[]).unwrap(), "[]");
    }

    #[test]
    fn test_render_preserves_key_order_and_number_kinds() {
        let rows = vec![record(&[
            ("total", serde_json::from_str("6").unwrap()),
            ("sum_bytes", serde_json::from_str("800").unwrap()),
            ("avg_latency", serde_json::from_str("8.7").unwrap()),
        ])];
        assert_eq!(
            render(&rows).unwrap(),
            r#"[{"total":6,"sum_bytes":800,"avg_latency":8.7}]"#
        );
    }

    #[test]
    fn test_render_round_trips() {
        let rows = vec![record(&[
            ("s", Value::String("caf\u{e9}".into())),
            ("n", Value::Null),
        ])];
        let json = render(&rows).unwrap();
        let parsed: Vec<Record> = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, rows);
    }

    #[test]
    fn test_write_output_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.json");
        let rows = vec![record(&[("a", Value::Bool(true))])];

        write_output(&rows, Some(&path)).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), r#"[{"a":true}]"#);
    }
}
