//! Source-binding configuration.
//!
//! Every query runs against a set of named sources bound on the command
//! line: `--source alias=path`, with `--log-file path` as shorthand for
//! `--source logs=path`.

use crate::error::{Error, Result};
use indexmap::IndexMap;
use std::path::{Path, PathBuf};

/// Alias bound by `--log-file`.
pub const DEFAULT_ALIAS: &str = "logs";

/// The set of source aliases available to a query run.
#[derive(Clone, Debug, Default)]
pub struct SourceBindings {
    bindings: IndexMap<String, PathBuf>,
}

impl SourceBindings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind an alias to a file path.
    ///
    /// Re-binding an alias to the same path is idempotent; binding it to a
    /// different path is a semantic error.
    pub fn bind(&mut self, alias: impl Into<String>, path: impl Into<PathBuf>) -> Result<()> {
        let alias = alias.into();
        let path = path.into();

        match self.bindings.get(&alias) {
            Some(existing) if *existing != path => Err(Error::DuplicateSourceBinding(alias)),
            Some(_) => Ok(()),
            None => {
                self.bindings.insert(alias, path);
                Ok(())
            }
        }
    }

    /// Look up the path bound to an alias.
    pub fn get(&self, alias: &str) -> Option<&Path> {
        self.bindings.get(alias).map(PathBuf::as_path)
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// Iterate bindings in bind order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Path)> {
        self.bindings
            .iter()
            .map(|(alias, path)| (alias.as_str(), path.as_path()))
    }
}

/// Parse one `alias=path` binding flag.
pub fn parse_binding(spec: &str) -> Result<(String, PathBuf)> {
    let (alias, path) = spec
        .split_once('=')
        .ok_or_else(|| Error::InvalidInvocation(format!("--source expects alias=path, got '{spec}'")))?;

    if !is_valid_alias(alias) {
        return Err(Error::InvalidInvocation(format!(
            "invalid source alias '{alias}'"
        )));
    }
    if path.is_empty() {
        return Err(Error::InvalidInvocation(format!(
            "empty path for source alias '{alias}'"
        )));
    }

    Ok((alias.to_string(), PathBuf::from(path)))
}

/// Whether a string is a valid source alias (identifier-shaped).
pub fn is_valid_alias(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
