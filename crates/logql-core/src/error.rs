//! Error types for LogQL.
//!
//! Every failure in the pipeline maps onto one of four taxonomy codes:
//! `E_PARSE`, `E_SEMANTIC`, `E_IO`, `E_RUNTIME`. The CLI turns any error
//! into a single-line JSON envelope on stderr.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for LogQL operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for LogQL.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Invocation / Lexical / Syntax Errors (E_PARSE)
    // ========================================================================
    #[error("Invalid invocation: {0}")]
    InvalidInvocation(String),

    #[error("Unexpected character '{ch}' at line {line}, column {column}")]
    UnexpectedChar { ch: char, line: usize, column: usize },

    #[error("Unterminated string literal at line {line}, column {column}")]
    UnterminatedString { line: usize, column: usize },

    #[error("Invalid escape sequence '\\{ch}' at line {line}, column {column}")]
    InvalidEscape { ch: char, line: usize, column: usize },

    #[error("Invalid number literal '{text}' at line {line}, column {column}")]
    InvalidNumber { text: String, line: usize, column: usize },

    #[error("Unexpected {found} at line {line}, column {column}: expected {expected}")]
    UnexpectedToken {
        found: String,
        expected: String,
        line: usize,
        column: usize,
    },

    #[error("Unexpected end of query: expected {0}")]
    UnexpectedEnd(String),

    // ========================================================================
    // Name Resolution / Validation Errors (E_SEMANTIC)
    // ========================================================================
    #[error("Unknown source alias: {0}")]
    UnknownAlias(String),

    #[error("Unknown canonical label: CANON.{0}")]
    UnknownLabel(String),

    #[error("Source alias '{0}' is already bound to a different path")]
    DuplicateSourceBinding(String),

    #[error("Alias '{0}' is already part of this query")]
    DuplicateConflateAlias(String),

    #[error("Duplicate output key: {0}")]
    DuplicateOutputKey(String),

    #[error("Duplicate GROUP BY entry: {0}")]
    DuplicateGroupKey(String),

    #[error("Duplicate canonical label: {0}")]
    DuplicateLabel(String),

    #[error("SELECT * cannot be combined with CONFLATE")]
    StarWithConflate,

    #[error("SELECT {0} cannot be combined with aggregates")]
    StarWithAggregate(String),

    #[error("Selection '{0}' must appear in GROUP BY")]
    SelectionOutsideGroup(String),

    #[error("UPON condition compares alias '{0}' with itself")]
    UponSameAlias(String),

    #[error("WHERE references CANON.{label}, whose candidate '{candidate}' is not anchored at the FROM alias")]
    CanonBeyondAnchor { label: String, candidate: String },

    #[error("UPTREE.{0} does not name an alias in any enclosing query")]
    UnboundCorrelation(String),

    // ========================================================================
    // Source I/O Errors (E_IO)
    // ========================================================================
    #[error("Cannot open source file {}: {source}", path.display())]
    SourceOpen {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot read source file {}: {source}", path.display())]
    SourceRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed record at {}:{line}: {message}", path.display())]
    MalformedRecord {
        path: PathBuf,
        line: usize,
        message: String,
    },

    #[error("Record at {}:{line} is not a JSON object", path.display())]
    NonObjectRecord { path: PathBuf, line: usize },

    #[error("Cannot write output to {}: {source}", path.display())]
    OutputWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ========================================================================
    // Execution Errors (E_RUNTIME)
    // ========================================================================
    #[error("Scalar subquery produced {0} rows, expected at most one")]
    ScalarCardinality(usize),

    #[error("Subquery row has {0} columns, expected exactly one")]
    SubqueryWidth(usize),

    #[error("Conflicting values for CANON.{0} under GLOSS STRICT")]
    StrictConflict(String),
}

impl Error {
    /// Get the taxonomy code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidInvocation(_)
            | Self::UnexpectedChar { .. }
            | Self::UnterminatedString { .. }
            | Self::InvalidEscape { .. }
            | Self::InvalidNumber { .. }
            | Self::UnexpectedToken { .. }
            | Self::UnexpectedEnd(_) => "E_PARSE",

            Self::UnknownAlias(_)
            | Self::UnknownLabel(_)
            | Self::DuplicateSourceBinding(_)
            | Self::DuplicateConflateAlias(_)
            | Self::DuplicateOutputKey(_)
            | Self::DuplicateGroupKey(_)
            | Self::DuplicateLabel(_)
            | Self::StarWithConflate
            | Self::StarWithAggregate(_)
            | Self::SelectionOutsideGroup(_)
            | Self::UponSameAlias(_)
            | Self::CanonBeyondAnchor { .. }
            | Self::UnboundCorrelation(_) => "E_SEMANTIC",

            Self::SourceOpen { .. }
            | Self::SourceRead { .. }
            | Self::MalformedRecord { .. }
            | Self::NonObjectRecord { .. }
            | Self::OutputWrite { .. } => "E_IO",

            Self::ScalarCardinality(_) | Self::SubqueryWidth(_) | Self::StrictConflict(_) => {
                "E_RUNTIME"
            }
        }
    }

    /// Convert to the single-line JSON error envelope.
    pub fn envelope(&self) -> String {
        serde_json::json!({
            "error": format!("LOGQL_ERROR: {}", self),
            "code": self.code(),
        })
        .to_string()
    }
}
