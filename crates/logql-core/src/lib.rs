//! LogQL Core - value model, sources, and errors for the LogQL engine.
//!
//! # Architecture
//!
//! The query processing pipeline:
//!
//! 1. **Lexing / Parsing** (`logql-lang`) - Tokenize and parse query text into an AST
//! 2. **Analysis / Planning** (`logql-engine`) - Resolve names, validate, build a typed plan
//! 3. **Execution** (`logql-engine`) - Scan, conflate, filter, group, project
//! 4. **Output** (`logql-engine`) - Render the canonical JSON array
//!
//! This crate provides the layers everything else stands on: the JSON value
//! semantics (deep equality, group keys), the NDJSON source reader, source
//! bindings, and the four-code error taxonomy.

pub mod config;
pub mod error;
pub mod source;
pub mod value;

pub use config::{parse_binding, SourceBindings, DEFAULT_ALIAS};
pub use error::{Error, Result};
pub use source::{read_records, SourceReader};
pub use value::{as_numeric, deep_eq, is_scalar, GroupKey, GroupScalar, Record, Value};
