//! LogQL Engine - analysis, planning, and evaluation.
//!
//! # Architecture
//!
//! The query execution pipeline:
//!
//! 1. **Analysis** (`analyze`) - Resolve names against bound sources and
//!    enclosing scopes, enforce the semantic rules, lower to a typed plan
//! 2. **Plan** (`plan`) - The resolved, executable form of a query
//! 3. **Evaluation** (`eval`) - Scan, conflate, filter, group, project
//! 4. **Output** (`output`) - Render the canonical JSON array
//!
//! # Example
//!
//! ```ignore
//! use logql_core::SourceBindings;
//! use logql_engine::run_query;
//!
//! let mut bindings = SourceBindings::new();
//! bindings.bind("logs", "app.ndjson")?;
//! let rows = run_query("SELECT level, message FROM logs", &bindings)?;
//! ```

pub mod analyze;
pub mod eval;
pub mod output;
pub mod plan;

pub use analyze::analyze;
pub use eval::execute;
pub use output::{render, write_output};
pub use plan::QueryPlan;

use logql_core::{Record, Result, SourceBindings};

/// Parse, analyze, and execute a query in one call.
pub fn run_query(query_text: &str, bindings: &SourceBindings) -> Result<Vec<Record>> {
    let ast = logql_lang::parse(query_text)?;
    let plan = analyze(&ast, bindings)?;
    tracing::debug!(
        sources = plan.sources.len(),
        joins = plan.joins.len(),
        "query planned"
    );
    execute(&plan)
}
