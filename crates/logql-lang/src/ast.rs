//! Source-level AST for LogQL queries.
//!
//! Nodes keep enough of the original spelling to reproduce default output
//! keys: field paths render canonically, aggregate calls render their
//! canonical call string, and scalar subqueries carry the verbatim query
//! text between the POCKET parentheses.

use logql_core::Value;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A parsed query, possibly nested inside another via POCKET.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Query {
    pub select: Vec<SelectItem>,
    /// The anchor (FROM) alias.
    pub from: String,
    pub filter: Option<Expr>,
    pub gloss: Option<GlossBlock>,
    pub conflates: Vec<Conflate>,
    pub group_by: Vec<GroupExpr>,
}

/// One entry of the select list.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum SelectItem {
    /// `*` - whole anchor record; only legal without CONFLATE or aggregates.
    Star,
    /// `alias.*` - every top-level key of that alias's record.
    AliasStar(String),
    Field {
        path: FieldPath,
        alias: Option<String>,
    },
    Canon {
        label: String,
        alias: Option<String>,
    },
    Aggregate {
        call: AggCall,
        alias: Option<String>,
    },
    Scalar {
        query: Box<Query>,
        /// Verbatim source between the POCKET parentheses, trimmed.
        text: String,
        alias: Option<String>,
    },
}

impl SelectItem {
    /// The output key this item produces, after AS or default naming.
    pub fn output_key(&self) -> Option<String> {
        match self {
            Self::Star | Self::AliasStar(_) => None,
            Self::Field { path, alias } => {
                Some(alias.clone().unwrap_or_else(|| path.text()))
            }
            Self::Canon { label, alias } => {
                Some(alias.clone().unwrap_or_else(|| format!("CANON.{label}")))
            }
            Self::Aggregate { call, alias } => {
                Some(alias.clone().unwrap_or_else(|| call.canonical_text()))
            }
            Self::Scalar { text, alias, .. } => Some(alias.clone().unwrap_or_else(|| text.clone())),
        }
    }
}

// ============================================================================
// Field Paths
// ============================================================================

/// One step of a field path.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Segment {
    /// Object key: `a.level`
    Key(String),
    /// Array index: `a.items.0`
    Index(u64),
    /// Bracketed lookup by arbitrary key: `a.headers["content-type"]`
    Quoted(String),
}

/// A dotted field path, optionally rooted at UPTREE for correlation.
///
/// Whether the first segment is a source alias or a field of the anchor
/// record is decided by the analyzer, not the parser.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldPath {
    pub uptree: bool,
    pub segments: Vec<Segment>,
}

impl FieldPath {
    /// Canonical text of the path, used for default output keys and
    /// GROUP BY containment matching.
    pub fn text(&self) -> String {
        let mut out = String::new();
        if self.uptree {
            out.push_str("UPTREE");
        }
        for segment in &self.segments {
            match segment {
                Segment::Key(k) => {
                    if !out.is_empty() {
                        out.push('.');
                    }
                    out.push_str(k);
                }
                Segment::Index(i) => {
                    if !out.is_empty() {
                        out.push('.');
                    }
                    out.push_str(&i.to_string());
                }
                Segment::Quoted(k) => {
                    out.push_str("[\"");
                    out.push_str(&k.replace('\\', "\\\\").replace('"', "\\\""));
                    out.push_str("\"]");
                }
            }
        }
        out
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text())
    }
}

// ============================================================================
// Aggregates
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AggFunc {
    Count,
    Sum,
    Avg,
    Min,
    Max,
    Unique,
}

impl AggFunc {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Count => "COUNT",
            Self::Sum => "SUM",
            Self::Avg => "AVG",
            Self::Min => "MIN",
            Self::Max => "MAX",
            Self::Unique => "UNIQUE",
        }
    }
}

/// Argument of an aggregate call.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum AggArg {
    /// `COUNT(*)` only.
    Star,
    Field(FieldPath),
    Canon(String),
}

/// An aggregate call in the select list.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AggCall {
    pub func: AggFunc,
    pub arg: AggArg,
}

impl AggCall {
    /// Canonical call string: uppercased function, argument verbatim,
    /// `AVERAGE` already normalized to `AVG` by the parser.
    pub fn canonical_text(&self) -> String {
        let arg = match &self.arg {
            AggArg::Star => "*".to_string(),
            AggArg::Field(path) => path.text(),
            AggArg::Canon(label) => format!("CANON.{label}"),
        };
        format!("{}({})", self.func.name(), arg)
    }
}

// ============================================================================
// Conflation (joins)
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum JoinFlavor {
    /// INTERSECTING (also the default when no flavor is written).
    Inner,
    PreservingLeft,
    PreservingRight,
    PreservingBoth,
}

/// One side of an UPON conjunct.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum JoinKey {
    Field(FieldPath),
    Canon(String),
}

/// `CONFLATE [flavor] alias UPON a.x = b.y AND ...`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Conflate {
    pub flavor: JoinFlavor,
    pub alias: String,
    pub upon: Vec<(JoinKey, JoinKey)>,
}

/// One GROUP BY entry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum GroupExpr {
    Field(FieldPath),
    Canon(String),
}

impl GroupExpr {
    /// Canonical text, used for select-list containment matching.
    pub fn text(&self) -> String {
        match self {
            Self::Field(path) => path.text(),
            Self::Canon(label) => format!("CANON.{label}"),
        }
    }
}

// ============================================================================
// Canonical labels (GLOSS)
// ============================================================================

/// `name := src1 | src2 [DEFAULT literal]`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GlossDecl {
    pub name: String,
    pub candidates: Vec<FieldPath>,
    pub default: Option<Value>,
}

/// `GLOSS [STRICT] { decl, decl, ... }`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GlossBlock {
    pub strict: bool,
    pub decls: Vec<GlossDecl>,
}

// ============================================================================
// Boolean expressions
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

/// Quantifier over a table subquery.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum QuantMode {
    /// Exists a member satisfying the comparison; empty table is false.
    Eitherwise,
    /// Every member satisfies the comparison; empty table is true.
    Everywise,
}

/// A value-producing expression inside WHERE.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ValueTerm {
    Literal(Value),
    Field(FieldPath),
    Canon(String),
    Scalar { query: Box<Query>, text: String },
}

/// A table subquery: `POCKET[ ... ]`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TableSub {
    pub query: Box<Query>,
}

/// WHERE expression tree. OR is lowest, AND binds tighter, predicates
/// tightest; parentheses override.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Compare {
        op: CmpOp,
        lhs: ValueTerm,
        rhs: ValueTerm,
    },
    Beholds(TableSub),
    Amongst {
        value: ValueTerm,
        table: TableSub,
    },
    Quantified {
        op: CmpOp,
        value: ValueTerm,
        mode: QuantMode,
        table: TableSub,
    },
}
