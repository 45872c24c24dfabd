//! Typed logical plan.
//!
//! The analyzer lowers a parsed query into this form: every name is
//! resolved to a `(scope distance, source ordinal, path)` triple, canonical
//! labels to `(scope distance, label index)`, and subqueries to nested
//! plans. The evaluator executes plans without ever looking at names again.
//!
//! Pipeline shape: scan the anchor source, run the conflation chain, apply
//! the filter, then either project rows or fold them through the group
//! table.

use logql_core::Value;
use logql_lang::{CmpOp, JoinFlavor, QuantMode, Segment};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// One source participating in a query scope, in alias-binding order.
/// Ordinal 0 is the anchor (FROM); conflated sources follow.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SourceSlot {
    pub alias: String,
    pub path: PathBuf,
}

/// A resolved field reference.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FieldAccess {
    /// How many scopes outward the row lives (0 = current row).
    pub up: usize,
    /// Source ordinal within that scope.
    pub ordinal: usize,
    /// Remaining path below the record root.
    pub path: Vec<Segment>,
}

/// A value-producing expression.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum ValueExpr {
    Literal(Value),
    Field(FieldAccess),
    /// A canonical label: `up` scopes outward, label index within that
    /// scope's GLOSS block.
    Canon { up: usize, label: usize },
    /// Scalar subquery; at most one row of one column.
    Scalar(Box<QueryPlan>),
}

/// A filter predicate over the joined row view.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum Predicate {
    And(Box<Predicate>, Box<Predicate>),
    Or(Box<Predicate>, Box<Predicate>),
    Compare {
        op: CmpOp,
        lhs: ValueExpr,
        rhs: ValueExpr,
    },
    /// True iff the table subquery yields at least one row.
    Beholds(Box<QueryPlan>),
    /// Deep-equality membership test against a table subquery.
    Amongst {
        value: ValueExpr,
        table: Box<QueryPlan>,
    },
    /// EITHERWISE / EVERYWISE quantified comparison.
    Quantified {
        op: CmpOp,
        value: ValueExpr,
        mode: QuantMode,
        table: Box<QueryPlan>,
    },
}

/// One conflation stage. The stage's left side is the pipeline so far;
/// `ordinal` names the source slot this stage fills.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct JoinStage {
    pub flavor: JoinFlavor,
    pub ordinal: usize,
    /// AND-ed equality conjuncts, compared with deep structural equality.
    pub on: Vec<(ValueExpr, ValueExpr)>,
}

/// A resolved canonical label declaration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GlossLabel {
    pub name: String,
    /// Candidate field references, tried in order.
    pub candidates: Vec<ValueExpr>,
    /// Applies only when every candidate is null.
    pub default: Option<Value>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GlossPlan {
    pub strict: bool,
    pub labels: Vec<GlossLabel>,
}

/// An aggregate reducer.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum AggSpec {
    /// COUNT(*) - every row of the group.
    CountStar,
    /// COUNT(field) - rows where the field is present and non-null.
    Count(ValueExpr),
    Sum(ValueExpr),
    Avg(ValueExpr),
    Min(ValueExpr),
    Max(ValueExpr),
    Unique(ValueExpr),
}

/// A plain projection column.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum Column {
    /// `*` - every top-level key of the anchor record.
    Star,
    /// `alias.*` - every top-level key of that slot's record, prefixed.
    AliasStar { ordinal: usize, alias: String },
    Expr { key: String, expr: ValueExpr },
}

/// Where an aggregate-output column draws its value from.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum AggColumnSource {
    /// Index into the group-key tuple.
    GroupKey(usize),
    /// Index into the aggregate states.
    Aggregate(usize),
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AggColumn {
    pub key: String,
    pub source: AggColumnSource,
}

/// The final stage of a plan.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum OutputPlan {
    /// One output object per surviving row.
    Project(Vec<Column>),
    /// Group-and-reduce. With empty `keys` a single synthetic group exists
    /// even on empty input.
    Aggregate {
        keys: Vec<ValueExpr>,
        aggs: Vec<AggSpec>,
        columns: Vec<AggColumn>,
    },
}

/// A fully analyzed, executable query.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct QueryPlan {
    pub sources: Vec<SourceSlot>,
    pub joins: Vec<JoinStage>,
    pub filter: Option<Predicate>,
    pub gloss: Option<GlossPlan>,
    pub output: OutputPlan,
}

impl QueryPlan {
    /// Number of canonical labels declared in this plan's own scope.
    pub fn label_count(&self) -> usize {
        self.gloss.as_ref().map(|g| g.labels.len()).unwrap_or(0)
    }
}
