//! Plan execution.
//!
//! The executor pulls records from the anchor source one at a time and
//! pushes each through the conflation chain, the filter, and the output
//! sink. Conflated sources are materialized with matched-flags so the
//! PRESERVING flavors can emit their unmatched rows after the anchor scan
//! drains. Correlated subqueries run against a stack of frames, one per
//! enclosing query.

pub mod filter;
pub mod gloss;
pub mod group;
mod join;
pub mod subquery;

use crate::plan::*;
use indexmap::{IndexMap, IndexSet};
use logql_core::{GroupKey, Record, Result, SourceReader, Value};
use logql_lang::{JoinFlavor, Segment};
use std::cell::RefCell;
use std::rc::Rc;

/// Execute a plan and return its output rows.
pub fn execute(plan: &QueryPlan) -> Result<Vec<Record>> {
    exec_plan(plan, &[])
}

// ============================================================================
// Rows and frames
// ============================================================================

/// A pipeline row: one optional record per source slot. Slots reference
/// their records; extending a row through a join never clones payloads.
#[derive(Clone)]
pub struct Row {
    slots: Vec<Option<Rc<Record>>>,
    /// Per-row canonical-label cache, shared across clones of this row.
    gloss_cache: Rc<RefCell<Vec<Option<Value>>>>,
}

impl Row {
    fn new(n_slots: usize, n_labels: usize) -> Self {
        Self {
            slots: vec![None; n_slots],
            gloss_cache: Rc::new(RefCell::new(vec![None; n_labels])),
        }
    }

    fn with_anchor(record: Rc<Record>, n_slots: usize, n_labels: usize) -> Self {
        let mut row = Self::new(n_slots, n_labels);
        row.slots[0] = Some(record);
        row
    }

    /// Extend with a newly joined record. The label cache starts fresh
    /// since candidate values can change once the slot is filled.
    fn extended(&self, ordinal: usize, record: Rc<Record>, n_labels: usize) -> Self {
        let mut slots = self.slots.clone();
        slots[ordinal] = Some(record);
        Self {
            slots,
            gloss_cache: Rc::new(RefCell::new(vec![None; n_labels])),
        }
    }

    pub(crate) fn slot(&self, ordinal: usize) -> Option<&Rc<Record>> {
        self.slots.get(ordinal).and_then(|slot| slot.as_ref())
    }

    /// Read a field path out of a slot. Missing slots, missing keys, and
    /// traversal through non-containers all yield null.
    pub(crate) fn field(&self, ordinal: usize, path: &[Segment]) -> Value {
        let Some(record) = self.slot(ordinal) else {
            return Value::Null;
        };
        if path.is_empty() {
            return Value::Object((**record).clone());
        }

        let mut current = match &path[0] {
            Segment::Key(key) | Segment::Quoted(key) => record.get(key),
            Segment::Index(_) => None,
        };
        for segment in &path[1..] {
            current = current.and_then(|value| step(value, segment));
        }
        current.cloned().unwrap_or(Value::Null)
    }

    pub(crate) fn cached_label(&self, label: usize) -> Option<Value> {
        self.gloss_cache.borrow().get(label).cloned().flatten()
    }

    pub(crate) fn cache_label(&self, label: usize, value: Value) {
        if let Some(slot) = self.gloss_cache.borrow_mut().get_mut(label) {
            *slot = Some(value);
        }
    }
}

fn step<'v>(value: &'v Value, segment: &Segment) -> Option<&'v Value> {
    match (value, segment) {
        (Value::Object(map), Segment::Key(key) | Segment::Quoted(key)) => map.get(key),
        (Value::Array(items), Segment::Index(index)) => items.get(*index as usize),
        _ => None,
    }
}

/// One level of the execution scope stack: a row plus the GLOSS block it
/// resolves labels against.
#[derive(Clone)]
pub struct Frame<'p> {
    pub row: Row,
    pub gloss: Option<&'p GlossPlan>,
}

// ============================================================================
// Expression evaluation
// ============================================================================

/// Evaluate a value expression against the current frame. `scopes` holds
/// the enclosing frames, outermost first; `up` indexes outward from the
/// current frame.
pub(crate) fn eval_value<'p>(
    expr: &'p ValueExpr,
    scopes: &[Frame<'p>],
    frame: &Frame<'p>,
) -> Result<Value> {
    match expr {
        ValueExpr::Literal(value) => Ok(value.clone()),
        ValueExpr::Field(access) => {
            let target = if access.up == 0 {
                frame
            } else {
                &scopes[scopes.len() - access.up]
            };
            Ok(target.row.field(access.ordinal, &access.path))
        }
        ValueExpr::Canon { up, label } => {
            if *up == 0 {
                gloss::resolve(*label, frame, scopes)
            } else {
                let at = scopes.len() - up;
                gloss::resolve(*label, &scopes[at], &scopes[..at])
            }
        }
        ValueExpr::Scalar(plan) => subquery::scalar_value(plan, scopes, frame),
    }
}

// ============================================================================
// Executor
// ============================================================================

pub(crate) fn exec_plan<'p>(plan: &'p QueryPlan, scopes: &[Frame<'p>]) -> Result<Vec<Record>> {
    let mut stages = Vec::with_capacity(plan.joins.len());
    let mut key_sets: Vec<IndexSet<String>> = vec![IndexSet::new(); plan.sources.len()];
    for stage in &plan.joins {
        let exec = join::JoinExec::open(stage, &plan.sources[stage.ordinal])?;
        key_sets[stage.ordinal] = exec.key_union();
        stages.push(exec);
    }

    let sink = match &plan.output {
        OutputPlan::Project(columns) => Sink::Project {
            columns,
            rows: Vec::new(),
        },
        OutputPlan::Aggregate {
            keys,
            aggs,
            columns,
        } => Sink::Group {
            keys,
            aggs,
            columns,
            groups: IndexMap::new(),
        },
    };

    let mut executor = Executor {
        plan,
        scopes: scopes.to_vec(),
        stages,
        key_sets,
        sink,
    };

    let n_slots = plan.sources.len();
    let n_labels = plan.label_count();
    let reader = SourceReader::open(&plan.sources[0].path)?;
    let mut scanned = 0usize;
    for item in reader {
        let (_, record) = item?;
        let record = Rc::new(record);
        for key in record.keys() {
            executor.key_sets[0].insert(key.clone());
        }
        scanned += 1;
        let row = Row::with_anchor(record, n_slots, n_labels);
        executor.process(row, 0)?;
    }
    executor.flush_unmatched()?;

    tracing::debug!(
        anchor = %plan.sources[0].alias,
        scanned,
        "anchor scan complete"
    );
    executor.finish()
}

enum Sink<'p> {
    Project {
        columns: &'p [Column],
        rows: Vec<Record>,
    },
    Group {
        keys: &'p [ValueExpr],
        aggs: &'p [AggSpec],
        columns: &'p [AggColumn],
        groups: IndexMap<GroupKey, Vec<group::AggState>>,
    },
}

struct Executor<'p> {
    plan: &'p QueryPlan,
    scopes: Vec<Frame<'p>>,
    stages: Vec<join::JoinExec<'p>>,
    key_sets: Vec<IndexSet<String>>,
    sink: Sink<'p>,
}

impl<'p> Executor<'p> {
    /// Push a row through join stage `depth` and everything after it.
    fn process(&mut self, row: Row, depth: usize) -> Result<()> {
        if depth == self.stages.len() {
            return self.emit(row);
        }

        let stage: &'p JoinStage = self.stages[depth].stage;
        let count = self.stages[depth].records.len();
        let n_labels = self.plan.label_count();
        let mut matched_any = false;

        for i in 0..count {
            let record = self.stages[depth].records[i].clone();
            let candidate = row.extended(stage.ordinal, record, n_labels);
            let frame = Frame {
                row: candidate.clone(),
                gloss: self.plan.gloss.as_ref(),
            };
            if join::upon_matches(stage, &self.scopes, &frame)? {
                matched_any = true;
                self.stages[depth].matched[i] = true;
                self.process(candidate, depth + 1)?;
            }
        }

        if !matched_any
            && matches!(
                stage.flavor,
                JoinFlavor::PreservingLeft | JoinFlavor::PreservingBoth
            )
        {
            self.process(row, depth + 1)?;
        }
        Ok(())
    }

    /// Emit right-side rows that matched no pipeline row, stage by stage,
    /// after the anchor scan. They enter the pipeline at the stage after
    /// their own.
    fn flush_unmatched(&mut self) -> Result<()> {
        let n_slots = self.plan.sources.len();
        let n_labels = self.plan.label_count();

        for depth in 0..self.stages.len() {
            let stage: &'p JoinStage = self.stages[depth].stage;
            if !matches!(
                stage.flavor,
                JoinFlavor::PreservingRight | JoinFlavor::PreservingBoth
            ) {
                continue;
            }
            let count = self.stages[depth].records.len();
            for i in 0..count {
                if self.stages[depth].matched[i] {
                    continue;
                }
                let record = self.stages[depth].records[i].clone();
                let mut row = Row::new(n_slots, n_labels);
                row.slots[stage.ordinal] = Some(record);
                self.process(row, depth + 1)?;
            }
        }
        Ok(())
    }

    fn emit(&mut self, row: Row) -> Result<()> {
        let frame = Frame {
            row,
            gloss: self.plan.gloss.as_ref(),
        };

        if let Some(predicate) = &self.plan.filter {
            if !filter::eval_predicate(predicate, &self.scopes, &frame)? {
                return Ok(());
            }
        }

        match &mut self.sink {
            Sink::Project { columns, rows } => {
                let columns: &'p [Column] = *columns;
                rows.push(project_row(columns, &self.scopes, &frame, &self.key_sets)?);
            }
            Sink::Group {
                keys, aggs, groups, ..
            } => {
                let (keys, aggs): (&'p [ValueExpr], &'p [AggSpec]) = (*keys, *aggs);
                group::feed(groups, keys, aggs, &self.scopes, &frame)?;
            }
        }
        Ok(())
    }

    fn finish(self) -> Result<Vec<Record>> {
        match self.sink {
            Sink::Project { rows, .. } => Ok(rows),
            Sink::Group {
                keys,
                aggs,
                columns,
                mut groups,
            } => {
                // Global aggregation produces one row even on empty input.
                if keys.is_empty() && groups.is_empty() {
                    groups.insert(Vec::new(), aggs.iter().map(group::AggState::new).collect());
                }

                let mut out = Vec::with_capacity(groups.len());
                for (key, states) in &groups {
                    let mut record = Record::new();
                    for column in columns {
                        let value = match column.source {
                            AggColumnSource::GroupKey(i) => key[i].to_value(),
                            AggColumnSource::Aggregate(i) => states[i].finalize(),
                        };
                        record.insert(column.key.clone(), value);
                    }
                    out.push(record);
                }
                Ok(out)
            }
        }
    }
}

fn project_row<'p>(
    columns: &'p [Column],
    scopes: &[Frame<'p>],
    frame: &Frame<'p>,
    key_sets: &[IndexSet<String>],
) -> Result<Record> {
    let mut out = Record::new();
    for column in columns {
        match column {
            Column::Star => {
                if let Some(record) = frame.row.slot(0) {
                    for (key, value) in record.iter() {
                        out.insert(key.clone(), value.clone());
                    }
                }
            }
            Column::AliasStar { ordinal, alias } => match frame.row.slot(*ordinal) {
                Some(record) => {
                    for (key, value) in record.iter() {
                        out.insert(format!("{alias}.{key}"), value.clone());
                    }
                }
                // Null-filled side: emit null for every key this source is
                // known to carry; an empty source synthesizes nothing.
                None => {
                    for key in &key_sets[*ordinal] {
                        out.insert(format!("{alias}.{key}"), Value::Null);
                    }
                }
            },
            Column::Expr { key, expr } => {
                let value = eval_value(expr, scopes, frame)?;
                out.insert(key.clone(), value);
            }
        }
    }
    Ok(out)
}
