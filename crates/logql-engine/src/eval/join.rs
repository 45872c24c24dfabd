//! Conflation-stage state.
//!
//! Each stage materializes its right-hand source once per plan execution
//! and tracks which of those records matched at least one pipeline row, so
//! the PRESERVING RIGHT and PRESERVING BOTH flavors can append the rest
//! after the anchor drains. UPON conjuncts compare under deep structural
//! equality, where `null = null` holds.

use super::{eval_value, Frame};
use crate::plan::{JoinStage, SourceSlot};
use indexmap::IndexSet;
use logql_core::{deep_eq, read_records, Record, Result};
use std::rc::Rc;

pub(super) struct JoinExec<'p> {
    pub stage: &'p JoinStage,
    pub records: Vec<Rc<Record>>,
    pub matched: Vec<bool>,
}

impl<'p> JoinExec<'p> {
    pub fn open(stage: &'p JoinStage, slot: &SourceSlot) -> Result<Self> {
        let records: Vec<Rc<Record>> = read_records(&slot.path)?.into_iter().map(Rc::new).collect();
        let matched = vec![false; records.len()];
        Ok(Self {
            stage,
            records,
            matched,
        })
    }

    /// Union of top-level keys across this source's records, for `alias.*`
    /// expansion over null-filled rows.
    pub fn key_union(&self) -> IndexSet<String> {
        let mut keys = IndexSet::new();
        for record in &self.records {
            for key in record.keys() {
                keys.insert(key.clone());
            }
        }
        keys
    }
}

/// Whether every UPON conjunct holds on the candidate combined row.
pub(super) fn upon_matches<'p>(
    stage: &'p JoinStage,
    scopes: &[Frame<'p>],
    frame: &Frame<'p>,
) -> Result<bool> {
    for (lhs, rhs) in &stage.on {
        let left = eval_value(lhs, scopes, frame)?;
        let right = eval_value(rhs, scopes, frame)?;
        if !deep_eq(&left, &right) {
            return Ok(false);
        }
    }
    Ok(true)
}
