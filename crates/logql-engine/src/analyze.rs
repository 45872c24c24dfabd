//! Semantic analysis: names to ordinals, AST to typed plan.
//!
//! The analyzer walks the AST with a scope stack. Each query level binds
//! its aliases (FROM plus CONFLATE) and its canonical labels; UPTREE
//! references search enclosing scopes, and unresolvable names fail here,
//! never at execution time. All the select-list, GROUP BY, UPON, and
//! GLOSS validation rules live in this module.

use crate::plan::*;
use logql_core::{Error, Result, SourceBindings};
use logql_lang::{
    AggArg, AggCall, AggFunc, Conflate, Expr, FieldPath, GlossBlock, GroupExpr, JoinKey, Query,
    Segment, SelectItem, ValueTerm,
};

/// Analyze a parsed query against the bound sources, producing a plan.
pub fn analyze(query: &Query, bindings: &SourceBindings) -> Result<QueryPlan> {
    let mut analyzer = Analyzer {
        bindings,
        scopes: Vec::new(),
    };
    analyzer.query_plan(query)
}

struct Scope {
    aliases: Vec<String>,
    labels: Vec<String>,
}

struct Analyzer<'a> {
    bindings: &'a SourceBindings,
    /// Innermost scope last. During analysis of a query its own scope is
    /// on top; UPTREE searches start one below.
    scopes: Vec<Scope>,
}

impl<'a> Analyzer<'a> {
    fn query_plan(&mut self, query: &Query) -> Result<QueryPlan> {
        let mut aliases = vec![query.from.clone()];
        for conflate in &query.conflates {
            if aliases.contains(&conflate.alias) {
                return Err(Error::DuplicateConflateAlias(conflate.alias.clone()));
            }
            aliases.push(conflate.alias.clone());
        }

        let mut sources = Vec::with_capacity(aliases.len());
        for alias in &aliases {
            let path = self
                .bindings
                .get(alias)
                .ok_or_else(|| Error::UnknownAlias(alias.clone()))?;
            sources.push(SourceSlot {
                alias: alias.clone(),
                path: path.to_path_buf(),
            });
        }

        let mut labels = Vec::new();
        if let Some(gloss) = &query.gloss {
            for decl in &gloss.decls {
                if labels.contains(&decl.name) {
                    return Err(Error::DuplicateLabel(decl.name.clone()));
                }
                labels.push(decl.name.clone());
            }
        }

        self.scopes.push(Scope { aliases, labels });
        let result = self.query_plan_scoped(query, sources);
        self.scopes.pop();
        result
    }

    fn query_plan_scoped(&mut self, query: &Query, sources: Vec<SourceSlot>) -> Result<QueryPlan> {
        let gloss = match &query.gloss {
            Some(block) => Some(self.gloss_plan(block)?),
            None => None,
        };

        let mut joins = Vec::with_capacity(query.conflates.len());
        for (i, conflate) in query.conflates.iter().enumerate() {
            joins.push(self.join_stage(conflate, i + 1)?);
        }

        let filter = match &query.filter {
            Some(expr) => Some(self.predicate(expr, query.gloss.as_ref(), gloss.as_ref())?),
            None => None,
        };

        let output = self.output_plan(query)?;

        Ok(QueryPlan {
            sources,
            joins,
            filter,
            gloss,
            output,
        })
    }

    // ------------------------------------------------------------------------
    // GLOSS
    // ------------------------------------------------------------------------

    fn gloss_plan(&mut self, block: &GlossBlock) -> Result<GlossPlan> {
        let mut plan_labels = Vec::with_capacity(block.decls.len());
        for decl in &block.decls {
            let mut candidates = Vec::with_capacity(decl.candidates.len());
            for candidate in &decl.candidates {
                candidates.push(self.field_expr(candidate, None)?);
            }
            plan_labels.push(GlossLabel {
                name: decl.name.clone(),
                candidates,
                default: decl.default.clone(),
            });
        }
        Ok(GlossPlan {
            strict: block.strict,
            labels: plan_labels,
        })
    }

    // ------------------------------------------------------------------------
    // CONFLATE
    // ------------------------------------------------------------------------

    fn join_stage(&mut self, conflate: &Conflate, ordinal: usize) -> Result<JoinStage> {
        let mut on = Vec::with_capacity(conflate.upon.len());
        for (lhs, rhs) in &conflate.upon {
            let left = self.join_side(lhs, ordinal)?;
            let right = self.join_side(rhs, ordinal)?;

            if let (ValueExpr::Field(a), ValueExpr::Field(b)) = (&left, &right) {
                if a.up == 0 && b.up == 0 && a.ordinal == b.ordinal {
                    let alias = self.current_scope().aliases[a.ordinal].clone();
                    return Err(Error::UponSameAlias(alias));
                }
            }

            on.push((left, right));
        }
        Ok(JoinStage {
            flavor: conflate.flavor,
            ordinal,
            on,
        })
    }

    fn join_side(&mut self, key: &JoinKey, max_ordinal: usize) -> Result<ValueExpr> {
        match key {
            JoinKey::Field(path) => self.field_expr(path, Some(max_ordinal)),
            JoinKey::Canon(label) => self.canon_expr(label),
        }
    }

    // ------------------------------------------------------------------------
    // Field / CANON resolution
    // ------------------------------------------------------------------------

    fn current_scope(&self) -> &Scope {
        self.scopes.last().expect("analyzer scope stack is never empty")
    }

    /// Resolve a field path to a `FieldAccess` expression.
    ///
    /// `max_ordinal` restricts which sources are visible (UPON conjuncts
    /// see only the anchor and prior conflates plus the stage's own alias).
    fn field_expr(&self, path: &FieldPath, max_ordinal: Option<usize>) -> Result<ValueExpr> {
        if path.uptree {
            return self.uptree_expr(path);
        }

        let scope = self.current_scope();
        let (ordinal, rest) = match path.segments.first() {
            // A leading segment naming a bound alias qualifies the path,
            // provided something follows it; a bare alias-shaped name is a
            // field of the anchor.
            Some(Segment::Key(name)) if path.segments.len() > 1 => {
                match scope.aliases.iter().position(|a| a == name) {
                    Some(ordinal) => (ordinal, path.segments[1..].to_vec()),
                    None => (0, path.segments.clone()),
                }
            }
            _ => (0, path.segments.clone()),
        };

        if let Some(max) = max_ordinal {
            if ordinal > max {
                let alias = scope.aliases[ordinal].clone();
                return Err(Error::UnknownAlias(alias));
            }
        }

        Ok(ValueExpr::Field(FieldAccess {
            up: 0,
            ordinal,
            path: rest,
        }))
    }

    fn uptree_expr(&self, path: &FieldPath) -> Result<ValueExpr> {
        let alias = match path.segments.first() {
            Some(Segment::Key(alias)) => alias,
            _ => return Err(Error::UnboundCorrelation(path.text())),
        };

        let enclosing = &self.scopes[..self.scopes.len().saturating_sub(1)];
        for (distance, scope) in enclosing.iter().rev().enumerate() {
            if let Some(ordinal) = scope.aliases.iter().position(|a| a == alias) {
                return Ok(ValueExpr::Field(FieldAccess {
                    up: distance + 1,
                    ordinal,
                    path: path.segments[1..].to_vec(),
                }));
            }
        }
        Err(Error::UnboundCorrelation(alias.clone()))
    }

    fn canon_expr(&self, label: &str) -> Result<ValueExpr> {
        for (distance, scope) in self.scopes.iter().rev().enumerate() {
            if let Some(index) = scope.labels.iter().position(|l| l == label) {
                return Ok(ValueExpr::Canon {
                    up: distance,
                    label: index,
                });
            }
        }
        Err(Error::UnknownLabel(label.to_string()))
    }

    // ------------------------------------------------------------------------
    // WHERE
    // ------------------------------------------------------------------------

    fn predicate(
        &mut self,
        expr: &Expr,
        gloss_ast: Option<&GlossBlock>,
        gloss_plan: Option<&GlossPlan>,
    ) -> Result<Predicate> {
        Ok(match expr {
            Expr::And(lhs, rhs) => Predicate::And(
                Box::new(self.predicate(lhs, gloss_ast, gloss_plan)?),
                Box::new(self.predicate(rhs, gloss_ast, gloss_plan)?),
            ),
            Expr::Or(lhs, rhs) => Predicate::Or(
                Box::new(self.predicate(lhs, gloss_ast, gloss_plan)?),
                Box::new(self.predicate(rhs, gloss_ast, gloss_plan)?),
            ),
            Expr::Compare { op, lhs, rhs } => Predicate::Compare {
                op: *op,
                lhs: self.where_term(lhs, gloss_ast, gloss_plan)?,
                rhs: self.where_term(rhs, gloss_ast, gloss_plan)?,
            },
            Expr::Beholds(table) => Predicate::Beholds(Box::new(self.query_plan(&table.query)?)),
            Expr::Amongst { value, table } => Predicate::Amongst {
                value: self.where_term(value, gloss_ast, gloss_plan)?,
                table: Box::new(self.query_plan(&table.query)?),
            },
            Expr::Quantified {
                op,
                value,
                mode,
                table,
            } => Predicate::Quantified {
                op: *op,
                value: self.where_term(value, gloss_ast, gloss_plan)?,
                mode: *mode,
                table: Box::new(self.query_plan(&table.query)?),
            },
        })
    }

    fn where_term(
        &mut self,
        term: &ValueTerm,
        gloss_ast: Option<&GlossBlock>,
        gloss_plan: Option<&GlossPlan>,
    ) -> Result<ValueExpr> {
        match term {
            ValueTerm::Literal(value) => Ok(ValueExpr::Literal(value.clone())),
            ValueTerm::Field(path) => self.field_expr(path, None),
            ValueTerm::Canon(label) => {
                let expr = self.canon_expr(label)?;
                // A label of the current query may appear in WHERE only
                // when every candidate is anchored at the FROM alias.
                if let ValueExpr::Canon { up: 0, label: idx } = expr {
                    self.check_where_canon(label, idx, gloss_ast, gloss_plan)?;
                }
                Ok(expr)
            }
            ValueTerm::Scalar { query, .. } => {
                Ok(ValueExpr::Scalar(Box::new(self.query_plan(query)?)))
            }
        }
    }

    fn check_where_canon(
        &self,
        label: &str,
        index: usize,
        gloss_ast: Option<&GlossBlock>,
        gloss_plan: Option<&GlossPlan>,
    ) -> Result<()> {
        let (Some(ast), Some(plan)) = (gloss_ast, gloss_plan) else {
            return Ok(());
        };

        for (candidate, resolved) in ast.decls[index]
            .candidates
            .iter()
            .zip(&plan.labels[index].candidates)
        {
            let anchored = matches!(
                resolved,
                ValueExpr::Field(FieldAccess { up: 0, ordinal: 0, .. })
            );
            if !anchored {
                return Err(Error::CanonBeyondAnchor {
                    label: label.to_string(),
                    candidate: candidate.text(),
                });
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------------
    // SELECT / GROUP BY
    // ------------------------------------------------------------------------

    fn output_plan(&mut self, query: &Query) -> Result<OutputPlan> {
        let has_aggregates = query
            .select
            .iter()
            .any(|item| matches!(item, SelectItem::Aggregate { .. }));

        if has_aggregates || !query.group_by.is_empty() {
            self.aggregate_output(query, has_aggregates)
        } else {
            self.projection_output(query)
        }
    }

    fn aggregate_output(&mut self, query: &Query, has_aggregates: bool) -> Result<OutputPlan> {
        let mut key_texts: Vec<String> = Vec::with_capacity(query.group_by.len());
        for entry in &query.group_by {
            let text = entry.text();
            if key_texts.contains(&text) {
                return Err(Error::DuplicateGroupKey(text));
            }
            key_texts.push(text);
        }

        let mut keys = Vec::with_capacity(query.group_by.len());
        for entry in &query.group_by {
            keys.push(match entry {
                GroupExpr::Field(path) => self.field_expr(path, None)?,
                GroupExpr::Canon(label) => self.canon_expr(label)?,
            });
        }

        let mut aggs = Vec::new();
        let mut columns = Vec::with_capacity(query.select.len());

        for item in &query.select {
            match item {
                SelectItem::Star => {
                    return Err(if has_aggregates {
                        Error::StarWithAggregate("*".into())
                    } else {
                        Error::SelectionOutsideGroup("*".into())
                    })
                }
                SelectItem::AliasStar(alias) => {
                    let text = format!("{alias}.*");
                    return Err(if has_aggregates {
                        Error::StarWithAggregate(text)
                    } else {
                        Error::SelectionOutsideGroup(text)
                    });
                }
                SelectItem::Aggregate { call, alias } => {
                    aggs.push(self.agg_spec(call)?);
                    columns.push(AggColumn {
                        key: alias.clone().unwrap_or_else(|| call.canonical_text()),
                        source: AggColumnSource::Aggregate(aggs.len() - 1),
                    });
                }
                SelectItem::Field { path, alias } => {
                    let text = path.text();
                    let index = key_texts
                        .iter()
                        .position(|t| *t == text)
                        .ok_or_else(|| Error::SelectionOutsideGroup(text.clone()))?;
                    columns.push(AggColumn {
                        key: alias.clone().unwrap_or(text),
                        source: AggColumnSource::GroupKey(index),
                    });
                }
                SelectItem::Canon { label, alias } => {
                    let text = format!("CANON.{label}");
                    let index = key_texts
                        .iter()
                        .position(|t| *t == text)
                        .ok_or_else(|| Error::SelectionOutsideGroup(text.clone()))?;
                    // Validate the reference even though the key expression
                    // is already resolved.
                    self.canon_expr(label)?;
                    columns.push(AggColumn {
                        key: alias.clone().unwrap_or(text),
                        source: AggColumnSource::GroupKey(index),
                    });
                }
                SelectItem::Scalar { text, .. } => {
                    return Err(Error::SelectionOutsideGroup(text.clone()))
                }
            }
        }

        check_unique_keys(columns.iter().map(|c| c.key.as_str()))?;

        Ok(OutputPlan::Aggregate {
            keys,
            aggs,
            columns,
        })
    }

    fn agg_spec(&mut self, call: &AggCall) -> Result<AggSpec> {
        let arg = match &call.arg {
            AggArg::Star => {
                return Ok(AggSpec::CountStar);
            }
            AggArg::Field(path) => self.field_expr(path, None)?,
            AggArg::Canon(label) => self.canon_expr(label)?,
        };

        Ok(match call.func {
            AggFunc::Count => AggSpec::Count(arg),
            AggFunc::Sum => AggSpec::Sum(arg),
            AggFunc::Avg => AggSpec::Avg(arg),
            AggFunc::Min => AggSpec::Min(arg),
            AggFunc::Max => AggSpec::Max(arg),
            AggFunc::Unique => AggSpec::Unique(arg),
        })
    }

    fn projection_output(&mut self, query: &Query) -> Result<OutputPlan> {
        let mut columns = Vec::with_capacity(query.select.len());

        for item in &query.select {
            match item {
                SelectItem::Star => {
                    if !query.conflates.is_empty() {
                        return Err(Error::StarWithConflate);
                    }
                    columns.push(Column::Star);
                }
                SelectItem::AliasStar(alias) => {
                    let ordinal = self
                        .current_scope()
                        .aliases
                        .iter()
                        .position(|a| a == alias)
                        .ok_or_else(|| Error::UnknownAlias(alias.clone()))?;
                    columns.push(Column::AliasStar {
                        ordinal,
                        alias: alias.clone(),
                    });
                }
                SelectItem::Field { path, alias } => columns.push(Column::Expr {
                    key: alias.clone().unwrap_or_else(|| path.text()),
                    expr: self.field_expr(path, None)?,
                }),
                SelectItem::Canon { label, alias } => columns.push(Column::Expr {
                    key: alias.clone().unwrap_or_else(|| format!("CANON.{label}")),
                    expr: self.canon_expr(label)?,
                }),
                SelectItem::Scalar { query, text, alias } => columns.push(Column::Expr {
                    key: alias.clone().unwrap_or_else(|| text.clone()),
                    expr: ValueExpr::Scalar(Box::new(self.query_plan(query)?)),
                }),
                SelectItem::Aggregate { .. } => {
                    unreachable!("projection_output is only called when has_aggregates is false")
                }
            }
        }

        check_unique_keys(columns.iter().filter_map(|c| match c {
            Column::Expr { key, .. } => Some(key.as_str()),
            _ => None,
        }))?;

        Ok(OutputPlan::Project(columns))
    }
}

fn check_unique_keys<'k>(keys: impl Iterator<Item = &'k str>) -> Result<()> {
    let mut seen: Vec<&str> = Vec::new();
    for key in keys {
        if seen.contains(&key) {
            return Err(Error::DuplicateOutputKey(key.to_string()));
        }
        seen.push(key);
    }
    Ok(())
}
