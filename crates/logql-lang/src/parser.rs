//! Recursive-descent parser for LogQL.
//!
//! Clause order follows the grammar: select list, FROM, optional WHERE,
//! optional GLOSS block, any number of CONFLATE stages, optional GROUP BY.
//! Precedence in WHERE is OR below AND below the comparison predicates;
//! parentheses override. Every syntactic mismatch is `E_PARSE`.

use crate::ast::*;
use crate::lexer::tokenize;
use crate::token::{Keyword, Token, TokenKind};
use logql_core::{Error, Result, Value};

/// Parse a complete query string into an AST.
pub fn parse(src: &str) -> Result<Query> {
    let tokens = tokenize(src)?;
    let mut parser = Parser {
        src,
        tokens,
        pos: 0,
    };
    let query = parser.query()?;

    if !parser.peek().is_eof() {
        return Err(parser.unexpected("end of query"));
    }
    Ok(query)
}

struct Parser<'a> {
    src: &'a str,
    tokens: Vec<Token>,
    pos: usize,
}

impl<'a> Parser<'a> {
    // ------------------------------------------------------------------------
    // Token stream helpers
    // ------------------------------------------------------------------------

    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek_at(&self, n: usize) -> &Token {
        &self.tokens[(self.pos + n).min(self.tokens.len() - 1)]
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn eat_keyword(&mut self, kw: Keyword) -> bool {
        if self.peek().is_keyword(kw) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect_keyword(&mut self, kw: Keyword) -> Result<()> {
        if self.eat_keyword(kw) {
            Ok(())
        } else {
            Err(self.unexpected(&format!("keyword {kw}")))
        }
    }

    fn expect_kind(&mut self, kind: TokenKind, expected: &str) -> Result<Token> {
        if self.peek().kind == kind {
            Ok(self.advance())
        } else {
            Err(self.unexpected(expected))
        }
    }

    fn identifier(&mut self, expected: &str) -> Result<String> {
        match self.peek().as_identifier() {
            Some(name) => {
                let name = name.to_string();
                self.advance();
                Ok(name)
            }
            None => Err(self.unexpected(expected)),
        }
    }

    fn unexpected(&self, expected: &str) -> Error {
        let token = self.peek();
        if token.is_eof() {
            Error::UnexpectedEnd(expected.to_string())
        } else {
            Error::UnexpectedToken {
                found: token.to_string(),
                expected: expected.to_string(),
                line: token.line,
                column: token.column,
            }
        }
    }

    // ------------------------------------------------------------------------
    // Query
    // ------------------------------------------------------------------------

    fn query(&mut self) -> Result<Query> {
        self.expect_keyword(Keyword::Select)?;

        let mut select = vec![self.select_item()?];
        while self.peek().kind == TokenKind::Comma {
            self.advance();
            select.push(self.select_item()?);
        }

        self.expect_keyword(Keyword::From)?;
        let from = self.identifier("source alias after FROM")?;

        let filter = if self.eat_keyword(Keyword::Where) {
            Some(self.or_expr()?)
        } else {
            None
        };

        let gloss = if self.eat_keyword(Keyword::Gloss) {
            Some(self.gloss_block()?)
        } else {
            None
        };

        let mut conflates = Vec::new();
        while self.eat_keyword(Keyword::Conflate) {
            conflates.push(self.conflate()?);
        }

        let mut group_by = Vec::new();
        if self.eat_keyword(Keyword::Group) {
            self.expect_keyword(Keyword::By)?;
            group_by.push(self.group_entry()?);
            while self.peek().kind == TokenKind::Comma {
                self.advance();
                group_by.push(self.group_entry()?);
            }
        }

        Ok(Query {
            select,
            from,
            filter,
            gloss,
            conflates,
            group_by,
        })
    }

    // ------------------------------------------------------------------------
    // Select list
    // ------------------------------------------------------------------------

    fn select_item(&mut self) -> Result<SelectItem> {
        if self.peek().kind == TokenKind::Star {
            self.advance();
            return Ok(SelectItem::Star);
        }

        // alias.*
        if self.peek().as_identifier().is_some()
            && self.peek_at(1).kind == TokenKind::Dot
            && self.peek_at(2).kind == TokenKind::Star
        {
            let alias = self.identifier("alias")?;
            self.advance(); // .
            self.advance(); // *
            return Ok(SelectItem::AliasStar(alias));
        }

        if self.peek().is_keyword(Keyword::Canon) && self.peek_at(1).kind == TokenKind::Dot {
            self.advance();
            self.advance();
            let label = self.identifier("canonical label after CANON.")?;
            let alias = self.opt_as()?;
            return Ok(SelectItem::Canon { label, alias });
        }

        if let Some(func) = self.agg_func_at_call() {
            self.advance();
            let call = self.agg_call(func)?;
            let alias = self.opt_as()?;
            return Ok(SelectItem::Aggregate { call, alias });
        }

        if self.peek().is_keyword(Keyword::Pocket)
            && self.peek_at(1).kind == TokenKind::LeftParen
        {
            let (query, text) = self.scalar_subquery()?;
            let alias = self.opt_as()?;
            return Ok(SelectItem::Scalar { query, text, alias });
        }

        let path = self.field_path(false)?;
        let alias = self.opt_as()?;
        Ok(SelectItem::Field { path, alias })
    }

    fn opt_as(&mut self) -> Result<Option<String>> {
        if self.eat_keyword(Keyword::As) {
            Ok(Some(self.identifier("output name after AS")?))
        } else {
            Ok(None)
        }
    }

    /// The aggregate function at the cursor, if the cursor sits on an
    /// aggregate keyword immediately followed by `(`.
    fn agg_func_at_call(&self) -> Option<AggFunc> {
        if self.peek_at(1).kind != TokenKind::LeftParen {
            return None;
        }
        match &self.peek().kind {
            TokenKind::Keyword(Keyword::Count) => Some(AggFunc::Count),
            TokenKind::Keyword(Keyword::Sum) => Some(AggFunc::Sum),
            TokenKind::Keyword(Keyword::Avg) | TokenKind::Keyword(Keyword::Average) => {
                Some(AggFunc::Avg)
            }
            TokenKind::Keyword(Keyword::Min) => Some(AggFunc::Min),
            TokenKind::Keyword(Keyword::Max) => Some(AggFunc::Max),
            TokenKind::Keyword(Keyword::Unique) => Some(AggFunc::Unique),
            _ => None,
        }
    }

    fn agg_call(&mut self, func: AggFunc) -> Result<AggCall> {
        self.expect_kind(TokenKind::LeftParen, "'('")?;

        let arg = if self.peek().kind == TokenKind::Star {
            if func != AggFunc::Count {
                return Err(self.unexpected("field path or CANON reference"));
            }
            self.advance();
            AggArg::Star
        } else if self.peek().is_keyword(Keyword::Canon) && self.peek_at(1).kind == TokenKind::Dot
        {
            self.advance();
            self.advance();
            AggArg::Canon(self.identifier("canonical label after CANON.")?)
        } else {
            AggArg::Field(self.field_path(false)?)
        };

        self.expect_kind(TokenKind::RightParen, "')'")?;
        Ok(AggCall { func, arg })
    }

    // ------------------------------------------------------------------------
    // Field paths
    // ------------------------------------------------------------------------

    fn field_path(&mut self, allow_uptree: bool) -> Result<FieldPath> {
        let uptree = if allow_uptree
            && self.peek().is_keyword(Keyword::Uptree)
            && self.peek_at(1).kind == TokenKind::Dot
        {
            self.advance();
            self.advance();
            true
        } else {
            false
        };

        let mut segments = vec![Segment::Key(self.identifier("field path")?)];

        loop {
            match &self.peek().kind {
                TokenKind::Dot => {
                    // A trailing `.` before `*` belongs to an alias.* item,
                    // never to a path; callers handle that case first.
                    self.advance();
                    segments.push(self.path_segment()?);
                }
                TokenKind::LeftBracket => {
                    self.advance();
                    let key = match &self.peek().kind {
                        TokenKind::Str(key) => {
                            let key = key.clone();
                            self.advance();
                            key
                        }
                        _ => return Err(self.unexpected("quoted key inside '[]'")),
                    };
                    self.expect_kind(TokenKind::RightBracket, "']'")?;
                    segments.push(Segment::Quoted(key));
                }
                _ => break,
            }
        }

        Ok(FieldPath { uptree, segments })
    }

    fn path_segment(&mut self) -> Result<Segment> {
        if let Some(name) = self.peek().as_identifier() {
            let segment = Segment::Key(name.to_string());
            self.advance();
            return Ok(segment);
        }
        if let TokenKind::Integer(i) = self.peek().kind {
            if i >= 0 {
                self.advance();
                return Ok(Segment::Index(i as u64));
            }
        }
        Err(self.unexpected("path segment (identifier or nonnegative index)"))
    }

    // ------------------------------------------------------------------------
    // GLOSS
    // ------------------------------------------------------------------------

    fn gloss_block(&mut self) -> Result<GlossBlock> {
        let strict = self.eat_keyword(Keyword::Strict);
        self.expect_kind(TokenKind::LeftBrace, "'{'")?;

        let mut decls = vec![self.gloss_decl()?];
        while self.peek().kind == TokenKind::Comma {
            self.advance();
            decls.push(self.gloss_decl()?);
        }

        self.expect_kind(TokenKind::RightBrace, "'}'")?;
        Ok(GlossBlock { strict, decls })
    }

    fn gloss_decl(&mut self) -> Result<GlossDecl> {
        let name = self.identifier("canonical label name")?;
        self.expect_kind(TokenKind::Assign, "':='")?;

        let mut candidates = vec![self.field_path(true)?];
        while self.peek().kind == TokenKind::Pipe {
            self.advance();
            candidates.push(self.field_path(true)?);
        }

        let default = if self.eat_keyword(Keyword::Default) {
            Some(self.literal()?)
        } else {
            None
        };

        Ok(GlossDecl {
            name,
            candidates,
            default,
        })
    }

    fn literal(&mut self) -> Result<Value> {
        let value = match &self.peek().kind {
            TokenKind::Str(s) => Value::String(s.clone()),
            TokenKind::Integer(i) => Value::Number((*i).into()),
            TokenKind::Float(f) => serde_json::Number::from_f64(*f)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            TokenKind::Keyword(Keyword::Null) => Value::Null,
            TokenKind::Keyword(Keyword::True) => Value::Bool(true),
            TokenKind::Keyword(Keyword::False) => Value::Bool(false),
            _ => return Err(self.unexpected("literal")),
        };
        self.advance();
        Ok(value)
    }

    // ------------------------------------------------------------------------
    // CONFLATE
    // ------------------------------------------------------------------------

    fn conflate(&mut self) -> Result<Conflate> {
        let flavor = if self.eat_keyword(Keyword::Intersecting) {
            JoinFlavor::Inner
        } else if self.eat_keyword(Keyword::Preserving) {
            if self.eat_keyword(Keyword::Left) {
                JoinFlavor::PreservingLeft
            } else if self.eat_keyword(Keyword::Right) {
                JoinFlavor::PreservingRight
            } else if self.eat_keyword(Keyword::Both) {
                JoinFlavor::PreservingBoth
            } else {
                return Err(self.unexpected("LEFT, RIGHT, or BOTH after PRESERVING"));
            }
        } else {
            JoinFlavor::Inner
        };

        let alias = self.identifier("source alias after CONFLATE")?;
        self.expect_keyword(Keyword::Upon)?;

        let mut upon = vec![self.upon_conjunct()?];
        while self.eat_keyword(Keyword::And) {
            upon.push(self.upon_conjunct()?);
        }

        Ok(Conflate {
            flavor,
            alias,
            upon,
        })
    }

    fn upon_conjunct(&mut self) -> Result<(JoinKey, JoinKey)> {
        let lhs = self.join_key()?;
        self.expect_kind(TokenKind::Eq, "'=' in UPON condition")?;
        let rhs = self.join_key()?;
        Ok((lhs, rhs))
    }

    fn join_key(&mut self) -> Result<JoinKey> {
        if self.peek().is_keyword(Keyword::Canon) && self.peek_at(1).kind == TokenKind::Dot {
            self.advance();
            self.advance();
            Ok(JoinKey::Canon(self.identifier("canonical label")?))
        } else {
            Ok(JoinKey::Field(self.field_path(false)?))
        }
    }

    fn group_entry(&mut self) -> Result<GroupExpr> {
        if self.peek().is_keyword(Keyword::Canon) && self.peek_at(1).kind == TokenKind::Dot {
            self.advance();
            self.advance();
            Ok(GroupExpr::Canon(self.identifier("canonical label")?))
        } else {
            Ok(GroupExpr::Field(self.field_path(false)?))
        }
    }

    // ------------------------------------------------------------------------
    // WHERE expressions
    // ------------------------------------------------------------------------

    fn or_expr(&mut self) -> Result<Expr> {
        let mut lhs = self.and_expr()?;
        while self.eat_keyword(Keyword::Or) {
            let rhs = self.and_expr()?;
            lhs = Expr::Or(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn and_expr(&mut self) -> Result<Expr> {
        let mut lhs = self.predicate()?;
        while self.eat_keyword(Keyword::And) {
            let rhs = self.predicate()?;
            lhs = Expr::And(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn predicate(&mut self) -> Result<Expr> {
        if self.peek().kind == TokenKind::LeftParen {
            self.advance();
            let inner = self.or_expr()?;
            self.expect_kind(TokenKind::RightParen, "')'")?;
            return Ok(inner);
        }

        if self.eat_keyword(Keyword::Beholds) {
            return Ok(Expr::Beholds(self.table_subquery()?));
        }

        let value = self.value_term()?;

        if self.eat_keyword(Keyword::Amongst) {
            return Ok(Expr::Amongst {
                value,
                table: self.table_subquery()?,
            });
        }

        let op = self.cmp_op()?;

        if self.eat_keyword(Keyword::Eitherwise) {
            return Ok(Expr::Quantified {
                op,
                value,
                mode: QuantMode::Eitherwise,
                table: self.table_subquery()?,
            });
        }
        if self.eat_keyword(Keyword::Everywise) {
            return Ok(Expr::Quantified {
                op,
                value,
                mode: QuantMode::Everywise,
                table: self.table_subquery()?,
            });
        }

        let rhs = self.value_term()?;
        Ok(Expr::Compare { op, lhs: value, rhs })
    }

    fn cmp_op(&mut self) -> Result<CmpOp> {
        let op = match self.peek().kind {
            TokenKind::Eq => CmpOp::Eq,
            TokenKind::Neq => CmpOp::Ne,
            TokenKind::Lt => CmpOp::Lt,
            TokenKind::LtEq => CmpOp::Le,
            TokenKind::Gt => CmpOp::Gt,
            TokenKind::GtEq => CmpOp::Ge,
            _ => return Err(self.unexpected("comparison operator or AMONGST")),
        };
        self.advance();
        Ok(op)
    }

    fn value_term(&mut self) -> Result<ValueTerm> {
        match &self.peek().kind {
            TokenKind::Str(_)
            | TokenKind::Integer(_)
            | TokenKind::Float(_)
            | TokenKind::Keyword(Keyword::Null)
            | TokenKind::Keyword(Keyword::True)
            | TokenKind::Keyword(Keyword::False) => Ok(ValueTerm::Literal(self.literal()?)),

            TokenKind::Keyword(Keyword::Pocket) => {
                let (query, text) = self.scalar_subquery()?;
                Ok(ValueTerm::Scalar { query, text })
            }

            TokenKind::Keyword(Keyword::Canon) if self.peek_at(1).kind == TokenKind::Dot => {
                self.advance();
                self.advance();
                Ok(ValueTerm::Canon(
                    self.identifier("canonical label after CANON.")?,
                ))
            }

            _ => Ok(ValueTerm::Field(self.field_path(true)?)),
        }
    }

    // ------------------------------------------------------------------------
    // Subqueries
    // ------------------------------------------------------------------------

    fn scalar_subquery(&mut self) -> Result<(Box<Query>, String)> {
        self.expect_keyword(Keyword::Pocket)?;
        self.expect_kind(TokenKind::LeftParen, "'('")?;

        let start = self.peek().offset;
        let query = self.query()?;
        let end = self.peek().offset;
        self.expect_kind(TokenKind::RightParen, "')'")?;

        let text = self.src[start..end].trim().to_string();
        Ok((Box::new(query), text))
    }

    fn table_subquery(&mut self) -> Result<TableSub> {
        self.expect_keyword(Keyword::Pocket)?;
        self.expect_kind(TokenKind::LeftBracket, "'['")?;
        let query = self.query()?;
        self.expect_kind(TokenKind::RightBracket, "']'")?;
        Ok(TableSub {
            query: Box::new(query),
        })
    }
}
