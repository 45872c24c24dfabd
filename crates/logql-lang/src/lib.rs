//! LogQL Lang - lexer, AST, and parser for the LogQL query language.
//!
//! This crate is pure syntax: query text in, AST out. Name resolution,
//! validation, and planning live in `logql-engine`.

pub mod ast;
pub mod lexer;
pub mod parser;
pub mod token;

pub use ast::{
    AggArg, AggCall, AggFunc, CmpOp, Conflate, Expr, FieldPath, GlossBlock, GlossDecl, GroupExpr,
    JoinFlavor, JoinKey, QuantMode, Query, Segment, SelectItem, TableSub, ValueTerm,
};
pub use lexer::tokenize;
pub use parser::parse;
pub use token::{Keyword, Token, TokenKind};
