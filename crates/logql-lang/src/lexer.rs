//! Hand-written scanner for LogQL query text.
//!
//! Keywords match case-insensitively, identifiers are case-sensitive,
//! string literals support only the `\"` and `\\` escapes, and number
//! literals allow no leading zero and no exponent. Every lexical failure
//! is an `E_PARSE` error carrying the offending position.

use crate::token::{Keyword, Token, TokenKind};
use logql_core::{Error, Result};
use std::iter::Peekable;
use std::str::CharIndices;

/// Tokenize a query string. The returned stream always ends with `Eof`.
pub fn tokenize(src: &str) -> Result<Vec<Token>> {
    Lexer::new(src).run()
}

struct Lexer<'a> {
    src: &'a str,
    iter: Peekable<CharIndices<'a>>,
    line: usize,
    column: usize,
}

impl<'a> Lexer<'a> {
    fn new(src: &'a str) -> Self {
        Self {
            src,
            iter: src.char_indices().peekable(),
            line: 1,
            column: 1,
        }
    }

    fn run(mut self) -> Result<Vec<Token>> {
        let mut tokens = Vec::new();

        while let Some(&(offset, ch)) = self.iter.peek() {
            if ch.is_whitespace() {
                self.bump();
                continue;
            }

            let (line, column) = (self.line, self.column);

            let kind = if ch.is_ascii_alphabetic() || ch == '_' {
                self.word()
            } else if ch.is_ascii_digit() || ch == '-' {
                self.number(line, column)?
            } else if ch == '"' {
                self.string(line, column)?
            } else {
                self.punct(line, column)?
            };

            let end = self.offset();
            tokens.push(Token {
                kind,
                text: self.src[offset..end].to_string(),
                line,
                column,
                offset,
            });
        }

        tokens.push(Token {
            kind: TokenKind::Eof,
            text: String::new(),
            line: self.line,
            column: self.column,
            offset: self.src.len(),
        });
        Ok(tokens)
    }

    /// Byte offset of the next unconsumed character.
    fn offset(&mut self) -> usize {
        self.iter.peek().map(|&(i, _)| i).unwrap_or(self.src.len())
    }

    fn bump(&mut self) -> Option<char> {
        let (_, ch) = self.iter.next()?;
        if ch == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(ch)
    }

    fn peek_char(&mut self) -> Option<char> {
        self.iter.peek().map(|&(_, c)| c)
    }

    fn word(&mut self) -> TokenKind {
        let start = self.offset();
        while matches!(self.peek_char(), Some(c) if c.is_ascii_alphanumeric() || c == '_') {
            self.bump();
        }
        let text = &self.src[start..self.offset()];

        match Keyword::lookup(text) {
            Some(kw) => TokenKind::Keyword(kw),
            None => TokenKind::Identifier(text.to_string()),
        }
    }

    fn number(&mut self, line: usize, column: usize) -> Result<TokenKind> {
        let start = self.offset();

        if self.peek_char() == Some('-') {
            self.bump();
            if !matches!(self.peek_char(), Some(c) if c.is_ascii_digit()) {
                return Err(Error::UnexpectedChar {
                    ch: '-',
                    line,
                    column,
                });
            }
        }

        let int_start = self.offset();
        while matches!(self.peek_char(), Some(c) if c.is_ascii_digit()) {
            self.bump();
        }
        let int_part = &self.src[int_start..self.offset()];
        if int_part.len() > 1 && int_part.starts_with('0') {
            return Err(Error::InvalidNumber {
                text: int_part.to_string(),
                line,
                column,
            });
        }

        // A dot only belongs to the number when a digit follows; otherwise
        // it is a path separator (`a.0.b`).
        let mut is_float = false;
        if self.peek_char() == Some('.') {
            let mut ahead = self.iter.clone();
            ahead.next();
            if matches!(ahead.peek(), Some(&(_, c)) if c.is_ascii_digit()) {
                is_float = true;
                self.bump();
                while matches!(self.peek_char(), Some(c) if c.is_ascii_digit()) {
                    self.bump();
                }
            }
        }

        let text = &self.src[start..self.offset()];
        if is_float {
            let value = text.parse::<f64>().map_err(|_| Error::InvalidNumber {
                text: text.to_string(),
                line,
                column,
            })?;
            Ok(TokenKind::Float(value))
        } else {
            let value = text.parse::<i64>().map_err(|_| Error::InvalidNumber {
                text: text.to_string(),
                line,
                column,
            })?;
            Ok(TokenKind::Integer(value))
        }
    }

    fn string(&mut self, line: usize, column: usize) -> Result<TokenKind> {
        self.bump(); // opening quote
        let mut value = String::new();

        loop {
            match self.bump() {
                None | Some('\n') => return Err(Error::UnterminatedString { line, column }),
                Some('"') => return Ok(TokenKind::Str(value)),
                Some('\\') => match self.bump() {
                    Some('"') => value.push('"'),
                    Some('\\') => value.push('\\'),
                    Some(ch) => {
                        return Err(Error::InvalidEscape {
                            ch,
                            line: self.line,
                            column: self.column,
                        })
                    }
                    None => return Err(Error::UnterminatedString { line, column }),
                },
                Some(ch) => value.push(ch),
            }
        }
    }

    fn punct(&mut self, line: usize, column: usize) -> Result<TokenKind> {
        let ch = self.bump().unwrap_or_default();
        let kind = match ch {
            '=' => TokenKind::Eq,
            '!' => match self.peek_char() {
                Some('=') => {
                    self.bump();
                    TokenKind::Neq
                }
                _ => return Err(Error::UnexpectedChar { ch, line, column }),
            },
            '<' => {
                if self.peek_char() == Some('=') {
                    self.bump();
                    TokenKind::LtEq
                } else {
                    TokenKind::Lt
                }
            }
            '>' => {
                if self.peek_char() == Some('=') {
                    self.bump();
                    TokenKind::GtEq
                } else {
                    TokenKind::Gt
                }
            }
            ':' => match self.peek_char() {
                Some('=') => {
                    self.bump();
                    TokenKind::Assign
                }
                _ => return Err(Error::UnexpectedChar { ch, line, column }),
            },
            '(' => TokenKind::LeftParen,
            ')' => TokenKind::RightParen,
            '[' => TokenKind::LeftBracket,
            ']' => TokenKind::RightBracket,
            '{' => TokenKind::LeftBrace,
            '}' => TokenKind::RightBrace,
            ',' => TokenKind::Comma,
            '.' => TokenKind::Dot,
            '|' => TokenKind::Pipe,
            '*' => TokenKind::Star,
            _ => return Err(Error::UnexpectedChar { ch, line, column }),
        };
        Ok(kind)
    }
}
