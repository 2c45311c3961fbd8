#![forbid(unsafe_code)]

//! isl-flavoured text syntax for sets, e.g.
//! `[n] -> { [i, j] : 0 <= i < n and 0 <= j <= i or i = n }`.

mod lexer;
mod parser;

use std::mem;

use miette::SourceSpan;

use crate::error::ParseError;

pub use lexer::{Lexer, Token, TokenKind};
pub use parser::parse_set;

/// Position over a token stream. Shared with the index-expression parser.
pub struct Cursor<'a> {
    tokens: &'a [Token],
    idx: usize,
}

impl<'a> Cursor<'a> {
    pub fn new(tokens: &'a [Token]) -> Self {
        Self { tokens, idx: 0 }
    }

    pub fn at(&self, kind: TokenKind) -> bool {
        self.peek_kind()
            .is_some_and(|k| mem::discriminant(k) == mem::discriminant(&kind))
    }

    pub fn peek_kind(&self) -> Option<&TokenKind> {
        self.tokens.get(self.idx).map(|t| &t.kind)
    }

    pub fn peek_kind_n(&self, n: usize) -> Option<&TokenKind> {
        self.tokens.get(self.idx + n).map(|t| &t.kind)
    }

    pub fn peek_span(&self) -> SourceSpan {
        self.tokens
            .get(self.idx)
            .or_else(|| self.tokens.last())
            .map(|t| t.span)
            .unwrap_or_else(|| SourceSpan::new(0.into(), 0))
    }

    /// Span of the previously consumed token.
    pub fn prev_span(&self) -> SourceSpan {
        self.idx
            .checked_sub(1)
            .and_then(|i| self.tokens.get(i))
            .map(|t| t.span)
            .unwrap_or_else(|| self.peek_span())
    }

    pub fn next(&mut self) -> Option<Token> {
        let tok = self.tokens.get(self.idx)?.clone();
        self.idx += 1;
        Some(tok)
    }

    pub fn eat(&mut self, kind: TokenKind) -> bool {
        if self.at(kind) {
            self.idx += 1;
            true
        } else {
            false
        }
    }

    pub fn expect(&mut self, expected: TokenKind, what: &str) -> Result<Token, ParseError> {
        if self.at(expected) {
            self.next()
                .ok_or_else(|| ParseError::new("unexpected end of input", self.peek_span()))
        } else {
            Err(ParseError::new(format!("expected {what}"), self.peek_span()))
        }
    }

    pub fn expect_ident(&mut self) -> Result<(String, SourceSpan), ParseError> {
        let span = self.peek_span();
        match self.next() {
            Some(Token {
                kind: TokenKind::Ident(name),
                span,
            }) => Ok((name, span)),
            _ => Err(ParseError::new("expected identifier", span)),
        }
    }

    pub fn expect_eof(&mut self) -> Result<(), ParseError> {
        if self.at(TokenKind::Eof) {
            Ok(())
        } else {
            Err(ParseError::new("expected end of input", self.peek_span()))
        }
    }
}
