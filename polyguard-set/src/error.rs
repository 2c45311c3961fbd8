#![forbid(unsafe_code)]
#![allow(unused_assignments)]

use miette::{Diagnostic, SourceSpan};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error, Diagnostic)]
pub enum SetError {
    #[error("integer overflow in set arithmetic")]
    #[diagnostic(code(polyguard::set::overflow))]
    Overflow,

    /// The sample search ran out of steps before it could decide emptiness.
    #[error("sample-point search exhausted its budget of {budget} steps")]
    #[diagnostic(
        code(polyguard::set::search_exhausted),
        help("the set likely has large coefficients or an unbounded integer-infeasible region")
    )]
    SearchExhausted { budget: usize },

    #[error("variable '{0}' is not part of the set's space")]
    #[diagnostic(code(polyguard::set::unknown_variable))]
    UnknownVariable(String),

    /// Exact elimination would split into more pieces than allowed.
    #[error("exact projection would split into more than {limit} pieces")]
    #[diagnostic(
        code(polyguard::set::split_limit),
        help("large strides or coefficients make the integer projection expensive")
    )]
    SplitLimit { limit: usize },

    #[error("name '{0}' is declared more than once in a space")]
    #[diagnostic(code(polyguard::set::duplicate_name))]
    DuplicateName(String),
}

#[derive(Debug, Clone, Error, Diagnostic)]
#[error("parse error: {message}")]
#[diagnostic(code(polyguard::parse))]
#[allow(unused_assignments)]
pub struct ParseError {
    pub message: String,
    #[label]
    pub span: SourceSpan,
}

impl ParseError {
    pub fn new(message: impl Into<String>, span: SourceSpan) -> Self {
        Self {
            message: message.into(),
            span,
        }
    }
}
