#![forbid(unsafe_code)]
#![allow(unused_assignments)]

use miette::Diagnostic;
use thiserror::Error;

/// Structural problems in a kernel snapshot, found by [`crate::Kernel::validate`]
/// or while loading one.
#[derive(Debug, Error, Diagnostic)]
pub enum KernelError {
    #[error("iteration variable '{name}' is a dimension of more than one domain")]
    #[diagnostic(code(polyguard::kernel::duplicate_iname))]
    DuplicateIname { name: String },

    #[error("instruction '{insn_id}' runs within undeclared iteration variable '{iname}'")]
    #[diagnostic(code(polyguard::kernel::undeclared_iname))]
    UndeclaredIname { insn_id: String, iname: String },

    #[error("tag '{tag}' is attached to undeclared iteration variable '{iname}'")]
    #[diagnostic(code(polyguard::kernel::unknown_tagged_iname))]
    TaggedUnknownIname { iname: String, tag: String },

    #[error("instruction id '{0}' is used more than once")]
    #[diagnostic(code(polyguard::kernel::duplicate_insn_id))]
    DuplicateInstructionId(String),

    #[error("invalid iteration tag '{0}'")]
    #[diagnostic(
        code(polyguard::kernel::invalid_tag),
        help("expected one of g.N, l.N, l.auto, vec, unr, unique.<key>")
    )]
    InvalidTag(String),

    #[error("unknown data type '{0}'")]
    #[diagnostic(code(polyguard::kernel::invalid_dtype))]
    InvalidDType(String),

    #[error("malformed kernel snapshot: {0}")]
    #[diagnostic(code(polyguard::kernel::json))]
    Json(#[from] serde_json::Error),
}

/// Failure to evaluate an [`crate::Expr`] to a concrete integer.
#[derive(Debug, Clone, PartialEq, Eq, Error, Diagnostic)]
pub enum EvalError {
    #[error("no value for variable '{0}'")]
    #[diagnostic(code(polyguard::eval::unknown_variable))]
    UnknownVariable(String),

    #[error("'{0}' has no integer value")]
    #[diagnostic(code(polyguard::eval::not_evaluable))]
    NotEvaluable(String),

    #[error("division by zero")]
    #[diagnostic(code(polyguard::eval::division_by_zero))]
    DivisionByZero,

    #[error("integer overflow")]
    #[diagnostic(code(polyguard::eval::overflow))]
    Overflow,
}
