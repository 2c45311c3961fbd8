#![forbid(unsafe_code)]

//! Kernel snapshots: iteration domains, tagged iteration variables,
//! instructions, storage, and the symbolic analysis the checks rely on.

pub mod analysis;
mod error;
mod expr;
mod kernel;
mod parse;
mod tag;

pub use analysis::{AffineAnalysis, SymbolicAnalysis};
pub use error::{EvalError, KernelError};
pub use expr::Expr;
pub use kernel::{
    ArgKind, Argument, DType, GridSizes, Instruction, Kernel, Scope, TemporaryVariable,
};
pub use parse::parse_expr;
pub use tag::{AxisKind, Tag};
