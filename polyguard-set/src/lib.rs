#![forbid(unsafe_code)]

//! Exact integer sets over named parameters and dimensions.
//!
//! Sets are finite unions of conjunctions of affine constraints and
//! congruences. Emptiness, inclusion and sampling are decided by
//! Fourier–Motzkin shadows plus a bounded integer search; projection splits
//! into dark shadow and splinters where the rational shadow would be too
//! large. Every answer is exact or an explicit error
//! ([`SetError::SearchExhausted`], [`SetError::SplitLimit`]).

mod basic;
mod error;
mod linear;
mod point;
mod sample;
mod set;
mod space;
pub mod syntax;

pub use basic::BasicSet;
pub use error::{ParseError, SetError};
pub use linear::{Constraint, ConstraintKind, LinExpr, Normalized};
pub use point::Point;
pub use set::Set;
pub use space::Space;
