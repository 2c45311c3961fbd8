#![forbid(unsafe_code)]

//! Post-codegen sanity check: the loop nest a code generator emitted for an
//! instruction must cover exactly the instruction's domain.

mod domains;
mod records;

pub use domains::{check_implemented_domains, witness};
pub use records::{ImplementedDomains, RecordError, load_implemented};
