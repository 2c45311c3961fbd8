#![forbid(unsafe_code)]

//! Static correctness checks for kernel variants headed for a parallel
//! accelerator.

pub mod advisory;
pub mod checks;
mod error;
mod orchestrator;

pub use advisory::{
    Advisory, AdvisoryPolicy, DeviceDescriptor, LocalMemType, Problem, advise, filter_variants,
};
pub use checks::check_for_orphaned_user_hardware_axes;
pub use error::{AccessSite, CheckError, ErrorKind, WriteDestinationReason};
pub use orchestrator::{CHECK_PASSES, CheckPass, check_variants, run_checks, run_checks_with};
