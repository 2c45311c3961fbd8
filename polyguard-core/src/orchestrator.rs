#![forbid(unsafe_code)]

use polyguard_kernel::{AffineAnalysis, Kernel, SymbolicAnalysis};
use rayon::prelude::*;
use tracing::{debug, error};

use crate::checks;
use crate::error::CheckError;

type CheckFn = fn(&Kernel, &dyn SymbolicAnalysis) -> Result<(), CheckError>;

/// One named pass of the automatic check suite.
pub struct CheckPass {
    pub name: &'static str,
    pub run: CheckFn,
}

/// The automatic suite, in the order it runs.
pub const CHECK_PASSES: &[CheckPass] = &[
    CheckPass {
        name: "unused_hw_axes",
        run: checks::check_for_unused_hw_axes_in_insns,
    },
    CheckPass {
        name: "double_use_of_hw_axes",
        run: checks::check_for_double_use_of_hw_axes,
    },
    CheckPass {
        name: "inactive_iname_access",
        run: checks::check_for_inactive_iname_access,
    },
    CheckPass {
        name: "write_races",
        run: checks::check_for_write_races,
    },
    CheckPass {
        name: "data_dependent_parallel_bounds",
        run: checks::check_for_data_dependent_parallel_bounds,
    },
    CheckPass {
        name: "bounds",
        run: checks::check_bounds,
    },
    CheckPass {
        name: "write_destinations",
        run: checks::check_write_destinations,
    },
];

/// Run the automatic suite with the default affine analysis.
pub fn run_checks(kernel: &Kernel) -> Result<(), CheckError> {
    run_checks_with(kernel, &AffineAnalysis)
}

/// Run every pass in order and stop at the first failure, dumping the
/// failing snapshot.
pub fn run_checks_with(
    kernel: &Kernel,
    analysis: &dyn SymbolicAnalysis,
) -> Result<(), CheckError> {
    for pass in CHECK_PASSES {
        debug!(kernel = %kernel.name, pass = pass.name, "running check");
        if let Err(err) = (pass.run)(kernel, analysis) {
            error!(
                kernel = %kernel.name,
                pass = pass.name,
                "failing kernel after processing:\n{kernel}"
            );
            return Err(err);
        }
    }
    Ok(())
}

/// Check independent variants in parallel. Verdicts come back in input
/// order.
pub fn check_variants(kernels: &[Kernel]) -> Vec<Result<(), CheckError>> {
    kernels.par_iter().map(run_checks).collect()
}
