#![forbid(unsafe_code)]

use polyguard_kernel::{Kernel, SymbolicAnalysis};

use super::sorted;
use crate::error::{AccessSite, CheckError};

/// The right-hand side may only read inames the instruction runs within.
pub fn check_for_inactive_iname_access(
    kernel: &Kernel,
    analysis: &dyn SymbolicAnalysis,
) -> Result<(), CheckError> {
    let all_inames = kernel.all_inames();
    for insn in &kernel.instructions {
        let stray: Vec<String> = sorted(
            analysis
                .dependencies(&insn.expression)
                .into_iter()
                .filter(|d| all_inames.contains(d) && !insn.inames.contains(d)),
        );
        if !stray.is_empty() {
            return Err(CheckError::InactiveAccess {
                insn_id: insn.id.clone(),
                site: AccessSite::Expression,
                inames: stray,
            });
        }
    }
    Ok(())
}
