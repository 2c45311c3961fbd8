#![forbid(unsafe_code)]

use polyguard_kernel::{Kernel, SymbolicAnalysis};

use crate::error::{CheckError, WriteDestinationReason};

/// Instructions may only write temporaries, arguments, or (temporary) domain
/// parameters of domains they do not run in. The written name must resolve
/// to exactly one of them.
pub fn check_write_destinations(
    kernel: &Kernel,
    _analysis: &dyn SymbolicAnalysis,
) -> Result<(), CheckError> {
    let all_inames = kernel.all_inames();
    let all_params = kernel.all_params();

    for insn in &kernel.instructions {
        let fail = |variable: &str, reason| CheckError::WriteDestination {
            insn_id: insn.id.clone(),
            variable: variable.to_string(),
            reason,
        };

        let Some(wvar) = insn.assignee.assignee_name() else {
            return Err(fail(
                &insn.assignee.to_string(),
                WriteDestinationReason::UnresolvedAssignee,
            ));
        };

        if all_inames.contains(wvar) {
            return Err(fail(wvar, WriteDestinationReason::IterationVariable));
        }

        let is_param = all_params.contains(wvar);
        if is_param {
            if !kernel.is_temporary(wvar) {
                return Err(fail(wvar, WriteDestinationReason::ParameterNotTemporary));
            }
            let own = kernel.domain_for_inames(&insn.inames)?;
            if own.params().iter().any(|p| p == wvar) {
                return Err(fail(wvar, WriteDestinationReason::SelfReferentialBound));
            }
        }

        // A temporary domain parameter resolves to its temporary.
        let resolutions =
            usize::from(kernel.is_temporary(wvar)) + usize::from(kernel.argument(wvar).is_some());
        match resolutions {
            0 => return Err(fail(wvar, WriteDestinationReason::UnresolvedAssignee)),
            1 => {}
            _ => return Err(fail(wvar, WriteDestinationReason::AmbiguousDestination)),
        }
    }
    Ok(())
}
