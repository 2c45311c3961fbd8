#![forbid(unsafe_code)]

use std::collections::BTreeSet;

use polyguard_kernel::{AxisKind, Kernel, Scope, SymbolicAnalysis, Tag};

use super::{insn_inames_where, sorted};
use crate::error::{AccessSite, CheckError, WriteDestinationReason};

/// A write races when the instruction runs across a parallel iname that the
/// assignee index does not distinguish, within the storage the parallel
/// instances share.
pub fn check_for_write_races(
    kernel: &Kernel,
    analysis: &dyn SymbolicAnalysis,
) -> Result<(), CheckError> {
    let all_inames = kernel.all_inames();

    for insn in &kernel.instructions {
        let mut index_deps = BTreeSet::new();
        for ix in insn.assignee.assignee_index() {
            index_deps.extend(analysis.dependencies(ix));
        }
        let assignee_inames: BTreeSet<String> = index_deps
            .into_iter()
            .filter(|d| all_inames.contains(d))
            .collect();

        let stray = sorted(assignee_inames.difference(&insn.inames).cloned());
        if !stray.is_empty() {
            return Err(CheckError::InactiveAccess {
                insn_id: insn.id.clone(),
                site: AccessSite::Assignee,
                inames: stray,
            });
        }

        let Some(name) = insn.assignee.assignee_name() else {
            return Err(CheckError::WriteDestination {
                insn_id: insn.id.clone(),
                variable: insn.assignee.to_string(),
                reason: WriteDestinationReason::UnresolvedAssignee,
            });
        };

        if kernel.argument(name).is_some() && kernel.is_temporary(name) {
            return Err(CheckError::WriteDestination {
                insn_id: insn.id.clone(),
                variable: name.to_string(),
                reason: WriteDestinationReason::AmbiguousDestination,
            });
        }

        let raceable = if kernel.argument(name).is_some() {
            insn_inames_where(kernel, insn, Tag::is_parallel)
        } else if let Some(tv) = kernel.temporaries.get(name) {
            match tv.scope {
                Scope::Local => insn_inames_where(kernel, insn, |t| {
                    t.is_parallel() && t.hardware_axis_kind() != Some(AxisKind::Group)
                }),
                Scope::Private => insn_inames_where(kernel, insn, |t| {
                    t.is_parallel() && t.hardware_axis_kind().is_none()
                }),
                Scope::Undecided => {
                    return Err(CheckError::UndecidedScope {
                        insn_id: insn.id.clone(),
                        temporary: name.to_string(),
                    });
                }
            }
        } else {
            return Err(CheckError::WriteDestination {
                insn_id: insn.id.clone(),
                variable: name.to_string(),
                reason: WriteDestinationReason::UnresolvedAssignee,
            });
        };

        let race = sorted(raceable.difference(&assignee_inames).cloned());
        if !race.is_empty() {
            return Err(CheckError::WriteRace {
                insn_id: insn.id.clone(),
                inames: race,
            });
        }
    }
    Ok(())
}
