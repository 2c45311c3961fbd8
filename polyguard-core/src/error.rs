#![forbid(unsafe_code)]
#![allow(unused_assignments)]

use std::collections::BTreeSet;
use std::fmt;

use miette::Diagnostic;
use polyguard_kernel::AxisKind;
use polyguard_set::{Point, SetError};
use thiserror::Error;

/// Coarse classification of a failed check.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    AxisCoverage,
    AxisConflict,
    InactiveAccess,
    WriteRaceCondition,
    DataDependentBounds,
    OutOfBoundsAccess,
    WriteDestination,
    DomainMismatch,
    /// The snapshot is not in a state the checks can judge.
    Usage,
}

/// Where an out-of-context iname was referenced.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AccessSite {
    Expression,
    Assignee,
}

impl fmt::Display for AccessSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccessSite::Expression => f.write_str("expression"),
            AccessSite::Assignee => f.write_str("assignee"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WriteDestinationReason {
    IterationVariable,
    ParameterNotTemporary,
    SelfReferentialBound,
    UnresolvedAssignee,
    AmbiguousDestination,
}

impl fmt::Display for WriteDestinationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WriteDestinationReason::IterationVariable => {
                f.write_str("iteration variables may not be written")
            }
            WriteDestinationReason::ParameterNotTemporary => {
                f.write_str("it is a domain parameter but not a temporary variable")
            }
            WriteDestinationReason::SelfReferentialBound => {
                f.write_str("it bounds the domain the instruction runs in")
            }
            WriteDestinationReason::UnresolvedAssignee => {
                f.write_str("it is not a temporary, an argument or a domain parameter")
            }
            WriteDestinationReason::AmbiguousDestination => {
                f.write_str("it is declared both as a temporary and as an argument")
            }
        }
    }
}

fn axes(set: &BTreeSet<u32>) -> String {
    set.iter()
        .map(|a| a.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

fn mismatched(available: &BTreeSet<u32>, used: &BTreeSet<u32>) -> String {
    axes(&available.symmetric_difference(used).copied().collect())
}

fn names(list: &[String]) -> String {
    list.join(", ")
}

fn witness_lines(
    implemented_not_desired: &Option<Point>,
    desired_not_implemented: &Option<Point>,
) -> String {
    let mut lines = Vec::new();
    if let Some(pt) = implemented_not_desired {
        lines.push(format!("sample point implemented, but not desired: {pt}"));
    }
    if let Some(pt) = desired_not_implemented {
        lines.push(format!("sample point desired, but not implemented: {pt}"));
    }
    lines.join("\n")
}

#[derive(Debug, Error, Diagnostic)]
pub enum CheckError {
    #[error(
        "instruction '{insn_id}' does not use all {axis_kind} hardware axes (available: {} used: {}; mismatched: {})",
        axes(available),
        axes(used),
        mismatched(available, used)
    )]
    #[diagnostic(
        code(polyguard::axis_coverage),
        help("every non-boostable instruction must run within an iname for each grid axis")
    )]
    AxisCoverage {
        insn_id: String,
        axis_kind: AxisKind,
        available: BTreeSet<u32>,
        used: BTreeSet<u32>,
    },

    #[error("instruction '{insn_id}': iname '{iname}' still carries an automatic local-axis tag")]
    #[diagnostic(
        code(polyguard::usage::auto_local),
        help("assign concrete local axes before checking")
    )]
    UnresolvedAutoLocal { insn_id: String, iname: String },

    #[error("user-requested local hardware axis {axis} has no iname mapped to it")]
    #[diagnostic(code(polyguard::axis_coverage::orphaned))]
    OrphanedLocalAxis { axis: u32 },

    #[error("instruction '{insn_id}' has multiple inames tagged '{tag}': {}", names(inames))]
    #[diagnostic(code(polyguard::axis_conflict))]
    AxisConflict {
        insn_id: String,
        tag: String,
        inames: Vec<String>,
    },

    #[error(
        "{site} of instruction '{insn_id}' references inames the instruction does not run within: {}",
        names(inames)
    )]
    #[diagnostic(code(polyguard::inactive_access))]
    InactiveAccess {
        insn_id: String,
        site: AccessSite,
        inames: Vec<String>,
    },

    #[error(
        "instruction '{insn_id}' contains a write race: it runs across parallel iname(s) '{}' not referenced in the assignee index",
        names(inames)
    )]
    #[diagnostic(code(polyguard::write_race))]
    WriteRace { insn_id: String, inames: Vec<String> },

    #[error("temporary '{temporary}' written by instruction '{insn_id}' has no decided memory scope")]
    #[diagnostic(
        code(polyguard::usage::undecided_scope),
        help("decide between local and private storage before checking")
    )]
    UndecidedScope { insn_id: String, temporary: String },

    #[error("instruction '{insn_id}' may not write '{variable}': {reason}")]
    #[diagnostic(code(polyguard::write_destination))]
    WriteDestination {
        insn_id: String,
        variable: String,
        reason: WriteDestinationReason,
    },

    #[error(
        "domain {domain_index} has a data-dependent parameter '{parameter}' and contains parallel inames '{}'",
        names(parallel_inames)
    )]
    #[diagnostic(code(polyguard::data_dependent_bounds))]
    DataDependentBounds {
        domain_index: usize,
        parameter: String,
        parallel_inames: Vec<String>,
    },

    #[error(
        "subscript '{reference}' in instruction '{insn_id}' has the wrong number of indices (got: {got}, expected: {expected})"
    )]
    #[diagnostic(code(polyguard::out_of_bounds::arity))]
    SubscriptArity {
        insn_id: String,
        reference: String,
        got: usize,
        expected: usize,
    },

    #[error("'{reference}' in instruction '{insn_id}' accesses out-of-bounds array element")]
    #[diagnostic(code(polyguard::out_of_bounds))]
    OutOfBounds { insn_id: String, reference: String },

    #[error(
        "sanity check failed: implemented and desired domain for instruction '{insn_id}' do not match\n\nimplemented: {implemented}\n\ndesired: {desired}\n\n{}",
        witness_lines(implemented_not_desired, desired_not_implemented)
    )]
    #[diagnostic(code(polyguard::domain_mismatch))]
    DomainMismatch {
        insn_id: String,
        implemented: String,
        desired: String,
        implemented_not_desired: Option<Point>,
        desired_not_implemented: Option<Point>,
        code: Option<String>,
    },

    #[error("no instruction with id '{insn_id}'")]
    #[diagnostic(code(polyguard::usage::unknown_instruction))]
    UnknownInstruction { insn_id: String },

    #[error("no implemented domain pieces recorded for instruction '{insn_id}'")]
    #[diagnostic(code(polyguard::usage::empty_implementation))]
    EmptyImplementation { insn_id: String },

    #[error(transparent)]
    #[diagnostic(transparent)]
    SetAlgebra(#[from] SetError),
}

impl CheckError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CheckError::AxisCoverage { .. } | CheckError::OrphanedLocalAxis { .. } => {
                ErrorKind::AxisCoverage
            }
            CheckError::AxisConflict { .. } => ErrorKind::AxisConflict,
            CheckError::InactiveAccess { .. } => ErrorKind::InactiveAccess,
            CheckError::WriteRace { .. } => ErrorKind::WriteRaceCondition,
            CheckError::DataDependentBounds { .. } => ErrorKind::DataDependentBounds,
            CheckError::SubscriptArity { .. } | CheckError::OutOfBounds { .. } => {
                ErrorKind::OutOfBoundsAccess
            }
            CheckError::WriteDestination { .. } => ErrorKind::WriteDestination,
            CheckError::DomainMismatch { .. } => ErrorKind::DomainMismatch,
            CheckError::UnresolvedAutoLocal { .. }
            | CheckError::UndecidedScope { .. }
            | CheckError::UnknownInstruction { .. }
            | CheckError::EmptyImplementation { .. }
            | CheckError::SetAlgebra(_) => ErrorKind::Usage,
        }
    }

    /// The offending instruction, when the failure concerns one.
    pub fn insn_id(&self) -> Option<&str> {
        match self {
            CheckError::AxisCoverage { insn_id, .. }
            | CheckError::UnresolvedAutoLocal { insn_id, .. }
            | CheckError::AxisConflict { insn_id, .. }
            | CheckError::InactiveAccess { insn_id, .. }
            | CheckError::WriteRace { insn_id, .. }
            | CheckError::UndecidedScope { insn_id, .. }
            | CheckError::WriteDestination { insn_id, .. }
            | CheckError::SubscriptArity { insn_id, .. }
            | CheckError::OutOfBounds { insn_id, .. }
            | CheckError::DomainMismatch { insn_id, .. }
            | CheckError::UnknownInstruction { insn_id }
            | CheckError::EmptyImplementation { insn_id } => Some(insn_id),
            CheckError::OrphanedLocalAxis { .. }
            | CheckError::DataDependentBounds { .. }
            | CheckError::SetAlgebra(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coverage_message_lists_both_axis_sets() {
        let err = CheckError::AxisCoverage {
            insn_id: "w".into(),
            axis_kind: AxisKind::Local,
            available: BTreeSet::from([0, 1]),
            used: BTreeSet::from([0]),
        };
        assert_eq!(
            err.to_string(),
            "instruction 'w' does not use all local hardware axes (available: 0,1 used: 0; mismatched: 1)"
        );
        assert_eq!(err.kind(), ErrorKind::AxisCoverage);
        assert_eq!(err.insn_id(), Some("w"));
    }

    #[test]
    fn set_errors_are_usage_errors() {
        let err = CheckError::from(SetError::Overflow);
        assert_eq!(err.kind(), ErrorKind::Usage);
        assert_eq!(err.insn_id(), None);
    }
}
