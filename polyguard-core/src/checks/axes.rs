#![forbid(unsafe_code)]

use std::collections::{BTreeMap, BTreeSet};

use polyguard_kernel::{AxisKind, Kernel, SymbolicAnalysis, Tag};

use crate::error::CheckError;

/// Every non-boostable instruction must run within exactly the hardware
/// axes the grid launches; otherwise it would execute redundantly along the
/// unused ones.
pub fn check_for_unused_hw_axes_in_insns(
    kernel: &Kernel,
    _analysis: &dyn SymbolicAnalysis,
) -> Result<(), CheckError> {
    let group_axes: BTreeSet<u32> = (0..kernel.grid.group.len() as u32).collect();
    let local_axes: BTreeSet<u32> = (0..kernel.grid.local.len() as u32).collect();

    for insn in kernel.instructions.iter().filter(|i| !i.boostable) {
        let mut group_used = BTreeSet::new();
        let mut local_used = BTreeSet::new();

        for iname in &insn.inames {
            match kernel.tag(iname) {
                Some(Tag::LocalAxis(axis)) => {
                    local_used.insert(*axis);
                }
                Some(Tag::GroupAxis(axis)) => {
                    group_used.insert(*axis);
                }
                Some(Tag::AutoLocal) => {
                    return Err(CheckError::UnresolvedAutoLocal {
                        insn_id: insn.id.clone(),
                        iname: iname.clone(),
                    });
                }
                _ => {}
            }
        }

        if group_used != group_axes {
            return Err(CheckError::AxisCoverage {
                insn_id: insn.id.clone(),
                axis_kind: AxisKind::Group,
                available: group_axes,
                used: group_used,
            });
        }
        if local_used != local_axes {
            return Err(CheckError::AxisCoverage {
                insn_id: insn.id.clone(),
                axis_kind: AxisKind::Local,
                available: local_axes,
                used: local_used,
            });
        }
    }
    Ok(())
}

/// No two inames of one instruction may carry the same unique tag key.
pub fn check_for_double_use_of_hw_axes(
    kernel: &Kernel,
    _analysis: &dyn SymbolicAnalysis,
) -> Result<(), CheckError> {
    for insn in &kernel.instructions {
        let mut seen: BTreeMap<String, &str> = BTreeMap::new();
        for iname in &insn.inames {
            let Some(tag) = kernel.tag(iname) else {
                continue;
            };
            let Some(key) = tag.unique_key() else {
                continue;
            };
            if let Some(first) = seen.get(&key) {
                return Err(CheckError::AxisConflict {
                    insn_id: insn.id.clone(),
                    tag: tag.to_string(),
                    inames: vec![first.to_string(), iname.clone()],
                });
            }
            seen.insert(key, iname);
        }
    }
    Ok(())
}

/// Every local axis the user sized explicitly needs an iname mapped to it.
pub fn check_for_orphaned_user_hardware_axes(
    kernel: &Kernel,
    _analysis: &dyn SymbolicAnalysis,
) -> Result<(), CheckError> {
    for axis in kernel.local_sizes.keys() {
        let found = kernel
            .iname_to_tag
            .values()
            .any(|tag| *tag == Tag::LocalAxis(*axis));
        if !found {
            return Err(CheckError::OrphanedLocalAxis { axis: *axis });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use polyguard_kernel::AffineAnalysis;

    fn kernel(tags: &str, local: &str) -> Kernel {
        let src = format!(
            r#"{{
                "name": "axes",
                "domains": ["[n] -> {{ [i, j] : 0 <= i < n and 0 <= j < 16 }}"],
                "instructions": [{{"id": "w", "assignee": "out[i, j]", "expression": "1", "inames": ["i", "j"]}}],
                "iname_to_tag": {tags},
                "args": [{{"name": "out", "shape": ["n", "16"], "dtype": "float32", "kind": "global"}}],
                "grid": {{"group": ["n"], "local": {local}}}
            }}"#
        );
        Kernel::from_json(&src).unwrap()
    }

    #[test]
    fn full_coverage_passes() {
        let k = kernel(r#"{"i": "g.0", "j": "l.0"}"#, r#"["16"]"#);
        check_for_unused_hw_axes_in_insns(&k, &AffineAnalysis).unwrap();
    }

    #[test]
    fn auto_local_tag_is_a_usage_error() {
        let k = kernel(r#"{"i": "g.0", "j": "l.auto"}"#, r#"["16"]"#);
        let err = check_for_unused_hw_axes_in_insns(&k, &AffineAnalysis).unwrap_err();
        assert!(matches!(err, CheckError::UnresolvedAutoLocal { .. }));
    }

    #[test]
    fn boostable_instructions_are_exempt() {
        let mut k = kernel(r#"{"i": "g.0"}"#, r#"["16"]"#);
        k.instructions[0].boostable = true;
        check_for_unused_hw_axes_in_insns(&k, &AffineAnalysis).unwrap();
    }

    #[test]
    fn orphaned_local_axis() {
        let mut k = kernel(r#"{"i": "g.0", "j": "l.0"}"#, r#"["16"]"#);
        k.local_sizes.insert(1, "4".parse().unwrap());
        let err = check_for_orphaned_user_hardware_axes(&k, &AffineAnalysis).unwrap_err();
        assert_eq!(
            err.to_string(),
            "user-requested local hardware axis 1 has no iname mapped to it"
        );
    }
}
