#![forbid(unsafe_code)]

use std::collections::BTreeSet;

use polyguard_core::CheckError;
use polyguard_kernel::Kernel;
use polyguard_set::{Point, Set};
use tracing::{debug, error};

use crate::records::ImplementedDomains;

/// Compare each recorded implemented domain against the instruction's
/// desired domain, both restricted to the instruction's inames under the
/// kernel's assumptions. `code` is attached to the failure when given.
pub fn check_implemented_domains(
    kernel: &Kernel,
    records: &ImplementedDomains,
    code: Option<&str>,
) -> Result<(), CheckError> {
    for (insn_id, pieces) in records {
        let insn = kernel
            .instruction(insn_id)
            .ok_or_else(|| CheckError::UnknownInstruction {
                insn_id: insn_id.clone(),
            })?;

        let Some((first, rest)) = pieces.split_first() else {
            return Err(CheckError::EmptyImplementation {
                insn_id: insn_id.clone(),
            });
        };
        let implemented = rest
            .iter()
            .try_fold(first.clone(), |acc, piece| acc.union(piece))?;

        let domain = kernel.domain_for_inames(&insn.inames)?;
        let desired = domain
            .intersect(&kernel.assumptions)?
            .project_onto_dims(&insn.inames)?;
        let implemented = implemented
            .intersect(&kernel.assumptions)?
            .project_onto_dims(&insn.inames)?;

        if implemented.is_equal(&desired)? {
            debug!(insn = %insn_id, "implemented domain matches");
            continue;
        }

        let shown: BTreeSet<&str> = insn
            .inames
            .iter()
            .map(String::as_str)
            .chain(domain.params().iter().map(String::as_str))
            .collect();
        let implemented_not_desired = sample_witness(&implemented.subtract(&desired)?, &shown)?;
        let desired_not_implemented = sample_witness(&desired.subtract(&implemented)?, &shown)?;

        if let Some(code) = code {
            error!(insn = %insn_id, "code generated for mismatched domain:\n{code}");
        }
        return Err(CheckError::DomainMismatch {
            insn_id: insn_id.clone(),
            implemented: implemented.to_string(),
            desired: desired.to_string(),
            implemented_not_desired,
            desired_not_implemented,
            code: code.map(str::to_string),
        });
    }
    Ok(())
}

fn sample_witness(diff: &Set, shown: &BTreeSet<&str>) -> Result<Option<Point>, CheckError> {
    Ok(diff
        .coalesce()?
        .sample_point()?
        .map(|pt| witness(&pt, shown)))
}

/// Restrict a sample point to `shown`, ordered by name.
pub fn witness(point: &Point, shown: &BTreeSet<&str>) -> Point {
    let mut coords: Vec<(String, i64)> = point
        .coords()
        .iter()
        .filter(|(name, _)| shown.contains(name.as_str()))
        .cloned()
        .collect();
    coords.sort();
    Point::new(coords)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn witness_keeps_shown_names_sorted() {
        let pt = Point::new(vec![
            ("n".into(), 4),
            ("j".into(), 1),
            ("_q".into(), 7),
            ("i".into(), 2),
        ]);
        let shown = BTreeSet::from(["i", "j", "n"]);
        assert_eq!(witness(&pt, &shown).to_string(), "i=2, j=1, n=4");
    }
}
