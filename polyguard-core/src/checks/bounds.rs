#![forbid(unsafe_code)]

use std::collections::BTreeSet;

use polyguard_kernel::{Expr, Kernel, SymbolicAnalysis};
use polyguard_set::{LinExpr, Set};
use tracing::debug;

use super::sorted;
use crate::error::CheckError;

/// Parallel inames may not live in a domain whose bounds are read from
/// temporaries at run time.
pub fn check_for_data_dependent_parallel_bounds(
    kernel: &Kernel,
    _analysis: &dyn SymbolicAnalysis,
) -> Result<(), CheckError> {
    for (idx, dom) in kernel.domains.iter().enumerate() {
        let parallel: Vec<String> = sorted(
            dom.dims()
                .iter()
                .filter(|d| kernel.tag(d).is_some_and(|t| t.is_parallel()))
                .cloned(),
        );
        if parallel.is_empty() {
            continue;
        }
        if let Some(param) = dom.params().iter().find(|p| kernel.is_temporary(p)) {
            return Err(CheckError::DataDependentBounds {
                domain_index: idx,
                parameter: param.clone(),
                parallel_inames: parallel,
            });
        }
    }
    Ok(())
}

/// Every affine subscript into a shaped argument or temporary stays within
/// `0 <= index < extent` on each axis, for every point of the instruction's
/// domain under the kernel's assumptions. Subscripts that cannot be analyzed
/// are skipped.
pub fn check_bounds(kernel: &Kernel, analysis: &dyn SymbolicAnalysis) -> Result<(), CheckError> {
    for insn in &kernel.instructions {
        let domain = kernel.domain_for_inames(&insn.inames)?;

        // Data-dependent bounds: nothing sensible to compare against.
        if domain.params().iter().any(|p| kernel.is_temporary(p)) {
            continue;
        }
        let available: BTreeSet<String> = domain.space().names().map(str::to_string).collect();
        let domain = domain.intersect(&kernel.assumptions)?;

        for expr in [&insn.expression, &insn.assignee] {
            for (aggregate, index) in expr.subscripts() {
                let shape: &[Expr] = if let Some(arg) = kernel.argument(aggregate) {
                    match &arg.shape {
                        Some(shape) => shape,
                        None => continue,
                    }
                } else if let Some(tv) = kernel.temporaries.get(aggregate) {
                    &tv.shape
                } else {
                    continue;
                };

                let reference = render(aggregate, index);
                let in_scope = index
                    .iter()
                    .chain(shape.iter())
                    .all(|e| analysis.dependencies(e).is_subset(&available));
                if !in_scope {
                    debug!(insn = %insn.id, %reference, "bounds check skipped: unknown names");
                    continue;
                }

                if index.len() != shape.len() {
                    return Err(CheckError::SubscriptArity {
                        insn_id: insn.id.clone(),
                        reference,
                        got: index.len(),
                        expected: shape.len(),
                    });
                }

                let Some(range) = analysis.access_range(&domain, index)? else {
                    debug!(insn = %insn.id, %reference, "bounds check skipped: non-affine index");
                    continue;
                };
                let Some(bounds) = shape_box(analysis, &range, shape)? else {
                    debug!(insn = %insn.id, %reference, "bounds check skipped: non-affine shape");
                    continue;
                };

                if !range.is_subset(&bounds)? {
                    return Err(CheckError::OutOfBounds {
                        insn_id: insn.id.clone(),
                        reference,
                    });
                }
            }
        }
    }
    Ok(())
}

/// `∏ [0, shape[k])` over the access axes of `range`.
fn shape_box(
    analysis: &dyn SymbolicAnalysis,
    range: &Set,
    shape: &[Expr],
) -> Result<Option<Set>, CheckError> {
    let mut bounds = Set::universe(range.space().clone());
    for (axis, extent) in shape.iter().enumerate() {
        let (Some(dim), Some(hi)) = (range.dims().get(axis), analysis.linearize(extent)) else {
            return Ok(None);
        };
        let slab = Set::slab(range.space().clone(), dim, &LinExpr::zero(), &hi)?;
        bounds = bounds.intersect(&slab)?;
    }
    Ok(Some(bounds))
}

fn render(aggregate: &str, index: &[Expr]) -> String {
    Expr::Subscript {
        aggregate: aggregate.to_string(),
        index: index.to_vec(),
    }
    .to_string()
}
