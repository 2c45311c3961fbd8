#![forbid(unsafe_code)]

//! The individual passes. Each one borrows the snapshot, never mutates it,
//! and reports the first violation it finds.

mod access;
mod axes;
mod bounds;
mod destinations;
mod race;

use std::collections::BTreeSet;

use polyguard_kernel::{Instruction, Kernel, Tag};

pub use access::check_for_inactive_iname_access;
pub use axes::{
    check_for_double_use_of_hw_axes, check_for_orphaned_user_hardware_axes,
    check_for_unused_hw_axes_in_insns,
};
pub use bounds::{check_bounds, check_for_data_dependent_parallel_bounds};
pub use destinations::check_write_destinations;
pub use race::check_for_write_races;

/// Inames of `insn` whose tag satisfies `pred`.
fn insn_inames_where(
    kernel: &Kernel,
    insn: &Instruction,
    pred: impl Fn(&Tag) -> bool,
) -> BTreeSet<String> {
    insn.inames
        .iter()
        .filter(|i| kernel.tag(i).is_some_and(&pred))
        .cloned()
        .collect()
}

fn sorted(set: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut out: Vec<String> = set.into_iter().collect();
    out.sort();
    out
}
