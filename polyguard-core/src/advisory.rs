#![forbid(unsafe_code)]

//! Device-fit advisory: will a variant launch on a given device at all?
//!
//! Severities run from 1 (informational) to 5 (will certainly not run).

use std::collections::BTreeMap;

use polyguard_kernel::analysis::evaluate;
use polyguard_kernel::{ArgKind, EvalError, Expr, Kernel, Scope};
use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LocalMemType {
    /// Dedicated on-chip memory.
    Local,
    /// Emulated in (cached) global memory.
    Global,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceDescriptor {
    pub max_work_item_dimensions: usize,
    pub max_work_item_sizes: Vec<i64>,
    pub max_work_group_size: i64,
    pub local_mem_size: i64,
    pub local_mem_type: LocalMemType,
    pub max_constant_args: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdvisoryPolicy {
    /// Variants at or above this severity are dropped.
    pub kill_level_min: u8,
    /// Messages at or above this severity are logged.
    pub warn_level_min: u8,
}

impl Default for AdvisoryPolicy {
    fn default() -> Self {
        Self {
            kill_level_min: 5,
            warn_level_min: 1,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Problem {
    pub severity: u8,
    pub message: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Advisory {
    /// 0 when nothing was found.
    pub max_severity: u8,
    pub messages: Vec<Problem>,
}

impl Advisory {
    fn push(&mut self, severity: u8, message: impl Into<String>) {
        self.max_severity = self.max_severity.max(severity);
        self.messages.push(Problem {
            severity,
            message: message.into(),
        });
    }
}

fn evaluate_all(exprs: &[Expr], params: &BTreeMap<String, i64>) -> Result<Vec<i64>, EvalError> {
    exprs.iter().map(|e| evaluate(e, params)).collect()
}

fn unknown_value(what: &str, err: &EvalError) -> String {
    match err {
        EvalError::UnknownVariable(name) => format!(
            "could not check {what} because no value for variable '{name}' was passed"
        ),
        other => format!("could not check {what}: {other}"),
    }
}

/// Bytes of local memory the kernel's local temporaries occupy.
pub fn local_mem_use(kernel: &Kernel, params: &BTreeMap<String, i64>) -> Result<i64, EvalError> {
    let mut total: i64 = 0;
    for tv in kernel.temporaries.values().filter(|t| t.scope == Scope::Local) {
        let mut bytes = tv.dtype.size_in_bytes() as i64;
        for extent in evaluate_all(&tv.shape, params)? {
            bytes = bytes.checked_mul(extent).ok_or(EvalError::Overflow)?;
        }
        total = total.checked_add(bytes).ok_or(EvalError::Overflow)?;
    }
    Ok(total)
}

/// Judge whether `kernel` fits `device` for the given parameter values.
pub fn advise(
    kernel: &Kernel,
    device: &DeviceDescriptor,
    params: &BTreeMap<String, i64>,
) -> Advisory {
    let mut out = Advisory::default();

    let dims = kernel.grid.group.len().max(kernel.grid.local.len());
    if dims > device.max_work_item_dimensions {
        out.push(5, "too many work item dimensions");
    }

    let sizes = evaluate_all(&kernel.grid.group, params)
        .and_then(|_| evaluate_all(&kernel.grid.local, params));
    match sizes {
        Err(err) => out.push(1, unknown_value("axis bounds", &err)),
        Ok(local) => {
            for (axis, len) in local.iter().enumerate() {
                if let Some(limit) = device.max_work_item_sizes.get(axis) {
                    if len > limit {
                        out.push(5, format!("local axis {axis} too big"));
                    }
                }
            }
            let group_size = local
                .iter()
                .try_fold(1i64, |acc, len| acc.checked_mul(*len));
            if group_size.is_none_or(|size| size > device.max_work_group_size) {
                out.push(5, "work group too big");
            }
        }
    }

    match local_mem_use(kernel, params) {
        Err(err) => out.push(1, unknown_value("local memory use", &err)),
        Ok(bytes) if bytes > device.local_mem_size => match device.local_mem_type {
            LocalMemType::Local => out.push(5, "using too much local memory"),
            LocalMemType::Global => out.push(
                4,
                "using more local memory than available, possibly OK due to cache nature",
            ),
        },
        Ok(_) => {}
    }

    let constant_args = kernel
        .args
        .iter()
        .filter(|a| a.kind == ArgKind::Constant)
        .count();
    if constant_args > device.max_constant_args {
        out.push(5, "too many constant arguments");
    }

    out
}

/// Lazily keep the variants whose worst problem stays below the kill level,
/// logging messages at or above the warn level.
pub fn filter_variants<'a, I>(
    variants: I,
    device: &'a DeviceDescriptor,
    params: &'a BTreeMap<String, i64>,
    policy: AdvisoryPolicy,
) -> impl Iterator<Item = Kernel> + 'a
where
    I: IntoIterator<Item = Kernel>,
    I::IntoIter: 'a,
{
    variants.into_iter().filter(move |kernel| {
        let advisory = advise(kernel, device, params);
        for problem in &advisory.messages {
            if problem.severity >= policy.warn_level_min {
                warn!(
                    kernel = %kernel.name,
                    severity = problem.severity,
                    "{}",
                    problem.message
                );
            }
        }
        advisory.max_severity < policy.kill_level_min
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device() -> DeviceDescriptor {
        DeviceDescriptor {
            max_work_item_dimensions: 3,
            max_work_item_sizes: vec![1024, 1024, 64],
            max_work_group_size: 1024,
            local_mem_size: 49152,
            local_mem_type: LocalMemType::Local,
            max_constant_args: 8,
        }
    }

    fn kernel(local: &str, temps: &str) -> Kernel {
        let src = format!(
            r#"{{
                "name": "adv",
                "domains": ["[n] -> {{ [i] : 0 <= i < n }}"],
                "temporaries": {temps},
                "grid": {{"group": ["n // 256"], "local": {local}}}
            }}"#
        );
        Kernel::from_json(&src).unwrap()
    }

    fn params(n: i64) -> BTreeMap<String, i64> {
        BTreeMap::from([("n".to_string(), n)])
    }

    #[test]
    fn clean_variant_has_severity_zero() {
        let k = kernel(r#"["256"]"#, "[]");
        let adv = advise(&k, &device(), &params(4096));
        assert_eq!(adv.max_severity, 0, "{:?}", adv.messages);
    }

    #[test]
    fn oversized_work_group_is_fatal() {
        let k = kernel(r#"["64", "32"]"#, "[]");
        let adv = advise(&k, &device(), &params(4096));
        assert_eq!(adv.max_severity, 5);
        assert!(adv.messages.iter().any(|p| p.message == "work group too big"));
    }

    #[test]
    fn missing_parameter_is_informational() {
        let k = kernel(r#"["256"]"#, "[]");
        let adv = advise(&k, &device(), &BTreeMap::new());
        assert_eq!(adv.max_severity, 1);
        assert!(adv.messages[0].message.contains("variable 'n'"));
    }

    #[test]
    fn global_backed_local_memory_is_a_warning() {
        let temps = r#"[{"name": "tile", "shape": ["128", "128"], "dtype": "float32", "scope": "local"}]"#;
        let k = kernel(r#"["256"]"#, temps);
        let mut dev = device();
        assert_eq!(advise(&k, &dev, &params(4096)).max_severity, 5);
        dev.local_mem_type = LocalMemType::Global;
        assert_eq!(advise(&k, &dev, &params(4096)).max_severity, 4);
    }

    #[test]
    fn filter_drops_variants_at_kill_level() {
        let good = kernel(r#"["256"]"#, "[]");
        let mut bad = kernel(r#"["2048"]"#, "[]");
        bad.name = "bad".into();
        let dev = device();
        let p = params(4096);
        let kept: Vec<String> = filter_variants(vec![good, bad], &dev, &p, AdvisoryPolicy::default())
            .map(|k| k.name)
            .collect();
        assert_eq!(kept, vec!["adv"]);
    }
}
