#![forbid(unsafe_code)]

//! Integer sample-point search.
//!
//! Variables are fixed one at a time (parameters first). The feasible
//! interval of the next variable comes from the Fourier–Motzkin shadow of
//! the constraints left after the previous choices; candidates inside that
//! interval are tried nearest-to-zero first. Whenever the shadow is exact
//! (unit coefficients, the common case for loop domains) the first
//! candidate succeeds and no backtracking happens.
//!
//! The search never guesses: if it cannot try every candidate of a
//! truncated interval and found nothing, it reports
//! [`SetError::SearchExhausted`] instead of claiming emptiness.

use std::collections::BTreeMap;

use crate::basic::{fourier_motzkin, push_normalized};
use crate::error::SetError;
use crate::linear::{div_ceil, div_floor, Constraint, ConstraintKind};
use crate::point::Point;
use crate::space::Space;

const STEP_BUDGET: usize = 200_000;
const CANDIDATES_PER_VARIABLE: usize = 64;

struct Search {
    steps: usize,
    truncated: bool,
}

impl Search {
    fn tick(&mut self) -> Result<(), SetError> {
        self.steps += 1;
        if self.steps > STEP_BUDGET {
            return Err(SetError::SearchExhausted {
                budget: STEP_BUDGET,
            });
        }
        Ok(())
    }

    fn solve(
        &mut self,
        constraints: &[Constraint],
        vars: &[&str],
        assignment: &mut BTreeMap<String, i64>,
    ) -> Result<bool, SetError> {
        self.tick()?;
        let Some((var, rest)) = vars.split_first() else {
            // Every variable is fixed; normalization already rejected any
            // violated constant constraint.
            return Ok(constraints.iter().all(|c| c.expr().is_constant()));
        };

        let Some((lo, hi)) = bounds(constraints, var, rest)? else {
            return Ok(false);
        };

        let candidates = Candidates::new(lo, hi);
        let exhaustive = candidates.exhaustive();
        for value in candidates {
            let Some(next) = substitute(constraints, var, value)? else {
                continue;
            };
            assignment.insert(var.to_string(), value);
            if self.solve(&next, rest, assignment)? {
                return Ok(true);
            }
            assignment.remove(*var);
        }
        if !exhaustive {
            self.truncated = true;
        }
        Ok(false)
    }
}

/// Integer interval of `var` in the shadow that eliminates `rest`.
/// `None` when the shadow is empty.
#[allow(clippy::type_complexity)]
fn bounds(
    constraints: &[Constraint],
    var: &str,
    rest: &[&str],
) -> Result<Option<(Option<i64>, Option<i64>)>, SetError> {
    let mut shadow = constraints.to_vec();
    for other in rest {
        if !shadow.iter().any(|c| c.expr().mentions(other)) {
            continue;
        }
        match fourier_motzkin(&shadow, other)? {
            Some(next) => shadow = next,
            None => return Ok(None),
        }
    }

    let mut lo: Option<i64> = None;
    let mut hi: Option<i64> = None;
    for c in &shadow {
        let a = c.expr().coeff(var);
        if a == 0 {
            continue;
        }
        let k = c.expr().constant_term();
        match c.kind() {
            ConstraintKind::Eq => {
                // a·x + k = 0
                if k % a != 0 {
                    return Ok(None);
                }
                let x = -k / a;
                lo = Some(lo.map_or(x, |l| l.max(x)));
                hi = Some(hi.map_or(x, |h| h.min(x)));
            }
            ConstraintKind::Ge if a > 0 => {
                let x = div_ceil(-k, a);
                lo = Some(lo.map_or(x, |l| l.max(x)));
            }
            ConstraintKind::Ge => {
                let x = div_floor(k, -a);
                hi = Some(hi.map_or(x, |h| h.min(x)));
            }
            // Checked once the variable is fixed.
            ConstraintKind::Mod(_) => {}
        }
    }
    if let (Some(l), Some(h)) = (lo, hi) {
        if l > h {
            return Ok(None);
        }
    }
    Ok(Some((lo, hi)))
}

fn substitute(
    constraints: &[Constraint],
    var: &str,
    value: i64,
) -> Result<Option<Vec<Constraint>>, SetError> {
    let mut out = Vec::with_capacity(constraints.len());
    for c in constraints {
        if !push_normalized(&mut out, c.substitute_value(var, value)?) {
            return Ok(None);
        }
    }
    Ok(Some(out))
}

/// Values of `[lo, hi]` ordered by distance from the point of the interval
/// closest to zero, capped at [`CANDIDATES_PER_VARIABLE`].
struct Candidates {
    lo: Option<i64>,
    hi: Option<i64>,
    start: i64,
    emitted: usize,
    offset: i64,
    upward: bool,
}

impl Candidates {
    fn new(lo: Option<i64>, hi: Option<i64>) -> Self {
        let mut start = 0;
        if let Some(l) = lo {
            start = start.max(l);
        }
        if let Some(h) = hi {
            start = start.min(h);
        }
        Self {
            lo,
            hi,
            start,
            emitted: 0,
            offset: 0,
            upward: true,
        }
    }

    fn exhaustive(&self) -> bool {
        match (self.lo, self.hi) {
            (Some(l), Some(h)) => {
                (h as i128 - l as i128) < CANDIDATES_PER_VARIABLE as i128
            }
            _ => false,
        }
    }

    fn in_range(&self, v: i64) -> bool {
        self.lo.is_none_or(|l| v >= l) && self.hi.is_none_or(|h| v <= h)
    }
}

impl Iterator for Candidates {
    type Item = i64;

    fn next(&mut self) -> Option<i64> {
        while self.emitted < CANDIDATES_PER_VARIABLE {
            if self.offset > 0 {
                let up_blocked = self
                    .hi
                    .is_some_and(|h| self.start.saturating_add(self.offset) > h);
                let down_blocked = self
                    .lo
                    .is_some_and(|l| self.start.saturating_sub(self.offset) < l);
                if up_blocked && down_blocked {
                    return None;
                }
            }

            // start, start+1, start-1, start+2, start-2, ...
            let v = if self.offset == 0 {
                self.offset = 1;
                Some(self.start)
            } else if self.upward {
                self.upward = false;
                self.start.checked_add(self.offset)
            } else {
                self.upward = true;
                let v = self.start.checked_sub(self.offset);
                self.offset += 1;
                v
            };

            if let Some(v) = v {
                if self.in_range(v) {
                    self.emitted += 1;
                    return Some(v);
                }
            }
        }
        None
    }
}

pub(crate) fn sample(space: &Space, constraints: &[Constraint]) -> Result<Option<Point>, SetError> {
    let vars: Vec<&str> = space.names().collect();
    let mut search = Search {
        steps: 0,
        truncated: false,
    };
    let mut assignment = BTreeMap::new();
    if search.solve(constraints, &vars, &mut assignment)? {
        let coords = vars
            .iter()
            .map(|v| (v.to_string(), assignment.get(*v).copied().unwrap_or(0)))
            .collect();
        return Ok(Some(Point::new(coords)));
    }
    if search.truncated {
        return Err(SetError::SearchExhausted {
            budget: STEP_BUDGET,
        });
    }
    Ok(None)
}
