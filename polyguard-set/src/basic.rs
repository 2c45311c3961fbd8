#![forbid(unsafe_code)]

use std::collections::{BTreeMap, BTreeSet};

use crate::error::SetError;
use crate::linear::{lcm, Constraint, ConstraintKind, LinExpr, Normalized};
use crate::point::Point;
use crate::sample;
use crate::space::Space;

/// Cap on the pieces one exact projection may split into.
pub(crate) const MAX_SPLITS: usize = 256;

/// Adds `c` to `out` in normalized form, keeping only the tightest of
/// parallel inequalities. Returns `false` when the system became infeasible.
pub(crate) fn push_normalized(out: &mut Vec<Constraint>, c: Constraint) -> bool {
    let c = match c.normalize() {
        Normalized::Trivial => return true,
        Normalized::Infeasible => return false,
        Normalized::Constraint(c) => c,
    };
    if let Some(existing) = out.iter_mut().find(|e| e.parallel_to(&c)) {
        let (old, new) = (existing.expr().constant_term(), c.expr().constant_term());
        return match c.kind() {
            ConstraintKind::Eq | ConstraintKind::Mod(_) => old == new,
            ConstraintKind::Ge => {
                if new < old {
                    *existing = c;
                }
                true
            }
        };
    }
    out.push(c);
    true
}

fn normalized_system(
    constraints: impl IntoIterator<Item = Constraint>,
) -> Option<Vec<Constraint>> {
    let mut out = Vec::new();
    for c in constraints {
        if !push_normalized(&mut out, c) {
            return None;
        }
    }
    Some(out)
}

/// The equality with the smallest coefficient on `name`.
fn equality_pivot(constraints: &[Constraint], name: &str) -> Option<usize> {
    constraints
        .iter()
        .enumerate()
        .filter(|(_, c)| c.is_equality() && c.expr().mentions(name))
        .min_by_key(|(_, c)| c.expr().coeff(name).abs())
        .map(|(idx, _)| idx)
}

/// Substitute `name` away through the equality at `pivot`.
///
/// With `c·name + e = 0`, every other constraint is scaled by `|c|` so the
/// equality cancels `name`; congruences scale their modulus along. A
/// non-unit `c` leaves the integrality of `name` as `e ≡ 0 (mod |c|)`, so
/// the result is the exact integer projection. `None` means infeasible.
fn eliminate_by_equality(
    constraints: &[Constraint],
    pivot: usize,
    name: &str,
) -> Result<Option<Vec<Constraint>>, SetError> {
    let eq = constraints[pivot].expr();
    let c = eq.coeff(name);
    let mut out: Vec<Constraint> = Vec::new();
    if c.abs() > 1 {
        let rest = eq.substitute_value(name, 0)?;
        if !push_normalized(&mut out, Constraint::divisible(rest, c)?) {
            return Ok(None);
        }
    }
    for (idx, other) in constraints.iter().enumerate() {
        if idx == pivot {
            continue;
        }
        let a = other.expr().coeff(name);
        if a == 0 {
            if !push_normalized(&mut out, other.clone()) {
                return Ok(None);
            }
            continue;
        }
        // |c|·other - sign(c)·a·eq cancels `name`.
        let lhs = other.expr().checked_scale(c.abs())?;
        let rhs = eq.checked_scale(a * c.signum())?;
        let combined = lhs.checked_sub(&rhs)?;
        let next = match other.kind() {
            ConstraintKind::Eq => Constraint::eq(combined),
            ConstraintKind::Ge => Constraint::ge(combined),
            ConstraintKind::Mod(m) => {
                let m = m.checked_mul(c.abs()).ok_or(SetError::Overflow)?;
                Constraint::divisible(combined, m)?
            }
        };
        if !push_normalized(&mut out, next) {
            return Ok(None);
        }
    }
    Ok(Some(out))
}

/// Eliminate `name` from a conjunction (Fourier–Motzkin).
///
/// An equality mentioning `name` is used as a substitution. Otherwise every
/// lower bound is paired with every upper bound and congruences on `name`
/// are dropped; the result is the rational shadow, which contains the
/// integer projection. `None` means the system is infeasible.
pub(crate) fn fourier_motzkin(
    constraints: &[Constraint],
    name: &str,
) -> Result<Option<Vec<Constraint>>, SetError> {
    if let Some(p) = equality_pivot(constraints, name) {
        return eliminate_by_equality(constraints, p, name);
    }
    let (rest, lower, upper) = match split_bounds(constraints, name) {
        Some(split) => split,
        None => return Ok(None),
    };
    combine_bounds(rest, name, &lower, &upper, false)
}

/// Constraints free of `name`, then lower and upper bounds on it.
/// Congruences on `name` are left out.
#[allow(clippy::type_complexity)]
fn split_bounds(
    constraints: &[Constraint],
    name: &str,
) -> Option<(Vec<Constraint>, Vec<LinExpr>, Vec<LinExpr>)> {
    let mut rest = Vec::new();
    let mut lower = Vec::new();
    let mut upper = Vec::new();
    for c in constraints {
        let a = c.expr().coeff(name);
        if a != 0 && c.kind() != ConstraintKind::Ge {
            continue;
        }
        if a > 0 {
            lower.push(c.expr().clone());
        } else if a < 0 {
            upper.push(c.expr().clone());
        } else if !push_normalized(&mut rest, c.clone()) {
            return None;
        }
    }
    Some((rest, lower, upper))
}

/// Pairs every lower bound `a·x + l >= 0` with every upper bound
/// `-b·x + u >= 0` of `x = name` into `b·l + a·u >= 0`, or into
/// `b·l + a·u >= (a - 1)(b - 1)` for the dark shadow.
fn combine_bounds(
    mut out: Vec<Constraint>,
    name: &str,
    lower: &[LinExpr],
    upper: &[LinExpr],
    dark: bool,
) -> Result<Option<Vec<Constraint>>, SetError> {
    for l in lower {
        let a = l.coeff(name);
        for u in upper {
            let b = -u.coeff(name);
            let mut combined = l.checked_scale(b)?.checked_add(&u.checked_scale(a)?)?;
            if dark {
                let slack = (a - 1).checked_mul(b - 1).ok_or(SetError::Overflow)?;
                combined.add_constant(-slack)?;
            }
            if !push_normalized(&mut out, Constraint::ge(combined)) {
                return Ok(None);
            }
        }
    }
    Ok(Some(out))
}

/// Eliminate `name` exactly over the integers (Omega test).
///
/// Returns conjunctions whose union is the integer projection; infeasible
/// ones are left out.
pub(crate) fn eliminate_exact(
    constraints: &[Constraint],
    name: &str,
) -> Result<Vec<Vec<Constraint>>, SetError> {
    if !constraints.iter().any(|c| c.expr().mentions(name)) {
        return Ok(vec![constraints.to_vec()]);
    }
    if let Some(p) = equality_pivot(constraints, name) {
        return Ok(eliminate_by_equality(constraints, p, name)?.into_iter().collect());
    }

    let mut period = 1;
    for c in constraints {
        if let ConstraintKind::Mod(m) = c.kind() {
            if c.expr().mentions(name) {
                period = lcm(period, m)?;
            }
        }
    }
    if period == 1 {
        return eliminate_inequalities(constraints, name);
    }
    if period > MAX_SPLITS as i64 {
        return Err(SetError::SplitLimit { limit: MAX_SPLITS });
    }
    // name = period·name' + r turns every congruence on `name` into a
    // constant one, decided per residue r.
    let mut out = Vec::new();
    for r in 0..period {
        let mut replacement = LinExpr::term(name, period);
        replacement.add_constant(r)?;
        let shifted = constraints
            .iter()
            .map(|c| c.substitute(name, &replacement))
            .collect::<Result<Vec<_>, _>>()?;
        if let Some(system) = normalized_system(shifted) {
            out.extend(eliminate_inequalities(&system, name)?);
        }
        if out.len() > MAX_SPLITS {
            return Err(SetError::SplitLimit { limit: MAX_SPLITS });
        }
    }
    Ok(out)
}

/// Exact elimination when only inequalities mention `name`.
///
/// If every lower/upper pair has a unit coefficient on one side the real
/// shadow is exact. Otherwise the result is the dark shadow together with
/// the splinters: for each lower bound `a·x + l >= 0` and each
/// `0 <= i <= (m·a - a - m) / m`, with `m` the largest upper coefficient,
/// the slice `a·x + l = i` eliminated through its equality.
fn eliminate_inequalities(
    constraints: &[Constraint],
    name: &str,
) -> Result<Vec<Vec<Constraint>>, SetError> {
    let Some((rest, lower, upper)) = split_bounds(constraints, name) else {
        return Ok(Vec::new());
    };
    let exact = lower.iter().all(|l| {
        upper
            .iter()
            .all(|u| l.coeff(name) == 1 || u.coeff(name) == -1)
    });
    if exact {
        return Ok(combine_bounds(rest, name, &lower, &upper, false)?
            .into_iter()
            .collect());
    }

    let mut out: Vec<Vec<Constraint>> = combine_bounds(rest, name, &lower, &upper, true)?
        .into_iter()
        .collect();

    let m = upper.iter().map(|u| -u.coeff(name)).max().unwrap_or(1);
    for l in &lower {
        let a = l.coeff(name);
        let span = m
            .checked_mul(a)
            .and_then(|ma| ma.checked_sub(a + m))
            .ok_or(SetError::Overflow)?;
        let last = span.div_euclid(m);
        for i in 0..=last {
            let mut slice = l.clone();
            slice.add_constant(-i)?;
            let system = normalized_system(
                constraints
                    .iter()
                    .cloned()
                    .chain(std::iter::once(Constraint::eq(slice))),
            );
            let Some(system) = system else {
                continue;
            };
            if let Some(p) = equality_pivot(&system, name) {
                out.extend(eliminate_by_equality(&system, p, name)?);
            }
            if out.len() > MAX_SPLITS {
                return Err(SetError::SplitLimit { limit: MAX_SPLITS });
            }
        }
    }
    Ok(out)
}

/// A single conjunction of affine constraints over a [`Space`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BasicSet {
    space: Space,
    constraints: Vec<Constraint>,
    contradiction: bool,
}

impl BasicSet {
    pub fn universe(space: Space) -> Self {
        Self {
            space,
            constraints: Vec::new(),
            contradiction: false,
        }
    }

    pub fn empty(space: Space) -> Self {
        Self {
            space,
            constraints: Vec::new(),
            contradiction: true,
        }
    }

    pub fn from_constraints(
        space: Space,
        constraints: impl IntoIterator<Item = Constraint>,
    ) -> Result<Self, SetError> {
        let mut out = Self::universe(space);
        for c in constraints {
            out.add_constraint(c)?;
        }
        Ok(out)
    }

    pub fn space(&self) -> &Space {
        &self.space
    }

    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    /// Known empty without any search.
    pub fn is_obviously_empty(&self) -> bool {
        self.contradiction
    }

    pub fn add_constraint(&mut self, c: Constraint) -> Result<(), SetError> {
        if let Some(unknown) = c.expr().vars().find(|v| !self.space.contains(v)) {
            return Err(SetError::UnknownVariable(unknown.to_string()));
        }
        if self.contradiction {
            return Ok(());
        }
        if !push_normalized(&mut self.constraints, c) {
            self.mark_empty();
        }
        Ok(())
    }

    fn mark_empty(&mut self) {
        self.contradiction = true;
        self.constraints.clear();
    }

    /// Same constraints over a wider space.
    pub fn rehome(&self, space: &Space) -> Result<BasicSet, SetError> {
        if let Some(missing) = self.space.names().find(|n| !space.contains(n)) {
            return Err(SetError::UnknownVariable(missing.to_string()));
        }
        Ok(BasicSet {
            space: space.clone(),
            constraints: self.constraints.clone(),
            contradiction: self.contradiction,
        })
    }

    pub fn intersect(&self, other: &BasicSet) -> Result<BasicSet, SetError> {
        let space = self.space.align(&other.space);
        let mut out = self.rehome(&space)?;
        if other.contradiction {
            out.mark_empty();
        }
        for c in &other.constraints {
            out.add_constraint(c.clone())?;
        }
        Ok(out)
    }

    /// Existentially eliminate `names`, dropping them from the space.
    ///
    /// The projection is exact over the integers, so it may split into
    /// several conjunctions. An empty result is the empty set.
    pub fn project_out(&self, names: &BTreeSet<String>) -> Result<Vec<BasicSet>, SetError> {
        let space = self.space.without(names);
        if self.contradiction {
            return Ok(Vec::new());
        }
        let mut systems = vec![self.constraints.clone()];
        for name in names {
            if !self.space.contains(name) {
                continue;
            }
            let mut next = Vec::new();
            for system in &systems {
                next.extend(eliminate_exact(system, name)?);
                if next.len() > MAX_SPLITS {
                    return Err(SetError::SplitLimit { limit: MAX_SPLITS });
                }
            }
            systems = next;
        }
        Ok(systems
            .into_iter()
            .map(|constraints| BasicSet {
                space: space.clone(),
                constraints,
                contradiction: false,
            })
            .collect())
    }

    pub fn contains(&self, values: &BTreeMap<String, i64>) -> Result<bool, SetError> {
        if self.contradiction {
            return Ok(false);
        }
        for c in &self.constraints {
            match c.holds(values)? {
                Some(true) => {}
                Some(false) => return Ok(false),
                None => {
                    let missing = c
                        .expr()
                        .vars()
                        .find(|v| !values.contains_key(*v))
                        .unwrap_or_default();
                    return Err(SetError::UnknownVariable(missing.to_string()));
                }
            }
        }
        Ok(true)
    }

    pub fn sample(&self) -> Result<Option<Point>, SetError> {
        if self.contradiction {
            return Ok(None);
        }
        sample::sample(&self.space, &self.constraints)
    }

    pub fn is_empty(&self) -> Result<bool, SetError> {
        Ok(self.sample()?.is_none())
    }

    /// `self \ other` as pairwise-disjoint pieces.
    ///
    /// Piece `k` satisfies the first `k` constraints of `other` and violates
    /// constraint `k + 1`.
    pub fn subtract(&self, other: &BasicSet) -> Result<Vec<BasicSet>, SetError> {
        let space = self.space.align(&other.space);
        let mut acc = self.rehome(&space)?;
        if other.contradiction {
            return Ok(vec![acc]);
        }
        let mut pieces = Vec::new();
        for c in &other.constraints {
            if acc.contradiction {
                break;
            }
            for negated in c.negate()? {
                let mut piece = acc.clone();
                piece.add_constraint(negated)?;
                if !piece.is_empty()? {
                    pieces.push(piece);
                }
            }
            acc.add_constraint(c.clone())?;
        }
        Ok(pieces)
    }

    /// Drop constraints implied by the others.
    pub fn remove_redundancies(&self) -> Result<BasicSet, SetError> {
        if self.contradiction || self.is_empty()? {
            return Ok(BasicSet::empty(self.space.clone()));
        }
        let mut kept = self.constraints.clone();
        let mut idx = 0;
        while idx < kept.len() {
            let mut rest = kept.clone();
            let candidate = rest.remove(idx);
            let others = BasicSet {
                space: self.space.clone(),
                constraints: rest.clone(),
                contradiction: false,
            };
            let mut implied = true;
            for negated in candidate.negate()? {
                let mut trial = others.clone();
                trial.add_constraint(negated)?;
                if !trial.is_empty()? {
                    implied = false;
                    break;
                }
            }
            if implied {
                kept = rest;
            } else {
                idx += 1;
            }
        }
        Ok(BasicSet {
            space: self.space.clone(),
            constraints: kept,
            contradiction: false,
        })
    }
}
