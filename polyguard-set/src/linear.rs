#![forbid(unsafe_code)]

use std::collections::BTreeMap;
use std::fmt;

use crate::error::SetError;

fn add(a: i64, b: i64) -> Result<i64, SetError> {
    a.checked_add(b).ok_or(SetError::Overflow)
}

fn mul(a: i64, b: i64) -> Result<i64, SetError> {
    a.checked_mul(b).ok_or(SetError::Overflow)
}

pub(crate) fn lcm(a: i64, b: i64) -> Result<i64, SetError> {
    let g = gcd(a, b);
    if g == 0 {
        return Ok(0);
    }
    mul(a.abs() / g, b.abs())
}

pub(crate) fn gcd(mut a: i64, mut b: i64) -> i64 {
    a = a.abs();
    b = b.abs();
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    a
}

/// `ceil(p / q)` for `q > 0`.
pub(crate) fn div_ceil(p: i64, q: i64) -> i64 {
    debug_assert!(q > 0);
    -((-p).div_euclid(q))
}

/// `floor(p / q)` for `q > 0`.
pub(crate) fn div_floor(p: i64, q: i64) -> i64 {
    debug_assert!(q > 0);
    p.div_euclid(q)
}

/// Integer affine form `Σ c·v + k` over named variables.
///
/// Zero coefficients are never stored, so two equal forms compare equal
/// structurally.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LinExpr {
    coeffs: BTreeMap<String, i64>,
    constant: i64,
}

impl LinExpr {
    pub fn zero() -> Self {
        Self::default()
    }

    pub fn from_constant(k: i64) -> Self {
        Self {
            coeffs: BTreeMap::new(),
            constant: k,
        }
    }

    pub fn var(name: impl Into<String>) -> Self {
        Self::term(name, 1)
    }

    pub fn term(name: impl Into<String>, coeff: i64) -> Self {
        let mut coeffs = BTreeMap::new();
        if coeff != 0 {
            coeffs.insert(name.into(), coeff);
        }
        Self { coeffs, constant: 0 }
    }

    pub fn coeff(&self, name: &str) -> i64 {
        self.coeffs.get(name).copied().unwrap_or(0)
    }

    pub fn constant_term(&self) -> i64 {
        self.constant
    }

    pub fn terms(&self) -> impl Iterator<Item = (&str, i64)> {
        self.coeffs.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn vars(&self) -> impl Iterator<Item = &str> {
        self.coeffs.keys().map(String::as_str)
    }

    pub fn is_constant(&self) -> bool {
        self.coeffs.is_empty()
    }

    pub fn mentions(&self, name: &str) -> bool {
        self.coeffs.contains_key(name)
    }

    pub fn add_term(&mut self, name: &str, coeff: i64) -> Result<(), SetError> {
        if coeff == 0 {
            return Ok(());
        }
        let next = add(self.coeff(name), coeff)?;
        if next == 0 {
            self.coeffs.remove(name);
        } else {
            self.coeffs.insert(name.to_string(), next);
        }
        Ok(())
    }

    pub fn add_constant(&mut self, k: i64) -> Result<(), SetError> {
        self.constant = add(self.constant, k)?;
        Ok(())
    }

    pub fn checked_add(&self, other: &LinExpr) -> Result<LinExpr, SetError> {
        let mut out = self.clone();
        for (name, c) in other.terms() {
            out.add_term(name, c)?;
        }
        out.add_constant(other.constant)?;
        Ok(out)
    }

    pub fn checked_scale(&self, k: i64) -> Result<LinExpr, SetError> {
        if k == 0 {
            return Ok(LinExpr::zero());
        }
        let mut coeffs = BTreeMap::new();
        for (name, c) in &self.coeffs {
            coeffs.insert(name.clone(), mul(*c, k)?);
        }
        Ok(LinExpr {
            coeffs,
            constant: mul(self.constant, k)?,
        })
    }

    pub fn checked_sub(&self, other: &LinExpr) -> Result<LinExpr, SetError> {
        self.checked_add(&other.checked_scale(-1)?)
    }

    pub fn checked_neg(&self) -> Result<LinExpr, SetError> {
        self.checked_scale(-1)
    }

    /// Replace `name` by `replacement` (exact substitution).
    pub fn substitute(&self, name: &str, replacement: &LinExpr) -> Result<LinExpr, SetError> {
        let c = self.coeff(name);
        if c == 0 {
            return Ok(self.clone());
        }
        let mut rest = self.clone();
        rest.coeffs.remove(name);
        rest.checked_add(&replacement.checked_scale(c)?)
    }

    pub fn substitute_value(&self, name: &str, value: i64) -> Result<LinExpr, SetError> {
        self.substitute(name, &LinExpr::from_constant(value))
    }

    pub fn rename(&self, from: &str, to: &str) -> Result<LinExpr, SetError> {
        self.substitute(from, &LinExpr::var(to))
    }

    /// Value under `values`; `None` when a variable is unbound.
    pub fn evaluate(&self, values: &BTreeMap<String, i64>) -> Result<Option<i64>, SetError> {
        let mut acc = self.constant;
        for (name, c) in &self.coeffs {
            let Some(v) = values.get(name) else {
                return Ok(None);
            };
            acc = add(acc, mul(*c, *v)?)?;
        }
        Ok(Some(acc))
    }

    /// The same form without its constant.
    fn linear_part(&self) -> LinExpr {
        LinExpr {
            coeffs: self.coeffs.clone(),
            constant: 0,
        }
    }

    fn content(&self) -> i64 {
        self.coeffs.values().fold(0, |g, c| gcd(g, *c))
    }
}

impl fmt::Display for LinExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (name, c) in &self.coeffs {
            let (sign, mag) = if *c < 0 { ("-", -c) } else { ("+", *c) };
            if first {
                if sign == "-" {
                    f.write_str("-")?;
                }
            } else {
                write!(f, " {sign} ")?;
            }
            if mag == 1 {
                write!(f, "{name}")?;
            } else {
                write!(f, "{mag}{name}")?;
            }
            first = false;
        }
        if first {
            write!(f, "{}", self.constant)
        } else if self.constant > 0 {
            write!(f, " + {}", self.constant)
        } else if self.constant < 0 {
            write!(f, " - {}", -self.constant)
        } else {
            Ok(())
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ConstraintKind {
    /// `expr = 0`
    Eq,
    /// `expr >= 0`
    Ge,
    /// `expr ≡ 0 (mod m)` with `m >= 2` once normalized.
    Mod(i64),
}

/// Largest modulus whose complement is spelled out residue by residue.
pub(crate) const MAX_MODULUS: i64 = 256;

/// Outcome of normalizing a constraint.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Normalized {
    Trivial,
    Infeasible,
    Constraint(Constraint),
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Constraint {
    kind: ConstraintKind,
    expr: LinExpr,
}

impl Constraint {
    pub fn eq(expr: LinExpr) -> Self {
        Self {
            kind: ConstraintKind::Eq,
            expr,
        }
    }

    pub fn ge(expr: LinExpr) -> Self {
        Self {
            kind: ConstraintKind::Ge,
            expr,
        }
    }

    /// `expr ≡ 0 (mod modulus)`. A zero modulus is an equality.
    pub fn divisible(expr: LinExpr, modulus: i64) -> Result<Self, SetError> {
        let m = modulus.checked_abs().ok_or(SetError::Overflow)?;
        Ok(if m == 0 {
            Self::eq(expr)
        } else {
            Self {
                kind: ConstraintKind::Mod(m),
                expr,
            }
        })
    }

    /// `lhs <= rhs`
    pub fn le_of(lhs: &LinExpr, rhs: &LinExpr) -> Result<Self, SetError> {
        Ok(Self::ge(rhs.checked_sub(lhs)?))
    }

    /// `lhs < rhs`
    pub fn lt_of(lhs: &LinExpr, rhs: &LinExpr) -> Result<Self, SetError> {
        let mut e = rhs.checked_sub(lhs)?;
        e.add_constant(-1)?;
        Ok(Self::ge(e))
    }

    /// `lhs = rhs`
    pub fn eq_of(lhs: &LinExpr, rhs: &LinExpr) -> Result<Self, SetError> {
        Ok(Self::eq(lhs.checked_sub(rhs)?))
    }

    pub fn kind(&self) -> ConstraintKind {
        self.kind
    }

    pub fn expr(&self) -> &LinExpr {
        &self.expr
    }

    pub fn is_equality(&self) -> bool {
        self.kind == ConstraintKind::Eq
    }

    /// Divide by the content of the variable coefficients. Inequalities get
    /// their constant floored, which tightens them to the integer hull of a
    /// single constraint.
    pub fn normalize(self) -> Normalized {
        if self.expr.is_constant() {
            let k = self.expr.constant;
            let holds = match self.kind {
                ConstraintKind::Eq => k == 0,
                ConstraintKind::Ge => k >= 0,
                ConstraintKind::Mod(m) => k.rem_euclid(m) == 0,
            };
            return if holds {
                Normalized::Trivial
            } else {
                Normalized::Infeasible
            };
        }

        if let ConstraintKind::Mod(m) = self.kind {
            return normalize_congruence(&self.expr, m);
        }

        let g = self.expr.content();
        let mut expr = self.expr;
        match self.kind {
            ConstraintKind::Eq => {
                if expr.constant % g != 0 {
                    return Normalized::Infeasible;
                }
                for c in expr.coeffs.values_mut() {
                    *c /= g;
                }
                expr.constant /= g;
                // Canonical sign: leading coefficient positive.
                if expr.coeffs.values().next().is_some_and(|c| *c < 0) {
                    for c in expr.coeffs.values_mut() {
                        *c = -*c;
                    }
                    expr.constant = -expr.constant;
                }
            }
            ConstraintKind::Ge => {
                for c in expr.coeffs.values_mut() {
                    *c /= g;
                }
                expr.constant = div_floor(expr.constant, g);
            }
            ConstraintKind::Mod(_) => {}
        }
        Normalized::Constraint(Constraint {
            kind: self.kind,
            expr,
        })
    }

    /// Alternatives whose union is the integer complement of this
    /// constraint. An equality negates into two disjoint half-spaces, a
    /// congruence into one alternative per non-zero residue.
    pub fn negate(&self) -> Result<Vec<Constraint>, SetError> {
        let mut below = self.expr.checked_neg()?;
        below.add_constant(-1)?;
        match self.kind {
            ConstraintKind::Mod(m) => {
                if m > MAX_MODULUS {
                    return Err(SetError::SplitLimit {
                        limit: MAX_MODULUS as usize,
                    });
                }
                (1..m)
                    .map(|r| {
                        let mut expr = self.expr.clone();
                        expr.add_constant(-r)?;
                        Ok(Constraint {
                            kind: ConstraintKind::Mod(m),
                            expr,
                        })
                    })
                    .collect()
            }
            ConstraintKind::Ge => Ok(vec![Constraint::ge(below)]),
            ConstraintKind::Eq => {
                let mut above = self.expr.clone();
                above.add_constant(-1)?;
                Ok(vec![Constraint::ge(above), Constraint::ge(below)])
            }
        }
    }

    pub fn substitute(&self, name: &str, replacement: &LinExpr) -> Result<Constraint, SetError> {
        Ok(Constraint {
            kind: self.kind,
            expr: self.expr.substitute(name, replacement)?,
        })
    }

    pub fn substitute_value(&self, name: &str, value: i64) -> Result<Constraint, SetError> {
        self.substitute(name, &LinExpr::from_constant(value))
    }

    /// Same kind and same variable coefficients; only the constant differs.
    pub(crate) fn parallel_to(&self, other: &Constraint) -> bool {
        self.kind == other.kind && self.expr.coeffs == other.expr.coeffs
    }

    /// `None` when some variable of the constraint is unbound.
    pub fn holds(&self, values: &BTreeMap<String, i64>) -> Result<Option<bool>, SetError> {
        Ok(self.expr.evaluate(values)?.map(|v| match self.kind {
            ConstraintKind::Eq => v == 0,
            ConstraintKind::Ge => v >= 0,
            ConstraintKind::Mod(m) => v.rem_euclid(m) == 0,
        }))
    }
}

/// Coefficients and constant reduced into `[0, m)`, then divided by their
/// common factor with `m`.
fn normalize_congruence(expr: &LinExpr, m: i64) -> Normalized {
    let mut reduced = LinExpr::from_constant(expr.constant.rem_euclid(m));
    for (name, c) in &expr.coeffs {
        let r = c.rem_euclid(m);
        if r != 0 {
            reduced.coeffs.insert(name.clone(), r);
        }
    }
    let h = gcd(reduced.content(), m);
    if reduced.constant % h != 0 {
        return Normalized::Infeasible;
    }
    if h == m {
        return Normalized::Trivial;
    }
    for c in reduced.coeffs.values_mut() {
        *c /= h;
    }
    reduced.constant /= h;
    Normalized::Constraint(Constraint {
        kind: ConstraintKind::Mod(m / h),
        expr: reduced,
    })
}

impl fmt::Display for Constraint {
    /// Prints `lhs >= rhs` / `lhs = rhs` with every coefficient positive,
    /// and congruences as `e mod m = r`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let ConstraintKind::Mod(m) = self.kind {
            let lhs = self.expr.linear_part();
            let r = self.expr.constant.checked_neg().unwrap_or(0).rem_euclid(m);
            let single = lhs.coeffs.len() == 1 && lhs.coeffs.values().all(|c| *c == 1);
            return if single {
                write!(f, "{lhs} mod {m} = {r}")
            } else {
                write!(f, "({lhs}) mod {m} = {r}")
            };
        }
        let mut lhs = LinExpr::zero();
        let mut rhs = LinExpr::zero();
        for (name, c) in self.expr.terms() {
            if c > 0 {
                lhs.coeffs.insert(name.to_string(), c);
            } else {
                rhs.coeffs.insert(name.to_string(), -c);
            }
        }
        let k = self.expr.constant;
        if k > 0 {
            lhs.constant = k;
        } else {
            rhs.constant = -k;
        }
        let op = if self.kind == ConstraintKind::Eq { "=" } else { ">=" };
        write!(f, "{lhs} {op} {rhs}")
    }
}
