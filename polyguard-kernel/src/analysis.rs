#![forbid(unsafe_code)]

use std::collections::{BTreeMap, BTreeSet};

use polyguard_set::{Constraint, ConstraintKind, LinExpr, Set, SetError, Space};

use crate::error::EvalError;
use crate::expr::Expr;

/// Symbolic questions the checks ask about expressions.
pub trait SymbolicAnalysis {
    /// Variables an expression reads.
    fn dependencies(&self, expr: &Expr) -> BTreeSet<String> {
        expr.dependencies()
    }

    /// Affine form of `expr`, or `None` when it is not affine.
    fn linearize(&self, expr: &Expr) -> Option<LinExpr> {
        linearize(expr)
    }

    /// Index tuples reached by `index` while iterating `domain`.
    ///
    /// The first `index.len()` dimensions of the result are the access axes,
    /// in order. Any further dimensions are existential helpers that could
    /// not be projected out exactly. `Ok(None)` means the subscript is not
    /// affine and no range can be given.
    fn access_range(&self, domain: &Set, index: &[Expr]) -> Result<Option<Set>, SetError>;

    fn evaluate(&self, expr: &Expr, values: &BTreeMap<String, i64>) -> Result<i64, EvalError>;
}

/// Plain affine analysis: sums, constant multiples, and floor division or
/// remainder by constants.
#[derive(Clone, Copy, Debug, Default)]
pub struct AffineAnalysis;

impl SymbolicAnalysis for AffineAnalysis {
    fn access_range(&self, domain: &Set, index: &[Expr]) -> Result<Option<Set>, SetError> {
        let mut lowering = Lowering::new(domain);
        let mut axes = Vec::new();
        let mut equalities = Vec::new();
        for (k, ix) in index.iter().enumerate() {
            let Some(lin) = lowering.lower(ix)? else {
                return Ok(None);
            };
            let axis = lowering.fresh(&format!("_acc{k}"));
            equalities.push(Constraint::eq_of(&LinExpr::var(axis.clone()), &lin)?);
            axes.push(axis);
        }

        // Access axes first, then helpers, then the domain's own dimensions.
        let lifted = Space::new(
            domain.params().to_vec(),
            axes.iter().chain(lowering.aux.iter()).cloned().collect(),
        )?;
        let mut set = Set::universe(lifted).intersect(domain)?;
        for c in equalities.into_iter().chain(lowering.constraints) {
            set.add_constraint(c)?;
        }

        let keep: BTreeSet<&str> = axes.iter().map(String::as_str).collect();
        let mut pending: Vec<String> = set
            .dims()
            .iter()
            .filter(|d| !keep.contains(d.as_str()))
            .cloned()
            .collect();
        // Eliminate one variable at a time, only where the projection stays
        // a single conjunction; the others remain existential dimensions.
        loop {
            let Some(pos) = pending.iter().position(|v| exact_to_eliminate(&set, v)) else {
                break;
            };
            let name = pending.remove(pos);
            set = set.project_out(&BTreeSet::from([name]))?;
        }
        Ok(Some(set))
    }

    fn evaluate(&self, expr: &Expr, values: &BTreeMap<String, i64>) -> Result<i64, EvalError> {
        evaluate(expr, values)
    }
}

/// An equality with a unit coefficient, or unit coefficients on every lower
/// bound or on every upper bound with no congruence involved.
fn exact_to_eliminate(set: &Set, name: &str) -> bool {
    set.pieces().iter().all(|piece| {
        let cs = piece.constraints();
        let unit_eq = cs
            .iter()
            .any(|c| c.kind() == ConstraintKind::Eq && c.expr().coeff(name).abs() == 1);
        if unit_eq {
            return true;
        }
        if cs
            .iter()
            .any(|c| c.kind() != ConstraintKind::Ge && c.expr().coeff(name) != 0)
        {
            return false;
        }
        let coeffs: Vec<i64> = cs
            .iter()
            .map(|c| c.expr().coeff(name))
            .filter(|a| *a != 0)
            .collect();
        coeffs.iter().filter(|a| **a > 0).all(|a| *a == 1)
            || coeffs.iter().filter(|a| **a < 0).all(|a| *a == -1)
    })
}

/// Affine form of an expression without division.
pub fn linearize(expr: &Expr) -> Option<LinExpr> {
    match expr {
        Expr::Int(n) => Some(LinExpr::from_constant(*n)),
        Expr::Var(name) => Some(LinExpr::var(name.clone())),
        Expr::Sum(xs) => xs.iter().try_fold(LinExpr::zero(), |acc, x| {
            acc.checked_add(&linearize(x)?).ok()
        }),
        Expr::Product(xs) => {
            let mut acc = LinExpr::from_constant(1);
            for x in xs {
                let f = linearize(x)?;
                acc = if acc.is_constant() {
                    f.checked_scale(acc.constant_term()).ok()?
                } else if f.is_constant() {
                    acc.checked_scale(f.constant_term()).ok()?
                } else {
                    return None;
                };
            }
            Some(acc)
        }
        Expr::Neg(x) => linearize(x)?.checked_neg().ok(),
        Expr::FloorDiv(..) | Expr::Remainder(..) | Expr::Subscript { .. } | Expr::Call { .. } => {
            None
        }
    }
}

/// Lowers expressions to affine forms over the domain, introducing one
/// helper variable per floor division or remainder.
struct Lowering<'a> {
    domain: &'a Set,
    taken: BTreeSet<String>,
    aux: Vec<String>,
    constraints: Vec<Constraint>,
}

impl<'a> Lowering<'a> {
    fn new(domain: &'a Set) -> Self {
        Self {
            domain,
            taken: domain.space().names().map(str::to_string).collect(),
            aux: Vec::new(),
            constraints: Vec::new(),
        }
    }

    fn fresh(&mut self, base: &str) -> String {
        let mut name = base.to_string();
        let mut n = 0;
        while self.taken.contains(&name) {
            n += 1;
            name = format!("{base}_{n}");
        }
        self.taken.insert(name.clone());
        name
    }

    fn lower(&mut self, expr: &Expr) -> Result<Option<LinExpr>, SetError> {
        Ok(match expr {
            Expr::Int(n) => Some(LinExpr::from_constant(*n)),
            Expr::Var(name) => {
                if !self.domain.space().contains(name) {
                    return Ok(None);
                }
                Some(LinExpr::var(name.clone()))
            }
            Expr::Sum(xs) => {
                let mut acc = LinExpr::zero();
                for x in xs {
                    let Some(t) = self.lower(x)? else {
                        return Ok(None);
                    };
                    acc = acc.checked_add(&t)?;
                }
                Some(acc)
            }
            Expr::Product(xs) => {
                let mut acc = LinExpr::from_constant(1);
                for x in xs {
                    let Some(f) = self.lower(x)? else {
                        return Ok(None);
                    };
                    acc = if acc.is_constant() {
                        f.checked_scale(acc.constant_term())?
                    } else if f.is_constant() {
                        acc.checked_scale(f.constant_term())?
                    } else {
                        return Ok(None);
                    };
                }
                Some(acc)
            }
            Expr::Neg(x) => match self.lower(x)? {
                Some(t) => Some(t.checked_neg()?),
                None => None,
            },
            Expr::FloorDiv(a, b) => self.floor_div(a, b)?.map(|(q, _, _)| q),
            Expr::Remainder(a, b) => match self.floor_div(a, b)? {
                // a % d = a - d * floor(a / d)
                Some((q, num, d)) => Some(num.checked_sub(&q.checked_scale(d)?)?),
                None => None,
            },
            Expr::Subscript { .. } | Expr::Call { .. } => None,
        })
    }

    /// `(q, a, d)` with `q = floor(a / d)` for a constant non-zero `d`.
    fn floor_div(
        &mut self,
        a: &Expr,
        b: &Expr,
    ) -> Result<Option<(LinExpr, LinExpr, i64)>, SetError> {
        let Some(num) = self.lower(a)? else {
            return Ok(None);
        };
        let Some(den) = self.lower(b)? else {
            return Ok(None);
        };
        if !den.is_constant() || den.constant_term() == 0 {
            return Ok(None);
        }
        let d = den.constant_term();
        let q = self.fresh("_q");
        self.aux.push(q.clone());
        // floor(a / d) = floor(-a / -d); bound with a positive divisor.
        let (n, m) = if d > 0 {
            (num.clone(), d)
        } else {
            (num.checked_neg()?, d.checked_neg().ok_or(SetError::Overflow)?)
        };
        let mq = LinExpr::term(q.clone(), m);
        // m*q <= n <= m*q + m - 1
        self.constraints.push(Constraint::le_of(&mq, &n)?);
        let mut top = mq.clone();
        top.add_constant(m - 1)?;
        self.constraints.push(Constraint::le_of(&n, &top)?);
        Ok(Some((LinExpr::var(q), num, d)))
    }
}

fn checked(v: Option<i64>) -> Result<i64, EvalError> {
    v.ok_or(EvalError::Overflow)
}

fn floor_div(a: i64, b: i64) -> Result<i64, EvalError> {
    if b == 0 {
        return Err(EvalError::DivisionByZero);
    }
    let q = checked(a.checked_div(b))?;
    if a % b != 0 && ((a < 0) != (b < 0)) {
        checked(q.checked_sub(1))
    } else {
        Ok(q)
    }
}

/// Concrete value of `expr` under `values`.
pub fn evaluate(expr: &Expr, values: &BTreeMap<String, i64>) -> Result<i64, EvalError> {
    match expr {
        Expr::Int(n) => Ok(*n),
        Expr::Var(name) => values
            .get(name)
            .copied()
            .ok_or_else(|| EvalError::UnknownVariable(name.clone())),
        Expr::Sum(xs) => xs.iter().try_fold(0i64, |acc, x| {
            checked(acc.checked_add(evaluate(x, values)?))
        }),
        Expr::Product(xs) => xs.iter().try_fold(1i64, |acc, x| {
            checked(acc.checked_mul(evaluate(x, values)?))
        }),
        Expr::Neg(x) => checked(evaluate(x, values)?.checked_neg()),
        Expr::FloorDiv(a, b) => floor_div(evaluate(a, values)?, evaluate(b, values)?),
        Expr::Remainder(a, b) => {
            let (a, b) = (evaluate(a, values)?, evaluate(b, values)?);
            let q = floor_div(a, b)?;
            checked(q.checked_mul(b).and_then(|qb| a.checked_sub(qb)))
        }
        Expr::Subscript { .. } | Expr::Call { .. } => Err(EvalError::NotEvaluable(expr.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn e(s: &str) -> Expr {
        s.parse().unwrap()
    }

    fn set(s: &str) -> Set {
        s.parse().unwrap()
    }

    #[test]
    fn shifted_access_range() {
        let dom = set("[n] -> { [i] : 0 <= i < n }");
        let range = AffineAnalysis
            .access_range(&dom, &[e("i + 1")])
            .unwrap()
            .unwrap();
        assert_eq!(range.dims().len(), 1);
        assert!(range.is_equal(&set("[n] -> { [_acc0] : 1 <= _acc0 <= n }")).unwrap());
    }

    #[test]
    fn floor_division_range_is_exact() {
        let dom = set("[n] -> { [i] : 0 <= i < 2n }");
        let range = AffineAnalysis
            .access_range(&dom, &[e("i // 2")])
            .unwrap()
            .unwrap();
        assert_eq!(range.dims(), &["_acc0".to_string()]);
        assert!(range.is_equal(&set("[n] -> { [_acc0] : 0 <= _acc0 < n }")).unwrap());
    }

    #[test]
    fn product_of_inames_is_not_affine() {
        let dom = set("[n] -> { [i, j] : 0 <= i < n and 0 <= j < n }");
        assert!(AffineAnalysis.access_range(&dom, &[e("i * j")]).unwrap().is_none());
    }

    #[test]
    fn evaluation_uses_floor_semantics() {
        let vals = BTreeMap::from([("n".to_string(), -7)]);
        assert_eq!(evaluate(&e("n // 2"), &vals), Ok(-4));
        assert_eq!(evaluate(&e("n % 3"), &vals), Ok(2));
        assert_eq!(
            evaluate(&e("m + 1"), &vals),
            Err(EvalError::UnknownVariable("m".into()))
        );
        assert_eq!(evaluate(&e("n // 0"), &vals), Err(EvalError::DivisionByZero));
    }

    #[test]
    fn linearize_folds_constant_factors() {
        let lin = linearize(&e("2 * (i + 3) - n")).unwrap();
        assert_eq!(lin.coeff("i"), 2);
        assert_eq!(lin.coeff("n"), -1);
        assert_eq!(lin.constant_term(), 6);
    }
}
