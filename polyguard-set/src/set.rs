#![forbid(unsafe_code)]

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use crate::basic::BasicSet;
use crate::error::{ParseError, SetError};
use crate::linear::{Constraint, LinExpr};
use crate::point::Point;
use crate::space::Space;

/// A finite union of [`BasicSet`]s over one [`Space`].
///
/// Every operation aligns its operands first, so sets over different but
/// compatible spaces (for example a parameter-only assumption set and a
/// domain) combine directly.
#[derive(Clone, Debug)]
pub struct Set {
    space: Space,
    pieces: Vec<BasicSet>,
}

impl Set {
    pub fn universe(space: Space) -> Self {
        Self {
            pieces: vec![BasicSet::universe(space.clone())],
            space,
        }
    }

    pub fn empty(space: Space) -> Self {
        Self {
            space,
            pieces: Vec::new(),
        }
    }

    pub fn from_basic(piece: BasicSet) -> Self {
        let space = piece.space().clone();
        let pieces = if piece.is_obviously_empty() {
            Vec::new()
        } else {
            vec![piece]
        };
        Self { space, pieces }
    }

    pub fn from_pieces(space: Space, pieces: Vec<BasicSet>) -> Result<Self, SetError> {
        let mut out = Self::empty(space);
        for p in pieces {
            out.push_piece(p)?;
        }
        Ok(out)
    }

    /// `lo <= dim < hi`.
    pub fn slab(space: Space, dim: &str, lo: &LinExpr, hi: &LinExpr) -> Result<Self, SetError> {
        let v = LinExpr::var(dim);
        let piece = BasicSet::from_constraints(
            space,
            [Constraint::le_of(lo, &v)?, Constraint::lt_of(&v, hi)?],
        )?;
        Ok(Self::from_basic(piece))
    }

    pub fn space(&self) -> &Space {
        &self.space
    }

    pub fn params(&self) -> &[String] {
        self.space.params()
    }

    pub fn dims(&self) -> &[String] {
        self.space.dims()
    }

    pub fn pieces(&self) -> &[BasicSet] {
        &self.pieces
    }

    fn push_piece(&mut self, piece: BasicSet) -> Result<(), SetError> {
        if !piece.is_obviously_empty() {
            self.pieces.push(piece.rehome(&self.space)?);
        }
        Ok(())
    }

    fn rehome(&self, space: &Space) -> Result<Set, SetError> {
        let pieces = self
            .pieces
            .iter()
            .map(|p| p.rehome(space))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Set {
            space: space.clone(),
            pieces,
        })
    }

    pub fn add_constraint(&mut self, c: Constraint) -> Result<(), SetError> {
        for piece in &mut self.pieces {
            piece.add_constraint(c.clone())?;
        }
        self.pieces.retain(|p| !p.is_obviously_empty());
        Ok(())
    }

    /// A copy with one more (unconstrained) dimension.
    pub fn with_dim(&self, name: &str) -> Result<Set, SetError> {
        self.rehome(&self.space.with_dim(name)?)
    }

    pub fn union(&self, other: &Set) -> Result<Set, SetError> {
        let space = self.space.align(&other.space);
        let mut out = self.rehome(&space)?;
        for p in &other.pieces {
            out.push_piece(p.clone())?;
        }
        Ok(out)
    }

    pub fn intersect(&self, other: &Set) -> Result<Set, SetError> {
        let space = self.space.align(&other.space);
        let mut out = Set::empty(space);
        for a in &self.pieces {
            for b in &other.pieces {
                out.push_piece(a.intersect(b)?)?;
            }
        }
        Ok(out)
    }

    pub fn project_out(&self, names: &BTreeSet<String>) -> Result<Set, SetError> {
        let space = self.space.without(names);
        let mut out = Set::empty(space);
        for p in &self.pieces {
            for piece in p.project_out(names)? {
                out.push_piece(piece)?;
            }
        }
        Ok(out)
    }

    /// Eliminate every dimension not in `keep`. Parameters stay.
    pub fn project_onto_dims(&self, keep: &BTreeSet<String>) -> Result<Set, SetError> {
        let drop: BTreeSet<String> = self
            .space
            .dims()
            .iter()
            .filter(|d| !keep.contains(*d))
            .cloned()
            .collect();
        self.project_out(&drop)
    }

    pub fn subtract(&self, other: &Set) -> Result<Set, SetError> {
        let space = self.space.align(&other.space);
        let mut remaining: Vec<BasicSet> = self
            .pieces
            .iter()
            .map(|p| p.rehome(&space))
            .collect::<Result<_, _>>()?;
        for b in &other.pieces {
            let mut next = Vec::new();
            for a in &remaining {
                next.extend(a.subtract(b)?);
            }
            remaining = next;
        }
        Set::from_pieces(space, remaining)
    }

    pub fn is_empty(&self) -> Result<bool, SetError> {
        for p in &self.pieces {
            if !p.is_empty()? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    pub fn is_subset(&self, other: &Set) -> Result<bool, SetError> {
        self.subtract(other)?.is_empty()
    }

    pub fn is_equal(&self, other: &Set) -> Result<bool, SetError> {
        Ok(self.is_subset(other)? && other.is_subset(self)?)
    }

    pub fn sample_point(&self) -> Result<Option<Point>, SetError> {
        for p in &self.pieces {
            if let Some(pt) = p.sample()? {
                return Ok(Some(pt));
            }
        }
        Ok(None)
    }

    pub fn contains(&self, values: &BTreeMap<String, i64>) -> Result<bool, SetError> {
        for p in &self.pieces {
            if p.contains(values)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Simplified but equal set: empty pieces and redundant constraints go,
    /// and a piece contained in another piece is dropped.
    pub fn coalesce(&self) -> Result<Set, SetError> {
        let mut pieces: Vec<BasicSet> = Vec::new();
        for p in &self.pieces {
            let p = p.remove_redundancies()?;
            if !p.is_obviously_empty() {
                pieces.push(p);
            }
        }

        let mut kept: Vec<BasicSet> = Vec::new();
        for (idx, p) in pieces.iter().enumerate() {
            let mut covered = false;
            for (jdx, q) in pieces.iter().enumerate() {
                if idx == jdx {
                    continue;
                }
                // Of two equal pieces keep the first.
                let inside = p.subtract(q)?.is_empty();
                let mutual = inside && q.subtract(p)?.is_empty();
                if inside && (!mutual || jdx < idx) {
                    covered = true;
                    break;
                }
            }
            if !covered {
                kept.push(p.clone());
            }
        }
        Set::from_pieces(self.space.clone(), kept)
    }
}

impl fmt::Display for Set {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.space.params().is_empty() {
            write!(f, "[{}] -> ", self.space.params().join(", "))?;
        }
        f.write_str("{ ")?;
        if !self.space.dims().is_empty() {
            write!(f, "[{}] ", self.space.dims().join(", "))?;
        }
        let universe = self.pieces.len() == 1 && self.pieces[0].constraints().is_empty();
        if universe {
            return f.write_str("}");
        }
        f.write_str(": ")?;
        if self.pieces.is_empty() {
            return f.write_str("false }");
        }
        let pieces = self
            .pieces
            .iter()
            .map(|p| {
                if p.constraints().is_empty() {
                    "true".to_string()
                } else {
                    p.constraints()
                        .iter()
                        .map(|c| c.to_string())
                        .collect::<Vec<_>>()
                        .join(" and ")
                }
            })
            .collect::<Vec<_>>()
            .join(" or ");
        write!(f, "{pieces} }}")
    }
}

impl FromStr for Set {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        crate::syntax::parse_set(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(s: &str) -> Set {
        s.parse().expect("set syntax")
    }

    #[test]
    fn redundant_union_coalesces_to_one_piece() {
        let s = set("{ [i] : 0 <= i < 10 or i = 3 }").coalesce().unwrap();
        assert_eq!(s.pieces().len(), 1);
        assert!(s.is_equal(&set("{ [i] : 0 <= i < 10 }")).unwrap());
    }

    #[test]
    fn parameters_align_with_assumptions() {
        let dom = set("[n] -> { [i] : 0 <= i < n }");
        let assumptions = set("[n] -> { : n >= 1 }");
        let both = dom.intersect(&assumptions).unwrap();
        assert_eq!(both.params(), &["n".to_string()]);
        let pt = both.sample_point().unwrap().unwrap();
        assert_eq!(pt.get("n"), Some(1));
        assert_eq!(pt.get("i"), Some(0));
    }

    #[test]
    fn projection_keeps_parameters() {
        let dom = set("[n] -> { [i, j] : 0 <= i < n and 0 <= j < i }");
        let keep = BTreeSet::from(["j".to_string()]);
        let p = dom.project_onto_dims(&keep).unwrap();
        assert_eq!(p.dims(), &["j".to_string()]);
        assert!(p.is_equal(&set("[n] -> { [j] : 0 <= j and j + 2 <= n }")).unwrap());
    }

    #[test]
    fn difference_with_parameters_has_witness() {
        let a = set("[n] -> { [i] : 0 <= i < n }");
        let b = set("[n] -> { [i] : 0 <= i < n - 1 }");
        let d = a.subtract(&b).unwrap();
        let pt = d.sample_point().unwrap().unwrap();
        assert_eq!(pt.get("i"), pt.get("n").map(|n| n - 1));
        assert!(b.subtract(&a).unwrap().is_empty().unwrap());
    }

    #[test]
    fn empty_set_prints_false() {
        let e = set("{ [i] : i > 3 and i < 2 }");
        assert!(e.is_empty().unwrap());
        assert_eq!(Set::empty(e.space().clone()).to_string(), "{ [i] : false }");
    }

    #[test]
    fn display_reparses_to_an_equal_set() {
        let s = set("[n] -> { [i, j] : 0 <= i < n and j = 2i + 1 or i = n }");
        let again = set(&s.to_string());
        assert!(s.is_equal(&again).unwrap());
    }
}
