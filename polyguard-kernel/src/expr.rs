#![forbid(unsafe_code)]

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use polyguard_set::ParseError;
use serde::{Deserialize, Deserializer, Serialize, Serializer, de};

/// Index/value expression of an instruction.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Expr {
    Int(i64),
    Var(String),
    Sum(Vec<Expr>),
    Product(Vec<Expr>),
    Neg(Box<Expr>),
    /// Floor division, `a // b`.
    FloorDiv(Box<Expr>, Box<Expr>),
    /// Remainder with the sign of the divisor, `a % b`.
    Remainder(Box<Expr>, Box<Expr>),
    Subscript { aggregate: String, index: Vec<Expr> },
    Call { function: String, args: Vec<Expr> },
}

impl Expr {
    pub fn var(name: impl Into<String>) -> Self {
        Expr::Var(name.into())
    }

    /// Name written by an assignee: the variable itself or the subscripted
    /// aggregate.
    pub fn assignee_name(&self) -> Option<&str> {
        match self {
            Expr::Var(name) => Some(name),
            Expr::Subscript { aggregate, .. } => Some(aggregate),
            _ => None,
        }
    }

    /// Index expressions of an assignee (empty for a plain variable).
    pub fn assignee_index(&self) -> &[Expr] {
        match self {
            Expr::Subscript { index, .. } => index,
            _ => &[],
        }
    }

    /// Every variable read, including subscripted aggregates. Function
    /// names are not variables.
    pub fn dependencies(&self) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        self.collect_dependencies(&mut out);
        out
    }

    fn collect_dependencies(&self, out: &mut BTreeSet<String>) {
        match self {
            Expr::Int(_) => {}
            Expr::Var(name) => {
                out.insert(name.clone());
            }
            Expr::Sum(xs) | Expr::Product(xs) | Expr::Call { args: xs, .. } => {
                for x in xs {
                    x.collect_dependencies(out);
                }
            }
            Expr::Neg(x) => x.collect_dependencies(out),
            Expr::FloorDiv(a, b) | Expr::Remainder(a, b) => {
                a.collect_dependencies(out);
                b.collect_dependencies(out);
            }
            Expr::Subscript { aggregate, index } => {
                out.insert(aggregate.clone());
                for x in index {
                    x.collect_dependencies(out);
                }
            }
        }
    }

    /// Every subscript in the tree, outermost first, nested ones included.
    pub fn subscripts(&self) -> Vec<(&str, &[Expr])> {
        let mut out = Vec::new();
        self.collect_subscripts(&mut out);
        out
    }

    fn collect_subscripts<'a>(&'a self, out: &mut Vec<(&'a str, &'a [Expr])>) {
        match self {
            Expr::Int(_) | Expr::Var(_) => {}
            Expr::Sum(xs) | Expr::Product(xs) | Expr::Call { args: xs, .. } => {
                for x in xs {
                    x.collect_subscripts(out);
                }
            }
            Expr::Neg(x) => x.collect_subscripts(out),
            Expr::FloorDiv(a, b) | Expr::Remainder(a, b) => {
                a.collect_subscripts(out);
                b.collect_subscripts(out);
            }
            Expr::Subscript { aggregate, index } => {
                out.push((aggregate.as_str(), index.as_slice()));
                for x in index {
                    x.collect_subscripts(out);
                }
            }
        }
    }

    fn precedence(&self) -> u8 {
        match self {
            Expr::Sum(_) => 1,
            Expr::Product(_) | Expr::FloorDiv(..) | Expr::Remainder(..) => 2,
            Expr::Neg(_) => 3,
            Expr::Int(n) if *n < 0 => 3,
            _ => 4,
        }
    }

    fn fmt_at(&self, f: &mut fmt::Formatter<'_>, min: u8) -> fmt::Result {
        if self.precedence() < min {
            f.write_str("(")?;
            self.fmt_bare(f)?;
            f.write_str(")")
        } else {
            self.fmt_bare(f)
        }
    }

    fn fmt_bare(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Int(n) => write!(f, "{n}"),
            Expr::Var(name) => f.write_str(name),
            Expr::Sum(xs) => {
                for (idx, x) in xs.iter().enumerate() {
                    match (idx, x) {
                        (0, x) => x.fmt_at(f, 1)?,
                        (_, Expr::Neg(inner)) => {
                            f.write_str(" - ")?;
                            inner.fmt_at(f, 2)?;
                        }
                        (_, x) => {
                            f.write_str(" + ")?;
                            x.fmt_at(f, 2)?;
                        }
                    }
                }
                Ok(())
            }
            Expr::Product(xs) => {
                for (idx, x) in xs.iter().enumerate() {
                    if idx > 0 {
                        f.write_str(" * ")?;
                    }
                    x.fmt_at(f, if idx == 0 { 2 } else { 3 })?;
                }
                Ok(())
            }
            Expr::Neg(x) => {
                f.write_str("-")?;
                x.fmt_at(f, 3)
            }
            Expr::FloorDiv(a, b) => {
                a.fmt_at(f, 2)?;
                f.write_str(" // ")?;
                b.fmt_at(f, 3)
            }
            Expr::Remainder(a, b) => {
                a.fmt_at(f, 2)?;
                f.write_str(" % ")?;
                b.fmt_at(f, 3)
            }
            Expr::Subscript { aggregate, index } => {
                write!(f, "{aggregate}[")?;
                write_list(f, index)?;
                f.write_str("]")
            }
            Expr::Call { function, args } => {
                write!(f, "{function}(")?;
                write_list(f, args)?;
                f.write_str(")")
            }
        }
    }
}

fn write_list(f: &mut fmt::Formatter<'_>, xs: &[Expr]) -> fmt::Result {
    for (idx, x) in xs.iter().enumerate() {
        if idx > 0 {
            f.write_str(", ")?;
        }
        x.fmt_at(f, 1)?;
    }
    Ok(())
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_at(f, 1)
    }
}

impl FromStr for Expr {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        crate::parse::parse_expr(s)
    }
}

impl Serialize for Expr {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Accepts the text form or a bare JSON integer.
impl<'de> Deserialize<'de> for Expr {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Int(i64),
            Text(String),
        }
        match Raw::deserialize(deserializer)? {
            Raw::Int(n) => Ok(Expr::Int(n)),
            Raw::Text(s) => s.parse().map_err(de::Error::custom),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn e(s: &str) -> Expr {
        s.parse().expect("expression syntax")
    }

    #[test]
    fn nested_subscripts_are_all_visited() {
        let x = e("a[b[i + 1], j] * 2");
        let names: Vec<&str> = x.subscripts().iter().map(|(n, _)| *n).collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn dependencies_skip_function_names() {
        let x = e("f(a[i], n)");
        let deps: Vec<String> = x.dependencies().into_iter().collect();
        assert_eq!(deps, vec!["a", "i", "n"]);
    }

    #[test]
    fn display_keeps_needed_parentheses() {
        assert_eq!(e("(i + 1) * 2").to_string(), "(i + 1) * 2");
        assert_eq!(e("i - (j - k)").to_string(), "i - (j - k)");
        assert_eq!(e("(i // 2) % 4").to_string(), "i // 2 % 4");
        assert_eq!(e("i // (2 * k)").to_string(), "i // (2 * k)");
    }

    #[test]
    fn assignee_name_of_subscript() {
        assert_eq!(e("out[i, j]").assignee_name(), Some("out"));
        assert_eq!(e("acc").assignee_name(), Some("acc"));
        assert_eq!(e("i + 1").assignee_name(), None);
    }
}
