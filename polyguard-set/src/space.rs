#![forbid(unsafe_code)]

use std::collections::BTreeSet;
use std::fmt;

use crate::error::SetError;

/// Named parameters and set dimensions of a set.
///
/// A name is either a parameter or a dimension. When two spaces are
/// aligned, a name that is a dimension on either side becomes a dimension
/// of the result; this is how a domain nested under a parent domain sees
/// the parent's iteration variables.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Space {
    params: Vec<String>,
    dims: Vec<String>,
}

impl Space {
    pub fn new(params: Vec<String>, dims: Vec<String>) -> Result<Self, SetError> {
        let mut seen = BTreeSet::new();
        for name in params.iter().chain(dims.iter()) {
            if !seen.insert(name.as_str()) {
                return Err(SetError::DuplicateName(name.clone()));
            }
        }
        Ok(Self { params, dims })
    }

    pub fn params_only(params: Vec<String>) -> Result<Self, SetError> {
        Self::new(params, Vec::new())
    }

    pub fn params(&self) -> &[String] {
        &self.params
    }

    pub fn dims(&self) -> &[String] {
        &self.dims
    }

    pub fn is_param(&self, name: &str) -> bool {
        self.params.iter().any(|p| p == name)
    }

    pub fn is_dim(&self, name: &str) -> bool {
        self.dims.iter().any(|d| d == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.is_param(name) || self.is_dim(name)
    }

    /// Parameters first, then dimensions.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.params
            .iter()
            .chain(self.dims.iter())
            .map(String::as_str)
    }

    pub fn align(&self, other: &Space) -> Space {
        let mut dims = self.dims.clone();
        for d in &other.dims {
            if !dims.contains(d) {
                dims.push(d.clone());
            }
        }
        let mut params: Vec<String> = Vec::new();
        for p in self.params.iter().chain(other.params.iter()) {
            if !dims.contains(p) && !params.contains(p) {
                params.push(p.clone());
            }
        }
        Space { params, dims }
    }

    pub fn without(&self, names: &BTreeSet<String>) -> Space {
        Space {
            params: self
                .params
                .iter()
                .filter(|p| !names.contains(*p))
                .cloned()
                .collect(),
            dims: self
                .dims
                .iter()
                .filter(|d| !names.contains(*d))
                .cloned()
                .collect(),
        }
    }

    pub fn with_dim(&self, name: &str) -> Result<Space, SetError> {
        if self.contains(name) {
            return Err(SetError::DuplicateName(name.to_string()));
        }
        let mut out = self.clone();
        out.dims.push(name.to_string());
        Ok(out)
    }
}

impl fmt::Display for Space {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.params.is_empty() {
            write!(f, "[{}] -> ", self.params.join(", "))?;
        }
        write!(f, "[{}]", self.dims.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(params: &[&str], dims: &[&str]) -> Space {
        Space::new(
            params.iter().map(|x| x.to_string()).collect(),
            dims.iter().map(|x| x.to_string()).collect(),
        )
        .unwrap()
    }

    #[test]
    fn alignment_promotes_parent_dims() {
        let parent = s(&["n"], &["i"]);
        let child = s(&["n", "i"], &["j"]);
        let aligned = parent.align(&child);
        assert_eq!(aligned.params(), &["n".to_string()]);
        assert_eq!(aligned.dims(), &["i".to_string(), "j".to_string()]);
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let err = Space::new(vec!["n".into()], vec!["n".into()]).unwrap_err();
        assert_eq!(err, SetError::DuplicateName("n".into()));
    }
}
