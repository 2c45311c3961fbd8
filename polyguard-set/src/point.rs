#![forbid(unsafe_code)]

use std::collections::BTreeMap;
use std::fmt;

/// A concrete integer assignment over a space (parameters, then dimensions).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Point {
    coords: Vec<(String, i64)>,
}

impl Point {
    pub fn new(coords: Vec<(String, i64)>) -> Self {
        Self { coords }
    }

    pub fn get(&self, name: &str) -> Option<i64> {
        self.coords
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| *v)
    }

    pub fn coords(&self) -> &[(String, i64)] {
        &self.coords
    }

    pub fn to_map(&self) -> BTreeMap<String, i64> {
        self.coords.iter().cloned().collect()
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts = self
            .coords
            .iter()
            .map(|(n, v)| format!("{n}={v}"))
            .collect::<Vec<_>>()
            .join(", ");
        f.write_str(&parts)
    }
}
