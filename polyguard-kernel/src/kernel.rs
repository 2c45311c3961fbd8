#![forbid(unsafe_code)]

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use polyguard_set::{Set, SetError, Space};
use serde::{Deserialize, Deserializer, Serialize, Serializer, de};

use crate::error::KernelError;
use crate::expr::Expr;
use crate::tag::Tag;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DType {
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Float16,
    Float32,
    Float64,
    Complex64,
    Complex128,
}

impl DType {
    pub fn size_in_bytes(self) -> u64 {
        match self {
            DType::Int8 | DType::UInt8 => 1,
            DType::Int16 | DType::UInt16 | DType::Float16 => 2,
            DType::Int32 | DType::UInt32 | DType::Float32 => 4,
            DType::Int64 | DType::UInt64 | DType::Float64 | DType::Complex64 => 8,
            DType::Complex128 => 16,
        }
    }

    fn name(self) -> &'static str {
        match self {
            DType::Int8 => "int8",
            DType::Int16 => "int16",
            DType::Int32 => "int32",
            DType::Int64 => "int64",
            DType::UInt8 => "uint8",
            DType::UInt16 => "uint16",
            DType::UInt32 => "uint32",
            DType::UInt64 => "uint64",
            DType::Float16 => "float16",
            DType::Float32 => "float32",
            DType::Float64 => "float64",
            DType::Complex64 => "complex64",
            DType::Complex128 => "complex128",
        }
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DType {
    type Err = KernelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "int8" | "char" => DType::Int8,
            "int16" | "short" => DType::Int16,
            "int32" | "int" => DType::Int32,
            "int64" | "long" => DType::Int64,
            "uint8" => DType::UInt8,
            "uint16" => DType::UInt16,
            "uint32" => DType::UInt32,
            "uint64" => DType::UInt64,
            "float16" | "half" => DType::Float16,
            "float32" | "float" => DType::Float32,
            "float64" | "double" => DType::Float64,
            "complex64" => DType::Complex64,
            "complex128" => DType::Complex128,
            other => return Err(KernelError::InvalidDType(other.to_string())),
        })
    }
}

impl Serialize for DType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

impl<'de> Deserialize<'de> for DType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

/// Memory a temporary lives in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    /// Shared by the work-items of one work-group.
    Local,
    /// One copy per work-item.
    Private,
    /// Not decided yet; no check can reason about it.
    Undecided,
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Local => f.write_str("local"),
            Scope::Private => f.write_str("private"),
            Scope::Undecided => f.write_str("undecided"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArgKind {
    Global,
    Constant,
    Value,
}

impl fmt::Display for ArgKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgKind::Global => f.write_str("global"),
            ArgKind::Constant => f.write_str("constant"),
            ArgKind::Value => f.write_str("value"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemporaryVariable {
    pub name: String,
    #[serde(default)]
    pub shape: Vec<Expr>,
    pub dtype: DType,
    pub scope: Scope,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Argument {
    pub name: String,
    /// `None` for scalars.
    #[serde(default)]
    pub shape: Option<Vec<Expr>>,
    pub dtype: DType,
    pub kind: ArgKind,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instruction {
    pub id: String,
    pub assignee: Expr,
    pub expression: Expr,
    #[serde(default)]
    pub inames: BTreeSet<String>,
    /// Boostable instructions may run redundantly across hardware axes they
    /// do not use.
    #[serde(default)]
    pub boostable: bool,
}

/// Hardware grid extents, one expression per used axis.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridSizes {
    #[serde(default)]
    pub group: Vec<Expr>,
    #[serde(default)]
    pub local: Vec<Expr>,
}

/// Immutable snapshot of a kernel variant, as handed to the checks.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Kernel {
    pub name: String,
    /// Parameter-only set of facts the generator may rely on.
    #[serde(with = "set_text", default = "no_assumptions")]
    pub assumptions: Set,
    #[serde(with = "set_text_list", default)]
    pub domains: Vec<Set>,
    #[serde(default)]
    pub instructions: Vec<Instruction>,
    #[serde(default)]
    pub iname_to_tag: BTreeMap<String, Tag>,
    #[serde(with = "named_temporaries", default)]
    pub temporaries: BTreeMap<String, TemporaryVariable>,
    #[serde(default)]
    pub args: Vec<Argument>,
    #[serde(default)]
    pub grid: GridSizes,
    /// Local axes the user asked for explicitly, with their extents.
    #[serde(default)]
    pub local_sizes: BTreeMap<u32, Expr>,
}

fn no_assumptions() -> Set {
    Set::universe(Space::default())
}

impl Kernel {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            assumptions: no_assumptions(),
            domains: Vec::new(),
            instructions: Vec::new(),
            iname_to_tag: BTreeMap::new(),
            temporaries: BTreeMap::new(),
            args: Vec::new(),
            grid: GridSizes::default(),
            local_sizes: BTreeMap::new(),
        }
    }

    /// Deserialize and [`validate`](Self::validate) a JSON snapshot.
    pub fn from_json(src: &str) -> Result<Self, KernelError> {
        let kernel: Kernel = serde_json::from_str(src)?;
        kernel.validate()?;
        Ok(kernel)
    }

    pub fn to_json(&self) -> Result<String, KernelError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), KernelError> {
        let mut inames = BTreeSet::new();
        for dom in &self.domains {
            for d in dom.dims() {
                if !inames.insert(d.as_str()) {
                    return Err(KernelError::DuplicateIname { name: d.clone() });
                }
            }
        }

        let mut ids = BTreeSet::new();
        for insn in &self.instructions {
            if !ids.insert(insn.id.as_str()) {
                return Err(KernelError::DuplicateInstructionId(insn.id.clone()));
            }
            if let Some(missing) = insn.inames.iter().find(|i| !inames.contains(i.as_str())) {
                return Err(KernelError::UndeclaredIname {
                    insn_id: insn.id.clone(),
                    iname: missing.clone(),
                });
            }
        }

        for (iname, tag) in &self.iname_to_tag {
            if !inames.contains(iname.as_str()) {
                return Err(KernelError::TaggedUnknownIname {
                    iname: iname.clone(),
                    tag: tag.to_string(),
                });
            }
        }
        Ok(())
    }

    pub fn all_inames(&self) -> BTreeSet<String> {
        self.domains
            .iter()
            .flat_map(|d| d.dims().iter().cloned())
            .collect()
    }

    /// Domain parameters that are not iteration variables of another domain.
    pub fn all_params(&self) -> BTreeSet<String> {
        let inames = self.all_inames();
        self.domains
            .iter()
            .flat_map(|d| d.params().iter())
            .filter(|p| !inames.contains(*p))
            .cloned()
            .collect()
    }

    pub fn tag(&self, iname: &str) -> Option<&Tag> {
        self.iname_to_tag.get(iname)
    }

    pub fn instruction(&self, id: &str) -> Option<&Instruction> {
        self.instructions.iter().find(|i| i.id == id)
    }

    pub fn argument(&self, name: &str) -> Option<&Argument> {
        self.args.iter().find(|a| a.name == name)
    }

    pub fn is_temporary(&self, name: &str) -> bool {
        self.temporaries.contains_key(name)
    }

    pub fn home_domain_index(&self, iname: &str) -> Option<usize> {
        self.domains
            .iter()
            .position(|d| d.dims().iter().any(|x| x == iname))
    }

    /// Intersection of every domain declaring one of `inames`, closed over
    /// the domains those depend on (a domain depends on the domain declaring
    /// an iteration variable it uses as a parameter).
    pub fn domain_for_inames(&self, inames: &BTreeSet<String>) -> Result<Set, SetError> {
        let mut wanted: BTreeSet<usize> = inames
            .iter()
            .filter_map(|i| self.home_domain_index(i))
            .collect();
        let mut queue: Vec<usize> = wanted.iter().copied().collect();
        while let Some(idx) = queue.pop() {
            for p in self.domains[idx].params() {
                if let Some(parent) = self.home_domain_index(p) {
                    if wanted.insert(parent) {
                        queue.push(parent);
                    }
                }
            }
        }

        let mut out = Set::universe(Space::default());
        for idx in wanted {
            out = out.intersect(&self.domains[idx])?;
        }
        Ok(out)
    }
}

impl fmt::Display for Kernel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rule = "-".repeat(75);
        writeln!(f, "{rule}")?;
        writeln!(f, "KERNEL: {}", self.name)?;
        writeln!(f, "{rule}")?;
        writeln!(f, "ARGUMENTS:")?;
        for arg in &self.args {
            write!(f, "{}: type: {}, kind: {}", arg.name, arg.dtype, arg.kind)?;
            if let Some(shape) = &arg.shape {
                write!(f, ", shape: ({})", join(shape))?;
            }
            writeln!(f)?;
        }
        writeln!(f, "{rule}")?;
        writeln!(f, "DOMAINS:")?;
        for dom in &self.domains {
            writeln!(f, "{dom}")?;
        }
        writeln!(f, "ASSUMPTIONS: {}", self.assumptions)?;
        writeln!(f, "{rule}")?;
        writeln!(f, "INAME TAGS:")?;
        for iname in self.all_inames() {
            match self.tag(&iname) {
                Some(tag) => writeln!(f, "{iname}: {tag}")?,
                None => writeln!(f, "{iname}: (none)")?,
            }
        }
        if !self.temporaries.is_empty() {
            writeln!(f, "{rule}")?;
            writeln!(f, "TEMPORARIES:")?;
            for tv in self.temporaries.values() {
                writeln!(
                    f,
                    "{}: type: {}, shape: ({}), scope: {}",
                    tv.name,
                    tv.dtype,
                    join(&tv.shape),
                    tv.scope
                )?;
            }
        }
        writeln!(f, "{rule}")?;
        writeln!(f, "INSTRUCTIONS:")?;
        for insn in &self.instructions {
            let inames: Vec<&str> = insn.inames.iter().map(String::as_str).collect();
            write!(
                f,
                "{} <- {}  {{id={}, inames={}",
                insn.assignee,
                insn.expression,
                insn.id,
                inames.join(",")
            )?;
            if insn.boostable {
                f.write_str(", boostable")?;
            }
            writeln!(f, "}}")?;
        }
        if !self.grid.group.is_empty() || !self.grid.local.is_empty() {
            writeln!(f, "{rule}")?;
            writeln!(
                f,
                "GRID: group ({}), local ({})",
                join(&self.grid.group),
                join(&self.grid.local)
            )?;
        }
        write!(f, "{rule}")
    }
}

fn join(xs: &[Expr]) -> String {
    xs.iter()
        .map(|x| x.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

mod set_text {
    use polyguard_set::Set;
    use serde::{Deserialize, Deserializer, Serializer, de};

    pub fn serialize<S: Serializer>(set: &Set, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(set)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Set, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

mod set_text_list {
    use polyguard_set::Set;
    use serde::{Deserialize, Deserializer, Serializer, de, ser::SerializeSeq};

    pub fn serialize<S: Serializer>(sets: &[Set], serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(sets.len()))?;
        for set in sets {
            seq.serialize_element(&set.to_string())?;
        }
        seq.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Set>, D::Error> {
        Vec::<String>::deserialize(deserializer)?
            .iter()
            .map(|s| s.parse().map_err(de::Error::custom))
            .collect()
    }
}

/// Temporaries are stored as a JSON list; the map key is the name.
mod named_temporaries {
    use std::collections::BTreeMap;

    use serde::{Deserialize, Deserializer, Serialize, Serializer, de};

    use super::TemporaryVariable;

    pub fn serialize<S: Serializer>(
        temps: &BTreeMap<String, TemporaryVariable>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        let list: Vec<&TemporaryVariable> = temps.values().collect();
        list.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<BTreeMap<String, TemporaryVariable>, D::Error> {
        let mut out = BTreeMap::new();
        for tv in Vec::<TemporaryVariable>::deserialize(deserializer)? {
            let name = tv.name.clone();
            if out.insert(name.clone(), tv).is_some() {
                return Err(de::Error::custom(format!(
                    "temporary '{name}' is declared twice"
                )));
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NESTED: &str = r#"{
        "name": "tri",
        "domains": ["[n] -> { [i] : 0 <= i < n }", "[i] -> { [j] : 0 <= j <= i }", "[m] -> { [k] : 0 <= k < m }"],
        "instructions": [
            {"id": "w", "assignee": "out[i, j]", "expression": "a[i] * 2", "inames": ["i", "j"]}
        ],
        "iname_to_tag": {"i": "g.0"},
        "args": [
            {"name": "a", "shape": ["n"], "dtype": "float32", "kind": "global"},
            {"name": "out", "shape": ["n", "n"], "dtype": "float32", "kind": "global"}
        ]
    }"#;

    #[test]
    fn domain_for_inames_pulls_in_parent_domains() {
        let k = Kernel::from_json(NESTED).unwrap();
        let only_j = BTreeSet::from(["j".to_string()]);
        let dom = k.domain_for_inames(&only_j).unwrap();
        assert_eq!(dom.params(), &["n".to_string()]);
        assert_eq!(dom.dims(), &["i".to_string(), "j".to_string()]);
    }

    #[test]
    fn all_params_excludes_inames() {
        let k = Kernel::from_json(NESTED).unwrap();
        let params: Vec<String> = k.all_params().into_iter().collect();
        assert_eq!(params, vec!["m", "n"]);
    }

    #[test]
    fn duplicate_iname_is_rejected() {
        let mut k = Kernel::from_json(NESTED).unwrap();
        let again = k.domains[0].clone();
        k.domains.push(again);
        let err = k.validate().expect_err("expected duplicate iname");
        assert!(matches!(err, KernelError::DuplicateIname { name } if name == "i"));
    }

    #[test]
    fn tag_on_unknown_iname_is_rejected() {
        let src = NESTED.replace(r#""i": "g.0""#, r#""q": "g.0""#);
        let err = Kernel::from_json(&src).expect_err("expected validation error");
        assert!(err.to_string().contains("undeclared iteration variable 'q'"));
    }

    #[test]
    fn json_round_trip_keeps_the_dump() {
        let k = Kernel::from_json(NESTED).unwrap();
        let again = Kernel::from_json(&k.to_json().unwrap()).unwrap();
        assert_eq!(k.to_string(), again.to_string());
    }

    #[test]
    fn dump_lists_instructions() {
        let k = Kernel::from_json(NESTED).unwrap();
        let dump = k.to_string();
        assert!(dump.contains("KERNEL: tri"));
        assert!(dump.contains("out[i, j] <- a[i] * 2  {id=w, inames=i,j}"));
        assert!(dump.contains("i: g.0"));
    }
}
