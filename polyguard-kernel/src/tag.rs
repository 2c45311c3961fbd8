#![forbid(unsafe_code)]

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer, de};

use crate::error::KernelError;

/// Which hardware grid an axis tag maps onto.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AxisKind {
    Group,
    Local,
}

impl fmt::Display for AxisKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AxisKind::Group => f.write_str("group"),
            AxisKind::Local => f.write_str("local"),
        }
    }
}

/// Execution tag attached to an iteration variable.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Tag {
    /// `g.N`: hardware work-group axis N.
    GroupAxis(u32),
    /// `l.N`: hardware local (work-item) axis N.
    LocalAxis(u32),
    /// `vec`
    Vector,
    /// `unr`
    Unroll,
    /// `l.auto`: a local axis whose index is still to be assigned.
    AutoLocal,
    /// `unique.<key>`: at most one iname per instruction may carry the key.
    Unique(String),
}

impl Tag {
    /// Instances of a parallel iname run concurrently.
    pub fn is_parallel(&self) -> bool {
        matches!(
            self,
            Tag::GroupAxis(_) | Tag::LocalAxis(_) | Tag::AutoLocal | Tag::Vector
        )
    }

    pub fn hardware_axis_kind(&self) -> Option<AxisKind> {
        match self {
            Tag::GroupAxis(_) => Some(AxisKind::Group),
            Tag::LocalAxis(_) | Tag::AutoLocal => Some(AxisKind::Local),
            _ => None,
        }
    }

    pub fn axis_index(&self) -> Option<u32> {
        match self {
            Tag::GroupAxis(n) | Tag::LocalAxis(n) => Some(*n),
            _ => None,
        }
    }

    /// Key that two inames of one instruction must not share. User keys
    /// live in their own namespace, apart from the hardware axes.
    pub fn unique_key(&self) -> Option<String> {
        match self {
            Tag::GroupAxis(n) => Some(format!("hw:g.{n}")),
            Tag::LocalAxis(n) => Some(format!("hw:l.{n}")),
            Tag::Vector => Some("hw:vec".to_string()),
            Tag::Unique(key) => Some(format!("unique:{key}")),
            Tag::Unroll | Tag::AutoLocal => None,
        }
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tag::GroupAxis(n) => write!(f, "g.{n}"),
            Tag::LocalAxis(n) => write!(f, "l.{n}"),
            Tag::Vector => f.write_str("vec"),
            Tag::Unroll => f.write_str("unr"),
            Tag::AutoLocal => f.write_str("l.auto"),
            Tag::Unique(key) => write!(f, "unique.{key}"),
        }
    }
}

impl FromStr for Tag {
    type Err = KernelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || KernelError::InvalidTag(s.to_string());
        match s.trim() {
            "vec" => return Ok(Tag::Vector),
            "unr" => return Ok(Tag::Unroll),
            "l.auto" => return Ok(Tag::AutoLocal),
            _ => {}
        }
        let (head, rest) = s.trim().split_once('.').ok_or_else(invalid)?;
        match head {
            "g" => rest.parse().map(Tag::GroupAxis).map_err(|_| invalid()),
            "l" => rest.parse().map(Tag::LocalAxis).map_err(|_| invalid()),
            "unique" if !rest.is_empty() => Ok(Tag::Unique(rest.to_string())),
            _ => Err(invalid()),
        }
    }
}

impl Serialize for Tag {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Tag {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_forms_round_trip() {
        for text in ["g.0", "l.2", "l.auto", "vec", "unr", "unique.red"] {
            let tag: Tag = text.parse().unwrap();
            assert_eq!(tag.to_string(), text);
        }
    }

    #[test]
    fn auto_local_is_local_without_index() {
        assert_eq!(Tag::AutoLocal.hardware_axis_kind(), Some(AxisKind::Local));
        assert_eq!(Tag::AutoLocal.axis_index(), None);
        assert_eq!(Tag::AutoLocal.unique_key(), None);
        assert!(Tag::AutoLocal.is_parallel());
    }

    #[test]
    fn user_keys_do_not_collide_with_hardware_axes() {
        let user: Tag = "unique.g.0".parse().unwrap();
        assert_eq!(user, Tag::Unique("g.0".into()));
        assert_ne!(user.unique_key(), Tag::GroupAxis(0).unique_key());
        assert_ne!(
            Tag::Unique("vec".into()).unique_key(),
            Tag::Vector.unique_key()
        );
        assert_eq!(
            Tag::Unique("red".into()).unique_key(),
            Tag::Unique("red".into()).unique_key()
        );
    }

    #[test]
    fn unroll_is_sequential() {
        assert!(!Tag::Unroll.is_parallel());
        assert_eq!(Tag::Unroll.hardware_axis_kind(), None);
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(matches!("l.x".parse::<Tag>(), Err(KernelError::InvalidTag(_))));
        assert!("unique.".parse::<Tag>().is_err());
        assert!("gpu".parse::<Tag>().is_err());
    }
}
