//! Hierarchical column labels.
//!
//! A label is a non-empty sequence of string segments. Flat tables use
//! depth-1 labels; multi-level tables use deeper ones, where the leading
//! segments form a group prefix and the last segment names the leaf column.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::fmt;

/// A column label of depth >= 1.
///
/// Stored inline for the common case of one or two segments.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ColLabel(SmallVec<[String; 2]>);

impl ColLabel {
    /// Builds a depth-1 label.
    pub fn flat(name: impl Into<String>) -> Self {
        Self(SmallVec::from_iter([name.into()]))
    }

    /// Builds a label from its segments. Panics on an empty sequence, which
    /// is unrepresentable by contract.
    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let segs: SmallVec<[String; 2]> = segments.into_iter().map(Into::into).collect();
        assert!(!segs.is_empty(), "column label must have at least one segment");
        Self(segs)
    }

    /// A depth-1 label for the positional naming scheme (`0..n`).
    pub fn from_position(pos: usize) -> Self {
        Self::flat(pos.to_string())
    }

    pub fn depth(&self) -> usize {
        self.0.len()
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// Whether `prefix` matches the leading segments of this label.
    pub fn starts_with(&self, prefix: &ColLabel) -> bool {
        self.0.len() > prefix.0.len() && self.0[..prefix.0.len()] == prefix.0[..]
    }

    /// Drops the leading `prefix` segments. Returns `None` if the prefix
    /// does not match or would consume the whole label.
    pub fn strip_prefix(&self, prefix: &ColLabel) -> Option<ColLabel> {
        if self.starts_with(prefix) {
            Some(Self(SmallVec::from_iter(
                self.0[prefix.0.len()..].iter().cloned(),
            )))
        } else {
            None
        }
    }

    /// Prepends `prefix`, deepening the label.
    pub fn with_prefix(&self, prefix: &ColLabel) -> ColLabel {
        let mut segs = prefix.0.clone();
        segs.extend(self.0.iter().cloned());
        Self(segs)
    }
}

impl fmt::Display for ColLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join("/"))
    }
}

impl From<&str> for ColLabel {
    fn from(name: &str) -> Self {
        Self::flat(name)
    }
}

impl From<String> for ColLabel {
    fn from(name: String) -> Self {
        Self::flat(name)
    }
}

impl From<(&str, &str)> for ColLabel {
    fn from((a, b): (&str, &str)) -> Self {
        Self::new([a, b])
    }
}
