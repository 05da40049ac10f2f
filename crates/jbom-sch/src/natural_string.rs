use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Reference designator with natural ordering (C1 < C2 < C10).
///
/// Keeps designator sets in BTreeSet/BTreeMap in the order a human expects.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NaturalString(String);

impl NaturalString {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for NaturalString {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for NaturalString {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl AsRef<str> for NaturalString {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::borrow::Borrow<str> for NaturalString {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for NaturalString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl PartialOrd for NaturalString {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for NaturalString {
    fn cmp(&self, other: &Self) -> Ordering {
        // natord treats "R01" and "R1" as equal; fall back so Ord stays total
        natord::compare(&self.0, &other.0).then_with(|| self.0.cmp(&other.0))
    }
}
