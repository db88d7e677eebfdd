//! Denylist of known-bad ("ghost") records.

use crate::record::Record;
use serde::{Deserialize, Serialize};

/// Case-insensitive name fragments identifying ghost records.
///
/// Ghost records are rows that were created during testing or by a broken
/// client and keep being resurrected by sync. They are removed by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GhostDenylist {
    fragments: Vec<String>,
}

impl GhostDenylist {
    /// Creates a denylist. Fragments are stored lowercased; empty fragments are dropped.
    pub fn new<S: AsRef<str>>(fragments: impl IntoIterator<Item = S>) -> Self {
        Self {
            fragments: fragments
                .into_iter()
                .map(|f| f.as_ref().trim().to_lowercase())
                .filter(|f| !f.is_empty())
                .collect(),
        }
    }

    /// Creates an empty denylist that matches nothing.
    pub fn empty() -> Self {
        Self {
            fragments: Vec::new(),
        }
    }

    /// Returns the fragments.
    pub fn fragments(&self) -> &[String] {
        &self.fragments
    }

    /// Returns true if nothing is denylisted.
    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    /// Returns true if `name` contains a denylisted fragment.
    pub fn matches_name(&self, name: &str) -> bool {
        if self.fragments.is_empty() || name.is_empty() {
            return false;
        }
        let lower = name.to_lowercase();
        self.fragments.iter().any(|f| lower.contains(f.as_str()))
    }

    /// Returns true if the record is a ghost.
    pub fn matches(&self, record: &Record) -> bool {
        record
            .name
            .as_deref()
            .is_some_and(|name| self.matches_name(name))
    }
}

impl Default for GhostDenylist {
    fn default() -> Self {
        Self::new(["previn", "unni", "unique"])
    }
}
