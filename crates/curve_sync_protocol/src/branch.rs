//! Branch-name normalization.
//!
//! Clinics have been renamed and merged over time, so stored records carry
//! a mix of old location names, casing variants and typos. A [`BranchTable`]
//! maps every such raw name onto one canonical branch identifier.

use serde::{Deserialize, Serialize};

/// One canonical branch and the name fragments that map onto it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchRule {
    /// Canonical branch identifier.
    pub canonical: String,
    /// Case-insensitive fragments; a raw name containing any of them maps to `canonical`.
    pub fragments: Vec<String>,
}

impl BranchRule {
    /// Creates a rule.
    pub fn new<S: Into<String>>(
        canonical: impl Into<String>,
        fragments: impl IntoIterator<Item = S>,
    ) -> Self {
        Self {
            canonical: canonical.into(),
            fragments: fragments.into_iter().map(Into::into).collect(),
        }
    }

    fn matches(&self, upper: &str) -> bool {
        self.fragments
            .iter()
            .any(|f| !f.is_empty() && upper.contains(&f.to_uppercase()))
    }
}

/// What to do with a name no rule matches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnmatchedPolicy {
    /// Return the name unchanged.
    Passthrough,
    /// Map it to a fixed bucket.
    Fallback(String),
}

/// Declarative branch normalizer.
///
/// [`BranchTable::normalize`] is pure and idempotent: normalizing an
/// already-normalized name returns it unchanged.
///
/// # Example
///
/// ```
/// use curve_sync_protocol::BranchTable;
///
/// let table = BranchTable::default();
/// assert_eq!(table.normalize("chennai"), "X3D DENTAL");
/// assert_eq!(table.normalize("X3D DENTAL"), "X3D DENTAL");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchTable {
    /// Rules, evaluated in order.
    pub rules: Vec<BranchRule>,
    /// Policy for names matched by no rule.
    pub unmatched: UnmatchedPolicy,
    /// Bucket for records with no branch at all.
    pub empty_bucket: String,
}

impl BranchTable {
    /// Creates a table with passthrough for unmatched names.
    pub fn new(rules: Vec<BranchRule>) -> Self {
        Self {
            rules,
            unmatched: UnmatchedPolicy::Passthrough,
            empty_bucket: "General".into(),
        }
    }

    /// Sets the unmatched-name policy.
    pub fn with_unmatched(mut self, policy: UnmatchedPolicy) -> Self {
        self.unmatched = policy;
        self
    }

    /// Sets the bucket for empty branch names.
    pub fn with_empty_bucket(mut self, bucket: impl Into<String>) -> Self {
        self.empty_bucket = bucket.into();
        self
    }

    /// Returns the canonical identifier for a raw branch name.
    pub fn normalize(&self, raw: &str) -> String {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return self.empty_bucket.clone();
        }

        let upper = trimmed.to_uppercase();

        // Canonical ids and buckets win before fragment matching so that a
        // name containing another rule's fragment still maps to itself.
        if let Some(rule) = self
            .rules
            .iter()
            .find(|r| r.canonical.to_uppercase() == upper)
        {
            return rule.canonical.clone();
        }
        if self.empty_bucket.to_uppercase() == upper {
            return self.empty_bucket.clone();
        }
        if let UnmatchedPolicy::Fallback(bucket) = &self.unmatched {
            if bucket.trim().to_uppercase() == upper {
                return bucket.clone();
            }
        }

        if let Some(rule) = self.rules.iter().find(|r| r.matches(&upper)) {
            return rule.canonical.clone();
        }

        match &self.unmatched {
            UnmatchedPolicy::Passthrough => raw.to_string(),
            UnmatchedPolicy::Fallback(bucket) => bucket.clone(),
        }
    }

    /// Returns true if `name` is already in normal form.
    pub fn is_canonical(&self, name: &str) -> bool {
        self.normalize(name) == name
    }

    /// Returns true if a record stored under `record_branch` belongs to `target`.
    ///
    /// Matches on case-insensitive equality of the raw names, or on equal
    /// canonical identifiers.
    pub fn matches_target(&self, record_branch: &str, target: &str) -> bool {
        if record_branch.trim().eq_ignore_ascii_case(target.trim()) {
            return true;
        }
        self.normalize(record_branch) == self.normalize(target)
    }

    /// Returns every canonical id named by a rule, in rule order.
    pub fn canonical_ids(&self) -> impl Iterator<Item = &str> {
        self.rules.iter().map(|r| r.canonical.as_str())
    }
}

impl Default for BranchTable {
    fn default() -> Self {
        Self::new(vec![
            BranchRule::new("X3D DENTAL", ["X3D", "CHENNAI", "COIMBATORE"]),
            BranchRule::new("BANGALORE", ["BANGALORE", "BENGALURU"]),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn legacy_names_map_to_x3d() {
        let table = BranchTable::default();
        for raw in ["CHENNAI", "Coimbatore", "x3d", "X3DENTAL", "X3DENTALS", " x3d dental "] {
            assert_eq!(table.normalize(raw), "X3D DENTAL", "raw = {raw:?}");
        }
    }

    #[test]
    fn second_clinic_keyword() {
        let table = BranchTable::default();
        assert_eq!(table.normalize("bengaluru east"), "BANGALORE");
        assert_eq!(table.normalize("BANGALORE"), "BANGALORE");
    }

    #[test]
    fn empty_goes_to_bucket() {
        let table = BranchTable::default();
        assert_eq!(table.normalize(""), "General");
        assert_eq!(table.normalize("   "), "General");
        assert_eq!(table.normalize("general"), "General");
    }

    #[test]
    fn unmatched_passthrough_and_fallback() {
        let table = BranchTable::default();
        assert_eq!(table.normalize("BRANCH"), "BRANCH");
        assert_eq!(table.normalize("Mysore"), "Mysore");

        let table = table.with_unmatched(UnmatchedPolicy::Fallback("General".into()));
        assert_eq!(table.normalize("Mysore"), "General");
    }

    #[test]
    fn fallback_bucket_containing_a_fragment_is_stable() {
        let table = BranchTable::default()
            .with_unmatched(UnmatchedPolicy::Fallback("X3D ANNEX".into()));
        assert_eq!(table.normalize("Mysore"), "X3D ANNEX");
        assert_eq!(table.normalize("X3D ANNEX"), "X3D ANNEX");
        assert!(table.is_canonical("X3D ANNEX"));
        assert_eq!(table.normalize("x3d"), "X3D DENTAL");
    }

    #[test]
    fn canonical_beats_fragment() {
        // "X3D BANGALORE" is itself canonical even though it contains "X3D".
        let table = BranchTable::new(vec![
            BranchRule::new("X3D DENTAL", ["X3D"]),
            BranchRule::new("X3D BANGALORE", ["BANGALORE"]),
        ]);
        assert_eq!(table.normalize("X3D BANGALORE"), "X3D BANGALORE");
        assert!(table.is_canonical("X3D BANGALORE"));
    }

    #[test]
    fn target_matching() {
        let table = BranchTable::default();
        assert!(table.matches_target("CHENNAI", "X3D"));
        assert!(table.matches_target("x3d dental", "X3D DENTAL"));
        assert!(table.matches_target("Mysore", "MYSORE"));
        assert!(!table.matches_target("BANGALORE", "X3D"));
        assert!(!table.matches_target("COIMBATORE", "BANGALORE"));
    }

    #[test]
    fn serde_roundtrip_of_policy() {
        let table = BranchTable::default().with_unmatched(UnmatchedPolicy::Fallback("BRANCH".into()));
        let json = serde_json::to_string(&table).unwrap();
        let back: BranchTable = serde_json::from_str(&json).unwrap();
        assert_eq!(back, table);
    }

    proptest! {
        #[test]
        fn normalize_is_idempotent(raw in "[ a-zA-Z0-9]{0,16}") {
            let table = BranchTable::default();
            let once = table.normalize(&raw);
            prop_assert_eq!(table.normalize(&once), once.clone());

            for bucket in ["General", "X3D ANNEX", "BANGALORE NORTH"] {
                let fallback = table.clone().with_unmatched(UnmatchedPolicy::Fallback(bucket.into()));
                let once = fallback.normalize(&raw);
                prop_assert_eq!(fallback.normalize(&once), once);
            }
        }
    }
}
