//! Configuration for the sync engine.

use curve_sync_protocol::{BranchTable, ConfigResponse, GhostDenylist};
use serde::{Deserialize, Serialize};

/// What the version gate clears when the stored data version is stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WipePolicy {
    /// Clear every key, then restore the session keys.
    FullWipe,
    /// Clear only appointment partitions and the current-patient scratch key.
    SelectiveWipe,
    /// Clear nothing; only stamp the new version.
    NoOpMigrate,
}

/// How a pull treats an empty or malformed cloud snapshot.
///
/// Neither choice is safe in every situation: `Authoritative` loses local
/// data when the server briefly returns nothing, `Transient` keeps rows the
/// server really did delete. Operators pick per deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmptyCloudPolicy {
    /// An empty cloud is the truth: empty every configured partition.
    Authoritative,
    /// An empty cloud is a glitch: leave local partitions untouched.
    Transient,
}

/// Configuration for sync operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Branch normalizer.
    pub branches: BranchTable,
    /// Canonical branches mirrored on every pull, in write order.
    pub known_branches: Vec<String>,
    /// Branch used when the session has none.
    pub default_branch: String,
    /// Expected data version token.
    pub data_version: String,
    /// What to clear when the stored version is stale.
    pub wipe_policy: WipePolicy,
    /// How to treat an empty or malformed snapshot.
    pub empty_cloud_policy: EmptyCloudPolicy,
    /// Names of ghost records to scrub.
    pub ghosts: GhostDenylist,
    /// Keep legacy partitions after migrating their records.
    pub retain_legacy_partitions: bool,
    /// Remote config reported when the server cannot be reached.
    pub fallback_remote: ConfigResponse,
}

impl SyncConfig {
    /// Creates a configuration with the given expected data version.
    pub fn new(data_version: impl Into<String>) -> Self {
        Self {
            data_version: data_version.into(),
            ..Self::default()
        }
    }

    /// Sets the branch normalizer.
    pub fn with_branches(mut self, branches: BranchTable) -> Self {
        self.branches = branches;
        self
    }

    /// Sets the mirrored branches.
    pub fn with_known_branches<S: Into<String>>(
        mut self,
        branches: impl IntoIterator<Item = S>,
    ) -> Self {
        self.known_branches = branches.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the default branch.
    pub fn with_default_branch(mut self, branch: impl Into<String>) -> Self {
        self.default_branch = branch.into();
        self
    }

    /// Sets the wipe policy.
    pub fn with_wipe_policy(mut self, policy: WipePolicy) -> Self {
        self.wipe_policy = policy;
        self
    }

    /// Sets the empty-cloud policy.
    pub fn with_empty_cloud_policy(mut self, policy: EmptyCloudPolicy) -> Self {
        self.empty_cloud_policy = policy;
        self
    }

    /// Sets the ghost denylist.
    pub fn with_ghosts(mut self, ghosts: GhostDenylist) -> Self {
        self.ghosts = ghosts;
        self
    }

    /// Keeps legacy partitions after migration.
    pub fn with_retain_legacy_partitions(mut self, retain: bool) -> Self {
        self.retain_legacy_partitions = retain;
        self
    }

    /// Sets the fallback remote config.
    pub fn with_fallback_remote(mut self, remote: ConfigResponse) -> Self {
        self.fallback_remote = remote;
        self
    }

    /// Branches written by a pull: the known branches, plus the default
    /// branch if it is not among them.
    pub fn mirrored_branches(&self) -> Vec<String> {
        let mut branches = self.known_branches.clone();
        if !branches.iter().any(|b| b == &self.default_branch) {
            branches.push(self.default_branch.clone());
        }
        branches
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            branches: BranchTable::default(),
            known_branches: ["X3D DENTAL", "BANGALORE", "General", "BRANCH"]
                .into_iter()
                .map(String::from)
                .collect(),
            default_branch: "X3D DENTAL".into(),
            data_version: "RESET_2026_01_04_V2".into(),
            wipe_policy: WipePolicy::SelectiveWipe,
            empty_cloud_policy: EmptyCloudPolicy::Transient,
            ghosts: GhostDenylist::default(),
            retain_legacy_partitions: false,
            fallback_remote: ConfigResponse {
                ip: "localhost".into(),
                port: 3000,
                base_url: "http://localhost:3000".into(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sync_config_builder() {
        let config = SyncConfig::new("V3")
            .with_known_branches(["X3D DENTAL", "BANGALORE"])
            .with_default_branch("BANGALORE")
            .with_wipe_policy(WipePolicy::FullWipe)
            .with_empty_cloud_policy(EmptyCloudPolicy::Authoritative)
            .with_retain_legacy_partitions(true);

        assert_eq!(config.data_version, "V3");
        assert_eq!(config.default_branch, "BANGALORE");
        assert_eq!(config.wipe_policy, WipePolicy::FullWipe);
        assert_eq!(config.empty_cloud_policy, EmptyCloudPolicy::Authoritative);
        assert!(config.retain_legacy_partitions);
    }

    #[test]
    fn mirrored_branches_include_default() {
        let config = SyncConfig::default()
            .with_known_branches(["BANGALORE"])
            .with_default_branch("X3D DENTAL");
        assert_eq!(config.mirrored_branches(), vec!["BANGALORE", "X3D DENTAL"]);

        let config = SyncConfig::default();
        assert_eq!(config.mirrored_branches(), config.known_branches);
    }

    #[test]
    fn partial_json_uses_defaults() {
        let config: SyncConfig = serde_json::from_str(
            r#"{"data_version": "V9", "empty_cloud_policy": "authoritative"}"#,
        )
        .unwrap();
        assert_eq!(config.data_version, "V9");
        assert_eq!(config.empty_cloud_policy, EmptyCloudPolicy::Authoritative);
        assert_eq!(config.wipe_policy, WipePolicy::SelectiveWipe);
        assert_eq!(config.default_branch, "X3D DENTAL");
    }
}
