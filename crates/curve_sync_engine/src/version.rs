//! Data version gate.
//!
//! The cache carries a version marker. When the stored marker differs from
//! the expected token the cache is stale and the configured [`WipePolicy`]
//! decides what is cleared before the new marker is stamped.

use crate::cache::{partition_key, LocalCache, SessionKey, CURRENT_PATIENT_KEY};
use crate::config::{SyncConfig, WipePolicy};
use crate::error::SyncResult;
use curve_storage::StorageBackend;
use serde::Serialize;
use tracing::{debug, info};

/// Version state of the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VersionState {
    /// The stored marker equals the expected token.
    Current,
    /// The marker is missing or differs.
    Stale,
}

/// What a gate run did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GateOutcome {
    /// State found before the run.
    pub state: VersionState,
    /// Marker found before the run.
    pub previous: Option<String>,
    /// Policy applied; `None` when the cache was current.
    pub policy: Option<WipePolicy>,
    /// Keys removed by the wipe.
    pub keys_cleared: Vec<String>,
    /// Whether the `branch` session key was missing and set to the default.
    pub branch_defaulted: bool,
}

/// Checks and enforces the data version of a cache.
#[derive(Debug, Clone)]
pub struct VersionGate {
    expected: String,
    policy: WipePolicy,
    default_branch: String,
}

impl VersionGate {
    /// Creates a gate.
    pub fn new(
        expected: impl Into<String>,
        policy: WipePolicy,
        default_branch: impl Into<String>,
    ) -> Self {
        Self {
            expected: expected.into(),
            policy,
            default_branch: default_branch.into(),
        }
    }

    /// Creates a gate from an engine configuration.
    pub fn from_config(config: &SyncConfig) -> Self {
        Self::new(
            config.data_version.clone(),
            config.wipe_policy,
            config.default_branch.clone(),
        )
    }

    /// Returns the expected version token.
    pub fn expected(&self) -> &str {
        &self.expected
    }

    /// Returns the version state of `cache` without changing it.
    pub fn check<B: StorageBackend>(&self, cache: &LocalCache<B>) -> VersionState {
        match cache.read_marker() {
            Some(marker) if marker == self.expected => VersionState::Current,
            _ => VersionState::Stale,
        }
    }

    /// Runs the gate: wipes a stale cache per policy, stamps the marker and
    /// makes sure a branch is selected.
    pub fn run<B: StorageBackend>(&self, cache: &LocalCache<B>) -> SyncResult<GateOutcome> {
        let previous = cache.read_marker();
        let state = self.check(cache);

        let mut outcome = GateOutcome {
            state,
            previous,
            policy: None,
            keys_cleared: Vec::new(),
            branch_defaulted: false,
        };

        if state == VersionState::Stale {
            info!(
                previous = outcome.previous.as_deref().unwrap_or("<none>"),
                expected = %self.expected,
                policy = ?self.policy,
                "data version changed, wiping cache"
            );
            outcome.keys_cleared = self.wipe(cache)?;
            outcome.policy = Some(self.policy);
            cache.write_marker(&self.expected)?;
        } else {
            debug!(version = %self.expected, "data version is current");
        }

        if cache.read_session_key(SessionKey::Branch).is_none() {
            cache.write_session_key(SessionKey::Branch, &self.default_branch)?;
            outcome.branch_defaulted = true;
        }

        Ok(outcome)
    }

    fn wipe<B: StorageBackend>(&self, cache: &LocalCache<B>) -> SyncResult<Vec<String>> {
        match self.policy {
            WipePolicy::FullWipe => {
                let session: Vec<(SessionKey, String)> = SessionKey::ALL
                    .into_iter()
                    .filter_map(|key| cache.read_session_key(key).map(|v| (key, v)))
                    .collect();
                let cleared: Vec<String> = cache
                    .all_keys()
                    .into_iter()
                    .filter(|k| !SessionKey::ALL.iter().any(|s| s.as_str() == k.as_str()))
                    .collect();

                cache.clear_all()?;
                for (key, value) in &session {
                    cache.write_session_key(*key, value)?;
                }
                cache.write(&partition_key(&self.default_branch), &[])?;
                Ok(cleared)
            }
            WipePolicy::SelectiveWipe => {
                let mut cleared = Vec::new();
                for key in cache.enumerate_partition_keys() {
                    if cache.remove(&key)? {
                        cleared.push(key);
                    }
                }
                if cache.remove_scratch()? {
                    cleared.push(CURRENT_PATIENT_KEY.to_string());
                }
                Ok(cleared)
            }
            WipePolicy::NoOpMigrate => Ok(Vec::new()),
        }
    }
}
