//! Outcomes of engine operations and their UI-facing shape.

use crate::config::EmptyCloudPolicy;
use crate::error::SyncResult;
use crate::ghost::ScrubReport;
use crate::migrate::MigrationReport;
use crate::version::GateOutcome;
use serde::Serialize;
use serde_json::{Map, Value};

/// A data-loss risk detected during a sync.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SyncWarning {
    /// The same booking id was found in more than one partition; the record
    /// from the last partition was pushed.
    BookingIdCollision {
        /// Colliding booking id.
        booking_id: String,
        /// Partitions holding it, in read order.
        partitions: Vec<String>,
    },
    /// The cloud snapshot was empty or malformed.
    EmptyCloud {
        /// Policy applied.
        policy: EmptyCloudPolicy,
        /// True if the snapshot could not be decoded.
        malformed: bool,
    },
    /// Local records absent from the cloud were dropped by the mirror.
    LocalRecordsDiscarded {
        /// Branch partition.
        branch: String,
        /// Records dropped.
        count: usize,
    },
    /// Stored entries of a local partition did not decode as records. They
    /// were not pushed, or were overwritten by a pull.
    UndecodableRecords {
        /// Partition key.
        partition: String,
        /// Entries affected; a partition that is not an array counts as one.
        count: usize,
    },
    /// Cloud records normalized to a branch that is not mirrored locally.
    UnmappedBranch {
        /// Canonical branch.
        branch: String,
        /// Records not written.
        count: usize,
    },
}

/// Summary of a push.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PushSummary {
    /// Records sent.
    pub sent: usize,
    /// Records the server acknowledged.
    pub acknowledged: usize,
    /// Local records without a booking id.
    pub skipped: usize,
    /// Collisions and undecodable entries found while collecting.
    pub warnings: Vec<SyncWarning>,
}

/// Result of [`SyncEngine::push_all`](crate::SyncEngine::push_all).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PushOutcome {
    /// Another sync was in flight.
    Skipped,
    /// No local record had a booking id; nothing was sent.
    NothingToSync {
        /// Undecodable entries found while collecting.
        warnings: Vec<SyncWarning>,
    },
    /// Records were sent.
    Pushed(PushSummary),
}

impl PushOutcome {
    /// Warnings raised by the push.
    pub fn warnings(&self) -> &[SyncWarning] {
        match self {
            PushOutcome::Skipped => &[],
            PushOutcome::NothingToSync { warnings } => warnings,
            PushOutcome::Pushed(summary) => &summary.warnings,
        }
    }
}

/// Summary of a mirrored pull.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PullSummary {
    /// Records in the cloud snapshot.
    pub total: usize,
    /// Records written per mirrored branch, in write order.
    pub written: Vec<(String, usize)>,
    /// Data-loss risks.
    pub warnings: Vec<SyncWarning>,
}

/// Result of [`SyncEngine::pull_all`](crate::SyncEngine::pull_all).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PullOutcome {
    /// Another sync was in flight.
    Skipped,
    /// The cloud was mirrored into the configured partitions.
    Mirrored(PullSummary),
    /// The cloud was empty or malformed; handled per policy.
    EmptyCloud {
        /// Policy applied.
        policy: EmptyCloudPolicy,
        /// True if the snapshot could not be decoded.
        malformed: bool,
        /// Partitions emptied (authoritative policy only).
        partitions_cleared: Vec<String>,
        /// Always carries one [`SyncWarning::EmptyCloud`].
        warnings: Vec<SyncWarning>,
    },
}

impl PullOutcome {
    /// Warnings raised by the pull.
    pub fn warnings(&self) -> &[SyncWarning] {
        match self {
            PullOutcome::Skipped => &[],
            PullOutcome::Mirrored(summary) => &summary.warnings,
            PullOutcome::EmptyCloud { warnings, .. } => warnings,
        }
    }
}

/// Result of [`SyncEngine::initialize`](crate::SyncEngine::initialize).
#[derive(Debug, Clone, Serialize)]
pub struct InitReport {
    /// Version gate run.
    pub gate: GateOutcome,
    /// Legacy partition migration.
    pub migration: MigrationReport,
    /// Ghost records removed.
    pub scrub: ScrubReport,
    /// Pull outcome; `None` if the pull failed.
    pub pull: Option<PullOutcome>,
    /// Why the pull failed. Local data is left as it was.
    pub pull_error: Option<String>,
}

/// UI-facing result: `{"success": true, ...}` or `{"error": "..."}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OperationResult {
    /// Set on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub success: Option<bool>,
    /// Set on failure. Transport failures read `Connection failed`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Fields of the successful value.
    #[serde(flatten)]
    pub data: Map<String, Value>,
}

impl OperationResult {
    /// Converts an engine result.
    pub fn from_result<T: Serialize>(result: SyncResult<T>) -> Self {
        match result {
            Ok(value) => Self::success(value),
            Err(e) => Self {
                success: None,
                error: Some(e.user_message()),
                data: Map::new(),
            },
        }
    }

    fn success<T: Serialize>(value: T) -> Self {
        let mut data = match serde_json::to_value(value) {
            Ok(Value::Object(map)) => map,
            Ok(Value::Null) => Map::new(),
            Ok(other) => Map::from_iter([("value".to_string(), other)]),
            Err(e) => {
                return Self {
                    success: None,
                    error: Some(format!("failed to encode result: {e}")),
                    data: Map::new(),
                }
            }
        };
        let success = data
            .remove("success")
            .and_then(|v| v.as_bool())
            .unwrap_or(true);
        Self {
            success: Some(success),
            error: None,
            data,
        }
    }

    /// Returns true for a successful result.
    pub fn is_success(&self) -> bool {
        self.success == Some(true)
    }
}

impl<T: Serialize> From<SyncResult<T>> for OperationResult {
    fn from(result: SyncResult<T>) -> Self {
        Self::from_result(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SyncError;
    use curve_sync_protocol::{AckResponse, BranchResetResponse};
    use serde_json::json;

    #[test]
    fn success_flattens_value() {
        let result: SyncResult<BranchResetResponse> = Ok(BranchResetResponse {
            success: true,
            deleted: 1,
            remaining: 0,
        });
        let value = serde_json::to_value(OperationResult::from(result)).unwrap();
        assert_eq!(value, json!({"success": true, "deleted": 1, "remaining": 0}));
    }

    #[test]
    fn transport_failure_reads_connection_failed() {
        let result: SyncResult<AckResponse> = Err(SyncError::transport_retryable("refused"));
        let value = serde_json::to_value(OperationResult::from(result)).unwrap();
        assert_eq!(value, json!({"error": "Connection failed"}));
    }

    #[test]
    fn unit_and_scalar_values() {
        let unit = OperationResult::from_result(Ok::<_, SyncError>(()));
        assert_eq!(serde_json::to_value(unit).unwrap(), json!({"success": true}));

        let count = OperationResult::from_result(Ok::<_, SyncError>(3usize));
        assert_eq!(
            serde_json::to_value(count).unwrap(),
            json!({"success": true, "value": 3})
        );
    }

    #[test]
    fn tagged_outcomes() {
        let value = serde_json::to_value(PushOutcome::NothingToSync { warnings: vec![] }).unwrap();
        assert_eq!(value, json!({"outcome": "nothing_to_sync", "warnings": []}));

        let value = serde_json::to_value(SyncWarning::UnmappedBranch {
            branch: "Mysore".into(),
            count: 2,
        })
        .unwrap();
        assert_eq!(value, json!({"kind": "unmapped_branch", "branch": "Mysore", "count": 2}));
    }
}
