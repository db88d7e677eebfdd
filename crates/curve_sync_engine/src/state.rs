//! Sync engine.

use crate::cache::{partition_key, LocalCache};
use crate::config::{EmptyCloudPolicy, SyncConfig};
use crate::error::{SyncError, SyncResult};
use crate::ghost::GhostScrubber;
use crate::migrate::BranchMigrator;
use crate::report::{InitReport, PullOutcome, PullSummary, PushOutcome, PushSummary, SyncWarning};
use crate::transport::RemoteStore;
use crate::version::VersionGate;
use curve_storage::StorageBackend;
use curve_sync_protocol::{
    AckResponse, BranchResetResponse, ConfigResponse, ProtocolError, Record, RecordMap,
};
use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// The current state of the sync engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    /// No push or pull in flight.
    Idle,
    /// Sending local records to the server.
    Pushing,
    /// Mirroring the server into local partitions.
    Pulling,
}

impl SyncState {
    /// Returns true if a push or pull is in flight.
    pub fn is_active(&self) -> bool {
        !matches!(self, SyncState::Idle)
    }
}

/// Statistics about sync operations.
#[derive(Debug, Clone, Default)]
pub struct SyncStats {
    /// Pushes that reached the server.
    pub pushes: u64,
    /// Pulls that completed, including empty-cloud pulls.
    pub pulls: u64,
    /// Total records sent.
    pub records_sent: u64,
    /// Total records written into partitions by pulls.
    pub records_mirrored: u64,
    /// Calls skipped because another sync was in flight.
    pub skipped: u64,
    /// Last error message.
    pub last_error: Option<String>,
}

/// Claims the in-flight flag; releases it on drop.
struct InFlight<'a> {
    flag: &'a AtomicBool,
    state: &'a RwLock<SyncState>,
}

impl<'a> InFlight<'a> {
    fn claim(flag: &'a AtomicBool, state: &'a RwLock<SyncState>, to: SyncState) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()?;
        *state.write() = to;
        Some(Self { flag, state })
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        *self.state.write() = SyncState::Idle;
        self.flag.store(false, Ordering::Release);
    }
}

/// The sync engine keeps a client cache consistent with the remote store.
///
/// Push and pull share one in-flight flag: while either runs, the other (and
/// a second call of the same kind) returns `Skipped` without touching
/// anything.
pub struct SyncEngine<R: RemoteStore, B: StorageBackend> {
    config: SyncConfig,
    remote: Arc<R>,
    cache: LocalCache<B>,
    state: RwLock<SyncState>,
    stats: RwLock<SyncStats>,
    syncing: AtomicBool,
}

impl<R: RemoteStore, B: StorageBackend> SyncEngine<R, B> {
    /// Creates a new sync engine.
    pub fn new(config: SyncConfig, remote: R, backend: B) -> Self {
        Self::with_shared_remote(config, Arc::new(remote), backend)
    }

    /// Creates a sync engine over a remote store shared with other owners.
    pub fn with_shared_remote(config: SyncConfig, remote: Arc<R>, backend: B) -> Self {
        Self {
            config,
            remote,
            cache: LocalCache::new(backend),
            state: RwLock::new(SyncState::Idle),
            stats: RwLock::new(SyncStats::default()),
            syncing: AtomicBool::new(false),
        }
    }

    /// Gets the configuration.
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Gets the remote store.
    pub fn remote(&self) -> &R {
        &self.remote
    }

    /// Gets the local cache.
    pub fn cache(&self) -> &LocalCache<B> {
        &self.cache
    }

    /// Gets the current state.
    pub fn state(&self) -> SyncState {
        *self.state.read()
    }

    /// Gets the current stats.
    pub fn stats(&self) -> SyncStats {
        self.stats.read().clone()
    }

    /// Returns true if a push or pull is in flight.
    pub fn is_syncing(&self) -> bool {
        self.syncing.load(Ordering::Acquire)
    }

    fn begin(&self, to: SyncState) -> Option<InFlight<'_>> {
        let guard = InFlight::claim(&self.syncing, &self.state, to);
        if guard.is_none() {
            debug!(attempted = ?to, "sync already in flight, skipping");
            self.stats.write().skipped += 1;
        }
        guard
    }

    fn record_error(&self, op: &str, err: &SyncError) {
        error!(op, error = %err, "sync operation failed");
        self.stats.write().last_error = Some(err.to_string());
    }

    /// Sends every locally cached record to the server in one batch.
    ///
    /// Partitions are read in key order and the last record seen for a
    /// booking id wins. Ids found in several partitions are reported as
    /// [`SyncWarning::BookingIdCollision`], stored entries that cannot be
    /// decoded as [`SyncWarning::UndecodableRecords`].
    pub async fn push_all(&self) -> SyncResult<PushOutcome> {
        let Some(_guard) = self.begin(SyncState::Pushing) else {
            return Ok(PushOutcome::Skipped);
        };

        let mut records = RecordMap::new();
        let mut origins: BTreeMap<String, Vec<String>> = BTreeMap::new();
        let mut skipped = 0;
        let mut warnings = Vec::new();

        for key in self.cache.enumerate_partition_keys() {
            let partition = self.cache.read_partition(&key);
            if !partition.is_clean() {
                warn!(partition = %key, count = partition.lost(), "undecodable entries not pushed");
                warnings.push(SyncWarning::UndecodableRecords {
                    partition: key.clone(),
                    count: partition.lost(),
                });
            }
            for record in partition.records {
                if !record.has_booking_id() {
                    skipped += 1;
                    continue;
                }
                let seen_in = origins.entry(record.booking_id.clone()).or_default();
                if seen_in.last() != Some(&key) {
                    seen_in.push(key.clone());
                }
                records.insert(record.booking_id.clone(), record);
            }
        }

        if records.is_empty() {
            debug!(skipped, "no local records to push");
            return Ok(PushOutcome::NothingToSync { warnings });
        }

        warnings.extend(
            origins
                .into_iter()
                .filter(|(_, partitions)| partitions.len() > 1)
                .map(|(booking_id, partitions)| {
                    warn!(%booking_id, ?partitions, "booking id found in several partitions");
                    SyncWarning::BookingIdCollision {
                        booking_id,
                        partitions,
                    }
                }),
        );

        let response = match self.remote.save_all(&records).await {
            Ok(response) => response,
            Err(e) => {
                self.record_error("push", &e);
                return Err(e);
            }
        };

        {
            let mut stats = self.stats.write();
            stats.pushes += 1;
            stats.records_sent += records.len() as u64;
        }
        info!(sent = records.len(), acknowledged = response.count, skipped, "push complete");

        Ok(PushOutcome::Pushed(PushSummary {
            sent: records.len(),
            acknowledged: response.count,
            skipped,
            warnings,
        }))
    }

    /// Mirrors the cloud snapshot into the configured branch partitions.
    ///
    /// Each mirrored partition is replaced by exactly the cloud records whose
    /// normalized branch equals it. On a transport error nothing local is
    /// changed.
    pub async fn pull_all(&self) -> SyncResult<PullOutcome> {
        let Some(_guard) = self.begin(SyncState::Pulling) else {
            return Ok(PullOutcome::Skipped);
        };

        let snapshot = match self.remote.get_all().await {
            Ok(snapshot) => Some(snapshot),
            Err(SyncError::MalformedSnapshot(reason)) => {
                warn!(%reason, "cloud snapshot is malformed");
                None
            }
            Err(e) => {
                self.record_error("pull", &e);
                return Err(e);
            }
        };

        let outcome = match snapshot {
            Some(snapshot) if !snapshot.is_empty() => self.mirror(snapshot)?,
            other => self.empty_cloud(other.is_none())?,
        };

        self.stats.write().pulls += 1;
        Ok(outcome)
    }

    fn mirror(&self, snapshot: RecordMap) -> SyncResult<PullOutcome> {
        let total = snapshot.len();
        let mut groups: BTreeMap<String, Vec<Record>> = BTreeMap::new();
        for (_, mut record) in snapshot {
            let branch = self.config.branches.normalize(record.branch_str());
            record.branch = Some(branch.clone());
            groups.entry(branch).or_default().push(record);
        }

        let mut warnings = Vec::new();
        let mut written = Vec::new();
        for branch in self.config.mirrored_branches() {
            let cloud = groups.remove(&branch).unwrap_or_default();
            let cloud_ids: HashSet<&str> = cloud.iter().map(|r| r.booking_id.as_str()).collect();

            let key = partition_key(&branch);
            let local = self.cache.read_partition(&key);
            if !local.is_clean() {
                warn!(partition = %key, count = local.lost(), "undecodable entries overwritten");
                warnings.push(SyncWarning::UndecodableRecords {
                    partition: key,
                    count: local.lost(),
                });
            }
            let discarded = local
                .records
                .iter()
                .filter(|r| !cloud_ids.contains(r.booking_id.as_str()))
                .count();
            if discarded > 0 {
                warn!(%branch, count = discarded, "local records not in cloud were discarded");
                warnings.push(SyncWarning::LocalRecordsDiscarded {
                    branch: branch.clone(),
                    count: discarded,
                });
            }

            self.cache.write_branch(&branch, &cloud)?;
            written.push((branch, cloud.len()));
        }

        for (branch, records) in groups {
            warn!(%branch, count = records.len(), "cloud records for an unmirrored branch");
            warnings.push(SyncWarning::UnmappedBranch {
                branch,
                count: records.len(),
            });
        }

        let mirrored: usize = written.iter().map(|(_, n)| n).sum();
        self.stats.write().records_mirrored += mirrored as u64;
        info!(total, mirrored, warnings = warnings.len(), "pull complete");

        Ok(PullOutcome::Mirrored(PullSummary {
            total,
            written,
            warnings,
        }))
    }

    fn empty_cloud(&self, malformed: bool) -> SyncResult<PullOutcome> {
        let policy = self.config.empty_cloud_policy;
        let mut partitions_cleared = Vec::new();

        match policy {
            EmptyCloudPolicy::Authoritative => {
                warn!(malformed, "cloud is empty, clearing local partitions");
                for branch in self.config.mirrored_branches() {
                    self.cache.write_branch(&branch, &[])?;
                    partitions_cleared.push(partition_key(&branch));
                }
            }
            EmptyCloudPolicy::Transient => {
                warn!(malformed, "cloud is empty, keeping local partitions");
            }
        }

        Ok(PullOutcome::EmptyCloud {
            policy,
            malformed,
            partitions_cleared,
            warnings: vec![SyncWarning::EmptyCloud { policy, malformed }],
        })
    }

    /// Upserts one record on the server. The local cache is not touched.
    pub async fn share_patient(&self, record: &Record) -> SyncResult<AckResponse> {
        if !record.has_booking_id() {
            return Err(ProtocolError::MissingBookingId.into());
        }
        self.remote.put(record).await.inspect_err(|e| {
            self.record_error("share", e);
        })
    }

    /// Deletes one record on the server. Deleting a missing id succeeds.
    pub async fn delete_patient(&self, booking_id: &str) -> SyncResult<AckResponse> {
        let booking_id = booking_id.trim();
        if booking_id.is_empty() {
            return Err(SyncError::Validation("bookingId is required".into()));
        }
        self.remote.delete(booking_id).await.inspect_err(|e| {
            self.record_error("delete", e);
        })
    }

    /// Deletes every server record whose branch matches `branch`.
    pub async fn reset_branch(&self, branch: &str) -> SyncResult<BranchResetResponse> {
        let branch = branch.trim();
        if branch.is_empty() {
            return Err(SyncError::Validation("branch name is required".into()));
        }

        let response = self.remote.delete_by_branch(branch).await.inspect_err(|e| {
            self.record_error("reset_branch", e);
        })?;
        warn!(
            %branch,
            deleted = response.deleted,
            remaining = response.remaining,
            "branch wiped on server"
        );
        Ok(response)
    }

    /// Removes every branch partition and the current-patient scratch key.
    ///
    /// Returns the number of partitions removed. No network.
    pub fn reset_local(&self) -> SyncResult<usize> {
        let keys: BTreeSet<String> = self
            .config
            .mirrored_branches()
            .iter()
            .map(|b| partition_key(b))
            .chain(self.cache.enumerate_partition_keys())
            .collect();

        let mut removed = 0;
        for key in &keys {
            if self.cache.remove(key)? {
                removed += 1;
            }
        }
        self.cache.remove_scratch()?;
        info!(removed, "local data reset");
        Ok(removed)
    }

    /// Fetches the server's advertised address, falling back to the
    /// configured one when the server is unreachable.
    pub async fn fetch_config(&self) -> ConfigResponse {
        match self.remote.fetch_config().await {
            Ok(config) => config,
            Err(e) => {
                warn!(error = %e, fallback = %self.config.fallback_remote.base_url, "failed to fetch config");
                self.config.fallback_remote.clone()
            }
        }
    }

    /// Startup sequence: version gate, branch migration, ghost scrub, pull.
    ///
    /// A failed pull is reported in the result; the local data stays as the
    /// earlier steps left it.
    pub async fn initialize(&self) -> SyncResult<InitReport> {
        let gate = VersionGate::from_config(&self.config).run(&self.cache)?;
        let migration = BranchMigrator::new(&self.config.branches)
            .retain_legacy(self.config.retain_legacy_partitions)
            .run(&self.cache)?;
        let scrub = GhostScrubber::new(&self.config.ghosts).run(&self.cache)?;

        let (pull, pull_error) = match self.pull_all().await {
            Ok(outcome) => (Some(outcome), None),
            Err(e) => {
                warn!(error = %e, "initial pull failed, using cached data");
                (None, Some(e.user_message()))
            }
        };

        Ok(InitReport {
            gate,
            migration,
            scrub,
            pull,
            pull_error,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MockRemoteStore;
    use curve_storage::InMemoryBackend;
    use std::time::Duration;

    fn engine(mock: MockRemoteStore) -> SyncEngine<MockRemoteStore, InMemoryBackend> {
        SyncEngine::new(SyncConfig::default(), mock, InMemoryBackend::new())
    }

    #[test]
    fn engine_creation() {
        let engine = engine(MockRemoteStore::new());
        assert_eq!(engine.state(), SyncState::Idle);
        assert!(!engine.is_syncing());
        assert_eq!(engine.stats().pushes, 0);
    }

    #[tokio::test]
    async fn push_with_nothing_makes_no_call() {
        let engine = engine(MockRemoteStore::new());
        engine
            .cache()
            .write_branch("X3D DENTAL", &[Record::default().with_name("no id")])
            .unwrap();

        let outcome = engine.push_all().await.unwrap();
        assert_eq!(outcome, PushOutcome::NothingToSync { warnings: vec![] });
        assert_eq!(engine.remote().call_count(), 0);
    }

    #[tokio::test]
    async fn push_collects_every_partition() {
        let engine = engine(MockRemoteStore::new());
        let cache = engine.cache();
        cache
            .write_branch(
                "BANGALORE",
                &[Record::new("1").with_name("old"), Record::default()],
            )
            .unwrap();
        cache
            .write_branch("X3D DENTAL", &[Record::new("1").with_name("new"), Record::new("2")])
            .unwrap();

        let PushOutcome::Pushed(summary) = engine.push_all().await.unwrap() else {
            panic!("expected a push");
        };
        assert_eq!(summary.sent, 2);
        assert_eq!(summary.acknowledged, 2);
        assert_eq!(summary.skipped, 1);
        assert_eq!(
            summary.warnings,
            vec![SyncWarning::BookingIdCollision {
                booking_id: "1".into(),
                partitions: vec!["appointments_BANGALORE".into(), "appointments_X3D DENTAL".into()],
            }]
        );

        let remote = engine.remote().records();
        assert_eq!(remote["1"].name.as_deref(), Some("new"));
        assert_eq!(engine.stats().records_sent, 2);
        assert_eq!(engine.state(), SyncState::Idle);
    }

    #[tokio::test]
    async fn push_reports_undecodable_entries() {
        let backend = InMemoryBackend::with_entries([
            (
                "appointments_BANGALORE",
                r#"[{"bookingId":"1"},{"bookingId":"2","age":{"years":30}}]"#,
            ),
            ("appointments_General", "{oops"),
        ]);
        let engine = SyncEngine::new(SyncConfig::default(), MockRemoteStore::new(), backend);

        let outcome = engine.push_all().await.unwrap();
        assert_eq!(
            outcome.warnings(),
            &[
                SyncWarning::UndecodableRecords {
                    partition: "appointments_BANGALORE".into(),
                    count: 1
                },
                SyncWarning::UndecodableRecords {
                    partition: "appointments_General".into(),
                    count: 1
                },
            ]
        );
        assert_eq!(engine.remote().records().len(), 1);
    }

    #[tokio::test]
    async fn pull_reports_overwritten_undecodable_entries() {
        let mock = MockRemoteStore::with_records([Record::new("5").with_branch("BANGALORE")]);
        let backend = InMemoryBackend::with_entries([(
            "appointments_BANGALORE",
            r#"[{"bookingId":"5"},{"bookingId":"6","age":{"years":30}}]"#,
        )]);
        let engine = SyncEngine::new(SyncConfig::default(), mock, backend);

        let outcome = engine.pull_all().await.unwrap();
        assert!(outcome.warnings().contains(&SyncWarning::UndecodableRecords {
            partition: "appointments_BANGALORE".into(),
            count: 1
        }));
        assert!(engine.cache().read_partition("appointments_BANGALORE").is_clean());
    }

    #[tokio::test]
    async fn pull_mirrors_strictly() {
        let mock = MockRemoteStore::with_records([
            Record::new("0005").with_branch("x3d"),
            Record::new("0006").with_branch("Bengaluru"),
            Record::new("0007").with_branch("Mysore"),
        ]);
        let engine = engine(mock);
        engine
            .cache()
            .write_branch("X3D DENTAL", &[Record::new("0001")])
            .unwrap();

        let outcome = engine.pull_all().await.unwrap();

        let x3d = engine.cache().read_branch("X3D DENTAL");
        assert_eq!(x3d.len(), 1);
        assert_eq!(x3d[0].booking_id, "0005");
        assert_eq!(x3d[0].branch.as_deref(), Some("X3D DENTAL"));
        assert_eq!(engine.cache().read_branch("BANGALORE").len(), 1);
        assert!(engine.cache().read_branch("General").is_empty());
        assert!(engine.cache().read_branch("BRANCH").is_empty());
        assert!(engine.cache().read_branch("Mysore").is_empty());

        let warnings = outcome.warnings();
        assert!(warnings.contains(&SyncWarning::LocalRecordsDiscarded {
            branch: "X3D DENTAL".into(),
            count: 1
        }));
        assert!(warnings.contains(&SyncWarning::UnmappedBranch {
            branch: "Mysore".into(),
            count: 1
        }));
    }

    #[tokio::test]
    async fn transient_empty_cloud_keeps_local() {
        let engine = engine(MockRemoteStore::new());
        engine
            .cache()
            .write_branch("BANGALORE", &[Record::new("1")])
            .unwrap();

        let outcome = engine.pull_all().await.unwrap();
        assert!(matches!(
            outcome,
            PullOutcome::EmptyCloud {
                policy: EmptyCloudPolicy::Transient,
                malformed: false,
                ..
            }
        ));
        assert_eq!(engine.cache().read_branch("BANGALORE").len(), 1);
    }

    #[tokio::test]
    async fn authoritative_empty_cloud_clears_local() {
        let mock = MockRemoteStore::new();
        mock.set_malformed(true);
        let engine = SyncEngine::new(
            SyncConfig::default().with_empty_cloud_policy(EmptyCloudPolicy::Authoritative),
            mock,
            InMemoryBackend::new(),
        );
        engine
            .cache()
            .write_branch("BANGALORE", &[Record::new("1")])
            .unwrap();

        let PullOutcome::EmptyCloud {
            malformed,
            partitions_cleared,
            ..
        } = engine.pull_all().await.unwrap()
        else {
            panic!("expected empty cloud");
        };
        assert!(malformed);
        assert_eq!(partitions_cleared.len(), 4);
        assert!(engine.cache().read_branch("BANGALORE").is_empty());
    }

    #[tokio::test]
    async fn offline_pull_leaves_local_untouched() {
        let mock = MockRemoteStore::new();
        mock.set_connected(false);
        let engine = engine(mock);
        engine
            .cache()
            .write_branch("BANGALORE", &[Record::new("1")])
            .unwrap();

        let err = engine.pull_all().await.unwrap_err();
        assert_eq!(err.user_message(), "Connection failed");
        assert_eq!(engine.cache().read_branch("BANGALORE").len(), 1);
        assert!(engine.stats().last_error.is_some());
        assert!(!engine.is_syncing());
    }

    #[tokio::test]
    async fn share_without_id_makes_no_call() {
        let engine = engine(MockRemoteStore::new());
        let err = engine.share_patient(&Record::default()).await.unwrap_err();
        assert!(err.is_validation());
        assert_eq!(engine.remote().call_count(), 0);

        let err = engine.delete_patient("  ").await.unwrap_err();
        assert!(err.is_validation());
        let err = engine.reset_branch("").await.unwrap_err();
        assert!(err.is_validation());
        assert_eq!(engine.remote().call_count(), 0);
    }

    #[tokio::test]
    async fn share_does_not_touch_cache() {
        let engine = engine(MockRemoteStore::new());
        engine
            .share_patient(&Record::new("0009").with_branch("BANGALORE"))
            .await
            .unwrap();
        assert!(engine.cache().enumerate_partition_keys().is_empty());
        assert_eq!(engine.remote().records().len(), 1);
    }

    #[tokio::test]
    async fn concurrent_calls_are_skipped() {
        let mock = MockRemoteStore::with_records([Record::new("1").with_branch("BANGALORE")]);
        mock.set_latency(Duration::from_millis(50));
        let engine = engine(mock);
        engine
            .cache()
            .write_branch("BANGALORE", &[Record::new("1")])
            .unwrap();

        let (pull, push) = tokio::join!(engine.pull_all(), engine.push_all());
        assert!(matches!(pull.unwrap(), PullOutcome::Mirrored(_)));
        assert_eq!(push.unwrap(), PushOutcome::Skipped);
        assert_eq!(engine.stats().skipped, 1);
        assert_eq!(engine.remote().call_count(), 1);
        assert_eq!(engine.state(), SyncState::Idle);
    }

    #[test]
    fn reset_local_removes_partitions_and_scratch() {
        let engine = engine(MockRemoteStore::new());
        let cache = engine.cache();
        cache.write_branch("X3D DENTAL", &[Record::new("1")]).unwrap();
        cache.write_branch("CHENNAI", &[]).unwrap();
        cache.backend().set("currentPatient", "{}").unwrap();
        cache.backend().set("role", "USER").unwrap();

        assert_eq!(engine.reset_local().unwrap(), 2);
        assert_eq!(cache.all_keys(), vec!["role"]);
    }

    #[tokio::test]
    async fn config_falls_back_when_offline() {
        let mock = MockRemoteStore::new();
        mock.set_connected(false);
        let engine = engine(mock);
        let config = engine.fetch_config().await;
        assert_eq!(config.base_url, "http://localhost:3000");
    }
}
