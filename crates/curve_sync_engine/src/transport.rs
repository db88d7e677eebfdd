//! Remote record store abstraction.

use crate::error::{SyncError, SyncResult};
use async_trait::async_trait;
use curve_sync_protocol::{
    AckResponse, BranchResetResponse, BranchTable, ConfigResponse, Record, RecordMap,
    SaveAllResponse,
};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

/// The shared server-side record store, as seen by a client.
///
/// This trait abstracts the network layer so the engine can run against
/// HTTP, an in-process server, or a mock in tests. Every method is one
/// round-trip and one suspension point.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Fetches the server's advertised address.
    async fn fetch_config(&self) -> SyncResult<ConfigResponse>;

    /// Fetches the full `bookingId -> Record` snapshot.
    async fn get_all(&self) -> SyncResult<RecordMap>;

    /// Fetches one record; `None` if it does not exist.
    async fn get(&self, booking_id: &str) -> SyncResult<Option<Record>>;

    /// Upserts one record by booking id.
    async fn put(&self, record: &Record) -> SyncResult<AckResponse>;

    /// Merges a batch of records into the store.
    async fn save_all(&self, records: &RecordMap) -> SyncResult<SaveAllResponse>;

    /// Deletes one record. Deleting a missing id succeeds.
    async fn delete(&self, booking_id: &str) -> SyncResult<AckResponse>;

    /// Deletes every record whose branch matches `branch`.
    async fn delete_by_branch(&self, branch: &str) -> SyncResult<BranchResetResponse>;
}

/// An in-memory remote store for testing.
#[derive(Debug)]
pub struct MockRemoteStore {
    records: RwLock<RecordMap>,
    branches: BranchTable,
    connected: AtomicBool,
    malformed: AtomicBool,
    latency: RwLock<Option<Duration>>,
    calls: AtomicUsize,
}

impl MockRemoteStore {
    /// Creates an empty, connected mock.
    pub fn new() -> Self {
        Self {
            records: RwLock::new(RecordMap::new()),
            branches: BranchTable::default(),
            connected: AtomicBool::new(true),
            malformed: AtomicBool::new(false),
            latency: RwLock::new(None),
            calls: AtomicUsize::new(0),
        }
    }

    /// Creates a mock holding the given records.
    pub fn with_records(records: impl IntoIterator<Item = Record>) -> Self {
        let mock = Self::new();
        {
            let mut map = mock.records.write();
            for record in records {
                map.insert(record.booking_id.clone(), record);
            }
        }
        mock
    }

    /// Sets the connected state; a disconnected mock fails every call.
    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    /// Makes `get_all` report a malformed snapshot.
    pub fn set_malformed(&self, malformed: bool) {
        self.malformed.store(malformed, Ordering::SeqCst);
    }

    /// Delays every call by `latency`.
    pub fn set_latency(&self, latency: Duration) {
        *self.latency.write() = Some(latency);
    }

    /// Returns a copy of the stored records.
    pub fn records(&self) -> RecordMap {
        self.records.read().clone()
    }

    /// Returns the number of calls made, successful or not.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    async fn enter(&self) -> SyncResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let latency = *self.latency.read();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        if !self.connected.load(Ordering::SeqCst) {
            return Err(SyncError::transport_retryable("mock store is offline"));
        }
        Ok(())
    }
}

impl Default for MockRemoteStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RemoteStore for MockRemoteStore {
    async fn fetch_config(&self) -> SyncResult<ConfigResponse> {
        self.enter().await?;
        Ok(ConfigResponse {
            ip: "127.0.0.1".into(),
            port: 3000,
            base_url: "http://mock.local".into(),
        })
    }

    async fn get_all(&self) -> SyncResult<RecordMap> {
        self.enter().await?;
        if self.malformed.load(Ordering::SeqCst) {
            return Err(SyncError::MalformedSnapshot("expected an object".into()));
        }
        Ok(self.records())
    }

    async fn get(&self, booking_id: &str) -> SyncResult<Option<Record>> {
        self.enter().await?;
        Ok(self.records.read().get(booking_id).cloned())
    }

    async fn put(&self, record: &Record) -> SyncResult<AckResponse> {
        self.enter().await?;
        if !record.has_booking_id() {
            return Err(SyncError::Validation(
                "Invalid patient data or missing bookingId".into(),
            ));
        }
        self.records
            .write()
            .insert(record.booking_id.clone(), record.clone());
        Ok(AckResponse::ok("Patient data shared successfully."))
    }

    async fn save_all(&self, records: &RecordMap) -> SyncResult<SaveAllResponse> {
        self.enter().await?;
        self.records
            .write()
            .extend(records.iter().map(|(k, v)| (k.clone(), v.clone())));
        Ok(SaveAllResponse {
            success: true,
            count: records.len(),
        })
    }

    async fn delete(&self, booking_id: &str) -> SyncResult<AckResponse> {
        self.enter().await?;
        let message = if self.records.write().remove(booking_id).is_some() {
            "Patient deleted successfully."
        } else {
            "Patient not found or already deleted."
        };
        Ok(AckResponse::ok(message))
    }

    async fn delete_by_branch(&self, branch: &str) -> SyncResult<BranchResetResponse> {
        self.enter().await?;
        let mut records = self.records.write();
        let before = records.len();
        records.retain(|_, r| !self.branches.matches_target(r.branch_str(), branch));
        Ok(BranchResetResponse {
            success: true,
            deleted: before - records.len(),
            remaining: records.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_offline_fails_every_call() {
        let mock = MockRemoteStore::new();
        mock.set_connected(false);

        let result = mock.get_all().await;
        assert!(matches!(result, Err(SyncError::Transport { .. })));
        assert_eq!(mock.call_count(), 1);
    }

    #[tokio::test]
    async fn mock_upsert_and_delete() {
        let mock = MockRemoteStore::new();
        mock.put(&Record::new("0001").with_name("A")).await.unwrap();
        mock.put(&Record::new("0001").with_name("B")).await.unwrap();
        assert_eq!(mock.records().len(), 1);
        assert_eq!(
            mock.get("0001").await.unwrap().unwrap().name.as_deref(),
            Some("B")
        );

        mock.delete("0001").await.unwrap();
        let ack = mock.delete("0001").await.unwrap();
        assert!(ack.success);
        assert!(mock.get("0001").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn mock_branch_reset_is_fuzzy() {
        let mock = MockRemoteStore::with_records([
            Record::new("1").with_branch("CHENNAI"),
            Record::new("2").with_branch("BANGALORE"),
        ]);
        let resp = mock.delete_by_branch("X3D").await.unwrap();
        assert_eq!((resp.deleted, resp.remaining), (1, 1));
    }
}
