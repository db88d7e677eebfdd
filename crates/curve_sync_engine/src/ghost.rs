//! Removal of ghost records from local partitions.

use crate::cache::LocalCache;
use crate::error::SyncResult;
use curve_storage::StorageBackend;
use curve_sync_protocol::GhostDenylist;
use serde_json::Value;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::warn;

/// Ghost records removed, per partition key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScrubReport {
    /// Partition key to number of records removed. Only changed partitions appear.
    pub removed: BTreeMap<String, usize>,
}

impl ScrubReport {
    /// Total records removed.
    pub fn total(&self) -> usize {
        self.removed.values().sum()
    }
}

/// Scrubs denylisted records out of every partition.
#[derive(Debug, Clone)]
pub struct GhostScrubber<'a> {
    denylist: &'a GhostDenylist,
}

impl<'a> GhostScrubber<'a> {
    /// Creates a scrubber.
    pub fn new(denylist: &'a GhostDenylist) -> Self {
        Self { denylist }
    }

    /// Removes ghosts from every stored partition.
    ///
    /// Entries that do not decode as records are matched on their raw
    /// `name` and otherwise written back unchanged.
    pub fn run<B: StorageBackend>(&self, cache: &LocalCache<B>) -> SyncResult<ScrubReport> {
        let mut report = ScrubReport::default();
        if self.denylist.is_empty() {
            return Ok(report);
        }

        for key in cache.enumerate_partition_keys() {
            let mut partition = cache.read_partition(&key);
            let before = partition.records.len() + partition.undecodable.len();
            partition.records.retain(|r| !self.denylist.matches(r));
            partition.undecodable.retain(|entry| !self.matches_raw(entry));
            let removed = before - partition.records.len() - partition.undecodable.len();
            if removed > 0 {
                warn!(partition = %key, removed, "removed ghost records");
                cache.write_partition(&key, &partition)?;
                report.removed.insert(key, removed);
            }
        }
        Ok(report)
    }

    fn matches_raw(&self, entry: &Value) -> bool {
        entry
            .get("name")
            .and_then(Value::as_str)
            .is_some_and(|name| self.denylist.matches_name(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use curve_storage::InMemoryBackend;
    use curve_sync_protocol::Record;

    #[test]
    fn ghosts_are_removed_everywhere() {
        let cache = LocalCache::new(InMemoryBackend::new());
        cache
            .write_branch(
                "X3D DENTAL",
                &[
                    Record::new("1").with_name("Previn"),
                    Record::new("2").with_name("Asha"),
                ],
            )
            .unwrap();
        cache
            .write_branch("BANGALORE", &[Record::new("3").with_name("UNNI")])
            .unwrap();
        cache
            .write_branch("General", &[Record::new("4").with_name("Ravi")])
            .unwrap();

        let denylist = GhostDenylist::default();
        let report = GhostScrubber::new(&denylist).run(&cache).unwrap();

        assert_eq!(report.total(), 2);
        assert_eq!(report.removed.len(), 2);
        assert!(!report.removed.contains_key("appointments_General"));
        for key in cache.enumerate_partition_keys() {
            assert!(cache.read(&key).iter().all(|r| !denylist.matches(r)));
        }
        assert_eq!(cache.read_branch("X3D DENTAL").len(), 1);
    }

    #[test]
    fn undecodable_entries_are_kept_unless_ghosts() {
        let cache = LocalCache::new(InMemoryBackend::with_entries([(
            "appointments_BANGALORE",
            r#"[{"bookingId":"1","name":"Previn"},{"bookingId":"2","age":{"y":1}},{"bookingId":"3","name":"Unni","age":[]}]"#,
        )]));

        let denylist = GhostDenylist::default();
        let report = GhostScrubber::new(&denylist).run(&cache).unwrap();

        assert_eq!(report.total(), 2);
        let partition = cache.read_partition("appointments_BANGALORE");
        assert!(partition.records.is_empty());
        assert_eq!(partition.undecodable.len(), 1);
        assert_eq!(partition.undecodable[0]["bookingId"], "2");
    }

    #[test]
    fn empty_denylist_is_a_noop() {
        let cache = LocalCache::new(InMemoryBackend::new());
        cache
            .write_branch("BANGALORE", &[Record::new("1").with_name("previn")])
            .unwrap();
        let denylist = GhostDenylist::empty();
        let report = GhostScrubber::new(&denylist).run(&cache).unwrap();
        assert_eq!(report.total(), 0);
        assert_eq!(cache.read_branch("BANGALORE").len(), 1);
    }
}
