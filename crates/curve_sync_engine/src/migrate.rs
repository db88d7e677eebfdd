//! Local branch migration.
//!
//! Partitions named after a legacy branch (`appointments_CHENNAI`, ...) are
//! folded into the partition of their canonical branch. Purely local: nothing
//! is pushed. A legacy partition holding entries that do not decode is never
//! removed.

use crate::cache::{partition_branch, partition_key, LocalCache, Partition};
use crate::error::SyncResult;
use curve_storage::StorageBackend;
use curve_sync_protocol::BranchTable;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, info, warn};

/// Migration of one legacy partition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PartitionMigration {
    /// Legacy branch.
    pub from: String,
    /// Canonical branch the records moved to.
    pub to: String,
    /// Records moved.
    pub moved: usize,
    /// Records skipped because their id already existed in the target.
    pub duplicates: usize,
    /// Stored entries that did not decode and stayed behind.
    pub undecodable: usize,
    /// Whether the legacy partition was removed.
    pub removed: bool,
}

/// Result of a migration pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MigrationReport {
    /// One entry per legacy partition found.
    pub migrations: Vec<PartitionMigration>,
    /// Records in canonical partitions whose branch field was rewritten.
    pub rewritten: usize,
}

impl MigrationReport {
    /// Total records moved across partitions.
    pub fn moved(&self) -> usize {
        self.migrations.iter().map(|m| m.moved).sum()
    }

    /// Total undecodable entries left in legacy partitions.
    pub fn undecodable(&self) -> usize {
        self.migrations.iter().map(|m| m.undecodable).sum()
    }

    /// Returns true if nothing changed.
    pub fn is_empty(&self) -> bool {
        self.migrations.is_empty() && self.rewritten == 0
    }
}

/// Folds legacy partitions into canonical ones.
#[derive(Debug, Clone)]
pub struct BranchMigrator<'a> {
    branches: &'a BranchTable,
    retain_legacy: bool,
}

impl<'a> BranchMigrator<'a> {
    /// Creates a migrator over a branch table.
    pub fn new(branches: &'a BranchTable) -> Self {
        Self {
            branches,
            retain_legacy: false,
        }
    }

    /// Keeps legacy partitions after their records were moved.
    pub fn retain_legacy(mut self, retain: bool) -> Self {
        self.retain_legacy = retain;
        self
    }

    /// Runs the migration over every stored partition.
    pub fn run<B: StorageBackend>(&self, cache: &LocalCache<B>) -> SyncResult<MigrationReport> {
        let mut report = MigrationReport::default();
        let mut targets: BTreeMap<String, Partition> = BTreeMap::new();
        let mut legacy = Vec::new();

        for key in cache.enumerate_partition_keys() {
            let Some(branch) = partition_branch(&key) else {
                continue;
            };
            let canonical = self.branches.normalize(branch);
            if canonical == branch {
                continue;
            }

            let source = cache.read_partition(&key);
            let target = targets
                .entry(canonical.clone())
                .or_insert_with(|| cache.read_partition(&partition_key(&canonical)));
            let mut seen: HashSet<String> =
                target.records.iter().map(|r| r.booking_id.clone()).collect();

            let mut migration = PartitionMigration {
                from: branch.to_string(),
                to: canonical.clone(),
                moved: 0,
                duplicates: 0,
                undecodable: source.lost(),
                removed: false,
            };
            let clean = source.is_clean();
            for mut record in source.records {
                if seen.insert(record.booking_id.clone()) {
                    record.branch = Some(canonical.clone());
                    target.records.push(record);
                    migration.moved += 1;
                } else {
                    migration.duplicates += 1;
                }
            }

            info!(
                from = %migration.from,
                to = %migration.to,
                moved = migration.moved,
                duplicates = migration.duplicates,
                "migrating legacy partition"
            );
            if !clean {
                warn!(
                    partition = %key,
                    undecodable = migration.undecodable,
                    "legacy partition has undecodable entries, keeping it"
                );
            }
            legacy.push((key, clean));
            report.migrations.push(migration);
        }

        for (branch, partition) in &targets {
            cache.write_partition(&partition_key(branch), partition)?;
        }

        if !self.retain_legacy {
            for ((key, clean), migration) in legacy.iter().zip(report.migrations.iter_mut()) {
                if *clean {
                    migration.removed = cache.remove(key)?;
                }
            }
        }

        report.rewritten = self.rewrite_branch_fields(cache)?;
        Ok(report)
    }

    fn rewrite_branch_fields<B: StorageBackend>(&self, cache: &LocalCache<B>) -> SyncResult<usize> {
        let mut total = 0;
        for key in cache.enumerate_partition_keys() {
            let Some(branch) = partition_branch(&key) else {
                continue;
            };
            if self.branches.normalize(branch) != branch {
                continue;
            }

            let mut partition = cache.read_partition(&key);
            let mut changed = 0;
            for record in &mut partition.records {
                let Some(current) = record.branch.as_deref() else {
                    continue;
                };
                let canonical = self.branches.normalize(current);
                if canonical != current {
                    record.branch = Some(canonical);
                    changed += 1;
                }
            }
            if changed > 0 {
                debug!(partition = %key, changed, "rewrote branch fields");
                cache.write_partition(&key, &partition)?;
                total += changed;
            }
        }
        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use curve_storage::InMemoryBackend;

    fn cache_with(entries: &[(&str, &str)]) -> LocalCache<InMemoryBackend> {
        LocalCache::new(InMemoryBackend::with_entries(entries.iter().copied()))
    }

    #[test]
    fn chennai_partition_moves_into_x3d() {
        let cache = cache_with(&[(
            "appointments_CHENNAI",
            r#"[{"bookingId":"0001","branch":"CHENNAI","name":"A"}]"#,
        )]);
        let table = BranchTable::default();

        let report = BranchMigrator::new(&table).run(&cache).unwrap();

        let target = cache.read_branch("X3D DENTAL");
        assert_eq!(target.len(), 1);
        assert_eq!(target[0].booking_id, "0001");
        assert_eq!(target[0].branch.as_deref(), Some("X3D DENTAL"));
        assert_eq!(report.moved(), 1);
        assert!(report.migrations[0].removed);
        assert_eq!(cache.enumerate_partition_keys(), vec!["appointments_X3D DENTAL"]);
    }

    #[test]
    fn undecodable_entry_keeps_legacy_partition() {
        let cache = cache_with(&[
            (
                "appointments_CHENNAI",
                r#"[{"bookingId":"0001","name":"A"},{"bookingId":"0002","age":{"years":30}}]"#,
            ),
            (
                "appointments_X3D DENTAL",
                r#"[{"bookingId":"0009","status":{"code":1}}]"#,
            ),
        ]);
        let table = BranchTable::default();

        let report = BranchMigrator::new(&table).run(&cache).unwrap();

        let migration = &report.migrations[0];
        assert_eq!(migration.moved, 1);
        assert_eq!(migration.undecodable, 1);
        assert!(!migration.removed);
        assert_eq!(report.undecodable(), 1);

        let target = cache.read_partition("appointments_X3D DENTAL");
        assert_eq!(target.records[0].booking_id, "0001");
        assert_eq!(target.undecodable.len(), 1);

        let legacy = cache.read_partition("appointments_CHENNAI");
        assert_eq!(legacy.records.len(), 1);
        assert_eq!(legacy.undecodable.len(), 1);
    }

    #[test]
    fn malformed_legacy_partition_is_kept() {
        let cache = cache_with(&[("appointments_COIMBATORE", "{oops")]);
        let table = BranchTable::default();

        let report = BranchMigrator::new(&table).run(&cache).unwrap();

        assert!(!report.migrations[0].removed);
        assert_eq!(
            cache.backend().get("appointments_COIMBATORE").unwrap().as_deref(),
            Some("{oops")
        );
    }

    #[test]
    fn existing_ids_are_not_duplicated() {
        let cache = cache_with(&[
            ("appointments_CHENNAI", r#"[{"bookingId":"1"},{"bookingId":"2"}]"#),
            ("appointments_COIMBATORE", r#"[{"bookingId":"2"}]"#),
            ("appointments_X3D DENTAL", r#"[{"bookingId":"1","branch":"X3D DENTAL"}]"#),
        ]);
        let table = BranchTable::default();

        let report = BranchMigrator::new(&table).run(&cache).unwrap();

        let ids: Vec<_> = cache
            .read_branch("X3D DENTAL")
            .into_iter()
            .map(|r| r.booking_id)
            .collect();
        assert_eq!(ids, vec!["1", "2"]);
        assert_eq!(report.moved(), 1);
        let dups: usize = report.migrations.iter().map(|m| m.duplicates).sum();
        assert_eq!(dups, 2);
    }

    #[test]
    fn retained_legacy_partitions_stay() {
        let cache = cache_with(&[("appointments_X3DENTALS", r#"[{"bookingId":"9"}]"#)]);
        let table = BranchTable::default();

        let report = BranchMigrator::new(&table)
            .retain_legacy(true)
            .run(&cache)
            .unwrap();

        assert!(!report.migrations[0].removed);
        assert_eq!(cache.read("appointments_X3DENTALS").len(), 1);
        assert_eq!(cache.read_branch("X3D DENTAL").len(), 1);
    }

    #[test]
    fn stale_branch_fields_are_rewritten_in_place() {
        let cache = cache_with(&[(
            "appointments_X3D DENTAL",
            r#"[{"bookingId":"1","branch":"CHENNAI"},{"bookingId":"2","branch":"X3D DENTAL"},{"bookingId":"3"}]"#,
        )]);
        let table = BranchTable::default();

        let report = BranchMigrator::new(&table).run(&cache).unwrap();

        assert!(report.migrations.is_empty());
        assert_eq!(report.rewritten, 1);
        let records = cache.read_branch("X3D DENTAL");
        assert_eq!(records[0].branch.as_deref(), Some("X3D DENTAL"));
        assert_eq!(records[2].branch, None);
    }

    #[test]
    fn canonical_cache_is_untouched() {
        let cache = cache_with(&[
            ("appointments_BANGALORE", r#"[{"bookingId":"1","branch":"BANGALORE"}]"#),
            ("appointments_BRANCH", "[]"),
        ]);
        let table = BranchTable::default();
        let report = BranchMigrator::new(&table).run(&cache).unwrap();
        assert!(report.is_empty());
    }
}
