//! Startup removal of ghost records.

use crate::error::ServerResult;
use crate::handler::HandlerContext;
use curve_sync_protocol::GhostDenylist;
use tracing::info;

/// Removes denylisted records from the store.
pub struct StartupCleaner<'a> {
    denylist: &'a GhostDenylist,
}

impl<'a> StartupCleaner<'a> {
    /// Creates a cleaner.
    pub fn new(denylist: &'a GhostDenylist) -> Self {
        Self { denylist }
    }

    /// Runs the cleaner once. Returns the booking ids removed.
    ///
    /// A store that does not exist yet is left alone.
    pub fn run(&self, context: &HandlerContext) -> ServerResult<Vec<String>> {
        if self.denylist.is_empty() || !context.store.exists() {
            return Ok(Vec::new());
        }

        let removed = context.modify(|records| {
            let ghosts: Vec<String> = records
                .iter()
                .filter(|(_, r)| self.denylist.matches(r))
                .map(|(id, _)| id.clone())
                .collect();
            for id in &ghosts {
                if let Some(record) = records.remove(id) {
                    info!(booking_id = %id, name = record.name_str(), "removing ghost record");
                }
            }
            let changed = !ghosts.is_empty();
            Ok((ghosts, changed))
        })?;

        if !removed.is_empty() {
            info!(count = removed.len(), "ghost records removed");
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use crate::store::{MemoryRecordStore, RecordStore};
    use curve_sync_protocol::{Record, RecordMap};
    use std::sync::Arc;

    fn context(records: &[Record]) -> HandlerContext {
        let map: RecordMap = records
            .iter()
            .map(|r| (r.booking_id.clone(), r.clone()))
            .collect();
        let store = Arc::new(MemoryRecordStore::with_records(map));
        HandlerContext::new(ServerConfig::default(), store)
    }

    #[test]
    fn removes_only_ghosts() {
        let ctx = context(&[
            Record::new("1").with_name("Previn Kumar"),
            Record::new("2").with_name("Asha"),
            Record::new("3").with_name("UNIQUE test"),
            Record::new("4"),
        ]);
        let denylist = GhostDenylist::default();

        let removed = StartupCleaner::new(&denylist).run(&ctx).unwrap();
        assert_eq!(removed, vec!["1", "3"]);

        let left: Vec<_> = ctx.store.load().unwrap().into_keys().collect();
        assert_eq!(left, vec!["2", "4"]);
    }

    #[test]
    fn absent_store_is_not_created() {
        let store = Arc::new(MemoryRecordStore::new());
        let ctx = HandlerContext::new(ServerConfig::default(), store.clone());
        let denylist = GhostDenylist::default();
        assert!(StartupCleaner::new(&denylist).run(&ctx).unwrap().is_empty());
        assert!(!store.exists());
    }
}
