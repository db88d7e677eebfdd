//! Sync command implementation.

use curve_storage::FileBackend;
use curve_sync_engine::{
    HttpRemoteStore, InitReport, LoopbackClient, LoopbackServer, SyncConfig, SyncEngine,
};
use curve_sync_protocol::{HttpRequest, HttpResponse};
use curve_sync_server::{ServerConfig, SyncServer};
use std::path::Path;
use tracing::info;

/// Serves engine requests from a server opened in this process.
struct LocalServer(SyncServer);

impl LoopbackServer for LocalServer {
    fn handle(&self, request: HttpRequest) -> HttpResponse {
        self.0.handle(request)
    }
}

/// Runs the client startup sequence for the cache at `cache_path` against
/// the record store at `store_path` and prints the report as JSON.
pub fn run(
    store_path: &Path,
    cache_path: &Path,
    config: SyncConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let report = runtime.block_on(sync_once(store_path, cache_path, config))?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

async fn sync_once(
    store_path: &Path,
    cache_path: &Path,
    config: SyncConfig,
) -> Result<InitReport, Box<dyn std::error::Error>> {
    let server_config = ServerConfig::default()
        .with_branches(config.branches.clone())
        .with_ghosts(config.ghosts.clone());
    let server = LocalServer(super::open_server(store_path, server_config));
    let base_url = config.fallback_remote.base_url.clone();
    let remote = HttpRemoteStore::new(base_url, LoopbackClient::new(server));

    let backend = FileBackend::open_with_create_dirs(cache_path)?;
    let engine = SyncEngine::new(config, remote, backend);
    let report = engine.initialize().await?;

    info!(
        cache = %cache_path.display(),
        migrated = report.migration.moved(),
        scrubbed = report.scrub.total(),
        "client sync finished"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use curve_storage::StorageBackend;
    use curve_sync_engine::PullOutcome;
    use curve_sync_protocol::{Record, RecordMap};
    use curve_sync_server::{JsonFileStore, RecordStore};
    use tempfile::tempdir;

    #[tokio::test]
    async fn mirrors_store_into_cache_file() {
        let dir = tempdir().unwrap();
        let store_path = dir.path().join("shared_patients.json");
        let cache_path = dir.path().join("client").join("cache.json");

        let mut records = RecordMap::new();
        records.insert("0001".into(), Record::new("0001").with_branch("CHENNAI"));
        records.insert("0002".into(), Record::new("0002").with_branch("BANGALORE"));
        JsonFileStore::new(&store_path).save(&records).unwrap();

        let report = sync_once(&store_path, &cache_path, SyncConfig::default())
            .await
            .unwrap();
        assert!(matches!(report.pull, Some(PullOutcome::Mirrored(_))));

        let cache = FileBackend::open(&cache_path).unwrap();
        let x3d = cache.get("appointments_X3D DENTAL").unwrap().unwrap();
        assert!(x3d.contains("0001"));
        let bangalore = cache.get("appointments_BANGALORE").unwrap().unwrap();
        assert!(bangalore.contains("0002"));
    }
}
