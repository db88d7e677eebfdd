//! CLI command implementations.

pub mod clean_ghosts;
pub mod inspect;
pub mod reset_branch;
pub mod sync;

use curve_sync_server::{JsonFileStore, ServerConfig, SyncServer};
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::Arc;

/// Opens the record store at `path` without running the startup cleaner.
pub(crate) fn open_server(path: &Path, config: ServerConfig) -> SyncServer {
    let config = config.with_clean_on_startup(false);
    SyncServer::with_store(config, Arc::new(JsonFileStore::new(path)))
}

/// Loads a JSON config file, or the defaults when no file is given.
///
/// Missing fields take their default values.
pub(crate) fn load_config<T: DeserializeOwned + Default>(
    path: Option<&Path>,
) -> Result<T, Box<dyn std::error::Error>> {
    match path {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .map_err(|e| format!("cannot read config {}: {}", path.display(), e))?;
            Ok(serde_json::from_str(&raw)?)
        }
        None => Ok(T::default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use curve_sync_engine::SyncConfig;
    use tempfile::tempdir;

    #[test]
    fn partial_config_keeps_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("sync.json");
        std::fs::write(&path, r#"{"default_branch": "BANGALORE"}"#).unwrap();

        let config: SyncConfig = load_config(Some(&path)).unwrap();
        assert_eq!(config.default_branch, "BANGALORE");
        assert_eq!(config.data_version, SyncConfig::default().data_version);
    }

    #[test]
    fn missing_config_file_is_an_error() {
        let dir = tempdir().unwrap();
        let result: Result<ServerConfig, _> = load_config(Some(&dir.path().join("nope.json")));
        assert!(result.is_err());
    }
}
