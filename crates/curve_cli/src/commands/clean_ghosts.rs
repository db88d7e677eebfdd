//! Clean-ghosts command implementation.

use curve_sync_server::{HandlerContext, JsonFileStore, ServerConfig, StartupCleaner};
use std::path::Path;
use std::sync::Arc;

/// Runs the startup cleaner once against the store at `path`.
pub fn run(path: &Path, config: ServerConfig) -> Result<(), Box<dyn std::error::Error>> {
    let removed = clean(path, config)?;
    if removed.is_empty() {
        println!("No ghost records found");
    } else {
        println!("Removed {} ghost record(s):", removed.len());
        for id in &removed {
            println!("  {}", id);
        }
    }
    Ok(())
}

fn clean(path: &Path, config: ServerConfig) -> Result<Vec<String>, Box<dyn std::error::Error>> {
    let ghosts = config.ghosts.clone();
    let context = HandlerContext::new(config, Arc::new(JsonFileStore::new(path)));
    Ok(StartupCleaner::new(&ghosts).run(&context)?)
}
