//! Reset-branch command implementation.

use curve_sync_protocol::BranchResetResponse;
use curve_sync_server::ServerConfig;
use std::path::Path;

/// Runs the reset-branch command.
///
/// Deletes every record whose branch matches `name` loosely, exactly as
/// `DELETE /api/branch/:name` does.
pub fn run(path: &Path, config: ServerConfig, name: &str) -> Result<(), Box<dyn std::error::Error>> {
    let response = reset(path, config, name)?;
    println!(
        "Branch '{}': deleted {}, remaining {}",
        name, response.deleted, response.remaining
    );
    Ok(())
}

fn reset(
    path: &Path,
    config: ServerConfig,
    name: &str,
) -> Result<BranchResetResponse, Box<dyn std::error::Error>> {
    if name.trim().is_empty() {
        return Err("Branch name required".into());
    }
    let server = super::open_server(path, config);
    Ok(server.handler().handle_delete_branch(name)?)
}
