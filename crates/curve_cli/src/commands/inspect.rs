//! Inspect command implementation.

use curve_sync_protocol::RecordMap;
use curve_sync_server::ServerConfig;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;

/// Record store inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Store path.
    pub path: String,
    /// Store file size in bytes.
    pub size: u64,
    /// Total number of records.
    pub record_count: usize,
    /// Record counts per canonical branch.
    pub branches: BTreeMap<String, usize>,
    /// Records whose stored branch is not in normal form.
    pub legacy_branch_records: usize,
    /// Records the ghost denylist would remove.
    pub ghost_records: usize,
}

/// Runs the inspect command.
pub fn run(
    path: &Path,
    config: ServerConfig,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    if !path.exists() {
        return Err(format!("No record store found at {}", path.display()).into());
    }

    let server = super::open_server(path, config);
    let records = server.records()?;

    let mut result = summarize(&records, server.config());
    result.path = path.display().to_string();
    result.size = std::fs::metadata(path)?.len();

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&result)?),
        _ => print_text_output(&result),
    }

    Ok(())
}

fn summarize(records: &RecordMap, config: &ServerConfig) -> InspectResult {
    let branches = &config.branches;
    let mut counts = BTreeMap::new();
    let mut legacy = 0;
    for record in records.values() {
        let canonical = branches.normalize(record.branch_str());
        if canonical != record.branch_str() {
            legacy += 1;
        }
        *counts.entry(canonical).or_insert(0) += 1;
    }

    InspectResult {
        path: String::new(),
        size: 0,
        record_count: records.len(),
        branches: counts,
        legacy_branch_records: legacy,
        ghost_records: records.values().filter(|r| config.ghosts.matches(r)).count(),
    }
}

fn print_text_output(result: &InspectResult) {
    println!("CURVE Record Store Inspection");
    println!("=============================");
    println!();
    println!("Path: {}", result.path);
    println!("Size: {} bytes", result.size);
    println!();
    println!("Records: {}", result.record_count);
    println!("  Legacy branch names: {}", result.legacy_branch_records);
    println!("  Ghost records:       {}", result.ghost_records);

    if !result.branches.is_empty() {
        println!();
        println!("Branches:");
        for (branch, count) in &result.branches {
            println!("  {:<16} {}", branch, count);
        }
    }
}
