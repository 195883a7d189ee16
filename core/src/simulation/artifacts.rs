//! Persisted run artifacts
//!
//! Three pretty-printed JSON files per run:
//! - `simulation_results.json`: the full [`SimulationOutcome`]
//! - `agent_memory.json`: memory entries in insertion order
//! - `step_trace.json`: observation/action pairs in step order

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::info;

use super::SimulationOutcome;
use crate::Result;

pub const RESULTS_FILE: &str = "simulation_results.json";
pub const MEMORY_FILE: &str = "agent_memory.json";
pub const TRACE_FILE: &str = "step_trace.json";

async fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let body = serde_json::to_string_pretty(value)?;
    tokio::fs::write(path, body).await?;
    Ok(())
}

/// Write all artifacts for `outcome` into `dir`, creating it if needed.
pub async fn write_artifacts(outcome: &SimulationOutcome, dir: &Path) -> Result<Vec<PathBuf>> {
    tokio::fs::create_dir_all(dir).await?;

    let results = dir.join(RESULTS_FILE);
    let memory = dir.join(MEMORY_FILE);
    let trace = dir.join(TRACE_FILE);

    write_json(&results, outcome).await?;
    write_json(&memory, &outcome.memory).await?;
    write_json(&trace, &outcome.steps).await?;

    info!(target = "simulation", dir = %dir.display(), "Results saved");
    Ok(vec![results, memory, trace])
}
