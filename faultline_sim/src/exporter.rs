//! JSON exporter for scenario runs.
//!
//! Writes the result, the incident timeline and per-label outcome statistics
//! so a run can be plotted or diffed against another seed.

use crate::recorder::{EpisodeRecord, LabelStats, RecordingSink};
use crate::runner::ScenarioResult;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use thiserror::Error;

/// Errors writing an export.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("failed to serialize export: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("failed to write export: {0}")]
    Io(#[from] std::io::Error),
}

/// Complete simulation export.
#[derive(Debug, Clone, Serialize)]
pub struct SimExport {
    /// Scenario name
    pub scenario: String,

    /// Seed used
    pub seed: u64,

    /// Virtual duration in seconds
    pub duration_sec: f64,

    /// Final results
    pub passed: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,

    /// Incident timeline
    pub episodes: Vec<EpisodeRecord>,

    /// Outcome statistics per incident label
    pub labels: BTreeMap<String, LabelStats>,

    /// Request counts per operation
    pub operations: BTreeMap<String, u64>,
}

impl SimExport {
    /// Creates an export holding only the result.
    pub fn new(result: &ScenarioResult) -> Self {
        Self {
            scenario: result.scenario.name().to_string(),
            seed: result.seed,
            duration_sec: result.final_time_secs,
            passed: result.passed,
            failure_reason: result.failure_reason.clone(),
            episodes: Vec::new(),
            labels: BTreeMap::new(),
            operations: BTreeMap::new(),
        }
    }

    /// Adds everything the recorder collected.
    pub fn with_recording(mut self, recorder: &RecordingSink) -> Self {
        self.episodes = recorder.episodes();
        self.labels = recorder
            .by_label()
            .into_iter()
            .map(|(label, stats)| (label.to_string(), stats))
            .collect();
        self.operations = recorder.by_operation();
        self
    }

    pub fn to_json(&self) -> Result<String, ExportError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Writes to a JSON file.
    pub fn write_to_file(&self, path: impl AsRef<Path>) -> Result<(), ExportError> {
        let json = self.to_json()?;
        let mut file = File::create(path)?;
        file.write_all(json.as_bytes())?;
        Ok(())
    }
}
