//! Optional per-evaluation snapshot records.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde_json::{Map, Value};
use tracing::{info, warn};
use uuid::Uuid;

use rtt_types::{Configuration, EvaluationSnapshot, InstanceId, Solver, TunerConfig, TunerResult};

/// Writes one JSON record per evaluated task under an export directory.
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotExporter {
    dir: PathBuf,
    metrics: Vec<String>,
}

impl SnapshotExporter {
    pub fn new(dir: impl Into<PathBuf>, metrics: Vec<String>) -> Self {
        Self {
            dir: dir.into(),
            metrics,
        }
    }

    /// Exporter for a run, if export is enabled.
    pub fn from_config(config: &TunerConfig) -> Option<Self> {
        config
            .export
            .enabled
            .then(|| Self::new(&config.export.path, config.export_metrics()))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Collect the record for a finished solver run.
    pub fn snapshot<S: Solver>(
        &self,
        instance_id: InstanceId,
        parameters: &Configuration,
        solver: &S,
    ) -> EvaluationSnapshot {
        let mut metrics = Map::new();
        for name in &self.metrics {
            let value = solver.metric(name).map_or(Value::Null, Value::from);
            metrics.insert(name.clone(), value);
        }
        EvaluationSnapshot {
            instance_id,
            parameters: parameters.clone(),
            metrics,
            solution: solver.solution(),
        }
    }

    /// Write a record to `<dir>/<UTC timestamp>-<uuid>.json`.
    pub fn write(&self, snapshot: &EvaluationSnapshot) -> TunerResult<PathBuf> {
        fs::create_dir_all(&self.dir)?;
        let file_name = format!(
            "{}-{}.json",
            Utc::now().format("%Y%m%dT%H%M%S%.6fZ"),
            Uuid::new_v4()
        );
        let path = self.dir.join(file_name);
        fs::write(&path, serde_json::to_vec_pretty(snapshot)?)?;
        Ok(path)
    }

    /// Snapshot and write; a failed write is logged and otherwise ignored.
    pub fn persist<S: Solver>(
        &self,
        instance_id: InstanceId,
        parameters: &Configuration,
        solver: &S,
    ) -> Option<PathBuf> {
        let snapshot = self.snapshot(instance_id, parameters, solver);
        match self.write(&snapshot) {
            Ok(path) => {
                info!("Saved snapshot {}", path.display());
                Some(path)
            }
            Err(e) => {
                warn!("Could not export snapshot to {}: {}", self.dir.display(), e);
                None
            }
        }
    }
}
