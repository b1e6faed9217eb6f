//! Tuning run configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::config_error;
use crate::errors::{ConfigError, TunerResult};

/// Configuration handed to the heuristic: parameter name to JSON value.
pub type Configuration = serde_json::Map<String, serde_json::Value>;

/// Bounded, periodically recycled worker pool settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolSettings {
    /// Maximum number of concurrent workers. `0` uses every available core.
    pub worker_count: usize,
    /// Evaluations a worker performs before it is retired.
    pub max_tasks_per_worker: usize,
    /// Evaluations a pool performs before it is torn down.
    pub max_tasks_per_pool: usize,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            worker_count: 1,
            max_tasks_per_worker: 1,
            max_tasks_per_pool: 10,
        }
    }
}

impl PoolSettings {
    /// Worker count with `0` resolved to the number of available cores.
    pub fn effective_workers(&self) -> usize {
        if self.worker_count > 0 {
            return self.worker_count;
        }
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    }
}

/// Surrogate tree settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TreeSettings {
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
}

impl Default for TreeSettings {
    fn default() -> Self {
        Self {
            min_samples_split: 20,
            min_samples_leaf: 10,
        }
    }
}

/// Optional per-evaluation snapshot export.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportSettings {
    pub enabled: bool,
    pub path: PathBuf,
    /// Metrics to record. Empty means only the tuned metric.
    pub metrics: Vec<String>,
}

/// Top-level configuration for a tuning run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TunerConfig {
    /// Fixed solver arguments, overridden by each drawn configuration.
    pub base_config: Configuration,

    /// Metric the solver exposes after running. Lower is better.
    pub metric_name: String,

    /// Warm-start sample count.
    pub n_init_pop: usize,

    /// Samples drawn per narrowing round.
    pub iter: usize,

    pub pool: PoolSettings,
    pub tree: TreeSettings,
    pub export: ExportSettings,

    /// Seed for the orchestrator RNG. `None` draws a fresh seed.
    pub seed: Option<u64>,

    /// Upper bound on narrowing rounds after the warm start.
    pub max_rounds: Option<usize>,
}

impl Default for TunerConfig {
    fn default() -> Self {
        Self {
            base_config: Configuration::new(),
            metric_name: "value".to_string(),
            n_init_pop: 100,
            iter: 5,
            pool: PoolSettings::default(),
            tree: TreeSettings::default(),
            export: ExportSettings::default(),
            seed: None,
            max_rounds: None,
        }
    }
}

impl TunerConfig {
    pub fn new(metric_name: &str) -> Self {
        Self {
            metric_name: metric_name.to_string(),
            ..Self::default()
        }
    }

    pub fn from_json_str(text: &str) -> TunerResult<Self> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> TunerResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn with_base_config(mut self, base_config: Configuration) -> Self {
        self.base_config = base_config;
        self
    }

    pub fn with_samples(mut self, n_init_pop: usize, iter: usize) -> Self {
        self.n_init_pop = n_init_pop;
        self.iter = iter;
        self
    }

    pub fn with_pool(
        mut self,
        worker_count: usize,
        max_tasks_per_worker: usize,
        max_tasks_per_pool: usize,
    ) -> Self {
        self.pool = PoolSettings {
            worker_count,
            max_tasks_per_worker,
            max_tasks_per_pool,
        };
        self
    }

    pub fn with_tree(mut self, min_samples_split: usize, min_samples_leaf: usize) -> Self {
        self.tree = TreeSettings {
            min_samples_split,
            min_samples_leaf,
        };
        self
    }

    pub fn with_export(mut self, path: impl Into<PathBuf>, metrics: Vec<String>) -> Self {
        self.export = ExportSettings {
            enabled: true,
            path: path.into(),
            metrics,
        };
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_max_rounds(mut self, max_rounds: usize) -> Self {
        self.max_rounds = Some(max_rounds);
        self
    }

    /// Metrics written to each exported snapshot.
    pub fn export_metrics(&self) -> Vec<String> {
        if self.export.metrics.is_empty() {
            vec![self.metric_name.clone()]
        } else {
            self.export.metrics.clone()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.metric_name.trim().is_empty() {
            return Err(config_error!("metric_name", "must not be empty"));
        }
        if self.n_init_pop == 0 {
            return Err(config_error!("n_init_pop", "must be greater than 0"));
        }
        if self.iter == 0 {
            return Err(config_error!("iter", "must be greater than 0"));
        }
        if self.pool.max_tasks_per_worker == 0 {
            return Err(config_error!("max_tasks_per_worker", "must be greater than 0"));
        }
        if self.pool.max_tasks_per_pool == 0 {
            return Err(config_error!("max_tasks_per_pool", "must be greater than 0"));
        }
        if self.tree.min_samples_leaf == 0 {
            return Err(config_error!("min_samples_leaf", "must be greater than 0"));
        }
        if self.tree.min_samples_split < 2 {
            return Err(config_error!(
                "min_samples_split",
                "must be at least 2, got {}",
                self.tree.min_samples_split
            ));
        }
        if self.export.enabled && self.export.path.as_os_str().is_empty() {
            return Err(config_error!("export.path", "required when export is enabled"));
        }
        Ok(())
    }
}
