//! The heuristic under test and the problem instances it runs on.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::Configuration;
use crate::errors::EvaluationError;

/// Stable identifier of a problem instance for the whole tuning run.
pub type InstanceId = usize;

/// One problem instance. The payload is shared read-only between workers.
#[derive(Debug)]
pub struct Instance<P> {
    pub id: InstanceId,
    pub payload: Arc<P>,
}

impl<P> Clone for Instance<P> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            payload: Arc::clone(&self.payload),
        }
    }
}

impl<P> Instance<P> {
    pub fn new(id: InstanceId, payload: P) -> Self {
        Self {
            id,
            payload: Arc::new(payload),
        }
    }

    /// Assign ids by position.
    pub fn enumerate(payloads: impl IntoIterator<Item = P>) -> Vec<Self> {
        payloads
            .into_iter()
            .enumerate()
            .map(|(id, payload)| Self::new(id, payload))
            .collect()
    }
}

/// A configured heuristic run. Must minimize its metric.
pub trait Solver {
    /// Run the heuristic to completion.
    fn run(&mut self) -> Result<(), EvaluationError>;

    /// Value of a named metric after [`Solver::run`].
    fn metric(&self, name: &str) -> Option<f64>;

    /// Solution recorded in exported snapshots.
    fn solution(&self) -> Option<serde_json::Value> {
        None
    }
}

/// Builds solvers from an instance payload and a merged configuration.
///
/// The factory is shared by every worker; each solver is built and run
/// inside the worker that evaluates it.
pub trait SolverFactory: Send + Sync {
    type Payload: Send + Sync;
    type Solver: Solver;

    fn build(
        &self,
        payload: &Self::Payload,
        config: &Configuration,
    ) -> Result<Self::Solver, EvaluationError>;
}

/// Persisted record of one evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationSnapshot {
    pub instance_id: InstanceId,
    pub parameters: Configuration,
    pub metrics: serde_json::Map<String, serde_json::Value>,
    pub solution: Option<serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enumerate_assigns_positional_ids() {
        let instances = Instance::enumerate(vec!["a", "b", "c"]);
        let ids: Vec<InstanceId> = instances.iter().map(|i| i.id).collect();
        assert_eq!(ids, vec![0, 1, 2]);
        assert_eq!(*instances[1].payload, "b");
    }

    #[test]
    fn clone_shares_payload() {
        let instance = Instance::new(3, vec![1.0, 2.0]);
        let copy = instance.clone();
        assert_eq!(copy.id, 3);
        assert!(Arc::ptr_eq(&instance.payload, &copy.payload));
    }

    #[test]
    fn snapshot_serialization() {
        let mut parameters = Configuration::new();
        parameters.insert("x".into(), serde_json::json!(2.5));
        let mut metrics = serde_json::Map::new();
        metrics.insert("value".into(), serde_json::json!(0.5));

        let snapshot = EvaluationSnapshot {
            instance_id: 1,
            parameters,
            metrics,
            solution: Some(serde_json::json!({"routes": [[0, 2, 1]]})),
        };

        let json = serde_json::to_string(&snapshot).unwrap();
        let back: EvaluationSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(snapshot, back);
    }
}
