//! Bounded, periodically recycled evaluation pool.
//!
//! Work is split into sub-batches of at most `max_tasks_per_pool` tasks.
//! Each sub-batch gets a fresh pool of at most `worker_count` threads; a
//! worker retires after `max_tasks_per_worker` evaluations and is replaced
//! while tasks remain. The pool is torn down before the next sub-batch, so
//! anything a leaky solver holds on to is reclaimed periodically.
//!
//! Configurations are drawn by the orchestrator at submission, and results
//! are appended to the history in submission order whatever the completion
//! order was.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::thread;

use crossbeam_channel::{unbounded, Receiver, Sender};
use rand::Rng;
use tracing::{debug, info, warn};

use rtt_types::{
    config_error, Configuration, EvaluationError, Instance, PoolSettings, Solver, SolverFactory,
    TunerConfig, TunerError, TunerResult,
};

use crate::export::SnapshotExporter;
use crate::history::History;
use crate::kwargs::KwargsManager;

/// One submitted evaluation.
#[derive(Debug)]
struct Task {
    seq: usize,
    /// Position in the instance slice.
    instance: usize,
    encoded: Vec<f64>,
    config: Configuration,
}

#[derive(Debug)]
struct Outcome {
    seq: usize,
    result: Result<f64, EvaluationError>,
}

enum WorkerEvent {
    Finished(Outcome),
    Retired,
}

/// Reports a worker's retirement even if it unwinds.
struct RetireGuard(Sender<WorkerEvent>);

impl Drop for RetireGuard {
    fn drop(&mut self) {
        let _ = self.0.send(WorkerEvent::Retired);
    }
}

pub struct ParallelBatchRunner {
    pool: PoolSettings,
    metric_name: String,
    base_config: Configuration,
    exporter: Option<SnapshotExporter>,
}

impl ParallelBatchRunner {
    pub fn new(config: &TunerConfig) -> Self {
        Self {
            pool: config.pool.clone(),
            metric_name: config.metric_name.clone(),
            base_config: config.base_config.clone(),
            exporter: SnapshotExporter::from_config(config),
        }
    }

    /// Evaluate `total` random configurations drawn from `manager` and
    /// append each successful one to `history`.
    ///
    /// Failed evaluations are logged and replaced by further draws. A
    /// sub-batch in which every evaluation fails aborts with
    /// [`TunerError::BatchFailed`].
    pub fn solve_instances<F, R>(
        &self,
        factory: &F,
        instances: &[Instance<F::Payload>],
        manager: &KwargsManager,
        total: usize,
        rng: &mut R,
        history: &mut History,
    ) -> TunerResult<usize>
    where
        F: SolverFactory,
        R: Rng,
    {
        if instances.is_empty() {
            return Err(config_error!("instances", "at least one instance is required").into());
        }

        let mut collected = 0;
        while collected < total {
            let batch = (total - collected).min(self.pool.max_tasks_per_pool);
            let tasks = (0..batch)
                .map(|seq| self.draw_task(seq, instances.len(), manager, rng))
                .collect::<TunerResult<Vec<_>>>()?;

            let mut results: Vec<Option<Result<f64, EvaluationError>>> = vec![None; batch];
            for outcome in self.run_pool(factory, instances, &tasks) {
                results[outcome.seq] = Some(outcome.result);
            }

            let mut succeeded = 0;
            for (task, result) in tasks.into_iter().zip(results) {
                let instance_id = instances[task.instance].id;
                match result {
                    Some(Ok(value)) => {
                        history.push(instance_id, task.encoded, value);
                        succeeded += 1;
                    }
                    Some(Err(e)) => warn!("Evaluation on instance {} failed: {}", instance_id, e),
                    None => warn!("Evaluation on instance {} produced no result", instance_id),
                }
            }

            if succeeded == 0 {
                return Err(TunerError::BatchFailed { attempted: batch });
            }
            collected += succeeded;
            debug!("Collected {}/{} evaluations", collected, total);
        }
        Ok(collected)
    }

    fn draw_task<R: Rng>(
        &self,
        seq: usize,
        n_instances: usize,
        manager: &KwargsManager,
        rng: &mut R,
    ) -> TunerResult<Task> {
        let instance = rng.random_range(0..n_instances);
        let encoded = manager.random_instance(rng);
        let mut config = self.base_config.clone();
        config.extend(manager.dummy_to_kwargs(&encoded)?);
        Ok(Task {
            seq,
            instance,
            encoded,
            config,
        })
    }

    /// Run one sub-batch on a fresh pool and block until it drains.
    fn run_pool<F: SolverFactory>(
        &self,
        factory: &F,
        instances: &[Instance<F::Payload>],
        tasks: &[Task],
    ) -> Vec<Outcome> {
        let (task_tx, task_rx) = unbounded::<&Task>();
        for task in tasks {
            let _ = task_tx.send(task);
        }
        drop(task_tx);

        let workers = self.pool.effective_workers().min(tasks.len());
        info!("Starting pool: {} tasks on {} workers", tasks.len(), workers);

        let (event_tx, event_rx) = unbounded::<WorkerEvent>();
        let mut outcomes = Vec::with_capacity(tasks.len());

        thread::scope(|scope| {
            let spawn_worker = |id: usize| -> bool {
                let tasks = task_rx.clone();
                let events = event_tx.clone();
                let max_tasks = self.pool.max_tasks_per_worker;
                let metric = self.metric_name.as_str();
                let exporter = self.exporter.as_ref();
                thread::Builder::new()
                    .name(format!("tuner-worker-{id}"))
                    .spawn_scoped(scope, move || {
                        worker_loop(factory, instances, tasks, events, max_tasks, metric, exporter)
                    })
                    .map_err(|e| warn!("Could not spawn worker {}: {}", id, e))
                    .is_ok()
            };

            let mut live = 0;
            let mut next_id = 0;
            while next_id < workers {
                live += usize::from(spawn_worker(next_id));
                next_id += 1;
            }

            while live > 0 {
                match event_rx.recv() {
                    Ok(WorkerEvent::Finished(outcome)) => outcomes.push(outcome),
                    Ok(WorkerEvent::Retired) => {
                        live -= 1;
                        if !task_rx.is_empty() {
                            debug!("Recycling worker, {} tasks left", task_rx.len());
                            live += usize::from(spawn_worker(next_id));
                            next_id += 1;
                        }
                    }
                    Err(_) => break,
                }
            }
        });

        outcomes
    }
}

fn worker_loop<F: SolverFactory>(
    factory: &F,
    instances: &[Instance<F::Payload>],
    tasks: Receiver<&Task>,
    events: Sender<WorkerEvent>,
    max_tasks: usize,
    metric: &str,
    exporter: Option<&SnapshotExporter>,
) {
    let guard = RetireGuard(events);
    for task in tasks.iter().take(max_tasks) {
        let result = evaluate(factory, &instances[task.instance], &task.config, metric, exporter);
        let _ = guard.0.send(WorkerEvent::Finished(Outcome {
            seq: task.seq,
            result,
        }));
    }
}

/// Build, run and score one solver. Panics inside the solver become
/// [`EvaluationError::Panicked`].
fn evaluate<F: SolverFactory>(
    factory: &F,
    instance: &Instance<F::Payload>,
    config: &Configuration,
    metric: &str,
    exporter: Option<&SnapshotExporter>,
) -> Result<f64, EvaluationError> {
    let run = panic::catch_unwind(AssertUnwindSafe(|| -> Result<f64, EvaluationError> {
        let mut solver = factory.build(&instance.payload, config)?;
        solver.run()?;
        let value = solver
            .metric(metric)
            .ok_or_else(|| EvaluationError::MissingMetric {
                metric: metric.to_string(),
            })?;
        if !value.is_finite() {
            return Err(EvaluationError::SolverFailed {
                message: format!("metric {metric} is not finite: {value}"),
            });
        }
        if let Some(exporter) = exporter {
            exporter.persist(instance.id, config, &solver);
        }
        Ok(value)
    }));

    run.unwrap_or_else(|payload| {
        Err(EvaluationError::Panicked {
            message: panic_message(payload.as_ref()),
        })
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
