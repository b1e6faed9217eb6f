//! Tunes a noisy mock heuristic on three instances of very different scale.
//!
//! ```text
//! RUST_LOG=rtt_tuner=debug cargo run -p rtt-tuner --example tune_mock_solver
//! ```

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde_json::json;
use tracing_subscriber::EnvFilter;

use rtt_tuner::rtt_types::{
    Configuration, DomainSpec, EvaluationError, Solver, SolverFactory, TunerConfig,
};
use rtt_tuner::RegressionTreeParameterTuner;

/// Instance scale and noise seed.
struct Workload {
    scale: f64,
    seed: u64,
}

struct MockHeuristic;

struct MockRun {
    temperature: f64,
    geometric: bool,
    moves: Vec<String>,
    rng: ChaCha8Rng,
    scale: f64,
    cost: Option<f64>,
}

impl Solver for MockRun {
    fn run(&mut self) -> Result<(), EvaluationError> {
        let mut cost = (self.temperature - 1.5).powi(2);
        if !self.geometric {
            cost += 0.8;
        }
        if !self.moves.iter().any(|m| m == "shift") {
            cost += 0.5;
        }
        cost += self.rng.random::<f64>() * 0.2;
        self.cost = Some(self.scale * cost);
        Ok(())
    }

    fn metric(&self, name: &str) -> Option<f64> {
        if name == "value" {
            self.cost
        } else {
            None
        }
    }

    fn solution(&self) -> Option<serde_json::Value> {
        Some(json!({ "moves": self.moves }))
    }
}

impl SolverFactory for MockHeuristic {
    type Payload = Workload;
    type Solver = MockRun;

    fn build(&self, workload: &Workload, config: &Configuration) -> Result<MockRun, EvaluationError> {
        let invalid = |key: &str| EvaluationError::SolverFailed {
            message: format!("missing or invalid {key}"),
        };
        let temperature = config
            .get("temperature")
            .and_then(|v| v.as_f64())
            .ok_or_else(|| invalid("temperature"))?;
        let cooling = config
            .get("cooling")
            .and_then(|v| v.as_str())
            .ok_or_else(|| invalid("cooling"))?;
        let moves = config
            .get("moves")
            .and_then(|v| v.as_array())
            .ok_or_else(|| invalid("moves"))?
            .iter()
            .filter_map(|m| m.as_str().map(str::to_string))
            .collect();

        let noise_seed = workload.seed ^ temperature.to_bits();
        Ok(MockRun {
            temperature,
            geometric: cooling == "geometric",
            moves,
            rng: ChaCha8Rng::seed_from_u64(noise_seed),
            scale: workload.scale,
            cost: None,
        })
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let domains = DomainSpec::from_json(json!({
        "temperature": [0.1, 5.0],
        "cooling": {"tuple": ["linear", "geometric"]},
        "moves": ["swap", "shift", "reverse"],
    }))?;

    let base = json!({"max_iterations": 500}).as_object().cloned().unwrap_or_default();
    let config = TunerConfig::new("value")
        .with_base_config(base)
        .with_samples(200, 40)
        .with_pool(0, 5, 50)
        .with_seed(7)
        .with_max_rounds(25);

    let workloads = [
        Workload { scale: 1.0, seed: 1 },
        Workload { scale: 250.0, seed: 2 },
        Workload { scale: 10_000.0, seed: 3 },
    ];

    let mut tuner = RegressionTreeParameterTuner::new(MockHeuristic, workloads, domains, config)?;
    let tuned = tuner.tune()?;

    println!("Tuned after {} rounds ({} evaluations):", tuner.rounds(), tuner.history().len());
    for (name, domain) in &tuned {
        println!("  {name}: {}", serde_json::to_string(domain)?);
    }
    Ok(())
}
