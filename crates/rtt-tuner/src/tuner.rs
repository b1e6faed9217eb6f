//! The regression-tree guided tuning loop.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info, warn};

use rtt_types::{
    config_error, DomainSpec, Instance, SolverFactory, TunedDomains, TunerConfig, TunerResult,
};

use crate::convergence::ConvergenceChecker;
use crate::history::History;
use crate::kwargs::KwargsManager;
use crate::narrow::{DomainNarrower, NarrowedDomain};
use crate::normalize::PerformanceNormalizer;
use crate::runner::ParallelBatchRunner;
use crate::surrogate::{CartFitter, RegressionTree, SurrogateFitter};

/// Loop states. Every transition happens on the orchestrating thread.
enum Phase {
    Init,
    WarmStart(KwargsManager),
    Refit,
    Narrow(RegressionTree),
    Check(NarrowedDomain),
    Done(TunedDomains),
}

/// Narrows the value domains of a heuristic's parameters toward the region
/// where it performs best across a set of problem instances.
pub struct RegressionTreeParameterTuner<F: SolverFactory, S: SurrogateFitter = CartFitter> {
    factory: F,
    instances: Vec<Instance<F::Payload>>,
    domain_spec: DomainSpec,
    config: TunerConfig,
    fitter: S,
    runner: ParallelBatchRunner,
    history: History,
    targets: Vec<f64>,
    incumbent: Option<KwargsManager>,
    rounds: usize,
}

impl<F: SolverFactory> RegressionTreeParameterTuner<F> {
    pub fn new(
        factory: F,
        payloads: impl IntoIterator<Item = F::Payload>,
        domain_spec: DomainSpec,
        config: TunerConfig,
    ) -> TunerResult<Self> {
        config.validate()?;
        KwargsManager::fit(&domain_spec)?;

        let instances = Instance::enumerate(payloads);
        if instances.is_empty() {
            return Err(config_error!("instances", "at least one instance is required").into());
        }

        Ok(Self {
            fitter: CartFitter::from(&config.tree),
            runner: ParallelBatchRunner::new(&config),
            factory,
            instances,
            domain_spec,
            config,
            history: History::new(),
            targets: Vec::new(),
            incumbent: None,
            rounds: 0,
        })
    }
}

impl<F: SolverFactory, S: SurrogateFitter> RegressionTreeParameterTuner<F, S> {
    /// Replace the surrogate fitting routine.
    pub fn with_surrogate<T: SurrogateFitter>(self, fitter: T) -> RegressionTreeParameterTuner<F, T> {
        RegressionTreeParameterTuner {
            factory: self.factory,
            instances: self.instances,
            domain_spec: self.domain_spec,
            config: self.config,
            fitter,
            runner: self.runner,
            history: self.history,
            targets: self.targets,
            incumbent: self.incumbent,
            rounds: self.rounds,
        }
    }

    /// Run the loop to convergence and return the incumbent's domains.
    ///
    /// Each call starts over with an empty history.
    pub fn tune(&mut self) -> TunerResult<TunedDomains> {
        let mut rng = match self.config.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_os_rng(),
        };

        let mut phase = Phase::Init;
        loop {
            phase = match phase {
                Phase::Init => {
                    self.history.clear();
                    self.targets.clear();
                    self.incumbent = None;
                    self.rounds = 0;
                    Phase::WarmStart(KwargsManager::fit(&self.domain_spec)?)
                }
                Phase::WarmStart(manager) => {
                    info!(
                        "Warm start: {} samples over {} instances",
                        self.config.n_init_pop,
                        self.instances.len()
                    );
                    self.runner.solve_instances(
                        &self.factory,
                        &self.instances,
                        &manager,
                        self.config.n_init_pop,
                        &mut rng,
                        &mut self.history,
                    )?;
                    Phase::Refit
                }
                Phase::Refit => {
                    self.targets = PerformanceNormalizer::normalize_history(&self.history);
                    let tree = self.fitter.fit(self.history.rows(), &self.targets)?;
                    info!(
                        "Fitted surrogate on {} samples ({} leaves)",
                        self.history.len(),
                        tree.leaf_count()
                    );
                    Phase::Narrow(tree)
                }
                Phase::Narrow(tree) => {
                    self.rounds += 1;
                    let fresh = KwargsManager::fit(&self.domain_spec)?;
                    let candidate = DomainNarrower::narrow(&tree, fresh)?;
                    info!(
                        "Round {}: best leaf value {:.5}",
                        self.rounds, candidate.best_leaf_value
                    );
                    Phase::Check(candidate)
                }
                Phase::Check(candidate) => self.check(candidate, &mut rng)?,
                Phase::Done(domains) => return Ok(domains),
            };
        }
    }

    fn check(&mut self, candidate: NarrowedDomain, rng: &mut ChaCha8Rng) -> TunerResult<Phase> {
        if let Some(incumbent) = &self.incumbent {
            if ConvergenceChecker::has_converged(&candidate.manager, incumbent) {
                info!("Converged after {} rounds", self.rounds);
                return Ok(Phase::Done(incumbent.domains()));
            }
        }

        let incumbent = self.incumbent.insert(candidate.manager);
        debug!("Incumbent domains: {:?}", incumbent.domains());

        if self.config.max_rounds.is_some_and(|cap| self.rounds >= cap) {
            warn!("Stopping after {} rounds without convergence", self.rounds);
            return Ok(Phase::Done(incumbent.domains()));
        }

        self.runner.solve_instances(
            &self.factory,
            &self.instances,
            incumbent,
            self.config.iter,
            rng,
            &mut self.history,
        )?;
        Ok(Phase::Refit)
    }

    /// Manager carrying the tightened ranges of the latest adopted round.
    pub fn incumbent(&self) -> Option<&KwargsManager> {
        self.incumbent.as_ref()
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    /// Normalized targets of the last surrogate fit.
    pub fn targets(&self) -> &[f64] {
        &self.targets
    }

    /// Narrowing rounds completed by the last [`tune`](Self::tune) call.
    pub fn rounds(&self) -> usize {
        self.rounds
    }

    pub fn config(&self) -> &TunerConfig {
        &self.config
    }

    pub fn domain_spec(&self) -> &DomainSpec {
        &self.domain_spec
    }
}
