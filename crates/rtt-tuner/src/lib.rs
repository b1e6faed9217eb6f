//! # rtt-tuner
//!
//! Regression-tree guided parameter tuning for stochastic heuristics.
//!
//! The tuner samples random configurations of a heuristic across a set of
//! problem instances, scores every run against its own instance with a
//! modified z-score, fits a regression tree on the encoded configurations
//! and tightens each parameter's domain along the path to the best leaf.
//! Rounds repeat until two successive narrowed domains agree.

mod attribute;
mod convergence;
mod export;
mod history;
mod kwargs;
mod narrow;
mod normalize;
mod runner;
mod surrogate;
mod tuner;

pub use attribute::{Attribute, Bounds, CategoricalAttribute, NumAttribute};
pub use convergence::{ConvergenceChecker, STABLE_RATIO};
pub use export::SnapshotExporter;
pub use history::History;
pub use kwargs::KwargsManager;
pub use narrow::{DomainNarrower, NarrowedDomain};
pub use normalize::{median, PerformanceNormalizer, MODIFIED_Z_SCALE};
pub use runner::ParallelBatchRunner;
pub use surrogate::{CartFitter, RegressionTree, SurrogateFitter, TreeNode};
pub use tuner::RegressionTreeParameterTuner;

pub use rtt_types;
