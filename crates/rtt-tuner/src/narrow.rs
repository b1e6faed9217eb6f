//! Best-leaf domain extraction.
//!
//! Walks a fitted [`RegressionTree`] and follows, at every split, the child
//! with the smaller resolved value. Each split on the chosen path tightens
//! one bound of its feature. Leaves resolve before their ancestors, so the
//! deepest constraint on a bound wins and shallower ones on the same bound
//! are dropped.

use tracing::debug;

use rtt_types::SurrogateError;

use crate::kwargs::KwargsManager;
use crate::surrogate::{RegressionTree, TreeNode};

/// Narrowed manager together with the value of the leaf it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct NarrowedDomain {
    pub best_leaf_value: f64,
    pub manager: KwargsManager,
}

/// Pending bound updates for one attribute.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct Tightening {
    lower: Option<f64>,
    upper: Option<f64>,
}

pub struct DomainNarrower;

impl DomainNarrower {
    /// Tighten `manager` along the best-leaf path of `tree`.
    ///
    /// Thresholds are clamped into the manager's current ranges, so a bound
    /// can only move inward.
    pub fn narrow(
        tree: &RegressionTree,
        mut manager: KwargsManager,
    ) -> Result<NarrowedDomain, SurrogateError> {
        let (best_leaf_value, tightenings) = Self::resolve(tree, tree.root(), manager.len())?;

        for (attr, tightening) in manager.attributes_mut().iter_mut().zip(tightenings) {
            let range = attr.range_mut();
            if let Some(lower) = tightening.lower {
                range.low = lower.clamp(range.low, range.high);
            }
            if let Some(upper) = tightening.upper {
                range.high = upper.clamp(range.low, range.high);
            }
            if tightening != Tightening::default() {
                debug!(
                    "Narrowed {} to [{}, {}]",
                    attr.dummy_name(),
                    attr.range().low,
                    attr.range().high
                );
            }
        }

        Ok(NarrowedDomain {
            best_leaf_value,
            manager,
        })
    }

    fn resolve(
        tree: &RegressionTree,
        idx: usize,
        n_features: usize,
    ) -> Result<(f64, Vec<Tightening>), SurrogateError> {
        match *tree.node(idx) {
            TreeNode::Leaf { value, .. } => Ok((value, vec![Tightening::default(); n_features])),
            TreeNode::Split {
                feature,
                threshold,
                left,
                right,
                ..
            } => {
                if feature >= n_features {
                    return Err(SurrogateError::MalformedTree {
                        node: idx,
                        reason: format!("feature {feature} outside {n_features} attributes"),
                    });
                }
                let (left_value, mut left_tight) = Self::resolve(tree, left, n_features)?;
                let (right_value, mut right_tight) = Self::resolve(tree, right, n_features)?;

                // minimization; equal values go right
                if left_value < right_value {
                    left_tight[feature].upper.get_or_insert(threshold);
                    Ok((left_value, left_tight))
                } else {
                    right_tight[feature].lower.get_or_insert(threshold);
                    Ok((right_value, right_tight))
                }
            }
        }
    }
}
