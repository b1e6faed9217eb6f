//! Regression-tree surrogate.
//!
//! The narrower only needs the fitted tree's structure, so the tree is an
//! explicit arena of [`TreeNode`]s and fitting sits behind the
//! [`SurrogateFitter`] trait. [`CartFitter`] is the default fitter: a
//! variance-minimizing CART with no depth limit.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use rtt_types::{SurrogateError, TreeSettings};

/// A node of the regression tree (arena-allocated, root at index 0).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TreeNode {
    Leaf {
        /// Mean target of the training rows reaching this leaf.
        value: f64,
        n_samples: usize,
    },
    /// Rows with `x[feature] <= threshold` go left, the rest go right.
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
        n_samples: usize,
    },
}

/// A fitted regression tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    nodes: Vec<TreeNode>,
}

impl RegressionTree {
    /// Wrap nodes produced by an external fitting routine.
    ///
    /// Children must be stored after their parent, which rules out cycles.
    pub fn from_nodes(nodes: Vec<TreeNode>) -> Result<Self, SurrogateError> {
        if nodes.is_empty() {
            return Err(SurrogateError::MalformedTree {
                node: 0,
                reason: "tree has no nodes".to_string(),
            });
        }
        for (idx, node) in nodes.iter().enumerate() {
            if let TreeNode::Split { left, right, .. } = *node {
                for child in [left, right] {
                    if child <= idx || child >= nodes.len() {
                        return Err(SurrogateError::MalformedTree {
                            node: idx,
                            reason: format!("invalid child index {child}"),
                        });
                    }
                }
            }
        }
        Ok(Self { nodes })
    }

    pub fn nodes(&self) -> &[TreeNode] {
        &self.nodes
    }

    pub fn node(&self, idx: usize) -> &TreeNode {
        &self.nodes[idx]
    }

    pub fn root(&self) -> usize {
        0
    }

    pub fn leaf_count(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| matches!(n, TreeNode::Leaf { .. }))
            .count()
    }

    /// Predicted target for one encoded configuration, or `None` when the
    /// row lacks a feature the tree splits on.
    pub fn predict(&self, row: &[f64]) -> Option<f64> {
        let mut idx = self.root();
        loop {
            match self.nodes[idx] {
                TreeNode::Leaf { value, .. } => return Some(value),
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                    ..
                } => {
                    idx = if *row.get(feature)? <= threshold { left } else { right };
                }
            }
        }
    }
}

/// Pluggable tree-fitting capability.
pub trait SurrogateFitter: Send + Sync {
    fn fit(&self, rows: &[Vec<f64>], targets: &[f64]) -> Result<RegressionTree, SurrogateError>;
}

/// Deterministic variance-minimizing CART.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CartFitter {
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
}

impl Default for CartFitter {
    fn default() -> Self {
        Self::from(&TreeSettings::default())
    }
}

impl From<&TreeSettings> for CartFitter {
    fn from(settings: &TreeSettings) -> Self {
        Self {
            min_samples_split: settings.min_samples_split,
            min_samples_leaf: settings.min_samples_leaf,
        }
    }
}

/// Best split found for one feature.
#[derive(Debug, Clone, Copy)]
struct Candidate {
    gain: f64,
    feature: usize,
    threshold: f64,
}

impl Candidate {
    /// Higher gain wins; equal gains keep the lower feature index.
    fn better(self, other: Self) -> Self {
        if other.gain > self.gain || (other.gain == self.gain && other.feature < self.feature) {
            other
        } else {
            self
        }
    }
}

impl SurrogateFitter for CartFitter {
    fn fit(&self, rows: &[Vec<f64>], targets: &[f64]) -> Result<RegressionTree, SurrogateError> {
        if rows.len() != targets.len() {
            return Err(SurrogateError::TargetLengthMismatch {
                rows: rows.len(),
                targets: targets.len(),
            });
        }
        let required = self.min_samples_split.max(2);
        if rows.len() < required {
            return Err(SurrogateError::InsufficientSamples {
                samples: rows.len(),
                required,
            });
        }
        let n_features = rows[0].len();
        if let Some((row, r)) = rows.iter().enumerate().find(|(_, r)| r.len() != n_features) {
            return Err(SurrogateError::DimensionMismatch {
                expected: n_features,
                got: r.len(),
                row,
            });
        }
        if targets.iter().all(|t| *t == targets[0]) {
            return Err(SurrogateError::DegenerateTarget);
        }

        let mut nodes = Vec::new();
        let indices: Vec<usize> = (0..rows.len()).collect();
        self.build_node(&mut nodes, rows, targets, indices, n_features);
        Ok(RegressionTree { nodes })
    }
}

impl CartFitter {
    pub fn new(min_samples_split: usize, min_samples_leaf: usize) -> Self {
        Self {
            min_samples_split,
            min_samples_leaf,
        }
    }

    fn build_node(
        &self,
        nodes: &mut Vec<TreeNode>,
        rows: &[Vec<f64>],
        targets: &[f64],
        indices: Vec<usize>,
        n_features: usize,
    ) -> usize {
        let n = indices.len();
        let mean = indices.iter().map(|&i| targets[i]).sum::<f64>() / n as f64;
        let idx = nodes.len();
        nodes.push(TreeNode::Leaf {
            value: mean,
            n_samples: n,
        });

        if n < self.min_samples_split || n < 2 * self.min_samples_leaf {
            return idx;
        }
        let total_var: f64 = indices.iter().map(|&i| (targets[i] - mean).powi(2)).sum();
        if total_var == 0.0 {
            return idx;
        }

        let best = (0..n_features)
            .into_par_iter()
            .filter_map(|feature| self.best_split(rows, targets, &indices, feature, total_var))
            .reduce_with(Candidate::better);

        let Some(best) = best.filter(|c| c.gain > 0.0) else {
            return idx;
        };

        let (left_indices, right_indices): (Vec<usize>, Vec<usize>) = indices
            .into_iter()
            .partition(|&i| rows[i][best.feature] <= best.threshold);

        if left_indices.is_empty() || right_indices.is_empty() {
            return idx;
        }

        let left = self.build_node(nodes, rows, targets, left_indices, n_features);
        let right = self.build_node(nodes, rows, targets, right_indices, n_features);
        nodes[idx] = TreeNode::Split {
            feature: best.feature,
            threshold: best.threshold,
            left,
            right,
            n_samples: n,
        };
        idx
    }

    /// Sorted sweep over one feature with running sums.
    fn best_split(
        &self,
        rows: &[Vec<f64>],
        targets: &[f64],
        indices: &[usize],
        feature: usize,
        total_var: f64,
    ) -> Option<Candidate> {
        let n = indices.len();
        let mut sorted: Vec<(f64, f64)> = indices
            .iter()
            .map(|&i| (rows[i][feature], targets[i]))
            .collect();
        sorted.sort_by(|a, b| a.0.total_cmp(&b.0));

        let total_sum: f64 = sorted.iter().map(|(_, y)| y).sum();
        let total_sq: f64 = sorted.iter().map(|(_, y)| y * y).sum();
        let (mut l_sum, mut l_sq) = (0.0, 0.0);
        let mut best: Option<Candidate> = None;

        for k in 0..n - 1 {
            let (x, y) = sorted[k];
            l_sum += y;
            l_sq += y * y;

            let next = sorted[k + 1].0;
            if x == next {
                continue;
            }
            let l_n = k + 1;
            let r_n = n - l_n;
            if l_n < self.min_samples_leaf || r_n < self.min_samples_leaf {
                continue;
            }

            let r_sum = total_sum - l_sum;
            let r_sq = total_sq - l_sq;
            let l_var = l_sq - l_sum * l_sum / l_n as f64;
            let r_var = r_sq - r_sum * r_sum / r_n as f64;
            let gain = total_var - l_var - r_var;

            if best.map_or(true, |b| gain > b.gain) {
                let mut threshold = x + (next - x) / 2.0;
                if threshold >= next {
                    threshold = x;
                }
                best = Some(Candidate {
                    gain,
                    feature,
                    threshold,
                });
            }
        }
        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    fn step_data(n: usize) -> (Vec<Vec<f64>>, Vec<f64>) {
        let rows: Vec<Vec<f64>> = (0..n).map(|i| vec![i as f64 / n as f64]).collect();
        let targets = rows
            .iter()
            .map(|r| if r[0] < 0.5 { 0.0 } else { 1.0 })
            .collect();
        (rows, targets)
    }

    #[test]
    fn learns_a_step() {
        let (rows, targets) = step_data(40);
        let tree = CartFitter::new(4, 2).fit(&rows, &targets).unwrap();

        match tree.node(tree.root()) {
            TreeNode::Split {
                feature, threshold, ..
            } => {
                assert_eq!(*feature, 0);
                assert!(*threshold > 0.47 && *threshold < 0.5, "threshold {threshold}");
            }
            other => panic!("expected split at root, got {other:?}"),
        }
        assert_eq!(tree.leaf_count(), 2);
        assert_eq!(tree.predict(&[0.1]), Some(0.0));
        assert_eq!(tree.predict(&[0.9]), Some(1.0));
    }

    #[test]
    fn leaves_respect_min_samples_leaf() {
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        let rows: Vec<Vec<f64>> = (0..300)
            .map(|_| vec![rng.random::<f64>(), rng.random::<f64>()])
            .collect();
        let targets: Vec<f64> = rows
            .iter()
            .map(|r| (r[0] - 0.3).abs() + rng.random::<f64>() * 0.05)
            .collect();

        let tree = CartFitter::new(20, 10).fit(&rows, &targets).unwrap();
        assert!(tree.leaf_count() > 1);
        for node in tree.nodes() {
            if let TreeNode::Leaf { n_samples, .. } = node {
                assert!(*n_samples >= 10);
            }
        }
    }

    #[test]
    fn prefers_informative_feature() {
        let mut rng = ChaCha8Rng::seed_from_u64(4);
        let rows: Vec<Vec<f64>> = (0..200)
            .map(|_| vec![rng.random::<f64>(), rng.random::<f64>(), rng.random::<f64>()])
            .collect();
        let targets: Vec<f64> = rows.iter().map(|r| if r[2] > 0.6 { 5.0 } else { 0.0 }).collect();

        let tree = CartFitter::default().fit(&rows, &targets).unwrap();
        assert!(matches!(tree.node(0), TreeNode::Split { feature: 2, .. }));
    }

    #[test]
    fn fitting_is_deterministic() {
        let mut rng = ChaCha8Rng::seed_from_u64(21);
        let rows: Vec<Vec<f64>> = (0..150)
            .map(|_| vec![rng.random::<f64>(), (rng.random::<f64>()).round()])
            .collect();
        let targets: Vec<f64> = rows.iter().map(|r| r[0] * 2.0 + r[1]).collect();

        let fitter = CartFitter::default();
        assert_eq!(
            fitter.fit(&rows, &targets).unwrap(),
            fitter.fit(&rows, &targets).unwrap()
        );
    }

    #[test]
    fn too_few_samples_is_an_error() {
        let (rows, targets) = step_data(10);
        let err = CartFitter::new(20, 10).fit(&rows, &targets).unwrap_err();
        assert_eq!(
            err,
            SurrogateError::InsufficientSamples {
                samples: 10,
                required: 20
            }
        );
    }

    #[test]
    fn constant_target_is_an_error() {
        let rows: Vec<Vec<f64>> = (0..30).map(|i| vec![i as f64]).collect();
        let targets = vec![0.0; 30];
        assert_eq!(
            CartFitter::default().fit(&rows, &targets).unwrap_err(),
            SurrogateError::DegenerateTarget
        );
    }

    #[test]
    fn ragged_rows_are_an_error() {
        let mut rows: Vec<Vec<f64>> = (0..30).map(|i| vec![i as f64, 0.0]).collect();
        rows[7] = vec![1.0];
        let targets: Vec<f64> = (0..30).map(f64::from).collect();
        assert_eq!(
            CartFitter::default().fit(&rows, &targets).unwrap_err(),
            SurrogateError::DimensionMismatch {
                expected: 2,
                got: 1,
                row: 7
            }
        );
    }

    #[test]
    fn from_nodes_validates_children() {
        let ok = RegressionTree::from_nodes(vec![
            TreeNode::Split {
                feature: 0,
                threshold: 0.5,
                left: 1,
                right: 2,
                n_samples: 20,
            },
            TreeNode::Leaf {
                value: -1.0,
                n_samples: 10,
            },
            TreeNode::Leaf {
                value: 1.0,
                n_samples: 10,
            },
        ]);
        let tree = ok.unwrap();
        assert_eq!(tree.predict(&[0.2]), Some(-1.0));
        assert_eq!(tree.predict(&[]), None);

        let cyclic = RegressionTree::from_nodes(vec![TreeNode::Split {
            feature: 0,
            threshold: 0.5,
            left: 0,
            right: 0,
            n_samples: 1,
        }]);
        assert!(matches!(cyclic, Err(SurrogateError::MalformedTree { node: 0, .. })));
        assert!(RegressionTree::from_nodes(Vec::new()).is_err());
    }
}
