//! Cross-instance score normalization.
//!
//! Objective magnitudes differ between problem instances, so raw values are
//! turned into modified z-scores within each instance cohort before the
//! surrogate sees them.

use tracing::debug;

use crate::history::History;

/// Consistency constant of the modified z-score.
pub const MODIFIED_Z_SCALE: f64 = 0.6745;

/// Stateless normalizer for objective values.
pub struct PerformanceNormalizer;

impl PerformanceNormalizer {
    /// Modified z-scores of one cohort, in input order.
    ///
    /// Scale is the median absolute deviation, falling back to the standard
    /// deviation when the MAD is zero. A cohort without spread scores all
    /// zeros; an empty cohort yields an empty vector.
    pub fn modified_z_scores(values: &[f64]) -> Vec<f64> {
        let Some(center) = median(values) else {
            return Vec::new();
        };

        let deviations: Vec<f64> = values.iter().map(|v| (v - center).abs()).collect();
        let mad = round5(median(&deviations).unwrap_or(0.0));
        if mad != 0.0 {
            return values
                .iter()
                .map(|v| MODIFIED_Z_SCALE * (v - center) / mad)
                .collect();
        }

        let spread = round5(std_dev(values));
        if spread != 0.0 {
            return values
                .iter()
                .map(|v| MODIFIED_Z_SCALE * (v - center) / spread)
                .collect();
        }

        vec![0.0; values.len()]
    }

    /// Normalized training targets for the whole history, each row scored
    /// within its instance cohort. Empty cohorts are skipped.
    pub fn normalize_history(history: &History) -> Vec<f64> {
        let mut scores = vec![0.0; history.len()];
        for (instance_id, rows) in history.cohorts() {
            if rows.is_empty() {
                debug!("Skipping empty cohort for instance {}", instance_id);
                continue;
            }
            let cohort: Vec<f64> = rows.iter().map(|&row| history.values()[row]).collect();
            for (&row, score) in rows.iter().zip(Self::modified_z_scores(&cohort)) {
                scores[row] = score;
            }
        }
        scores
    }
}

/// Median; mean of the two middle elements for even lengths.
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

/// Population standard deviation.
fn std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    (values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n).sqrt()
}

fn round5(value: f64) -> f64 {
    (value * 1e5).round() / 1e5
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn median_odd_and_even() {
        assert_eq!(median(&[3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(&[4.0, 1.0, 3.0, 2.0]), Some(2.5));
        assert_eq!(median(&[]), None);
    }

    #[test]
    fn identical_values_score_zero() {
        let scores = PerformanceNormalizer::modified_z_scores(&[7.0, 7.0, 7.0, 7.0]);
        assert_eq!(scores, vec![0.0; 4]);
    }

    #[test]
    fn empty_cohort_scores_nothing() {
        assert!(PerformanceNormalizer::modified_z_scores(&[]).is_empty());
    }

    #[test]
    fn mad_scaling() {
        // median 3, deviations [2, 1, 0, 1, 2] -> MAD 1
        let scores = PerformanceNormalizer::modified_z_scores(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        let expected = [-1.349, -0.6745, 0.0, 0.6745, 1.349];
        for (s, e) in scores.iter().zip(expected) {
            assert!(approx_eq(*s, e), "{s} != {e}");
        }
    }

    #[test]
    fn falls_back_to_standard_deviation_when_mad_is_zero() {
        // median 1, MAD 0, population std = sqrt(0.8 * 0.2 * 100) = 4
        let values = [1.0, 1.0, 1.0, 1.0, 11.0];
        let scores = PerformanceNormalizer::modified_z_scores(&values);
        assert!(approx_eq(scores[0], 0.0));
        assert!(approx_eq(scores[4], MODIFIED_Z_SCALE * 10.0 / 4.0));
    }

    #[test]
    fn spread_preserves_order() {
        let values = [12.0, 3.5, 40.0, 7.25, 3.5, 19.0];
        let scores = PerformanceNormalizer::modified_z_scores(&values);
        assert!(scores.iter().any(|s| *s != 0.0));

        for i in 0..values.len() {
            for j in 0..values.len() {
                if values[i] < values[j] {
                    assert!(scores[i] < scores[j]);
                }
                if values[i] == values[j] {
                    assert_eq!(scores[i], scores[j]);
                }
            }
        }
    }

    #[test]
    fn history_is_normalized_per_cohort() {
        let mut history = History::new();
        // instance 0 lives around 1000, instance 1 around 1
        history.push(0, vec![0.0], 1000.0);
        history.push(1, vec![0.0], 1.0);
        history.push(0, vec![0.0], 1010.0);
        history.push(1, vec![0.0], 2.0);
        history.push(0, vec![0.0], 990.0);
        history.push(1, vec![0.0], 3.0);

        let scores = PerformanceNormalizer::normalize_history(&history);
        let cohort_0 = PerformanceNormalizer::modified_z_scores(&[1000.0, 1010.0, 990.0]);
        let cohort_1 = PerformanceNormalizer::modified_z_scores(&[1.0, 2.0, 3.0]);

        assert_eq!(scores, vec![
            cohort_0[0], cohort_1[0], cohort_0[1], cohort_1[1], cohort_0[2], cohort_1[2],
        ]);
        // both cohorts land on the same scale
        assert!(approx_eq(scores[2], scores[5]));
    }
}
