//! Round-to-round convergence test on narrowed domains.

use tracing::debug;

use crate::kwargs::KwargsManager;

/// Both ratios of a bound pair must exceed this for the bound to be stable.
pub const STABLE_RATIO: f64 = 0.95;

pub struct ConvergenceChecker;

impl ConvergenceChecker {
    /// True when every bound of every attribute is within 5% of the
    /// incumbent's, measured as a ratio in both directions.
    ///
    /// A bound that is zero on both sides is stable; zero on one side only
    /// is not. Managers with different layouts never converge.
    pub fn has_converged(candidate: &KwargsManager, incumbent: &KwargsManager) -> bool {
        if candidate.len() != incumbent.len() {
            return false;
        }

        for (new, old) in candidate.attributes().iter().zip(incumbent.attributes()) {
            let (new_range, old_range) = (new.range(), old.range());
            if !bound_is_stable(new_range.low, old_range.low)
                || !bound_is_stable(new_range.high, old_range.high)
            {
                debug!(
                    "{} still moving: [{}, {}] -> [{}, {}]",
                    new.dummy_name(),
                    old_range.low,
                    old_range.high,
                    new_range.low,
                    new_range.high
                );
                return false;
            }
        }
        true
    }
}

fn bound_is_stable(candidate: f64, incumbent: f64) -> bool {
    match (candidate == 0.0, incumbent == 0.0) {
        (true, true) => true,
        (false, false) => {
            candidate / incumbent > STABLE_RATIO && incumbent / candidate > STABLE_RATIO
        }
        _ => false,
    }
}
