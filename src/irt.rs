//! Pure 3PL (three-parameter logistic) IRT routines.
//!
//! Everything in this module is a total function over its documented domain.
//! Degenerate statistical regions produce fallback values (zero information,
//! unit standard error) rather than errors, so a session always keeps moving.
//! Callers are responsible for validating item parameters (`a > 0`,
//! `0 <= c < 1`) before handing them in.

use crate::types::ItemParameters;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Maximum Newton-Raphson steps per ability update.
pub const MAX_NEWTON_ITERATIONS: usize = 10;
/// Convergence tolerance on the theta step.
pub const THETA_TOLERANCE: f64 = 1e-3;
/// Second-derivative magnitude below which an update aborts.
pub const CURVATURE_FLOOR: f64 = 1e-4;
/// Standard error reported when information is degenerate.
pub const DEFAULT_STANDARD_ERROR: f64 = 1.0;
/// Ability estimates are kept inside the calibration range.
pub const THETA_MIN: f64 = -6.0;
/// See [`THETA_MIN`].
pub const THETA_MAX: f64 = 6.0;

const MIN_EMPIRICAL_RATE: f64 = 0.01;
const MAX_EMPIRICAL_RATE: f64 = 0.99;

/// Probability of a correct response under the 3PL model.
///
/// P(θ) = c + (1-c) / (1 + e^{-a(θ-b)})
pub fn probability_correct(theta: f64, params: &ItemParameters) -> f64 {
    let z = params.discrimination * (theta - params.difficulty);
    params.guessing + (1.0 - params.guessing) / (1.0 + (-z).exp())
}

/// Fisher information the item carries about θ.
///
/// Uses the 3PL closed form
///
/// I(θ) = a² · (q/p) · ((p-c) / (1-c))²
///
/// which peaks near θ = b and vanishes far from it. Returns 0 in the
/// numerically degenerate region (p ≤ c or p ≥ 1) instead of dividing by
/// values indistinguishable from zero.
pub fn fisher_information(theta: f64, params: &ItemParameters) -> f64 {
    let a = params.discrimination;
    let c = params.guessing;
    let p = probability_correct(theta, params);
    let q = 1.0 - p;
    if p <= c || p >= 1.0 {
        return 0.0;
    }
    // Grouped so every intermediate stays in [0, 1]; q/p alone can overflow
    // when p is subnormal.
    let numerator = (p - c) * (p - c) * q;
    let denominator = (1.0 - c) * (1.0 - c) * p;
    a * a * numerator / denominator
}

/// Result of a single-response Newton-Raphson ability update.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EstimateUpdate {
    pub theta: f64,
    pub standard_error: f64,
    /// False when the iteration cap was exhausted before the step tolerance.
    pub converged: bool,
}

/// Ability estimate refolded from a full response history.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AbilityEstimate {
    pub theta: f64,
    pub standard_error: f64,
    /// Fisher information accumulated along the refold path.
    pub total_information: f64,
}

/// One ability update from a single scored response.
///
/// Runs a capped Newton-Raphson sequence on the response log-likelihood,
/// using the expected information as the negative second derivative. The
/// update aborts when the curvature drops below [`CURVATURE_FLOOR`], and the
/// iterate is clamped to the calibration range. The reported
/// standard error is 1/√I at the updated theta, or
/// [`DEFAULT_STANDARD_ERROR`] when information is degenerate.
pub fn update_estimate(theta: f64, is_correct: bool, params: &ItemParameters) -> EstimateUpdate {
    let a = params.discrimination;
    let c = params.guessing;
    let mut est = theta;
    let mut converged = false;

    for _ in 0..MAX_NEWTON_ITERATIONS {
        let info = fisher_information(est, params);
        if info < CURVATURE_FLOOR {
            // Curvature too flat for a meaningful step; keep the iterate.
            converged = true;
            break;
        }
        let z = a * (est - params.difficulty);
        let u = 1.0 / (1.0 + (-z).exp());
        let p = c + (1.0 - c) * u;
        let slope = a * (1.0 - c) * u * (1.0 - u);
        let first = if is_correct {
            slope / p
        } else {
            -slope / (1.0 - p)
        };
        let delta = first / -info;
        est = (est - delta).clamp(THETA_MIN, THETA_MAX);
        if delta.abs() < THETA_TOLERANCE {
            converged = true;
            break;
        }
    }

    if !converged {
        warn!(
            theta = est,
            "ability update hit the Newton-Raphson iteration cap before converging"
        );
    }

    let info = fisher_information(est, params);
    let standard_error = if info > 0.0 {
        1.0 / info.sqrt()
    } else {
        DEFAULT_STANDARD_ERROR
    };

    EstimateUpdate {
        theta: est,
        standard_error,
        converged,
    }
}

/// Re-estimate ability from a complete response history.
///
/// Folds [`update_estimate`] from θ = 0 over the history in administration
/// order, accumulating Fisher information at each step's updated theta. The
/// standard error is 1/√(ΣI). This deliberately refolds the whole history
/// instead of trusting a session's running estimate: sequential single
/// response updates accumulate floating drift, and a clean refold gives a
/// stable, reproducible final value.
pub fn reestimate_from_history(history: &[(bool, ItemParameters)]) -> AbilityEstimate {
    let mut theta = 0.0;
    let mut total_information = 0.0;

    for (is_correct, params) in history {
        let update = update_estimate(theta, *is_correct, params);
        theta = update.theta;
        total_information += fisher_information(theta, params);
    }

    let standard_error = if total_information > 0.0 {
        1.0 / total_information.sqrt()
    } else {
        DEFAULT_STANDARD_ERROR
    };

    AbilityEstimate {
        theta,
        standard_error,
        total_information,
    }
}

/// Seed an initial ability from prior correctness outcomes.
///
/// Empirical logit of the historical correct rate, with the rate clamped to
/// [0.01, 0.99] to avoid infinities. An empty history yields the neutral
/// prior θ = 0.
pub fn estimate_initial_ability(prior_outcomes: &[bool]) -> f64 {
    if prior_outcomes.is_empty() {
        return 0.0;
    }
    let correct = prior_outcomes.iter().filter(|c| **c).count();
    let rate = (correct as f64 / prior_outcomes.len() as f64)
        .clamp(MIN_EMPIRICAL_RATE, MAX_EMPIRICAL_RATE);
    (rate / (1.0 - rate)).ln()
}
