//! Property-based tests for the engine's numerical guarantees.
//!
//! These tests verify the invariants the adaptive loop leans on:
//!
//! - Ability updates move toward the evidence
//! - Fisher information is never negative
//! - Refolding a response history is deterministic
//! - The scaled score is monotone in theta and stays on the scale
//! - The stopping rule always fires by the item cap

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use crate::controller::{evaluate_stopping, EngineConfig, StoppingDecision};
    use crate::irt::{
        fisher_information, probability_correct, reestimate_from_history, update_estimate,
    };
    use crate::report::scaled_score;
    use crate::types::ItemParameters;

    // Calibrated parameter ranges seen in practice.
    fn item_params() -> impl Strategy<Value = ItemParameters> {
        (-3.0..3.0f64, 0.5..2.5f64, 0.0..0.3f64)
            .prop_map(|(b, a, c)| ItemParameters::new(b, a, c))
    }

    fn theta_range() -> impl Strategy<Value = f64> {
        -4.0..4.0f64
    }

    proptest! {
        /// A correct response never lowers the ability estimate.
        #[test]
        fn correct_response_never_lowers_theta(
            theta in theta_range(),
            params in item_params()
        ) {
            let update = update_estimate(theta, true, &params);
            prop_assert!(update.theta >= theta);
        }

        /// An incorrect response never raises the ability estimate.
        #[test]
        fn incorrect_response_never_raises_theta(
            theta in theta_range(),
            params in item_params()
        ) {
            let update = update_estimate(theta, false, &params);
            prop_assert!(update.theta <= theta);
        }

        /// The updated standard error is always positive.
        #[test]
        fn standard_error_is_positive(
            theta in theta_range(),
            is_correct in any::<bool>(),
            params in item_params()
        ) {
            let update = update_estimate(theta, is_correct, &params);
            prop_assert!(update.standard_error > 0.0);
        }

        /// Fisher information is non-negative everywhere.
        #[test]
        fn information_is_non_negative(
            theta in -10.0..10.0f64,
            params in item_params()
        ) {
            prop_assert!(fisher_information(theta, &params) >= 0.0);
        }

        /// The response probability respects the guessing floor.
        #[test]
        fn probability_stays_in_range(
            theta in -8.0..8.0f64,
            params in item_params()
        ) {
            let p = probability_correct(theta, &params);
            prop_assert!(p >= params.guessing);
            prop_assert!(p <= 1.0);
        }

        /// Identical response sequences refold to identical estimates.
        #[test]
        fn refold_is_deterministic(
            history in prop::collection::vec((any::<bool>(), item_params()), 1..30)
        ) {
            let first = reestimate_from_history(&history);
            let second = reestimate_from_history(&history);
            prop_assert!((first.theta - second.theta).abs() < 1e-9);
            prop_assert!((first.standard_error - second.standard_error).abs() < 1e-9);
        }

        /// The scaled score never decreases as theta grows.
        #[test]
        fn scaled_score_is_monotone(
            low in -6.0..6.0f64,
            delta in 0.0..6.0f64
        ) {
            prop_assert!(scaled_score(low) <= scaled_score(low + delta));
        }

        /// The scaled score always lands on the reportable scale.
        #[test]
        fn scaled_score_stays_on_scale(theta in -100.0..100.0f64) {
            let score = scaled_score(theta);
            prop_assert!((150..=850).contains(&score));
        }

        /// Whatever the standard-error trace looks like, the stopping rule
        /// terminates a session at the item cap.
        #[test]
        fn stopping_rule_fires_by_the_cap(
            se_trace in prop::collection::vec(0.05..3.0f64, 25)
        ) {
            let config = EngineConfig::default();
            let decision = evaluate_stopping(&config, 25, se_trace[24], &se_trace);
            prop_assert_eq!(decision, StoppingDecision::MaxItems);
        }
    }
}
