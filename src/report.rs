//! Final scoring and diagnostic analysis.
//!
//! Runs after a session terminates. Ability is re-estimated from the full
//! response history rather than the session's running estimate, then mapped
//! onto the reportable scale with a 95% confidence interval, a
//! per-competency strength/weakness split, and behavioral diagnostics.

use crate::error::{Error, Result};
use crate::irt;
use crate::types::{
    BehaviorPattern, Diagnostics, DifficultyProgression, FinalReport, Item, Response,
    ScoreInterval, Session,
};
use std::collections::{BTreeMap, BTreeSet};
use tracing::info;

/// Lowest reportable scaled score.
pub const SCALED_SCORE_MIN: f64 = 150.0;
/// Highest reportable scaled score.
pub const SCALED_SCORE_MAX: f64 = 850.0;

const SCALED_SCORE_MEAN: f64 = 500.0;
const SCALED_SCORE_SPREAD: f64 = 110.0;
const CONFIDENCE_Z: f64 = 1.96;

const MIN_COMPETENCY_ATTEMPTS: usize = 2;
const STRENGTH_RATE: f64 = 0.7;
const WEAKNESS_RATE: f64 = 0.4;

const RAPID_RESPONSE_SECONDS: f64 = 30.0;
const RAPID_RUN_LENGTH: usize = 3;
const ALTERNATION_RATE: f64 = 0.6;

/// Map theta onto the reportable scale.
///
/// score = round(clamp(500 + 110·θ, 150, 850))
pub fn scaled_score(theta: f64) -> i32 {
    let raw = SCALED_SCORE_MEAN + theta * SCALED_SCORE_SPREAD;
    raw.clamp(SCALED_SCORE_MIN, SCALED_SCORE_MAX).round() as i32
}

/// Build the final report for a session from its complete response history.
///
/// `responses` pairs each recorded response with the administered item, in
/// administration order. Fails when the session has no recorded responses.
pub fn build_report(session: &Session, responses: &[(Response, Item)]) -> Result<FinalReport> {
    if responses.is_empty() {
        return Err(Error::store(format!(
            "no responses recorded for session {}",
            session.id
        )));
    }

    let history: Vec<(bool, _)> = responses
        .iter()
        .map(|(response, item)| (response.is_correct, item.params))
        .collect();
    let estimate = irt::reestimate_from_history(&history);

    let score = scaled_score(estimate.theta);
    let margin = CONFIDENCE_Z * estimate.standard_error;
    let confidence_interval = ScoreInterval {
        low: scaled_score(estimate.theta - margin),
        high: scaled_score(estimate.theta + margin),
    };

    let (strengths, weaknesses) = classify_competencies(responses);
    let diagnostics = build_diagnostics(responses, estimate.total_information);

    info!(
        session = %session.id,
        theta = estimate.theta,
        standard_error = estimate.standard_error,
        score,
        "final analysis complete"
    );

    Ok(FinalReport {
        session_id: session.id,
        final_theta: estimate.theta,
        standard_error: estimate.standard_error,
        scaled_score: score,
        confidence_interval,
        strengths,
        weaknesses,
        diagnostics,
    })
}

/// Split competency tags into strengths and weaknesses by correct rate.
/// Tags with fewer than two attempts carry too little evidence for either.
fn classify_competencies(responses: &[(Response, Item)]) -> (BTreeSet<String>, BTreeSet<String>) {
    let mut tally: BTreeMap<&str, (usize, usize)> = BTreeMap::new();
    for (response, item) in responses {
        for tag in &item.competency_tags {
            let (correct, total) = tally.entry(tag.as_str()).or_default();
            *total += 1;
            if response.is_correct {
                *correct += 1;
            }
        }
    }

    let mut strengths = BTreeSet::new();
    let mut weaknesses = BTreeSet::new();
    for (tag, (correct, total)) in tally {
        if total < MIN_COMPETENCY_ATTEMPTS {
            continue;
        }
        let rate = correct as f64 / total as f64;
        if rate >= STRENGTH_RATE {
            strengths.insert(tag.to_string());
        } else if rate < WEAKNESS_RATE {
            weaknesses.insert(tag.to_string());
        }
    }
    (strengths, weaknesses)
}

fn build_diagnostics(responses: &[(Response, Item)], total_information: f64) -> Diagnostics {
    let times: Vec<f64> = responses
        .iter()
        .map(|(response, _)| response.response_time_seconds)
        .collect();
    let mean = times.iter().sum::<f64>() / times.len() as f64;
    let variance = times.iter().map(|t| (t - mean).powi(2)).sum::<f64>() / times.len() as f64;

    Diagnostics {
        total_questions: responses.len(),
        correct_answers: responses
            .iter()
            .filter(|(response, _)| response.is_correct)
            .count(),
        average_response_time_seconds: mean,
        response_time_variance: variance,
        difficulty_progression: difficulty_progression(responses),
        adaptive_efficiency: total_information / responses.len() as f64,
        behavior_patterns: behavior_patterns(responses),
    }
}

fn difficulty_progression(responses: &[(Response, Item)]) -> DifficultyProgression {
    let starting = responses[0].1.params.difficulty;
    let ending = responses[responses.len() - 1].1.params.difficulty;
    DifficultyProgression {
        starting_difficulty: starting,
        ending_difficulty: ending,
        adaptation_score: adaptation_score(responses),
    }
}

/// Share of transitions that moved difficulty in the statistically expected
/// direction: harder after a correct answer, easier after an incorrect one.
fn adaptation_score(responses: &[(Response, Item)]) -> f64 {
    if responses.len() < 2 {
        return 0.0;
    }
    let mut moved = 0usize;
    for pair in responses.windows(2) {
        let (prev_response, prev_item) = &pair[0];
        let (_, next_item) = &pair[1];
        let harder = next_item.params.difficulty > prev_item.params.difficulty;
        let easier = next_item.params.difficulty < prev_item.params.difficulty;
        if (prev_response.is_correct && harder) || (!prev_response.is_correct && easier) {
            moved += 1;
        }
    }
    moved as f64 / (responses.len() - 1) as f64
}

fn behavior_patterns(responses: &[(Response, Item)]) -> Vec<BehaviorPattern> {
    let mut patterns = Vec::new();

    if responses.len() >= RAPID_RUN_LENGTH {
        let tail = &responses[responses.len() - RAPID_RUN_LENGTH..];
        if tail
            .iter()
            .all(|(response, _)| response.response_time_seconds < RAPID_RESPONSE_SECONDS)
        {
            patterns.push(BehaviorPattern::RapidFinalResponses);
        }
    }

    if responses.len() >= 2 {
        let flips = responses
            .windows(2)
            .filter(|pair| pair[0].0.is_correct != pair[1].0.is_correct)
            .count();
        if flips as f64 / responses.len() as f64 > ALTERNATION_RATE {
            patterns.push(BehaviorPattern::AlternatingPerformance);
        }
    }

    patterns
}
