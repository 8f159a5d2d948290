//! Session lifecycle orchestration for the adaptive test loop.
//!
//! The controller is the sole state-transition authority. It seeds a session
//! from the user's prior history, issues items through the selector, folds
//! responses into the ability estimate, and applies the stopping rule in a
//! fixed priority order:
//!
//! 1. hard item cap
//! 2. minimum-questions floor
//! 3. precision target
//! 4. diminishing returns over the trailing standard-error window
//!
//! Sessions are independent units of mutable state; callers must serialize
//! `record_response` calls per session id. Different sessions can be driven
//! in parallel freely.

use crate::error::{Error, Result};
use crate::irt;
use crate::report;
use crate::selector::{self, SelectionConstraints};
use crate::store::{HistoryProvider, ItemBank, SessionStore};
use crate::types::{
    AbilityState, FeedbackLevel, FinalReport, Item, ItemId, Response, ResponseOutcome, Session,
    SessionStatus, StopReason,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use tracing::{debug, info};

/// Response time under which an incorrect answer reads as a guess.
const RAPID_GUESS_SECONDS: f64 = 30.0;
/// Response time over which a correct answer reads as effortful.
const SLOW_CORRECT_SECONDS: f64 = 180.0;
/// Ability level under which incorrect answers get remedial feedback.
const LOW_ABILITY_THETA: f64 = -0.5;

/// Tuning knobs for the adaptive loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Fewest responses before any convergence stop may fire.
    pub min_questions: usize,
    /// Hard cap on administered items.
    pub max_questions: usize,
    /// Standard-error target ending the session once the floor is met.
    pub target_precision: f64,
    /// Administered count at which the diminishing-returns check arms.
    pub early_convergence_min_items: usize,
    /// Trailing standard-error window inspected for diminishing returns.
    pub early_convergence_window: usize,
    /// Minimum improvement across the window to keep testing.
    pub early_convergence_threshold: f64,
    /// Prior responses consulted when seeding the initial ability.
    pub history_limit: usize,
    /// Upper bound on candidate items fetched per selection.
    pub candidate_pool_limit: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            min_questions: 8,
            max_questions: 25,
            target_precision: 0.3,
            early_convergence_min_items: 6,
            early_convergence_window: 3,
            early_convergence_threshold: 0.05,
            history_limit: 50,
            candidate_pool_limit: 200,
        }
    }
}

/// Outcome of one stopping-rule evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoppingDecision {
    Continue,
    TargetPrecision,
    EarlyConvergence,
    MaxItems,
}

impl StoppingDecision {
    /// Terminal status implied by this decision, if any.
    pub fn status(&self) -> Option<SessionStatus> {
        match self {
            Self::Continue => None,
            Self::TargetPrecision | Self::EarlyConvergence => Some(SessionStatus::Converged),
            Self::MaxItems => Some(SessionStatus::MaxItemsReached),
        }
    }

    /// Audit reason implied by this decision, if any.
    pub fn stop_reason(&self) -> Option<StopReason> {
        match self {
            Self::Continue => None,
            Self::TargetPrecision => Some(StopReason::TargetPrecision),
            Self::EarlyConvergence => Some(StopReason::EarlyConvergence),
            Self::MaxItems => Some(StopReason::MaxItems),
        }
    }
}

/// Evaluate the stopping rule against the session's current trace.
///
/// The checks run in fixed priority order: the item cap, the
/// minimum-questions floor, the precision target, then diminishing returns.
/// The floor precedes both convergence checks, so neither can fire before
/// `min_questions` responses are in.
pub fn evaluate_stopping(
    config: &EngineConfig,
    questions_administered: usize,
    standard_error: f64,
    se_trace: &[f64],
) -> StoppingDecision {
    if questions_administered >= config.max_questions {
        return StoppingDecision::MaxItems;
    }
    if questions_administered < config.min_questions {
        return StoppingDecision::Continue;
    }
    if standard_error <= config.target_precision {
        return StoppingDecision::TargetPrecision;
    }
    if questions_administered >= config.early_convergence_min_items
        && se_trace.len() >= config.early_convergence_window
    {
        let window = &se_trace[se_trace.len() - config.early_convergence_window..];
        let improvement = window[0] - window[window.len() - 1];
        if improvement < config.early_convergence_threshold {
            return StoppingDecision::EarlyConvergence;
        }
    }
    StoppingDecision::Continue
}

/// Classify the feedback depth owed for a response, given the updated
/// ability state.
pub fn classify_feedback_level(outcome: &ResponseOutcome, ability: &AbilityState) -> FeedbackLevel {
    if !outcome.is_correct && outcome.response_time_seconds < RAPID_GUESS_SECONDS {
        return FeedbackLevel::Remedial;
    }
    if !outcome.is_correct && ability.theta < LOW_ABILITY_THETA {
        return FeedbackLevel::Remedial;
    }
    if outcome.is_correct && outcome.response_time_seconds > SLOW_CORRECT_SECONDS {
        return FeedbackLevel::Detailed;
    }
    FeedbackLevel::Basic
}

/// Result of recording one response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseEvaluation {
    pub theta: f64,
    pub standard_error: f64,
    pub status: SessionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_reason: Option<StopReason>,
    pub should_continue: bool,
    pub feedback: FeedbackLevel,
    /// False when the ability update exhausted its iteration cap.
    pub estimate_converged: bool,
}

/// Drives adaptive testing sessions against the boundary stores.
pub struct SessionController {
    bank: Arc<dyn ItemBank>,
    sessions: Arc<dyn SessionStore>,
    history: Arc<dyn HistoryProvider>,
    config: EngineConfig,
}

impl SessionController {
    pub fn new(
        bank: Arc<dyn ItemBank>,
        sessions: Arc<dyn SessionStore>,
        history: Arc<dyn HistoryProvider>,
    ) -> Self {
        Self {
            bank,
            sessions,
            history,
            config: EngineConfig::default(),
        }
    }

    /// Replace the default configuration.
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Create a session seeded from the user's prior history.
    pub async fn initialize_session(
        &self,
        user_id: &str,
        test_subject: &str,
        content_constraints: Option<BTreeSet<String>>,
    ) -> Result<Session> {
        let prior = self
            .history
            .prior_outcomes(user_id, self.config.history_limit)
            .await?;
        let theta = irt::estimate_initial_ability(&prior);

        let mut session = Session::new(user_id, test_subject).with_initial_theta(theta);
        if let Some(tags) = content_constraints {
            session = session.with_content_constraints(tags);
        }
        self.sessions.save_session(&session).await?;

        info!(
            session = %session.id,
            user = user_id,
            subject = test_subject,
            theta,
            prior_responses = prior.len(),
            "initialized adaptive session"
        );
        Ok(session)
    }

    /// Select the next item for the session.
    ///
    /// Issuing the first item moves the session from `Initialized` to
    /// `Active`; that is the only session mutation performed here.
    pub async fn next_item(&self, session: &mut Session) -> Result<Item> {
        if session.status.is_terminal() {
            return Err(Error::session_terminated(
                session.id.to_string(),
                session.status.to_string(),
            ));
        }

        let pool = self
            .bank
            .fetch_candidates(
                &session.test_subject,
                session.content_constraints.as_ref(),
                self.config.candidate_pool_limit,
            )
            .await?;
        let excluded: HashSet<ItemId> = session.administered_item_ids.iter().cloned().collect();
        let constraints = SelectionConstraints {
            content_tags: session.content_constraints.clone(),
        };
        let item =
            selector::select_optimal_item(session.ability.theta, &excluded, &constraints, &pool)?
                .clone();

        if session.status == SessionStatus::Initialized {
            session.status = SessionStatus::Active;
            self.sessions.save_session(session).await?;
        }
        Ok(item)
    }

    /// Record a response and advance the session state machine.
    ///
    /// This is the only operation that mutates ability state, the
    /// administered-item sequence, and terminal status. Calls for the same
    /// session must not overlap.
    pub async fn record_response(
        &self,
        session: &mut Session,
        item: &Item,
        outcome: ResponseOutcome,
    ) -> Result<ResponseEvaluation> {
        if session.status.is_terminal() {
            return Err(Error::session_terminated(
                session.id.to_string(),
                session.status.to_string(),
            ));
        }
        if session.has_administered(&item.id) {
            return Err(Error::item_already_administered(
                item.id.to_string(),
                session.id.to_string(),
            ));
        }
        item.validate()?;

        let response = Response::new(session.id, item.id.clone(), &outcome);
        self.sessions.record_response(&response).await?;

        let update = irt::update_estimate(session.ability.theta, outcome.is_correct, &item.params);
        session.ability = AbilityState {
            theta: update.theta,
            standard_error: update.standard_error,
        };
        session.administered_item_ids.push(item.id.clone());
        session.se_trace.push(update.standard_error);
        if session.status == SessionStatus::Initialized {
            session.status = SessionStatus::Active;
        }
        debug!(
            session = %session.id,
            theta = update.theta,
            standard_error = update.standard_error,
            "ability updated"
        );

        let decision = evaluate_stopping(
            &self.config,
            session.questions_administered(),
            update.standard_error,
            &session.se_trace,
        );
        if let Some(status) = decision.status() {
            session.status = status;
            session.stop_reason = decision.stop_reason();
            info!(
                session = %session.id,
                status = %status,
                questions = session.questions_administered(),
                "session reached terminal status"
            );
        }
        self.sessions.save_session(session).await?;

        let feedback = classify_feedback_level(&outcome, &session.ability);
        Ok(ResponseEvaluation {
            theta: update.theta,
            standard_error: update.standard_error,
            status: session.status,
            stop_reason: session.stop_reason,
            should_continue: !session.status.is_terminal(),
            feedback,
            estimate_converged: update.converged,
        })
    }

    /// Abort a session on behalf of the caller.
    pub async fn abort_session(&self, session: &mut Session) -> Result<()> {
        if session.status.is_terminal() {
            return Err(Error::session_terminated(
                session.id.to_string(),
                session.status.to_string(),
            ));
        }
        session.status = SessionStatus::Terminated;
        session.stop_reason = Some(StopReason::Aborted);
        self.sessions.save_session(session).await?;
        info!(session = %session.id, "session aborted by caller");
        Ok(())
    }

    /// Build the final report for a terminated session.
    ///
    /// Re-estimates ability from the complete response history rather than
    /// the session's running estimate, then derives the scaled score,
    /// confidence interval, and diagnostics.
    pub async fn finalize(&self, session: &Session) -> Result<FinalReport> {
        if !session.status.is_terminal() {
            return Err(Error::session_not_terminated(
                session.id.to_string(),
                session.status.to_string(),
            ));
        }

        let responses = self.sessions.session_responses(&session.id).await?;
        let mut scored = Vec::with_capacity(responses.len());
        for response in responses {
            let item = self
                .bank
                .item(&response.item_id)
                .await?
                .ok_or_else(|| {
                    Error::store(format!("item {} missing from bank", response.item_id))
                })?;
            scored.push((response, item));
        }
        report::build_report(session, &scored)
    }
}
