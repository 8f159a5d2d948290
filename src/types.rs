//! Core data model: items, responses, sessions, and final reports.

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};
use uuid::Uuid;

/// Identifier for an exam item, as issued by the item bank.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ItemId(pub String);

impl ItemId {
    /// Create an item id from any string-like value.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl std::fmt::Display for ItemId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ItemId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for ItemId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Unique identifier for a testing session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Calibrated 3PL parameters for an item.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ItemParameters {
    /// Difficulty (b): ability level at which the item is most informative
    pub difficulty: f64,
    /// Discrimination (a): slope of the response curve; must be positive
    pub discrimination: f64,
    /// Guessing (c): lower asymptote of the response curve, in [0, 1)
    pub guessing: f64,
}

impl ItemParameters {
    pub fn new(difficulty: f64, discrimination: f64, guessing: f64) -> Self {
        Self {
            difficulty,
            discrimination,
            guessing,
        }
    }

    /// Check the 3PL constraints: `a > 0`, `0 <= c < 1`, finite `b`.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if !(self.discrimination > 0.0) {
            return Err(format!(
                "discrimination must be positive, got {}",
                self.discrimination
            ));
        }
        if !(self.guessing >= 0.0 && self.guessing < 1.0) {
            return Err(format!(
                "guessing must be in [0, 1), got {}",
                self.guessing
            ));
        }
        if !self.difficulty.is_finite() {
            return Err(format!("difficulty must be finite, got {}", self.difficulty));
        }
        Ok(())
    }
}

/// An exam item with calibrated IRT parameters and content metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    /// Test subject the item belongs to (e.g. a PAES exam code)
    pub subject: String,
    /// Content node within the subject, used for constrained selection
    pub content_tag: String,
    /// Competencies the item exercises, feeding the final strength/weakness split
    pub competency_tags: BTreeSet<String>,
    pub params: ItemParameters,
    pub expected_duration_seconds: u32,
}

/// Default expected duration when the bank supplies none.
const DEFAULT_ITEM_DURATION_SECONDS: u32 = 120;

impl Item {
    pub fn new(
        id: impl Into<ItemId>,
        subject: impl Into<String>,
        content_tag: impl Into<String>,
        params: ItemParameters,
    ) -> Self {
        Self {
            id: id.into(),
            subject: subject.into(),
            content_tag: content_tag.into(),
            competency_tags: BTreeSet::new(),
            params,
            expected_duration_seconds: DEFAULT_ITEM_DURATION_SECONDS,
        }
    }

    /// Add competency tags to the item.
    pub fn with_competencies<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.competency_tags.extend(tags.into_iter().map(Into::into));
        self
    }

    /// Set the expected duration.
    pub fn with_expected_duration(mut self, seconds: u32) -> Self {
        self.expected_duration_seconds = seconds;
        self
    }

    /// Validate the item's IRT parameters.
    pub fn validate(&self) -> Result<()> {
        self.params
            .validate()
            .map_err(|reason| Error::invalid_parameter(self.id.to_string(), reason))
    }
}

/// A caller-observed response outcome, before it is recorded.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResponseOutcome {
    pub is_correct: bool,
    pub response_time_seconds: f64,
}

impl ResponseOutcome {
    pub fn new(is_correct: bool, response_time_seconds: f64) -> Self {
        Self {
            is_correct,
            response_time_seconds,
        }
    }

    /// A correct answer taking the given time.
    pub fn correct(response_time_seconds: f64) -> Self {
        Self::new(true, response_time_seconds)
    }

    /// An incorrect answer taking the given time.
    pub fn incorrect(response_time_seconds: f64) -> Self {
        Self::new(false, response_time_seconds)
    }
}

/// A recorded response, immutable once written to the session store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub session_id: SessionId,
    pub item_id: ItemId,
    pub is_correct: bool,
    pub response_time_seconds: f64,
    pub recorded_at: DateTime<Utc>,
    /// Free-form caller analytics stored alongside the response
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analytics: Option<HashMap<String, Value>>,
}

impl Response {
    pub fn new(session_id: SessionId, item_id: ItemId, outcome: &ResponseOutcome) -> Self {
        Self {
            session_id,
            item_id,
            is_correct: outcome.is_correct,
            response_time_seconds: outcome.response_time_seconds,
            recorded_at: Utc::now(),
            analytics: None,
        }
    }

    /// Attach an analytics value to the response.
    pub fn with_analytics(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.analytics
            .get_or_insert_with(HashMap::new)
            .insert(key.into(), value.into());
        self
    }
}

/// Running latent-ability estimate for a session.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AbilityState {
    /// Latent trait estimate; practically within [-4, 4]
    pub theta: f64,
    /// Standard error of the estimate; always positive, 1.0 before any update
    pub standard_error: f64,
}

impl Default for AbilityState {
    fn default() -> Self {
        Self {
            theta: 0.0,
            standard_error: 1.0,
        }
    }
}

impl AbilityState {
    /// Pre-estimation state seeded with an initial theta.
    pub fn with_theta(theta: f64) -> Self {
        Self {
            theta,
            ..Default::default()
        }
    }
}

/// Lifecycle status of a testing session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionStatus {
    /// Created, no item issued yet
    Initialized,
    /// At least one item issued, stopping rule not yet met
    Active,
    /// Stopped by precision or diminishing returns
    Converged,
    /// Stopped by the hard item cap
    MaxItemsReached,
    /// Aborted by the caller
    Terminated,
}

impl SessionStatus {
    /// Whether the session accepts further items and responses.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Converged | Self::MaxItemsReached | Self::Terminated
        )
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Initialized => "INITIALIZED",
            Self::Active => "ACTIVE",
            Self::Converged => "CONVERGED",
            Self::MaxItemsReached => "MAX_ITEMS_REACHED",
            Self::Terminated => "TERMINATED",
        };
        write!(f, "{s}")
    }
}

/// Why a session stopped, for auditing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Standard error reached the precision target
    TargetPrecision,
    /// Standard error stopped improving over the trailing window
    EarlyConvergence,
    /// Hard cap on administered items
    MaxItems,
    /// Caller aborted the session
    Aborted,
}

/// A testing session: the unit of mutable state in the engine.
///
/// Sessions are created by the controller, persisted through the session
/// store, and mutated only by the controller's operations. Callers must
/// serialize `record_response` calls per session id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    /// Human-readable code, e.g. `ADAPT-1724112000000`
    pub session_code: String,
    pub user_id: String,
    pub test_subject: String,
    /// Optional content tags restricting item selection
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_constraints: Option<BTreeSet<String>>,
    /// Items in administration order; duplicates are rejected at record time
    pub administered_item_ids: Vec<ItemId>,
    pub ability: AbilityState,
    /// Standard error after each recorded response; its trailing window
    /// drives the early-convergence stop
    pub se_trace: Vec<f64>,
    pub status: SessionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_reason: Option<StopReason>,
    pub started_at: DateTime<Utc>,
}

impl Session {
    pub fn new(user_id: impl Into<String>, test_subject: impl Into<String>) -> Self {
        let started_at = Utc::now();
        Self {
            id: SessionId::new(),
            session_code: format!("ADAPT-{}", started_at.timestamp_millis()),
            user_id: user_id.into(),
            test_subject: test_subject.into(),
            content_constraints: None,
            administered_item_ids: Vec::new(),
            ability: AbilityState::default(),
            se_trace: Vec::new(),
            status: SessionStatus::Initialized,
            stop_reason: None,
            started_at,
        }
    }

    /// Seed the initial ability estimate.
    pub fn with_initial_theta(mut self, theta: f64) -> Self {
        self.ability = AbilityState::with_theta(theta);
        self
    }

    /// Restrict selection to the given content tags.
    pub fn with_content_constraints(mut self, tags: BTreeSet<String>) -> Self {
        self.content_constraints = Some(tags);
        self
    }

    pub fn questions_administered(&self) -> usize {
        self.administered_item_ids.len()
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn has_administered(&self, id: &ItemId) -> bool {
        self.administered_item_ids.iter().any(|i| i == id)
    }
}

/// Depth of feedback owed to the examinee for a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackLevel {
    Basic,
    Detailed,
    Remedial,
}

impl std::fmt::Display for FeedbackLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Basic => "basic",
            Self::Detailed => "detailed",
            Self::Remedial => "remedial",
        };
        write!(f, "{s}")
    }
}

/// 95% confidence interval on the scaled-score scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreInterval {
    pub low: i32,
    pub high: i32,
}

/// Behavioral patterns detected in the response sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BehaviorPattern {
    /// Run of very fast answers at the end, suggesting fatigue
    RapidFinalResponses,
    /// Correctness flips on most consecutive responses
    AlternatingPerformance,
}

/// How item difficulty moved over the session.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DifficultyProgression {
    pub starting_difficulty: f64,
    pub ending_difficulty: f64,
    /// Share of transitions that moved difficulty in the expected direction
    pub adaptation_score: f64,
}

/// Supplementary diagnostics attached to a final report. Informational
/// only; the authoritative result is the theta estimate and scaled score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostics {
    pub total_questions: usize,
    pub correct_answers: usize,
    pub average_response_time_seconds: f64,
    pub response_time_variance: f64,
    pub difficulty_progression: DifficultyProgression,
    /// Mean Fisher information contributed per administered item
    pub adaptive_efficiency: f64,
    pub behavior_patterns: Vec<BehaviorPattern>,
}

/// Final result of a terminated session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalReport {
    pub session_id: SessionId,
    pub final_theta: f64,
    pub standard_error: f64,
    /// Reportable score in [150, 850]
    pub scaled_score: i32,
    pub confidence_interval: ScoreInterval,
    pub strengths: BTreeSet<String>,
    pub weaknesses: BTreeSet<String>,
    pub diagnostics: Diagnostics,
}
