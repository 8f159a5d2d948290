//! # cat-core
//!
//! An adaptive testing (CAT) engine built on Item Response Theory.
//!
//! ## Core Components
//!
//! - **irt**: pure 3PL numerical routines (response probability, Fisher
//!   information, Newton-Raphson ability updates, full-history re-estimation)
//! - **selector**: deterministic maximum-information item selection
//! - **controller**: the session state machine driving the adaptive loop
//! - **report**: final scoring, confidence intervals, and diagnostics
//! - **store**: boundary traits for the item bank, session store, and
//!   history provider, with in-memory reference implementations
//!
//! ## Example
//!
//! ```rust,ignore
//! use cat_core::{ResponseOutcome, SessionController};
//!
//! let controller = SessionController::new(bank, sessions, history);
//! let mut session = controller.initialize_session("user-1", "MATH", None).await?;
//!
//! while !session.is_terminal() {
//!     let item = controller.next_item(&mut session).await?;
//!     let outcome = administer(&item); // caller-side item delivery
//!     controller.record_response(&mut session, &item, outcome).await?;
//! }
//!
//! let report = controller.finalize(&session).await?;
//! println!("scaled score: {}", report.scaled_score);
//! ```

pub mod controller;
pub mod error;
pub mod irt;
pub mod report;
pub mod selector;
pub mod store;
pub mod types;

#[cfg(test)]
mod proptest;

// Re-exports for convenience
pub use controller::{
    classify_feedback_level, evaluate_stopping, EngineConfig, ResponseEvaluation,
    SessionController, StoppingDecision,
};
pub use error::{Error, Result};
pub use irt::{
    estimate_initial_ability, fisher_information, probability_correct, reestimate_from_history,
    update_estimate, AbilityEstimate, EstimateUpdate,
};
pub use report::{build_report, scaled_score};
pub use selector::{select_optimal_item, SelectionConstraints};
pub use store::{
    HistoryProvider, InMemoryHistoryProvider, InMemoryItemBank, InMemorySessionStore, ItemBank,
    SessionStore,
};
pub use types::{
    AbilityState, BehaviorPattern, Diagnostics, DifficultyProgression, FeedbackLevel, FinalReport,
    Item, ItemId, ItemParameters, Response, ResponseOutcome, ScoreInterval, Session, SessionId,
    SessionStatus, StopReason,
};
