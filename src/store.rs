//! Boundary traits for the engine's external collaborators.
//!
//! The engine itself is deterministic, synchronous computation; everything
//! that touches storage sits behind these traits. In-memory reference
//! implementations are provided for embedding and tests. Persistence
//! technology is the caller's concern: any store that round-trips the
//! `Session`, `Response`, and `Item` records losslessly will do.

use crate::error::{Error, Result};
use crate::types::{Item, ItemId, Response, Session, SessionId};
use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap};
use std::sync::RwLock;

/// Supplier of calibrated candidate items.
#[async_trait]
pub trait ItemBank: Send + Sync {
    /// Fetch up to `limit` candidate items for a subject, optionally
    /// restricted to the given content tags.
    async fn fetch_candidates(
        &self,
        subject: &str,
        content_tags: Option<&BTreeSet<String>>,
        limit: usize,
    ) -> Result<Vec<Item>>;

    /// Look up a single item by id.
    async fn item(&self, id: &ItemId) -> Result<Option<Item>>;
}

/// Durable record of sessions and their responses.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn save_session(&self, session: &Session) -> Result<()>;

    async fn load_session(&self, id: &SessionId) -> Result<Option<Session>>;

    async fn record_response(&self, response: &Response) -> Result<()>;

    /// All responses recorded for a session, in administration order.
    async fn session_responses(&self, id: &SessionId) -> Result<Vec<Response>>;
}

/// Source of a user's prior response records.
#[async_trait]
pub trait HistoryProvider: Send + Sync {
    /// Up to `limit` most recent correctness outcomes for the user.
    async fn prior_outcomes(&self, user_id: &str, limit: usize) -> Result<Vec<bool>>;
}

fn lock_poisoned<T>(err: std::sync::PoisonError<T>) -> Error {
    Error::store(format!("store lock poisoned: {err}"))
}

/// In-memory item bank backed by an insertion-ordered item list.
#[derive(Default)]
pub struct InMemoryItemBank {
    items: RwLock<Vec<Item>>,
}

impl InMemoryItemBank {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_items(items: Vec<Item>) -> Self {
        Self {
            items: RwLock::new(items),
        }
    }

    /// Append an item to the bank.
    pub fn add_item(&self, item: Item) -> Result<()> {
        self.items.write().map_err(lock_poisoned)?.push(item);
        Ok(())
    }
}

#[async_trait]
impl ItemBank for InMemoryItemBank {
    async fn fetch_candidates(
        &self,
        subject: &str,
        content_tags: Option<&BTreeSet<String>>,
        limit: usize,
    ) -> Result<Vec<Item>> {
        let items = self.items.read().map_err(lock_poisoned)?;
        Ok(items
            .iter()
            .filter(|item| item.subject == subject)
            .filter(|item| content_tags.map_or(true, |tags| tags.contains(&item.content_tag)))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn item(&self, id: &ItemId) -> Result<Option<Item>> {
        let items = self.items.read().map_err(lock_poisoned)?;
        Ok(items.iter().find(|item| &item.id == id).cloned())
    }
}

/// In-memory session store.
#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<SessionId, Session>>,
    responses: RwLock<HashMap<SessionId, Vec<Response>>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn save_session(&self, session: &Session) -> Result<()> {
        self.sessions
            .write()
            .map_err(lock_poisoned)?
            .insert(session.id, session.clone());
        Ok(())
    }

    async fn load_session(&self, id: &SessionId) -> Result<Option<Session>> {
        Ok(self.sessions.read().map_err(lock_poisoned)?.get(id).cloned())
    }

    async fn record_response(&self, response: &Response) -> Result<()> {
        self.responses
            .write()
            .map_err(lock_poisoned)?
            .entry(response.session_id)
            .or_default()
            .push(response.clone());
        Ok(())
    }

    async fn session_responses(&self, id: &SessionId) -> Result<Vec<Response>> {
        Ok(self
            .responses
            .read()
            .map_err(lock_poisoned)?
            .get(id)
            .cloned()
            .unwrap_or_default())
    }
}

/// In-memory history provider keyed by user id.
#[derive(Default)]
pub struct InMemoryHistoryProvider {
    outcomes: RwLock<HashMap<String, Vec<bool>>>,
}

impl InMemoryHistoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Provider pre-seeded with one user's outcome history, oldest first.
    pub fn for_user(user_id: impl Into<String>, outcomes: Vec<bool>) -> Self {
        Self {
            outcomes: RwLock::new(HashMap::from([(user_id.into(), outcomes)])),
        }
    }

    /// Append an outcome to a user's history.
    pub fn record_outcome(&self, user_id: impl Into<String>, is_correct: bool) -> Result<()> {
        self.outcomes
            .write()
            .map_err(lock_poisoned)?
            .entry(user_id.into())
            .or_default()
            .push(is_correct);
        Ok(())
    }
}

#[async_trait]
impl HistoryProvider for InMemoryHistoryProvider {
    async fn prior_outcomes(&self, user_id: &str, limit: usize) -> Result<Vec<bool>> {
        let outcomes = self.outcomes.read().map_err(lock_poisoned)?;
        let history = outcomes.get(user_id).map(Vec::as_slice).unwrap_or(&[]);
        let start = history.len().saturating_sub(limit);
        Ok(history[start..].to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ItemParameters, ResponseOutcome};
    use pretty_assertions::assert_eq;

    fn item(id: &str, subject: &str, tag: &str) -> Item {
        Item::new(id, subject, tag, ItemParameters::new(0.0, 1.0, 0.2))
    }

    #[tokio::test]
    async fn bank_filters_by_subject_and_content_tag() {
        let bank = InMemoryItemBank::with_items(vec![
            item("m1", "MATH", "algebra"),
            item("m2", "MATH", "geometry"),
            item("r1", "READING", "inference"),
        ]);

        let math = bank.fetch_candidates("MATH", None, 10).await.unwrap();
        assert_eq!(math.len(), 2);

        let tags = BTreeSet::from(["geometry".to_string()]);
        let geometry = bank.fetch_candidates("MATH", Some(&tags), 10).await.unwrap();
        assert_eq!(geometry.len(), 1);
        assert_eq!(geometry[0].id, ItemId::from("m2"));
    }

    #[tokio::test]
    async fn bank_honors_the_pool_limit() {
        let bank = InMemoryItemBank::with_items(
            (0..10).map(|i| item(&format!("q{i}"), "MATH", "algebra")).collect(),
        );
        let limited = bank.fetch_candidates("MATH", None, 3).await.unwrap();
        assert_eq!(limited.len(), 3);
    }

    #[tokio::test]
    async fn session_store_round_trips_sessions_and_responses() {
        let store = InMemorySessionStore::new();
        let session = Session::new("user-1", "MATH");
        store.save_session(&session).await.unwrap();

        let loaded = store.load_session(&session.id).await.unwrap().unwrap();
        assert_eq!(loaded, session);

        let first = Response::new(session.id, ItemId::from("q1"), &ResponseOutcome::correct(30.0));
        let second =
            Response::new(session.id, ItemId::from("q2"), &ResponseOutcome::incorrect(55.0));
        store.record_response(&first).await.unwrap();
        store.record_response(&second).await.unwrap();

        let responses = store.session_responses(&session.id).await.unwrap();
        assert_eq!(responses.len(), 2);
        assert_eq!(responses[0].item_id, ItemId::from("q1"));
        assert_eq!(responses[1].item_id, ItemId::from("q2"));
    }

    #[tokio::test]
    async fn history_returns_most_recent_outcomes() {
        let provider = InMemoryHistoryProvider::for_user("user-1", vec![true, true, false, true]);
        let recent = provider.prior_outcomes("user-1", 2).await.unwrap();
        assert_eq!(recent, vec![false, true]);

        let unknown = provider.prior_outcomes("stranger", 10).await.unwrap();
        assert!(unknown.is_empty());
    }
}
