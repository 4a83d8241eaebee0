use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};
use trailhead_core::errors::DomainError;
use uuid::Uuid;

use crate::plan::PlanState;

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Each plan sits behind its own mutex so turns within a session are serialized while
/// different sessions proceed independently.
pub type SharedPlan = Arc<Mutex<PlanState>>;

#[derive(Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<SessionId, SharedPlan>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn create(&self) -> SessionId {
        let id = SessionId::generate();
        self.insert(id.clone()).await;
        id
    }

    /// Registers a caller-chosen id, replacing any plan already stored under it.
    pub async fn insert(&self, id: SessionId) {
        let plan = Arc::new(Mutex::new(PlanState::new()));
        self.sessions.write().await.insert(id, plan);
    }

    /// Returns the session's plan, creating a fresh one for an id seen for the first time.
    pub async fn get_or_create(&self, id: &SessionId) -> SharedPlan {
        if let Some(plan) = self.sessions.read().await.get(id) {
            return Arc::clone(plan);
        }
        let mut sessions = self.sessions.write().await;
        Arc::clone(
            sessions.entry(id.clone()).or_insert_with(|| Arc::new(Mutex::new(PlanState::new()))),
        )
    }

    pub async fn get(&self, id: &SessionId) -> Result<SharedPlan, DomainError> {
        self.sessions
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| DomainError::UnknownSession(id.to_string()))
    }

    /// Swaps in a fresh plan; context and history are discarded. A turn already running
    /// against the old plan finishes on it without affecting the session.
    pub async fn reset(&self, id: &SessionId) -> Result<(), DomainError> {
        let mut sessions = self.sessions.write().await;
        let plan =
            sessions.get_mut(id).ok_or_else(|| DomainError::UnknownSession(id.to_string()))?;
        *plan = Arc::new(Mutex::new(PlanState::new()));
        Ok(())
    }

    pub async fn remove(&self, id: &SessionId) -> Result<(), DomainError> {
        self.sessions
            .write()
            .await
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| DomainError::UnknownSession(id.to_string()))
    }

    /// Drops sessions whose plan reached `Complete`. Returns how many were removed.
    ///
    /// Completion is checked under the map's write lock, so a reset cannot slip in between
    /// the check and the removal. Plans busy with a turn are left for the next sweep.
    pub async fn cleanup_completed(&self) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, plan| match plan.try_lock() {
            Ok(plan) => !plan.is_complete(),
            Err(_) => true,
        });
        before - sessions.len()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}
