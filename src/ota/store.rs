use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

use super::session::{OtaSession, SessionId};

/// Holds the update sessions owned by one service instance.
pub trait SessionStore: Send + Sync {
    /// Stores a new session, returning a shared handle to it.
    fn insert(&self, session: OtaSession) -> Arc<OtaSession>;

    /// Looks up a session.
    fn get(&self, id: &SessionId) -> Option<Arc<OtaSession>>;

    /// Removes a session, returning it if it existed.
    fn remove(&self, id: &SessionId) -> Option<Arc<OtaSession>>;

    /// Returns every session, ordered by id.
    fn list(&self) -> Vec<Arc<OtaSession>>;

    /// Number of stored sessions.
    fn len(&self) -> usize;

    /// Returns whether the store holds no sessions.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Volatile store; sessions do not survive the process.
#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<BTreeMap<SessionId, Arc<OtaSession>>>,
}

impl SessionStore for InMemorySessionStore {
    fn insert(&self, session: OtaSession) -> Arc<OtaSession> {
        let session = Arc::new(session);
        self.sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(session.id().clone(), Arc::clone(&session));
        session
    }

    fn get(&self, id: &SessionId) -> Option<Arc<OtaSession>> {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
    }

    fn remove(&self, id: &SessionId) -> Option<Arc<OtaSession>> {
        self.sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id)
    }

    fn list(&self) -> Vec<Arc<OtaSession>> {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }

    fn len(&self) -> usize {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
