use super::Session;
use crate::error::SessionError;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// Registry of live sessions. The map lock is held only for lookup and
/// insert, never while a command runs. Sessions are never evicted.
#[derive(Default)]
pub struct SessionManager {
    sessions: Mutex<HashMap<String, Arc<Session>>>,
}

impl SessionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the session for `id`, creating it on first use. Concurrent
    /// callers with the same id all get the same instance.
    pub fn get_or_create(&self, id: &str) -> Arc<Session> {
        let mut sessions = self.sessions.lock();
        sessions
            .entry(id.to_string())
            .or_insert_with(|| {
                info!(session = id, "created session");
                Arc::new(Session::new(id))
            })
            .clone()
    }

    pub fn get(&self, id: &str) -> Result<Arc<Session>, SessionError> {
        self.sessions
            .lock()
            .get(id)
            .cloned()
            .ok_or_else(|| SessionError::NotFound(id.to_string()))
    }

    /// New session with a fresh random id.
    pub fn create(&self) -> Arc<Session> {
        self.get_or_create(&Uuid::new_v4().to_string())
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.lock().is_empty()
    }
}
