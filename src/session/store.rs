//! Keyed store of live sessions

use super::{Session, SessionError, SessionInfo, SessionResult, SessionState};
use crate::rendezvous::Rendezvous;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// A session together with the wake signal its agent blocks on
pub type SessionSlot = Rendezvous<Session>;

/// Thread-safe map from session id to its slot.
///
/// The map lock is only held for lookups and membership changes. All
/// per-session work happens on the slot's own lock, so sessions never
/// contend with each other.
#[derive(Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<String, Arc<SessionSlot>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Arc<SessionSlot>>> {
        self.sessions.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Arc<SessionSlot>>> {
        self.sessions.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Look up `session_id`, creating it if it is absent or unknown.
    ///
    /// Returns the slot and whether it was newly created.
    pub fn get_or_create(
        &self,
        session_id: Option<&str>,
        context: Option<String>,
    ) -> (Arc<SessionSlot>, bool) {
        self.get_or_create_with(session_id, context, |_| {})
    }

    /// Like [`get_or_create`](Self::get_or_create), running `on_created`
    /// against a new session before anyone else can look it up.
    pub fn get_or_create_with(
        &self,
        session_id: Option<&str>,
        context: Option<String>,
        on_created: impl FnOnce(&Session),
    ) -> (Arc<SessionSlot>, bool) {
        if let Some(slot) = session_id.and_then(|id| self.read().get(id).cloned()) {
            return (slot, false);
        }

        let id = session_id.map_or_else(|| uuid::Uuid::new_v4().to_string(), String::from);
        let mut sessions = self.write();
        // Another caller may have created it between the two locks
        if let Some(slot) = sessions.get(&id) {
            return (slot.clone(), false);
        }
        let session = Session::new(&id, context);
        on_created(&session);
        let slot = Arc::new(Rendezvous::new(session));
        sessions.insert(id, slot.clone());
        (slot, true)
    }

    /// Look up an existing session.
    ///
    /// # Errors
    ///
    /// `NotFound` if the id was never created or has been removed.
    pub fn get(&self, session_id: &str) -> SessionResult<Arc<SessionSlot>> {
        self.read()
            .get(session_id)
            .cloned()
            .ok_or_else(|| SessionError::NotFound(session_id.to_string()))
    }

    /// Drop the session from the map and hand back its slot.
    ///
    /// Anyone still holding the slot keeps a valid reference; the caller is
    /// responsible for waking them.
    ///
    /// # Errors
    ///
    /// `NotFound` if the id is unknown.
    pub fn remove(&self, session_id: &str) -> SessionResult<Arc<SessionSlot>> {
        self.write()
            .remove(session_id)
            .ok_or_else(|| SessionError::NotFound(session_id.to_string()))
    }

    /// Snapshot of every live session, oldest first
    pub fn list(&self) -> Vec<SessionInfo> {
        let slots: Vec<Arc<SessionSlot>> = self.read().values().cloned().collect();
        let mut infos: Vec<SessionInfo> = slots
            .iter()
            .map(|slot| slot.with(|s| Session::info(s)))
            .collect();
        infos.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        infos
    }

    pub fn list_in_state(&self, state: SessionState) -> Vec<SessionInfo> {
        self.list()
            .into_iter()
            .filter(|info| info.state == state)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_generates_id_when_absent() {
        let store = SessionStore::new();
        let (slot, created) = store.get_or_create(None, Some("ready".to_string()));
        assert!(created);

        let id = slot.with(|s| s.session_id.clone());
        assert!(uuid::Uuid::parse_str(&id).is_ok());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_known_id_is_reused() {
        let store = SessionStore::new();
        let (_, created) = store.get_or_create(Some("fixed"), None);
        assert!(created);

        let (slot, created) = store.get_or_create(Some("fixed"), Some("ignored".to_string()));
        assert!(!created);
        assert_eq!(slot.with(|s| s.context.clone()), None);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_creation_hook_runs_only_for_new_sessions() {
        let store = SessionStore::new();
        let mut seen = Vec::new();
        store.get_or_create_with(Some("hooked"), None, |s| {
            seen.push(s.session_id.clone());
        });
        store.get_or_create_with(Some("hooked"), None, |s| {
            seen.push(s.session_id.clone());
        });
        assert_eq!(seen, vec!["hooked".to_string()]);
    }

    #[test]
    fn test_unknown_id_is_created_with_that_id() {
        let store = SessionStore::new();
        let (slot, created) = store.get_or_create(Some("chosen-id"), None);
        assert!(created);
        assert_eq!(slot.with(|s| s.session_id.clone()), "chosen-id");
    }

    #[test]
    fn test_removed_id_is_not_found() {
        let store = SessionStore::new();
        store.get_or_create(Some("gone"), None);
        store.remove("gone").unwrap();

        assert_eq!(
            store.get("gone").err(),
            Some(SessionError::NotFound("gone".to_string()))
        );
        assert!(store.remove("gone").is_err());
        assert!(store.is_empty());
    }

    #[test]
    fn test_list_in_state_filters() {
        let store = SessionStore::new();
        store.get_or_create(Some("a"), None);
        let (b, _) = store.get_or_create(Some("b"), None);
        b.with(Session::terminate);

        let waiting = store.list_in_state(SessionState::Waiting);
        assert_eq!(waiting.len(), 1);
        assert_eq!(waiting[0].session_id, "a");
        assert_eq!(store.list().len(), 2);
    }
}
