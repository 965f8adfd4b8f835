//! In-memory session store
//!
//! One `SessionSlot` per session id, created under the store lock so that
//! concurrent first contact on the same id still yields a single session.
//! Each slot carries two locks:
//! - `run_gate`: async, held for a whole orchestrator run on that session
//! - `state`: sync, held only for in-memory reads and writes, never across `.await`

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::task::JoinHandle;

use crate::config::{CacheConfig, SessionConfig};
use crate::rag::cache::ContextCache;
use crate::session::types::Session;

/// Shared reference to a session slot
pub type SessionHandle = Arc<SessionSlot>;

/// A session plus the locks that serialize access to it
#[derive(Debug)]
pub struct SessionSlot {
    run_gate: tokio::sync::Mutex<()>,
    state: Mutex<Session>,
}

impl SessionSlot {
    fn new(session: Session) -> Self {
        Self {
            run_gate: tokio::sync::Mutex::new(()),
            state: Mutex::new(session),
        }
    }

    /// Wait until no other run is in progress on this session
    pub async fn begin_run(&self) -> tokio::sync::MutexGuard<'_, ()> {
        self.run_gate.lock().await
    }

    /// Run a closure against the session state under the state lock
    pub fn with<R>(&self, f: impl FnOnce(&mut Session) -> R) -> R {
        let mut guard = self.lock_state();
        f(&mut guard)
    }

    /// Copy of the current session state
    pub fn snapshot(&self) -> Session {
        self.lock_state().clone()
    }

    fn lock_state(&self) -> MutexGuard<'_, Session> {
        // a panic inside `with` leaves the session usable; its writes are whole-value
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn is_busy(&self) -> bool {
        self.run_gate.try_lock().is_err()
    }
}

/// Keyed store of active sessions
#[derive(Debug)]
pub struct SessionStore {
    sessions: Mutex<HashMap<String, SessionHandle>>,
    max_turns: usize,
    cache_config: CacheConfig,
    idle_timeout: Duration,
}

impl SessionStore {
    pub fn new(session_config: &SessionConfig, cache_config: &CacheConfig) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            max_turns: session_config.max_turns,
            cache_config: cache_config.clone(),
            idle_timeout: crate::config::span_secs(session_config.idle_timeout_secs),
        }
    }

    fn lock_sessions(&self) -> MutexGuard<'_, HashMap<String, SessionHandle>> {
        self.sessions.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Return the session for `session_id`, creating it on first contact
    pub fn get_or_create(&self, session_id: &str, user_id: &str) -> SessionHandle {
        let mut sessions = self.lock_sessions();

        if let Some(handle) = sessions.get(session_id) {
            return Arc::clone(handle);
        }

        let session = Session::new(
            session_id,
            user_id,
            self.max_turns,
            ContextCache::new(&self.cache_config),
        );
        let handle = Arc::new(SessionSlot::new(session));
        sessions.insert(session_id.to_string(), Arc::clone(&handle));
        tracing::debug!(session_id, user_id, "session created");

        handle
    }

    pub fn get(&self, session_id: &str) -> Option<SessionHandle> {
        self.lock_sessions().get(session_id).cloned()
    }

    pub fn contains(&self, session_id: &str) -> bool {
        self.lock_sessions().contains_key(session_id)
    }

    /// Clear turns and cache of a session; false if it doesn't exist
    pub fn reset(&self, session_id: &str) -> bool {
        match self.get(session_id) {
            Some(handle) => {
                handle.with(|session| session.reset());
                tracing::debug!(session_id, "session reset");
                true
            }
            None => false,
        }
    }

    /// Mark a session as active now; false if it doesn't exist
    pub fn touch(&self, session_id: &str) -> bool {
        match self.get(session_id) {
            Some(handle) => {
                handle.with(|session| session.touch());
                true
            }
            None => false,
        }
    }

    pub fn remove(&self, session_id: &str) -> Option<SessionHandle> {
        self.lock_sessions().remove(session_id)
    }

    /// Drop sessions idle past the timeout that nobody is using.
    ///
    /// A session is in use while a run holds its gate or any caller still
    /// holds a handle; those are kept regardless of age.
    pub fn evict_idle(&self, now: DateTime<Utc>) -> Vec<String> {
        let mut sessions = self.lock_sessions();
        let mut evicted = Vec::new();

        sessions.retain(|session_id, handle| {
            if Arc::strong_count(handle) > 1 || handle.is_busy() {
                return true;
            }

            let idle_for = handle.with(|session| now.signed_duration_since(session.last_active_at));
            if idle_for >= self.idle_timeout {
                evicted.push(session_id.clone());
                false
            } else {
                true
            }
        });

        if !evicted.is_empty() {
            tracing::info!(count = evicted.len(), "evicted idle sessions");
        }
        evicted
    }

    /// Periodically evict idle sessions until the returned task is aborted
    pub fn spawn_idle_reaper(self: Arc<Self>, interval: std::time::Duration) -> JoinHandle<()> {
        let interval = if interval.is_zero() {
            tracing::warn!("idle reaper interval is zero, using one second");
            std::time::Duration::from_secs(1)
        } else {
            interval
        };

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                self.evict_idle(Utc::now());
            }
        })
    }

    pub fn len(&self) -> usize {
        self.lock_sessions().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock_sessions().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(idle_timeout_secs: u64) -> SessionStore {
        let session_config = SessionConfig {
            idle_timeout_secs,
            ..Default::default()
        };
        SessionStore::new(&session_config, &CacheConfig::default())
    }

    #[test]
    fn test_get_or_create_is_idempotent() {
        let store = store(60);
        let first = store.get_or_create("s1", "u1");
        let second = store.get_or_create("s1", "u1");

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_huge_idle_timeout_keeps_sessions() {
        let store = store(u64::MAX);
        drop(store.get_or_create("s1", "u1"));
        assert!(store.evict_idle(Utc::now() + Duration::days(3650)).is_empty());
    }

    #[tokio::test]
    async fn test_zero_reap_interval_still_evicts() {
        let store = Arc::new(store(0));
        drop(store.get_or_create("s1", "u1"));

        let reaper = Arc::clone(&store).spawn_idle_reaper(std::time::Duration::ZERO);
        // first tick fires immediately
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        assert!(!reaper.is_finished());
        assert!(store.is_empty());
        reaper.abort();
    }

    #[test]
    fn test_reset_and_touch_unknown_session() {
        let store = store(60);
        assert!(!store.reset("missing"));
        assert!(!store.touch("missing"));
    }

    #[test]
    fn test_evict_idle_skips_held_sessions() {
        let store = store(60);
        let held = store.get_or_create("held", "u1");
        drop(store.get_or_create("idle", "u2"));

        let later = Utc::now() + Duration::seconds(120);
        let evicted = store.evict_idle(later);

        assert_eq!(evicted, vec!["idle".to_string()]);
        assert!(store.contains("held"));
        drop(held);
    }

    #[test]
    fn test_evict_idle_keeps_recent_sessions() {
        let store = store(60);
        drop(store.get_or_create("s1", "u1"));
        assert!(store.evict_idle(Utc::now()).is_empty());
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_evict_idle_skips_running_sessions() {
        let store = store(60);
        let handle = store.get_or_create("s1", "u1");
        let gate = handle.begin_run().await;
        let later = Utc::now() + Duration::seconds(120);

        assert!(store.evict_idle(later).is_empty());
        drop(gate);
        drop(handle);

        assert_eq!(store.evict_idle(later), vec!["s1".to_string()]);
    }
}
