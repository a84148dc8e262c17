//! Session lifecycle (§3 Session, §4.4 `startSession`/`terminateSession`).
//!
//! A `Session` is an opaque key/value bag identified by an ID placed in a
//! cookie. `$sessionCookiePath` and `$sessionCookieSecure` are reserved
//! keys the session itself remembers so `terminateSession` can emit a
//! clearing cookie with matching attributes without the caller repeating
//! them.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use std::time::{SystemTime, UNIX_EPOCH};

pub const SESSION_COOKIE_PATH_KEY: &str = "$sessionCookiePath";
pub const SESSION_COOKIE_SECURE_KEY: &str = "$sessionCookieSecure";

/// Name of the cookie carrying a session's ID, read by `dispatch_request`
/// and written by `Response::start_session`/`terminate_session`.
pub const SESSION_COOKIE_NAME: &str = "session_id";

#[derive(Debug, Clone, Default)]
pub struct Session {
    pub id: String,
    values: HashMap<String, String>,
}

impl Session {
    pub fn new(id: impl Into<String>) -> Self {
        Session {
            id: id.into(),
            values: HashMap::new(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(|s| s.as_str())
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.values.remove(key)
    }

    pub fn cookie_path(&self) -> &str {
        self.get(SESSION_COOKIE_PATH_KEY).unwrap_or("/")
    }

    pub fn cookie_secure(&self) -> bool {
        self.get(SESSION_COOKIE_SECURE_KEY) == Some("true")
    }
}

/// Storage backend for sessions. An embedder can supply a persistent
/// implementation (database, cache); the engine ships an in-memory one
/// for tests and simple deployments.
pub trait SessionStore: Send + Sync {
    fn create(&self) -> Session;
    fn load(&self, id: &str) -> Option<Session>;
    fn save(&self, session: Session);
    fn destroy(&self, id: &str);
}

/// `Mutex`-guarded `HashMap` session store. Not meant for production
/// scale (no eviction); a plain struct over a lock, no external crate.
#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<String, Session>>,
    next_id: Mutex<u64>,
}

impl InMemorySessionStore {
    pub fn new() -> Arc<Self> {
        Arc::new(InMemorySessionStore::default())
    }

    fn fresh_id(&self) -> String {
        let mut next_id = self.next_id.lock().unwrap();
        *next_id += 1;
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        format!("{:x}-{:x}", nanos, *next_id)
    }
}

impl SessionStore for InMemorySessionStore {
    fn create(&self) -> Session {
        let id = self.fresh_id();
        let session = Session::new(id.clone());
        self.sessions.write().unwrap().insert(id, session.clone());
        session
    }

    fn load(&self, id: &str) -> Option<Session> {
        self.sessions.read().unwrap().get(id).cloned()
    }

    fn save(&self, session: Session) {
        self.sessions
            .write()
            .unwrap()
            .insert(session.id.clone(), session);
    }

    fn destroy(&self, id: &str) {
        self.sessions.write().unwrap().remove(id);
    }
}
