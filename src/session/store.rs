use std::time::{Duration, Instant, SystemTime};

use dashmap::DashMap;
use tracing::{debug, info};

use crate::config::SessionConfig;
use crate::http::request::Request;
use crate::http::response::Response;
use crate::session::{SessionError, cookie, id};

/// Server-side session record.
#[derive(Debug, Clone)]
pub struct Session {
    key: String,
    id: String,
    last_access: Instant,
    on_client: bool,
    authenticated: bool,
}

impl Session {
    /// Creates a session with a fresh id that the client does not know yet.
    pub fn new(key: impl Into<String>) -> Result<Self, SessionError> {
        Ok(Self {
            key: key.into(),
            id: id::generate()?,
            last_access: Instant::now(),
            on_client: false,
            authenticated: false,
        })
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Whether the client already holds the cookie for this session.
    pub fn is_on_client(&self) -> bool {
        self.on_client
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    /// Time since the session was last looked up, measured at `now`.
    pub fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_access)
    }

    fn touch(&mut self) {
        self.last_access = Instant::now();
    }
}

/// Process-wide map of session id to session.
#[derive(Debug)]
pub struct SessionStore {
    policy: SessionConfig,
    sessions: DashMap<String, Session>,
}

impl SessionStore {
    pub fn new(policy: SessionConfig) -> Self {
        Self {
            policy,
            sessions: DashMap::new(),
        }
    }

    /// Name of the session cookie.
    pub fn key(&self) -> &str {
        &self.policy.key
    }

    pub fn policy(&self) -> &SessionConfig {
        &self.policy
    }

    /// Resolves the request's session cookie, creating a new session when the
    /// cookie is missing or names an unknown id.
    ///
    /// The session id is recorded on the request under the cookie name.
    pub fn find_or_create(&self, request: &mut Request) -> Result<SessionRef<'_>, SessionError> {
        let key = self.policy.key.as_str();

        let presented = request
            .headers
            .get_all("Cookie")
            .flat_map(cookie::pairs)
            .find(|(name, _)| *name == key)
            .map(|(_, value)| value.to_string());

        let id = match presented {
            Some(id) if self.touch(&id) => id,
            presented => {
                let session = Session::new(key)?;
                let id = session.id.clone();
                self.sessions.insert(id.clone(), session);

                debug!(
                    session = %id,
                    stale_cookie = presented.is_some(),
                    "Session created"
                );
                id
            }
        };

        request.session_ids.insert(key.to_string(), id.clone());
        Ok(SessionRef { store: self, id })
    }

    fn touch(&self, id: &str) -> bool {
        match self.sessions.get_mut(id) {
            Some(mut session) => {
                session.touch();
                true
            }
            None => false,
        }
    }

    /// Snapshot of a session.
    pub fn get(&self, id: &str) -> Option<Session> {
        self.sessions.get(id).map(|s| s.value().clone())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.sessions.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn set_authenticated(&self, id: &str, authenticated: bool) {
        if let Some(mut session) = self.sessions.get_mut(id) {
            session.authenticated = authenticated;
        }
    }

    /// Replaces a session with a fresh one under the same key and returns the
    /// new id. The client only learns it once a response is decorated with it
    /// through [`SessionStore::decorate`].
    pub fn reset(&self, id: &str) -> Result<String, SessionError> {
        let key = self
            .sessions
            .remove(id)
            .map(|(_, s)| s.key)
            .unwrap_or_else(|| self.policy.key.clone());

        let session = Session::new(key)?;
        let new_id = session.id.clone();
        self.sessions.insert(new_id.clone(), session);
        Ok(new_id)
    }

    /// Appends `Set-Cookie` for the session unless the client already has it.
    /// Returns whether a cookie was added.
    pub fn decorate(&self, id: &str, response: &mut Response) -> bool {
        let Some(mut session) = self.sessions.get_mut(id) else {
            return false;
        };
        if session.on_client {
            return false;
        }

        response.add_cookie(cookie::set_cookie_value(
            &self.policy,
            &session.key,
            &session.id,
            SystemTime::now(),
        ));
        session.on_client = true;
        true
    }

    /// Removes every session idle for longer than the expiry threshold,
    /// measured at `now`. Returns how many were removed.
    pub fn expire(&self, now: Instant) -> usize {
        let threshold = Duration::from_secs(self.policy.expiry_secs);
        let mut removed = 0;

        self.sessions.retain(|_, session| {
            let keep = session.age(now) <= threshold;
            if !keep {
                removed += 1;
            }
            keep
        });

        removed
    }

    /// Periodic sweep entry point for the timer collaborator.
    pub fn sweep(&self) -> usize {
        let removed = self.expire(Instant::now());
        if removed > 0 {
            info!(removed, remaining = self.len(), "Expired sessions swept");
        }
        removed
    }
}

/// A request's handle on its session.
///
/// The store keeps ownership; this only names the session by id.
#[derive(Debug, Clone)]
pub struct SessionRef<'a> {
    store: &'a SessionStore,
    id: String,
}

impl<'a> SessionRef<'a> {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn key(&self) -> &str {
        self.store.key()
    }

    pub fn store(&self) -> &'a SessionStore {
        self.store
    }

    pub fn is_authenticated(&self) -> bool {
        self.store
            .sessions
            .get(&self.id)
            .map(|s| s.authenticated)
            .unwrap_or(false)
    }

    pub fn set_authenticated(&self, authenticated: bool) {
        self.store.set_authenticated(&self.id, authenticated);
    }

    pub fn is_on_client(&self) -> bool {
        self.store
            .sessions
            .get(&self.id)
            .map(|s| s.on_client)
            .unwrap_or(false)
    }

    /// Adds the session cookie to `response` if the client lacks it.
    pub fn decorate(&self, response: &mut Response) -> bool {
        self.store.decorate(&self.id, response)
    }
}
