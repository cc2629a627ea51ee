//! Server-side sessions.
//!
//! The browser only holds an opaque random id in the `consultorio_session`
//! cookie; the physician identity stays in process memory. Sessions expire
//! after a period of inactivity or a maximum lifetime, whichever comes first.
//!
//! This store is per process. Restarting the server logs everyone out.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use parking_lot::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::models::PhysicianIdentity;
use crate::parse::parse_duration;

/// Name of the session cookie.
pub const SESSION_COOKIE: &str = "consultorio_session";

/// Session lifetime rules.
#[derive(Debug, Clone)]
pub struct SessionPolicy {
    /// Inactivity after which the session is dropped
    pub idle_timeout: Duration,
    /// Absolute lifetime from login
    pub max_lifetime: Duration,
}

impl Default for SessionPolicy {
    /// 8 hour idle timeout (a clinic shift), 24 hour maximum lifetime
    fn default() -> Self {
        Self {
            idle_timeout: Duration::from_secs(8 * 60 * 60),
            max_lifetime: Duration::from_secs(24 * 60 * 60),
        }
    }
}

impl SessionPolicy {
    /// Load from `SESSION_IDLE_TIMEOUT` and `SESSION_MAX_LIFETIME`
    /// (e.g. "30m", "8h").
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            idle_timeout: std::env::var("SESSION_IDLE_TIMEOUT")
                .ok()
                .and_then(|s| parse_duration(&s))
                .unwrap_or(defaults.idle_timeout),
            max_lifetime: std::env::var("SESSION_MAX_LIFETIME")
                .ok()
                .and_then(|s| parse_duration(&s))
                .unwrap_or(defaults.max_lifetime),
        }
    }

    fn is_expired(&self, session: &SessionData, now: Instant) -> bool {
        now.duration_since(session.created_at) > self.max_lifetime
            || now.duration_since(session.last_activity) > self.idle_timeout
    }
}

/// What a session remembers about its physician.
#[derive(Debug, Clone)]
pub struct SessionData {
    pub medico_id: i32,
    pub medico_nombre: String,
    pub medico_email: String,
    created_at: Instant,
    last_activity: Instant,
}

/// Shared session map. Cloning shares the same sessions.
#[derive(Clone)]
pub struct SessionStore {
    sessions: Arc<RwLock<HashMap<Uuid, SessionData>>>,
    policy: SessionPolicy,
}

impl SessionStore {
    pub fn new(policy: SessionPolicy) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            policy,
        }
    }

    /// Start a session for a freshly authenticated physician.
    ///
    /// Abandoned sessions that have expired are swept out first.
    pub fn create(&self, physician: &PhysicianIdentity) -> Uuid {
        let id = Uuid::new_v4();
        let now = Instant::now();
        let mut sessions = self.sessions.write();

        let before = sessions.len();
        sessions.retain(|_, session| !self.policy.is_expired(session, now));
        let swept = before - sessions.len();
        if swept > 0 {
            debug!(swept, "Expired sessions removed");
        }

        sessions.insert(
            id,
            SessionData {
                medico_id: physician.id,
                medico_nombre: physician.nombre.clone(),
                medico_email: physician.email.clone(),
                created_at: now,
                last_activity: now,
            },
        );

        id
    }

    /// Look up a live session and record activity on it.
    ///
    /// Expired sessions are removed and reported as absent.
    pub fn touch(&self, id: Uuid) -> Option<SessionData> {
        let now = Instant::now();
        let mut sessions = self.sessions.write();

        let expired = self.policy.is_expired(sessions.get(&id)?, now);
        if expired {
            sessions.remove(&id);
            return None;
        }

        let session = sessions.get_mut(&id)?;
        session.last_activity = now;
        Some(session.clone())
    }

    /// Replace the cached display name and return the updated session.
    ///
    /// `None` when the session was removed in the meantime.
    pub fn refresh_name(&self, id: Uuid, nombre: &str) -> Option<SessionData> {
        let mut sessions = self.sessions.write();
        let session = sessions.get_mut(&id)?;
        if session.medico_nombre != nombre {
            session.medico_nombre = nombre.to_string();
        }
        Some(session.clone())
    }

    /// Drop a session entirely.
    pub fn remove(&self, id: Uuid) {
        self.sessions.write().remove(&id);
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Session id carried by the request, if the cookie parses.
pub fn session_id(jar: &CookieJar) -> Option<Uuid> {
    jar.get(SESSION_COOKIE)
        .and_then(|cookie| Uuid::parse_str(cookie.value()).ok())
}

/// Cookie handing a session id to the browser.
pub fn session_cookie(id: Uuid) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, id.to_string()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build()
}

/// Jar with the session cookie expired.
pub fn clear_session_cookie(jar: CookieJar) -> CookieJar {
    jar.remove(Cookie::build(SESSION_COOKIE).path("/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity() -> PhysicianIdentity {
        PhysicianIdentity {
            id: 3,
            nombre: "Dra. Marta".into(),
            email: "marta@hospital.com".into(),
        }
    }

    #[test]
    fn test_create_and_touch() {
        let store = SessionStore::new(SessionPolicy::default());
        let id = store.create(&identity());

        let session = store.touch(id).unwrap();
        assert_eq!(session.medico_id, 3);
        assert_eq!(session.medico_nombre, "Dra. Marta");
        assert_eq!(session.medico_email, "marta@hospital.com");
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_unknown_session_is_absent() {
        let store = SessionStore::new(SessionPolicy::default());
        assert!(store.touch(Uuid::new_v4()).is_none());
    }

    #[test]
    fn test_refresh_name_and_remove() {
        let store = SessionStore::new(SessionPolicy::default());
        let id = store.create(&identity());

        let refreshed = store.refresh_name(id, "Dra. Marta López").unwrap();
        assert_eq!(refreshed.medico_nombre, "Dra. Marta López");
        assert_eq!(refreshed.medico_email, "marta@hospital.com");
        assert_eq!(store.touch(id).unwrap().medico_nombre, "Dra. Marta López");

        store.remove(id);
        assert!(store.refresh_name(id, "Otra").is_none());
        assert!(store.touch(id).is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_idle_session_expires() {
        let store = SessionStore::new(SessionPolicy {
            idle_timeout: Duration::from_millis(1),
            max_lifetime: Duration::from_secs(60),
        });
        let id = store.create(&identity());

        std::thread::sleep(Duration::from_millis(10));

        assert!(store.touch(id).is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_abandoned_sessions_are_swept_on_login() {
        let store = SessionStore::new(SessionPolicy {
            idle_timeout: Duration::from_millis(1),
            max_lifetime: Duration::from_millis(1),
        });
        for _ in 0..100 {
            store.create(&identity());
        }
        assert_eq!(store.len(), 100);

        std::thread::sleep(Duration::from_millis(20));

        let fresh = store.create(&identity());
        assert_eq!(store.len(), 1);
        assert!(store.touch(fresh).is_some());
    }

    #[test]
    fn test_live_sessions_survive_sweep() {
        let store = SessionStore::new(SessionPolicy::default());
        let first = store.create(&identity());
        let second = store.create(&identity());

        assert_eq!(store.len(), 2);
        assert!(store.touch(first).is_some());
        assert!(store.touch(second).is_some());
    }

    #[test]
    fn test_cookie_round_trip() {
        let id = Uuid::new_v4();
        let jar = CookieJar::new().add(session_cookie(id));

        assert_eq!(session_id(&jar), Some(id));

        let cleared = clear_session_cookie(jar);
        assert_eq!(session_id(&cleared), None);
    }

    #[test]
    fn test_garbage_cookie_is_ignored() {
        let jar = CookieJar::new().add(Cookie::new(SESSION_COOKIE, "not-a-uuid"));
        assert_eq!(session_id(&jar), None);
    }
}
