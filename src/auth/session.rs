use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::Utc;
use rand::Rng;

use super::credentials::Credentials;
use super::password::constant_time_eq;
use crate::error::{Error, Result};
use crate::types::AdminRecord;

pub const RATE_LIMIT_MAX: usize = 5;
pub const RATE_LIMIT_WINDOW_SECS: i64 = 300;

const SESSION_ID_BYTES: usize = 32;
const CSRF_TOKEN_BYTES: usize = 16; // 128-bit

/// Server-side state for one session cookie.
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    pub user_id: i64,
    pub username: String,
    pub roles: Vec<String>,
    pub logged_in: bool,
    pub csrf_token: String,
    /// Attempt timestamps per (action, client ip), pruned lazily on every
    /// rate-limit check.
    pub rate: HashMap<(String, String), Vec<i64>>,
}

/// Keyed session storage. An explicit abstraction (rather than ambient
/// process state) so multiple concurrent sessions can be driven
/// deterministically in tests.
pub trait SessionStore: Send + Sync {
    fn load(&self, id: &str) -> Option<SessionState>;
    fn save(&self, id: &str, state: SessionState);
    fn remove(&self, id: &str) -> Option<SessionState>;
}

/// In-memory session store. Sessions are per-process; rate-limit counters
/// therefore reset with a fresh session, mirroring the per-session scoping
/// this panel has always had.
#[derive(Default)]
pub struct MemorySessions {
    inner: RwLock<HashMap<String, SessionState>>,
}

impl MemorySessions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemorySessions {
    fn load(&self, id: &str) -> Option<SessionState> {
        self.inner
            .read()
            .expect("session lock poisoned")
            .get(id)
            .cloned()
    }

    fn save(&self, id: &str, state: SessionState) {
        self.inner
            .write()
            .expect("session lock poisoned")
            .insert(id.to_string(), state);
    }

    fn remove(&self, id: &str) -> Option<SessionState> {
        self.inner
            .write()
            .expect("session lock poisoned")
            .remove(id)
    }
}

/// Session lifecycle: login, logout, auth checks, CSRF issuance/validation
/// and per-(action, ip) rate limiting.
#[derive(Clone)]
pub struct SessionGuard {
    sessions: Arc<dyn SessionStore>,
    credentials: Credentials,
}

impl SessionGuard {
    #[must_use]
    pub fn new(sessions: Arc<dyn SessionStore>, credentials: Credentials) -> Self {
        Self {
            sessions,
            credentials,
        }
    }

    /// Resumes the session named by the cookie, or starts a fresh one. A
    /// CSRF token is present in the returned session either way. The bool
    /// is true when a new session (and thus a new cookie) was created.
    pub fn open(&self, existing: Option<&str>) -> (String, bool) {
        if let Some(id) = existing {
            if let Some(mut state) = self.sessions.load(id) {
                if state.csrf_token.is_empty() {
                    state.csrf_token = random_hex(CSRF_TOKEN_BYTES);
                    self.sessions.save(id, state);
                }
                return (id.to_string(), false);
            }
        }
        (self.start_fresh(), true)
    }

    /// Current state snapshot; an unknown id reads as an anonymous session.
    #[must_use]
    pub fn state(&self, id: &str) -> SessionState {
        self.sessions.load(id).unwrap_or_default()
    }

    #[must_use]
    pub fn is_authenticated(&self, id: &str) -> bool {
        let state = self.state(id);
        state.logged_in && state.user_id > 0
    }

    #[must_use]
    pub fn csrf_token(&self, id: &str) -> String {
        self.state(id).csrf_token
    }

    /// Constant-time CSRF check. An absent or empty token never passes.
    #[must_use]
    pub fn check_csrf(&self, id: &str, submitted: &str) -> bool {
        let stored = self.csrf_token(id);
        !stored.is_empty() && constant_time_eq(&stored, submitted)
    }

    /// Authenticates against the credential store.
    ///
    /// Order matters: the rate-limit gate runs first, empty fields and bad
    /// credentials are recorded as attempts, and a success regenerates the
    /// session id (fixation defense) WITHOUT clearing recorded attempts.
    /// Returns the regenerated session id alongside the admin record.
    pub fn login(
        &self,
        id: &str,
        username: &str,
        secret: &str,
        client_ip: &str,
    ) -> Result<(String, AdminRecord)> {
        if !self.rate_limit_check(id, "login", client_ip) {
            return Err(Error::RateLimited);
        }

        if username.is_empty() || secret.is_empty() {
            self.record_attempt(id, "login", client_ip);
            return Err(Error::Validation(
                "Username or password is empty".to_string(),
            ));
        }

        let Some(admin) = self.credentials.verify_credentials(username, secret)? else {
            self.record_attempt(id, "login", client_ip);
            return Err(Error::Unauthorized);
        };

        let new_id = self.mark_logged_in(id, &admin);
        Ok((new_id, admin))
    }

    /// Regenerates the session id and populates the user fields, keeping
    /// the CSRF token and rate counters of the old session. Also used when
    /// first-time admin setup auto-logs-in.
    pub fn mark_logged_in(&self, id: &str, admin: &AdminRecord) -> String {
        let mut state = self.sessions.remove(id).unwrap_or_default();
        if state.csrf_token.is_empty() {
            state.csrf_token = random_hex(CSRF_TOKEN_BYTES);
        }
        state.user_id = admin.id;
        state.username = admin.username.clone();
        state.roles = admin.roles.clone();
        state.logged_in = true;

        let new_id = random_hex(SESSION_ID_BYTES);
        self.sessions.save(&new_id, state);
        new_id
    }

    /// Destroys the session entirely and starts a fresh anonymous one with
    /// a new CSRF token. Returns the fresh session id.
    pub fn logout(&self, id: &str) -> String {
        self.sessions.remove(id);
        self.start_fresh()
    }

    /// True iff fewer than `RATE_LIMIT_MAX` attempts for (key, ip) fall
    /// inside the window. Prunes expired attempts as a side effect.
    pub fn rate_limit_check(&self, id: &str, key: &str, client_ip: &str) -> bool {
        let now = Utc::now().timestamp();
        let mut state = self.sessions.load(id).unwrap_or_default();
        let attempts = state
            .rate
            .entry((key.to_string(), client_ip.to_string()))
            .or_default();
        attempts.retain(|t| now - *t < RATE_LIMIT_WINDOW_SECS);
        let allowed = attempts.len() < RATE_LIMIT_MAX;
        self.sessions.save(id, state);
        allowed
    }

    /// Records an attempt timestamp for (key, ip). No pruning here; that
    /// happens on the next check.
    pub fn record_attempt(&self, id: &str, key: &str, client_ip: &str) {
        let mut state = self.sessions.load(id).unwrap_or_default();
        state
            .rate
            .entry((key.to_string(), client_ip.to_string()))
            .or_default()
            .push(Utc::now().timestamp());
        self.sessions.save(id, state);
    }

    fn start_fresh(&self) -> String {
        let id = random_hex(SESSION_ID_BYTES);
        let state = SessionState {
            csrf_token: random_hex(CSRF_TOKEN_BYTES),
            ..Default::default()
        };
        self.sessions.save(&id, state);
        id
    }
}

/// Cryptographically random hex string of `bytes * 2` characters.
fn random_hex(bytes: usize) -> String {
    let mut buf = vec![0u8; bytes];
    rand::thread_rng().fill(&mut buf[..]);
    hex::encode(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::FileStore;
    use tempfile::TempDir;

    fn guard(dir: &TempDir) -> (SessionGuard, Arc<MemorySessions>) {
        let store = Arc::new(FileStore::new(dir.path().join("site.json")));
        let credentials = Credentials::new(store);
        credentials.bootstrap_default().unwrap();
        let sessions = Arc::new(MemorySessions::new());
        (
            SessionGuard::new(sessions.clone(), credentials),
            sessions,
        )
    }

    #[test]
    fn test_open_issues_csrf_token_once() {
        let dir = TempDir::new().unwrap();
        let (guard, _) = guard(&dir);

        let (id, created) = guard.open(None);
        assert!(created);
        let token = guard.csrf_token(&id);
        assert_eq!(token.len(), 32);

        let (same_id, created) = guard.open(Some(&id));
        assert!(!created);
        assert_eq!(same_id, id);
        assert_eq!(guard.csrf_token(&id), token);
    }

    #[test]
    fn test_open_with_stale_cookie_starts_fresh() {
        let dir = TempDir::new().unwrap();
        let (guard, _) = guard(&dir);

        let (id, created) = guard.open(Some("deadbeef"));
        assert!(created);
        assert_ne!(id, "deadbeef");
    }

    #[test]
    fn test_login_success_regenerates_session_id() {
        let dir = TempDir::new().unwrap();
        let (guard, _) = guard(&dir);
        let (id, _) = guard.open(None);
        let csrf = guard.csrf_token(&id);

        let (new_id, admin) = guard.login(&id, "admin", "admin", "1.2.3.4").unwrap();
        assert_ne!(new_id, id);
        assert_eq!(admin.username, "admin");
        assert!(guard.is_authenticated(&new_id));
        assert!(!guard.is_authenticated(&id));
        // CSRF token survives the id regeneration.
        assert_eq!(guard.csrf_token(&new_id), csrf);
    }

    #[test]
    fn test_login_failure_is_recorded() {
        let dir = TempDir::new().unwrap();
        let (guard, sessions) = guard(&dir);
        let (id, _) = guard.open(None);

        assert!(matches!(
            guard.login(&id, "admin", "wrong", "1.2.3.4"),
            Err(Error::Unauthorized)
        ));
        assert!(matches!(
            guard.login(&id, "", "", "1.2.3.4"),
            Err(Error::Validation(_))
        ));

        let state = sessions.load(&id).unwrap();
        let attempts = &state.rate[&("login".to_string(), "1.2.3.4".to_string())];
        assert_eq!(attempts.len(), 2);
    }

    #[test]
    fn test_failed_attempts_survive_success() {
        let dir = TempDir::new().unwrap();
        let (guard, sessions) = guard(&dir);
        let (id, _) = guard.open(None);

        let _ = guard.login(&id, "admin", "wrong", "1.2.3.4");
        let (new_id, _) = guard.login(&id, "admin", "admin", "1.2.3.4").unwrap();

        let state = sessions.load(&new_id).unwrap();
        let attempts = &state.rate[&("login".to_string(), "1.2.3.4".to_string())];
        assert_eq!(attempts.len(), 1);
    }

    #[test]
    fn test_rate_limit_blocks_sixth_attempt() {
        let dir = TempDir::new().unwrap();
        let (guard, _) = guard(&dir);
        let (id, _) = guard.open(None);

        for _ in 0..RATE_LIMIT_MAX {
            assert!(matches!(
                guard.login(&id, "admin", "wrong", "1.2.3.4"),
                Err(Error::Unauthorized)
            ));
        }
        assert!(matches!(
            guard.login(&id, "admin", "admin", "1.2.3.4"),
            Err(Error::RateLimited)
        ));
    }

    #[test]
    fn test_rate_limit_window_expires() {
        let dir = TempDir::new().unwrap();
        let (guard, sessions) = guard(&dir);
        let (id, _) = guard.open(None);

        // Backdate five attempts beyond the window.
        let mut state = sessions.load(&id).unwrap();
        let stale = Utc::now().timestamp() - RATE_LIMIT_WINDOW_SECS - 1;
        state.rate.insert(
            ("login".to_string(), "1.2.3.4".to_string()),
            vec![stale; RATE_LIMIT_MAX],
        );
        sessions.save(&id, state);

        assert!(guard.rate_limit_check(&id, "login", "1.2.3.4"));
        // Pruning happened as a side effect.
        let state = sessions.load(&id).unwrap();
        assert!(state.rate[&("login".to_string(), "1.2.3.4".to_string())].is_empty());
    }

    #[test]
    fn test_rate_limit_keys_are_independent() {
        let dir = TempDir::new().unwrap();
        let (guard, _) = guard(&dir);
        let (id, _) = guard.open(None);

        for _ in 0..RATE_LIMIT_MAX {
            guard.record_attempt(&id, "login", "1.2.3.4");
        }
        assert!(!guard.rate_limit_check(&id, "login", "1.2.3.4"));
        assert!(guard.rate_limit_check(&id, "login", "5.6.7.8"));
        assert!(guard.rate_limit_check(&id, "other", "1.2.3.4"));
    }

    #[test]
    fn test_logout_invalidates_session_and_csrf() {
        let dir = TempDir::new().unwrap();
        let (guard, _) = guard(&dir);
        let (id, _) = guard.open(None);
        let (id, _) = guard.login(&id, "admin", "admin", "1.2.3.4").unwrap();
        let old_csrf = guard.csrf_token(&id);

        let fresh = guard.logout(&id);
        assert!(!guard.is_authenticated(&id));
        assert!(!guard.is_authenticated(&fresh));
        assert!(!guard.check_csrf(&fresh, &old_csrf));
        assert!(!guard.check_csrf(&id, &old_csrf));
        // The fresh session got a usable new token immediately.
        let new_csrf = guard.csrf_token(&fresh);
        assert!(!new_csrf.is_empty());
        assert!(guard.check_csrf(&fresh, &new_csrf));
    }

    #[test]
    fn test_check_csrf_rejects_empty_and_mismatch() {
        let dir = TempDir::new().unwrap();
        let (guard, _) = guard(&dir);
        let (id, _) = guard.open(None);

        assert!(!guard.check_csrf(&id, ""));
        assert!(!guard.check_csrf(&id, "bogus"));
        assert!(!guard.check_csrf("unknown-session", ""));
    }
}
