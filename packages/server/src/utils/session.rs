use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tracing::info;

/// Issued admin session.
#[derive(Debug, Clone)]
pub struct Session {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Longer TTLs are clamped to this.
const MAX_TTL: Duration = Duration::from_secs(365 * 24 * 60 * 60);

#[derive(Default)]
struct Inner {
    by_token: HashMap<String, Instant>,
    by_expiry: BTreeSet<(Instant, String)>,
}

impl Inner {
    fn remove(&mut self, token: &str) -> bool {
        match self.by_token.remove(token) {
            Some(expiry) => {
                self.by_expiry.remove(&(expiry, token.to_string()));
                true
            }
            None => false,
        }
    }
}

/// In-memory admin sessions with a fixed time to live.
///
/// Expired sessions are dropped lazily on lookup and in bulk by
/// [`SessionStore::evict_expired`].
pub struct SessionStore {
    ttl: Duration,
    inner: Mutex<Inner>,
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            inner: Mutex::new(Inner::default()),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Issue a new random session token.
    pub fn create(&self) -> Session {
        self.create_at(Instant::now())
    }

    fn create_at(&self, now: Instant) -> Session {
        let token = hex::encode(rand::random::<[u8; 32]>());
        let ttl = self.ttl.min(MAX_TTL);
        let expiry = now + ttl;

        let mut inner = self.lock();
        inner.by_token.insert(token.clone(), expiry);
        inner.by_expiry.insert((expiry, token.clone()));

        let ttl = chrono::Duration::from_std(ttl).unwrap_or_default();
        Session {
            token,
            expires_at: Utc::now() + ttl,
        }
    }

    /// Whether `token` names a live session.
    pub fn validate(&self, token: &str) -> bool {
        self.validate_at(token, Instant::now())
    }

    fn validate_at(&self, token: &str, now: Instant) -> bool {
        let mut inner = self.lock();
        match inner.by_token.get(token) {
            Some(&expiry) if expiry > now => true,
            Some(_) => {
                inner.remove(token);
                false
            }
            None => false,
        }
    }

    /// End a session. Returns whether it existed.
    pub fn revoke(&self, token: &str) -> bool {
        self.lock().remove(token)
    }

    /// Remove every session that expired at or before `now`.
    pub fn evict_expired(&self, now: Instant) -> usize {
        let mut inner = self.lock();
        let mut removed = 0;
        while let Some((expiry, _)) = inner.by_expiry.first() {
            if *expiry > now {
                break;
            }
            if let Some((_, token)) = inner.by_expiry.pop_first() {
                inner.by_token.remove(&token);
                removed += 1;
            }
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.lock().by_token.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Periodically evict expired sessions.
pub fn spawn_session_sweeper(
    sessions: Arc<SessionStore>,
    interval: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(interval);

        loop {
            interval.tick().await;
            let removed = sessions.evict_expired(Instant::now());
            if removed > 0 {
                info!(removed, "Evicted expired admin sessions");
            }
        }
    })
}
