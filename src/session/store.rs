//! Concurrent session store.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::http::{HeaderMap, HeaderValue};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::time::Instant;
use uuid::Uuid;

use crate::config::{SessionConfig, MAX_SESSION_TTL_SECS};
use crate::observability::metrics;
use crate::session::cookie::{cookie_values, CookieAttributes, CookieSigner};

/// Error building a session store.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("invalid session secret: {0}")]
    Secret(#[from] hmac::digest::InvalidLength),
}

/// Opaque per-client session identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionToken(String);

impl SessionToken {
    fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SessionToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A live session. Attached to request extensions for adapters to read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub token: SessionToken,
    pub created_at: Instant,
    pub expires_at: Instant,
    pub secure_only: bool,
}

impl Session {
    pub fn is_expired_at(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// Result of [`SessionStore::ensure`].
#[derive(Debug, Clone)]
pub struct Ensured {
    pub session: Session,
    /// Present when the session was minted by this call.
    pub set_cookie: Option<HeaderValue>,
}

impl Ensured {
    pub fn is_new(&self) -> bool {
        self.set_cookie.is_some()
    }
}

/// Every this many mints, expired sessions are swept from the map.
const SWEEP_EVERY: u64 = 256;

/// Maps signed session cookies to session state.
///
/// Backed by a sharded `DashMap`, so lookups and inserts from unrelated
/// connections only contend when they hash to the same shard. Expiry is
/// checked lazily: an expired entry is removed when it is next presented,
/// and every [`SWEEP_EVERY`] mints a sweep reclaims the ones never seen again.
#[derive(Debug, Clone)]
pub struct SessionStore {
    sessions: Arc<DashMap<SessionToken, Session>>,
    minted: Arc<AtomicU64>,
    signer: CookieSigner,
    cookie: CookieAttributes,
    ttl: Duration,
}

impl SessionStore {
    /// `secure` marks cookies `Secure`; set it when clients reach the
    /// gateway over an encrypted transport.
    ///
    /// The lifetime is clamped to [`MAX_SESSION_TTL_SECS`].
    pub fn new(config: &SessionConfig, secure: bool) -> Result<Self, SessionError> {
        let ttl_secs = config.ttl_secs.min(MAX_SESSION_TTL_SECS);
        Ok(Self {
            sessions: Arc::new(DashMap::new()),
            minted: Arc::new(AtomicU64::new(0)),
            signer: CookieSigner::new(config.secret.as_bytes())?,
            cookie: CookieAttributes {
                name: config.cookie_name.clone(),
                max_age_secs: ttl_secs,
                secure,
            },
            ttl: Duration::from_secs(ttl_secs),
        })
    }

    /// Return the presented session if it is valid, or mint a new one.
    pub fn ensure(&self, headers: &HeaderMap) -> Ensured {
        if let Some(session) = self.lookup(headers) {
            return Ensured {
                session,
                set_cookie: None,
            };
        }

        let session = self.mint();
        let set_cookie = self.cookie.set_cookie(&self.signer.sign(session.token.as_str()));
        Ensured {
            session,
            set_cookie,
        }
    }

    /// Find a valid, unexpired session among the presented cookies.
    pub fn lookup(&self, headers: &HeaderMap) -> Option<Session> {
        let now = Instant::now();
        cookie_values(headers, &self.cookie.name)
            .filter_map(|value| self.signer.verify(value))
            .find_map(|id| self.get_live(&SessionToken(id.to_string()), now))
    }

    fn get_live(&self, token: &SessionToken, now: Instant) -> Option<Session> {
        if let Some(session) = self.sessions.get(token) {
            if !session.is_expired_at(now) {
                return Some(session.clone());
            }
        }
        // Expired sessions are inert; drop them now that they were touched.
        if self.sessions.remove_if(token, |_, s| s.is_expired_at(now)).is_some() {
            tracing::debug!(session = %token, "Session expired");
        }
        None
    }

    fn mint(&self) -> Session {
        let now = Instant::now();
        let session = loop {
            let token = SessionToken::generate();
            if let Entry::Vacant(slot) = self.sessions.entry(token.clone()) {
                let session = Session {
                    token,
                    created_at: now,
                    expires_at: now + self.ttl,
                    secure_only: self.cookie.secure,
                };
                slot.insert(session.clone());
                break session;
            }
        };
        metrics::record_session_minted();
        tracing::debug!(session = %session.token, "Session minted");

        if self.minted.fetch_add(1, Ordering::Relaxed) % SWEEP_EVERY == SWEEP_EVERY - 1 {
            self.purge_expired(now);
        }
        session
    }

    /// Drop every session expired at `now`. Returns how many were removed.
    pub fn purge_expired(&self, now: Instant) -> usize {
        let before = self.sessions.len();
        self.sessions.retain(|_, session| !session.is_expired_at(now));
        let purged = before.saturating_sub(self.sessions.len());
        if purged > 0 {
            tracing::debug!(purged, remaining = self.sessions.len(), "Expired sessions swept");
        }
        purged
    }

    /// Number of stored sessions, expired ones included until swept.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Name of the session cookie.
    pub fn cookie_name(&self) -> &str {
        &self.cookie.name
    }
}
