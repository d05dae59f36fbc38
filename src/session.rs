use crate::{
    analytics::SummaryMemo,
    models::{AnalyticsSummary, UrlRecord, User},
    shortener::{self, ShortenError},
    store::UrlStore,
    timer::DelayedReset,
    AppState,
};
use async_trait::async_trait;
use axum::{
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
    response::Redirect,
};
use axum_extra::extract::CookieJar;
use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::sync::RwLock;
use uuid::Uuid;

pub const SESSION_COOKIE: &str = "session_id";

// ── Session ────────────────────────────────────────────────────────────────

/// Everything one signed-in user sees on the dashboard.
///
/// Dropping the session drops its links and aborts any pending banner or
/// "copied" reset.
pub struct Session {
    user: User,
    state: RwLock<SessionState>,
    banner_reset: DelayedReset,
    copied_reset: DelayedReset,
}

#[derive(Default)]
struct SessionState {
    store: UrlStore,
    memo: SummaryMemo,
    recently_shortened: Option<String>,
    copied: Option<String>,
}

/// A consistent read of the session for rendering.
pub struct SessionView {
    pub records: Arc<Vec<UrlRecord>>,
    pub summary: Arc<AnalyticsSummary>,
    pub recently_shortened: Option<String>,
    pub copied: Option<String>,
}

impl Session {
    pub fn new(user: User) -> Self {
        Self {
            user,
            state: RwLock::new(SessionState::default()),
            banner_reset: DelayedReset::new(),
            copied_reset: DelayedReset::new(),
        }
    }

    pub fn user(&self) -> &User {
        &self.user
    }

    /// Shorten `original_url`, put the record at the top of the list and
    /// show it in the banner for `banner_for`.
    pub async fn create_link(
        self: &Arc<Self>,
        short_base_url: &str,
        original_url: &str,
        is_password_protected: bool,
        password: Option<&str>,
        banner_for: Duration,
    ) -> Result<UrlRecord, ShortenError> {
        let record = {
            let mut state = self.state.write().await;
            let record = shortener::shorten(
                &state.store,
                short_base_url,
                original_url,
                is_password_protected,
                password,
            )?;
            state.store.push_newest(record.clone());
            state.recently_shortened = Some(record.short_url.clone());
            record
        };

        let weak = Arc::downgrade(self);
        let shown = record.short_url.clone();
        self.banner_reset.arm(banner_for, async move {
            if let Some(session) = weak.upgrade() {
                let mut state = session.state.write().await;
                if state.recently_shortened.as_deref() == Some(shown.as_str()) {
                    state.recently_shortened = None;
                }
            }
        });

        Ok(record)
    }

    /// Replace every link in the session.
    pub async fn replace_links(&self, records: Vec<UrlRecord>) {
        self.state.write().await.store.replace_all(records);
    }

    /// Flag `short_url` as just copied for `flash_for`.
    pub async fn mark_copied(self: &Arc<Self>, short_url: String, flash_for: Duration) {
        self.state.write().await.copied = Some(short_url.clone());

        let weak = Arc::downgrade(self);
        self.copied_reset.arm(flash_for, async move {
            if let Some(session) = weak.upgrade() {
                let mut state = session.state.write().await;
                if state.copied.as_deref() == Some(short_url.as_str()) {
                    state.copied = None;
                }
            }
        });
    }

    /// Current links plus their summary, recomputed only if the links changed.
    pub async fn view(&self) -> SessionView {
        let mut state = self.state.write().await;
        let records = state.store.snapshot();
        let summary = state.memo.get(&records);
        SessionView {
            records,
            summary,
            recently_shortened: state.recently_shortened.clone(),
            copied: state.copied.clone(),
        }
    }

    pub async fn summary(&self) -> Arc<AnalyticsSummary> {
        self.view().await.summary
    }
}

// ── Session Store ──────────────────────────────────────────────────────────

/// In-memory session store. Each entry maps a session token (UUID) to the
/// session and the instant it was created. Tokens expire after
/// `session_duration`.
pub struct SessionStore {
    sessions: RwLock<HashMap<String, (Arc<Session>, Instant)>>,
    pub session_duration: Duration,
}

impl SessionStore {
    pub fn new(session_duration_hours: u64) -> Self {
        Self::with_duration(Duration::from_secs(session_duration_hours * 3600))
    }

    pub fn with_duration(session_duration: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            session_duration,
        }
    }

    /// Start a session for `user` and return its token.
    pub async fn create(&self, user: User) -> (String, Arc<Session>) {
        let token = Uuid::new_v4().to_string();
        let session = Arc::new(Session::new(user));
        let mut sessions = self.sessions.write().await;
        // Opportunistically prune expired sessions on every login
        sessions.retain(|_, (_, created_at)| created_at.elapsed() < self.session_duration);
        sessions.insert(token.clone(), (Arc::clone(&session), Instant::now()));
        (token, session)
    }

    /// Return the session if the token exists and has not expired.
    pub async fn get(&self, token: &str) -> Option<Arc<Session>> {
        let sessions = self.sessions.read().await;
        sessions
            .get(token)
            .filter(|(_, created_at)| created_at.elapsed() < self.session_duration)
            .map(|(session, _)| Arc::clone(session))
    }

    /// Destroy a session (logout).
    pub async fn remove(&self, token: &str) -> Option<Arc<Session>> {
        let mut sessions = self.sessions.write().await;
        sessions.remove(token).map(|(session, _)| session)
    }

    #[cfg(test)]
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}

// ── CurrentSession extractor ───────────────────────────────────────────────

/// Extractor that enforces sign-in on any handler that includes it as a
/// parameter. If the request carries a valid `session_id` cookie the
/// extractor yields the session; otherwise it short-circuits with a
/// redirect to the login page so the handler never runs.
pub struct CurrentSession(pub Arc<Session>);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentSession
where
    S: Send + Sync,
    Arc<AppState>: FromRef<S>,
{
    type Rejection = Redirect;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let state = Arc::<AppState>::from_ref(state);
        let jar = CookieJar::from_headers(&parts.headers);

        let session = match jar.get(SESSION_COOKIE) {
            Some(cookie) => state.sessions.get(cookie.value()).await,
            None => None,
        };

        session.map(CurrentSession).ok_or_else(|| Redirect::to("/login"))
    }
}
