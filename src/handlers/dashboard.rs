use crate::{
    analytics::{
        bar_hue, format_activity_time, format_list_date, truncate_url, DISTRIBUTION_DISPLAY_LIMIT,
    },
    models::{AnalyticsSummary, AuthMode, UrlRecord},
    session::{CurrentSession, SessionView, SESSION_COOKIE},
    store::demo_records,
    validation, AppState,
};
use askama::Template;
use axum::{
    extract::{Form, Query, State},
    response::{IntoResponse, Redirect, Response},
    Json,
};
use axum_extra::extract::{
    cookie::{Cookie, SameSite},
    CookieJar,
};
use serde::Deserialize;
use std::sync::Arc;

const FLASH_COOKIE: &str = "flash_error";

// ── Template structs ───────────────────────────────────────────────────────

#[derive(Template)]
#[template(path = "login.html")]
struct LoginTemplate {
    mode: &'static str,
    toggle_mode: &'static str,
    heading: &'static str,
    subtitle: &'static str,
    submit_label: &'static str,
    toggle_prompt: &'static str,
    toggle_label: &'static str,
    email: String,
    error: Option<String>,
}

impl LoginTemplate {
    fn new(mode: AuthMode, email: String, error: Option<String>) -> Self {
        let (heading, subtitle, submit_label, toggle_prompt, toggle_label) = match mode {
            AuthMode::Login => (
                "Welcome Back",
                "Sign in to access your shortened URLs",
                "Sign In",
                "Don't have an account?",
                "Create one",
            ),
            AuthMode::Register => (
                "Create Account",
                "Join us to start shortening your URLs",
                "Create Account",
                "Already have an account?",
                "Sign in",
            ),
        };
        Self {
            mode: mode.as_str(),
            toggle_mode: mode.toggled().as_str(),
            heading,
            subtitle,
            submit_label,
            toggle_prompt,
            toggle_label,
            email,
            error,
        }
    }
}

#[derive(Template)]
#[template(path = "dashboard.html")]
struct DashboardTemplate {
    email: String,
    recently_shortened: Option<String>,
    flash_error: Option<String>,
    total_urls: usize,
    total_clicks: u64,
    avg_clicks_per_url: String,
    best_clicks: u64,
    top: Vec<TopRow>,
    recent: Vec<RecentRow>,
    distribution: Vec<ShareRow>,
    links: Vec<LinkRow>,
}

struct TopRow {
    rank: usize,
    original: String,
    short_url: String,
    clicks: u64,
}

struct RecentRow {
    original: String,
    when: String,
    clicks: u64,
}

struct ShareRow {
    short_url: String,
    clicks: u64,
    percentage: String,
    hue: usize,
}

struct LinkRow {
    original_url: String,
    short_url: String,
    created: String,
    clicks: u64,
    is_password_protected: bool,
    is_active: bool,
    copied: bool,
}

impl DashboardTemplate {
    fn new(email: String, view: SessionView, flash_error: Option<String>) -> Self {
        let summary: &AnalyticsSummary = &view.summary;

        let top = summary
            .top
            .iter()
            .enumerate()
            .map(|(i, r)| TopRow {
                rank: i + 1,
                original: truncate_url(&r.original_url),
                short_url: r.short_url.clone(),
                clicks: r.clicks,
            })
            .collect();

        let recent = summary
            .recent
            .iter()
            .map(|r| RecentRow {
                original: truncate_url(&r.original_url),
                when: format_activity_time(&r.created_at),
                clicks: r.clicks,
            })
            .collect();

        let distribution = summary
            .distribution
            .iter()
            .take(DISTRIBUTION_DISPLAY_LIMIT)
            .enumerate()
            .map(|(i, share)| ShareRow {
                short_url: share.short_url.clone(),
                clicks: share.clicks,
                percentage: format!("{:.1}", share.percentage),
                hue: bar_hue(i),
            })
            .collect();

        let links = view
            .records
            .iter()
            .map(|r: &UrlRecord| LinkRow {
                original_url: r.original_url.clone(),
                short_url: r.short_url.clone(),
                created: format_list_date(&r.created_at),
                clicks: r.clicks,
                is_password_protected: r.is_password_protected,
                is_active: r.is_active,
                copied: view.copied.as_deref() == Some(r.short_url.as_str()),
            })
            .collect();

        Self {
            email,
            recently_shortened: view.recently_shortened.clone(),
            flash_error,
            total_urls: summary.total_urls,
            total_clicks: summary.total_clicks,
            avg_clicks_per_url: summary.avg_clicks_per_url.clone(),
            best_clicks: summary.most_clicked.clicks,
            top,
            recent,
            distribution,
            links,
        }
    }
}

// ── Form types ─────────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct LoginQuery {
    #[serde(default)]
    mode: AuthMode,
}

#[derive(Deserialize)]
pub struct LoginForm {
    email: String,
    password: String,
    #[serde(default)]
    mode: AuthMode,
}

#[derive(Deserialize)]
pub struct ShortenForm {
    url: String,
    /// Checkbox: present ("on") when ticked.
    password_protected: Option<String>,
    password: Option<String>,
}

#[derive(Deserialize)]
pub struct CopyForm {
    short_url: String,
}

// ── Handlers ───────────────────────────────────────────────────────────────

/// GET /
pub async fn index() -> Redirect {
    Redirect::to("/dashboard")
}

// ── Login / Logout ─────────────────────────────────────────────────────────

/// GET /login
pub async fn login_page(
    jar: CookieJar,
    State(state): State<Arc<AppState>>,
    Query(query): Query<LoginQuery>,
) -> Response {
    // If already signed in, skip the login page.
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        if state.sessions.get(cookie.value()).await.is_some() {
            return Redirect::to("/dashboard").into_response();
        }
    }
    LoginTemplate::new(query.mode, String::new(), None).into_response()
}

/// POST /login
pub async fn login(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Form(form): Form<LoginForm>,
) -> Response {
    if let Some(message) = validation::validate(&form.email, &form.password) {
        tracing::debug!("Rejected {} input: {}", form.mode.as_str(), message);
        return LoginTemplate::new(form.mode, form.email, Some(message.into())).into_response();
    }

    let user = match state
        .identity
        .authenticate(&form.email, &form.password, form.mode)
        .await
    {
        Ok(user) => user,
        Err(e) => {
            tracing::warn!("Sign-in failed for {}: {}", form.email, e);
            return LoginTemplate::new(form.mode, form.email, Some(e.to_string())).into_response();
        }
    };

    let (token, session) = state.sessions.create(user).await;
    if state.config.seed_demo_links {
        session
            .replace_links(demo_records(&state.config.short_base_url))
            .await;
    }
    tracing::info!("Session started for {}", session.user().email);

    let cookie = Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::seconds(
            state.config.session_duration_hours as i64 * 3600,
        ))
        .build();

    (jar.add(cookie), Redirect::to("/dashboard")).into_response()
}

/// GET /logout
pub async fn logout(State(state): State<Arc<AppState>>, jar: CookieJar) -> Response {
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        if let Some(session) = state.sessions.remove(cookie.value()).await {
            tracing::info!("Session ended for {}", session.user().email);
        }
    }

    let removal = Cookie::build((SESSION_COOKIE, ""))
        .path("/")
        .max_age(time::Duration::seconds(0))
        .build();

    (jar.add(removal), Redirect::to("/login")).into_response()
}

// ── Dashboard ──────────────────────────────────────────────────────────────

/// GET /dashboard
pub async fn dashboard(CurrentSession(session): CurrentSession, jar: CookieJar) -> Response {
    // Read and clear the flash cookie
    let flash_error = jar.get(FLASH_COOKIE).map(|c| c.value().to_owned());
    let clear_error = Cookie::build((FLASH_COOKIE, "")).path("/").build();

    let view = session.view().await;
    let tmpl = DashboardTemplate::new(session.user().email.clone(), view, flash_error);

    (jar.remove(clear_error), tmpl).into_response()
}

/// GET /dashboard/summary
pub async fn summary(CurrentSession(session): CurrentSession) -> Json<AnalyticsSummary> {
    Json((*session.summary().await).clone())
}

/// POST /dashboard/shorten
pub async fn shorten(
    CurrentSession(session): CurrentSession,
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Form(form): Form<ShortenForm>,
) -> Response {
    let is_password_protected = form.password_protected.is_some();
    let password = form.password.as_deref().filter(|p| !p.is_empty());

    if is_password_protected && password.is_none() {
        return flash_error_and_redirect(jar, "Enter a password to protect this link.");
    }

    match session
        .create_link(
            &state.config.short_base_url,
            &form.url,
            is_password_protected,
            password,
            state.config.recent_banner,
        )
        .await
    {
        Ok(record) => {
            tracing::info!(
                "{} shortened {} to {}",
                session.user().email,
                record.original_url,
                record.short_url
            );
            Redirect::to("/dashboard").into_response()
        }
        Err(e) => {
            tracing::debug!("Shorten rejected: {}", e);
            flash_error_and_redirect(jar, &e.to_string())
        }
    }
}

/// POST /dashboard/copy
///
/// The browser writes to the clipboard itself; this only drives the
/// "Copied!" indicator.
pub async fn copy(
    CurrentSession(session): CurrentSession,
    State(state): State<Arc<AppState>>,
    Form(form): Form<CopyForm>,
) -> Redirect {
    session
        .mark_copied(form.short_url, state.config.copied_flash)
        .await;
    Redirect::to("/dashboard")
}

/// POST /dashboard/refresh
pub async fn refresh(
    CurrentSession(session): CurrentSession,
    State(state): State<Arc<AppState>>,
) -> Redirect {
    session
        .replace_links(demo_records(&state.config.short_base_url))
        .await;
    Redirect::to("/dashboard")
}

// ── Private helpers ────────────────────────────────────────────────────────

/// Set the error flash cookie and go back to the dashboard.
fn flash_error_and_redirect(jar: CookieJar, message: &str) -> Response {
    let cookie = Cookie::build((FLASH_COOKIE, message.to_owned()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::seconds(30))
        .build();

    (jar.add(cookie), Redirect::to("/dashboard")).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        gate::tests::FakeResolver,
        models::{ClickShare, User},
        resolver::Lookup,
    };
    use axum::http::{header::SET_COOKIE, StatusCode};
    use chrono::{TimeZone, Utc};

    fn app_state() -> Arc<AppState> {
        AppState::for_tests(FakeResolver::new(Ok(Lookup::NotFound)))
    }

    fn set_cookie(resp: &Response) -> Option<&str> {
        resp.headers().get(SET_COOKIE).and_then(|v| v.to_str().ok())
    }

    fn login_form(email: &str, password: &str) -> Form<LoginForm> {
        Form(LoginForm {
            email: email.into(),
            password: password.into(),
            mode: AuthMode::Login,
        })
    }

    fn shorten_form(url: &str, password: Option<&str>) -> Form<ShortenForm> {
        Form(ShortenForm {
            url: url.into(),
            password_protected: password.map(|_| "on".to_owned()),
            password: password.map(str::to_owned),
        })
    }

    #[tokio::test]
    async fn invalid_credentials_stay_on_login_page() {
        let state = app_state();
        let resp = login(
            State(state.clone()),
            CookieJar::new(),
            login_form("noatsign", "abcdef"),
        )
        .await;

        assert_eq!(resp.status(), StatusCode::OK);
        assert!(set_cookie(&resp).is_none());
        assert_eq!(state.sessions.len().await, 0);
    }

    #[tokio::test]
    async fn blocked_email_is_refused() {
        let state = app_state();
        let resp = login(
            State(state.clone()),
            CookieJar::new(),
            login_form("blocked@example.com", "abcdef"),
        )
        .await;

        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(state.sessions.len().await, 0);
    }

    #[tokio::test]
    async fn valid_login_starts_seeded_session() {
        let state = app_state();
        let resp = login(
            State(state.clone()),
            CookieJar::new(),
            login_form("a@b.com", "abcdef"),
        )
        .await;
        assert!(resp.status().is_redirection());

        let cookie = set_cookie(&resp).unwrap();
        let token = cookie
            .strip_prefix("session_id=")
            .and_then(|rest| rest.split(';').next())
            .unwrap();
        let session = state.sessions.get(token).await.unwrap();

        assert_eq!(session.user().email, "a@b.com");
        assert_eq!(session.summary().await.total_clicks, 15);
    }

    #[tokio::test]
    async fn summary_endpoint_serializes_seeded_session() {
        let state = app_state();
        let (_, session) = state
            .sessions
            .create(User {
                id: "u1".into(),
                email: "a@b.com".into(),
            })
            .await;
        session
            .replace_links(demo_records(&state.config.short_base_url))
            .await;

        let Json(body) = summary(CurrentSession(session)).await;
        let json = serde_json::to_value(&body).unwrap();

        assert_eq!(json["totalUrls"], 1);
        assert_eq!(json["totalClicks"], 15);
        assert_eq!(json["avgClicksPerUrl"], "15.0");
        assert_eq!(json["mostClicked"]["shortUrl"], "https://short.ly/abc123");
        assert_eq!(json["distribution"][0]["percentage"], 100.0);
    }

    #[tokio::test]
    async fn shorten_prepends_to_session() {
        let state = app_state();
        let (_, session) = state
            .sessions
            .create(User {
                id: "u1".into(),
                email: "a@b.com".into(),
            })
            .await;

        let resp = shorten(
            CurrentSession(session.clone()),
            State(state.clone()),
            CookieJar::new(),
            shorten_form("https://example.com/long", None),
        )
        .await;

        assert!(resp.status().is_redirection());
        assert!(set_cookie(&resp).is_none());
        let view = session.view().await;
        assert_eq!(view.records.len(), 1);
        assert_eq!(
            view.recently_shortened.as_deref(),
            Some(view.records[0].short_url.as_str())
        );
    }

    #[tokio::test]
    async fn protected_link_needs_a_password() {
        let state = app_state();
        let (_, session) = state
            .sessions
            .create(User {
                id: "u1".into(),
                email: "a@b.com".into(),
            })
            .await;

        let resp = shorten(
            CurrentSession(session.clone()),
            State(state.clone()),
            CookieJar::new(),
            shorten_form("https://example.com/long", Some("")),
        )
        .await;

        assert!(set_cookie(&resp).is_some_and(|c| c.starts_with("flash_error=")));
        assert!(session.view().await.records.is_empty());
    }

    #[tokio::test]
    async fn bad_url_is_flashed() {
        let state = app_state();
        let (_, session) = state
            .sessions
            .create(User {
                id: "u1".into(),
                email: "a@b.com".into(),
            })
            .await;

        let resp = shorten(
            CurrentSession(session.clone()),
            State(state.clone()),
            CookieJar::new(),
            shorten_form("javascript:alert(1)", None),
        )
        .await;

        assert!(set_cookie(&resp).is_some_and(|c| c.starts_with("flash_error=")));
        assert!(session.view().await.records.is_empty());
    }

    fn record(code: &str, clicks: u64) -> UrlRecord {
        UrlRecord {
            id: code.into(),
            original_url: format!("https://example.com/a/very/long/path/for/{code}"),
            short_url: format!("https://short.ly/{code}"),
            clicks,
            created_at: Utc.with_ymd_and_hms(2026, 10, 19, 9, 30, 0).unwrap(),
            is_active: true,
            ..Default::default()
        }
    }

    fn view(records: Vec<UrlRecord>, copied: Option<&str>) -> SessionView {
        let summary = crate::analytics::summarize(&records);
        SessionView {
            records: Arc::new(records),
            summary: Arc::new(summary),
            recently_shortened: None,
            copied: copied.map(str::to_owned),
        }
    }

    #[test]
    fn dashboard_rows_are_ranked_and_truncated() {
        let tmpl = DashboardTemplate::new(
            "a@b.com".into(),
            view(vec![record("aaa", 2), record("bbb", 8)], None),
            None,
        );

        assert_eq!(tmpl.top.len(), 2);
        assert_eq!(tmpl.top[0].rank, 1);
        assert_eq!(tmpl.top[0].short_url, "https://short.ly/bbb");
        assert!(tmpl.top[0].original.ends_with("..."));
        assert_eq!(tmpl.best_clicks, 8);
        assert_eq!(tmpl.avg_clicks_per_url, "5.0");
        assert_eq!(tmpl.recent[0].when, "Oct 19, 09:30 AM");
        assert_eq!(tmpl.links[0].created, "10/19/2026");
    }

    #[test]
    fn distribution_rows_are_capped_and_coloured() {
        let records: Vec<_> = (1..=12).map(|i| record(&format!("c{i}"), i)).collect();
        let tmpl = DashboardTemplate::new("a@b.com".into(), view(records, None), None);

        assert_eq!(tmpl.distribution.len(), DISTRIBUTION_DISPLAY_LIMIT);
        assert_eq!(tmpl.distribution[0].hue, 220);
        assert_eq!(tmpl.distribution[1].hue, 240);
    }

    #[test]
    fn copied_flag_marks_only_that_link() {
        let tmpl = DashboardTemplate::new(
            "a@b.com".into(),
            view(vec![record("x", 0), record("y", 0)], Some("https://short.ly/y")),
            None,
        );
        assert!(!tmpl.links[0].copied);
        assert!(tmpl.links[1].copied);
    }

    #[test]
    fn percentages_render_with_one_decimal() {
        let mut v = view(vec![], None);
        v.summary = Arc::new(AnalyticsSummary {
            distribution: vec![ClickShare {
                short_url: "https://short.ly/z".into(),
                clicks: 1,
                percentage: 100.0 / 3.0,
            }],
            ..crate::analytics::summarize(&[])
        });
        let tmpl = DashboardTemplate::new("a@b.com".into(), v, None);
        assert_eq!(tmpl.distribution[0].percentage, "33.3");
    }

    #[test]
    fn login_template_switches_copy_by_mode() {
        let login = LoginTemplate::new(AuthMode::Login, String::new(), None);
        assert_eq!(login.mode, "login");
        assert_eq!(login.toggle_mode, "register");
        assert_eq!(login.submit_label, "Sign In");

        let register = LoginTemplate::new(AuthMode::Register, String::new(), None);
        assert_eq!(register.heading, "Create Account");
        assert_eq!(register.toggle_mode, "login");
    }

    #[test]
    fn empty_dashboard_renders() {
        let tmpl = DashboardTemplate::new("a@b.com".into(), view(vec![], None), None);
        let html = tmpl.render().unwrap();
        assert!(html.contains("No URLs created yet"));
        assert!(html.contains("No click data available."));
    }
}
