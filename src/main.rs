use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod analytics;
mod cache;
mod config;
mod gate;
mod handlers;
mod identity;
mod models;
mod resolver;
mod session;
mod shortener;
mod store;
mod timer;
mod validation;

use cache::GateCache;
use identity::{IdentityProvider, LocalIdentityProvider};
use resolver::{HttpResolver, LinkResolver};
use session::SessionStore;

// ── Shared application state ───────────────────────────────────────────────

pub struct AppState {
    pub config: config::AppConfig,
    pub sessions: SessionStore,
    pub identity: Arc<dyn IdentityProvider>,
    /// External service that owns short links and their passwords.
    pub resolver: Arc<dyn LinkResolver>,
    /// Password prompts waiting for the visitor's next attempt.
    pub gates: GateCache,
}

#[cfg(test)]
impl AppState {
    /// State with test defaults and the given resolver.
    pub fn for_tests(resolver: impl LinkResolver + 'static) -> Arc<Self> {
        let config = config::AppConfig::for_tests();
        Arc::new(Self {
            sessions: SessionStore::new(config.session_duration_hours),
            identity: Arc::new(LocalIdentityProvider::new(config.auth_delay)),
            resolver: Arc::new(resolver),
            gates: GateCache::new(config.gate_ttl),
            config,
        })
    }
}

// ── Entry point ────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env (ignore error if file is absent; env vars may already be set)
    dotenvy::dotenv().ok();

    // Initialise structured logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "shortly=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration from environment
    let config = config::AppConfig::from_env()?;
    tracing::info!("Starting shortly on {}", config.bind_addr());
    tracing::info!("Short links use {}", config.short_base_url);
    tracing::info!("Resolving links via {}", config.backend_url);

    let resolver = HttpResolver::new(&config.backend_url, config.resolver_timeout)?;
    let identity = LocalIdentityProvider::new(config.auth_delay);
    let sessions = SessionStore::new(config.session_duration_hours);
    let gates = GateCache::new(config.gate_ttl);

    let state = Arc::new(AppState {
        config,
        sessions,
        identity: Arc::new(identity),
        resolver: Arc::new(resolver),
        gates,
    });

    let bind_addr = state.config.bind_addr();
    let app = router(state);

    // ── Serve ──────────────────────────────────────────────────────────────
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!("Listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app).await?;

    Ok(())
}

fn router(state: Arc<AppState>) -> Router {
    let dashboard_router = Router::new()
        .route("/", get(handlers::dashboard::dashboard))
        .route("/shorten", post(handlers::dashboard::shorten))
        .route("/copy", post(handlers::dashboard::copy))
        .route("/refresh", post(handlers::dashboard::refresh))
        .route("/summary", get(handlers::dashboard::summary));

    Router::new()
        .route("/", get(handlers::dashboard::index))
        // Liveness probe, no session required
        .route("/health", get(|| async { axum::http::StatusCode::OK }))
        .route(
            "/login",
            get(handlers::dashboard::login_page).post(handlers::dashboard::login),
        )
        .route("/logout", get(handlers::dashboard::logout))
        .nest("/dashboard", dashboard_router)
        // Short-link access must come LAST so the fixed paths take priority
        .route("/:code", get(handlers::access::access))
        .route("/:code/unlock", post(handlers::access::unlock))
        .route("/:code/cancel", post(handlers::access::cancel))
        .with_state(state)
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
}
