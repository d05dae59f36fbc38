use anyhow::{Context, Result};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Host to bind the HTTP server to, e.g. "0.0.0.0"
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Prefix for generated short links, e.g. "https://short.ly".
    /// Must NOT have a trailing slash.
    pub short_base_url: String,

    /// Base URL of the external resolver that serves `/api/{code}` and
    /// `/api/verify-password`. No trailing slash.
    pub backend_url: String,

    /// Where visitors land after cancelling a password prompt or giving up
    /// on a broken link.
    pub home_url: String,

    /// How many hours a dashboard session remains valid
    pub session_duration_hours: u64,

    /// Timeout applied to every resolver request
    pub resolver_timeout: Duration,

    /// Simulated latency of the local identity provider
    pub auth_delay: Duration,

    /// Load the sample link into the store on login
    pub seed_demo_links: bool,

    /// How long the "recently shortened" banner stays up
    pub recent_banner: Duration,

    /// How long a link shows as "Copied!"
    pub copied_flash: Duration,

    /// How long a parked password prompt stays usable
    pub gate_ttl: Duration,
}

impl AppConfig {
    /// Load configuration from environment variables (populated by dotenvy before this is called).
    pub fn from_env() -> Result<Self> {
        let port = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse::<u16>()
            .context("PORT must be a valid port number (1–65535)")?;

        let backend_url = std::env::var("BACKEND_URL")
            .unwrap_or_else(|_| "http://localhost:5000".into())
            .trim_end_matches('/')
            .to_owned();

        url::Url::parse(&backend_url).context("BACKEND_URL must be an absolute URL")?;

        let short_base_url = std::env::var("SHORT_BASE_URL")
            .unwrap_or_else(|_| "https://short.ly".into())
            .trim_end_matches('/')
            .to_owned();

        if short_base_url.is_empty() {
            anyhow::bail!("SHORT_BASE_URL must not be empty");
        }

        let seed_demo_links = match std::env::var("SEED_DEMO_LINKS") {
            Ok(v) => parse_flag(&v)
                .with_context(|| format!("SEED_DEMO_LINKS must be true or false, got '{v}'"))?,
            Err(_) => true,
        };

        let home_url = std::env::var("HOME_URL").unwrap_or_else(|_| "/".into());
        axum::http::HeaderValue::try_from(home_url.as_str())
            .context("HOME_URL must be usable as a redirect location")?;

        Ok(Self {
            host: std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port,
            short_base_url,
            backend_url,
            home_url,
            session_duration_hours: env_u64("SESSION_DURATION_HOURS", 24),
            resolver_timeout: Duration::from_secs(env_u64("RESOLVER_TIMEOUT_SECS", 5)),
            auth_delay: Duration::from_millis(env_u64("AUTH_DELAY_MS", 1000)),
            seed_demo_links,
            recent_banner: Duration::from_secs(env_u64("RECENT_BANNER_SECS", 5)),
            copied_flash: Duration::from_secs(env_u64("COPIED_FLASH_SECS", 2)),
            gate_ttl: Duration::from_secs(env_u64("GATE_TTL_MINUTES", 15) * 60),
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Read an unsigned integer, falling back to `default` when unset or unparsable.
fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .unwrap_or(default)
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
impl AppConfig {
    /// Defaults with no environment lookups, for handler-level tests.
    pub fn for_tests() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 0,
            short_base_url: "https://short.ly".into(),
            backend_url: "http://127.0.0.1:9".into(),
            home_url: "/".into(),
            session_duration_hours: 1,
            resolver_timeout: Duration::from_secs(1),
            auth_delay: Duration::ZERO,
            seed_demo_links: true,
            recent_banner: Duration::from_secs(5),
            copied_flash: Duration::from_secs(2),
            gate_ttl: Duration::from_secs(60),
        }
    }
}
