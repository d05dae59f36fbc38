use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("resolver request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("malformed resolver response: {0}")]
    Malformed(String),
}

/// What the resolver knows about a short code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    Found {
        requires_password: bool,
        original_url: Option<String>,
    },
    NotFound,
}

/// The resolver's answer to a password attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verification {
    Granted { original_url: String },
    Rejected {
        error: Option<String>,
        attempts: Option<u32>,
    },
}

/// The external service that owns short links and their passwords.
#[async_trait]
pub trait LinkResolver: Send + Sync {
    async fn lookup(&self, code: &str) -> Result<Lookup, ResolveError>;

    async fn verify(&self, code: &str, password: &str) -> Result<Verification, ResolveError>;
}

// ── Wire shapes ────────────────────────────────────────────────────────────

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LookupBody {
    #[serde(default)]
    requires_password: bool,
    original_url: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct VerifyRequest<'a> {
    short_url: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct VerifyGranted {
    original_url: String,
}

#[derive(Deserialize)]
struct VerifyRejected {
    error: Option<String>,
    attempts: Option<u32>,
}

// ── HTTP implementation ────────────────────────────────────────────────────

/// Talks to the resolver over HTTP:
/// `GET {base}/api/{code}` and `POST {base}/api/verify-password`.
#[derive(Debug, Clone)]
pub struct HttpResolver {
    client: reqwest::Client,
    base_url: String,
}

impl HttpResolver {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ResolveError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_owned(),
        })
    }
}

#[async_trait]
impl LinkResolver for HttpResolver {
    async fn lookup(&self, code: &str) -> Result<Lookup, ResolveError> {
        let url = format!("{}/api/{}", self.base_url, code);

        let resp = self.client.get(&url).send().await?;
        if !resp.status().is_success() {
            tracing::debug!("lookup for '{}' returned {}", code, resp.status());
            return Ok(Lookup::NotFound);
        }

        let body: LookupBody = resp
            .json()
            .await
            .map_err(|e| ResolveError::Malformed(e.to_string()))?;

        Ok(Lookup::Found {
            requires_password: body.requires_password,
            original_url: body.original_url.filter(|u| !u.is_empty()),
        })
    }

    async fn verify(&self, code: &str, password: &str) -> Result<Verification, ResolveError> {
        let url = format!("{}/api/verify-password", self.base_url);

        let resp = self
            .client
            .post(&url)
            .json(&VerifyRequest {
                short_url: code,
                password,
            })
            .send()
            .await?;

        if resp.status().is_success() {
            let body: VerifyGranted = resp
                .json()
                .await
                .map_err(|e| ResolveError::Malformed(e.to_string()))?;
            return Ok(Verification::Granted {
                original_url: body.original_url,
            });
        }

        tracing::debug!("password rejected for '{}' with {}", code, resp.status());
        let body: VerifyRejected = resp
            .json()
            .await
            .map_err(|e| ResolveError::Malformed(e.to_string()))?;

        Ok(Verification::Rejected {
            error: body.error.filter(|e| !e.is_empty()),
            attempts: body.attempts.filter(|&n| n > 0),
        })
    }
}
