use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One shortened link owned by a dashboard session.
///
/// Only `clicks`, `is_active` and `password_attempts` may change after
/// creation, and nothing in the dashboard currently changes them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UrlRecord {
    pub id: String,
    pub original_url: String,
    pub short_url: String,
    pub clicks: u64,
    pub created_at: DateTime<Utc>,
    pub is_password_protected: bool,
    pub is_active: bool,
    pub password_attempts: u32,
}

/// The signed-in dashboard user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct User {
    pub id: String,
    pub email: String,
}

/// Whether the login form is signing in or creating an account.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMode {
    #[default]
    Login,
    Register,
}

impl AuthMode {
    pub fn toggled(self) -> Self {
        match self {
            AuthMode::Login => AuthMode::Register,
            AuthMode::Register => AuthMode::Login,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AuthMode::Login => "login",
            AuthMode::Register => "register",
        }
    }
}

/// Share of all clicks that went to one link.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClickShare {
    pub short_url: String,
    pub clicks: u64,
    pub percentage: f64,
}

/// Aggregate statistics derived from a session's links.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsSummary {
    pub total_urls: usize,
    pub total_clicks: u64,
    /// One decimal place, or `"0"` when there are no links.
    pub avg_clicks_per_url: String,
    /// `UrlRecord::default()` when there are no links.
    pub most_clicked: UrlRecord,
    pub recent: Vec<UrlRecord>,
    pub top: Vec<UrlRecord>,
    pub distribution: Vec<ClickShare>,
}
