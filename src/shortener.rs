use crate::{models::UrlRecord, store::UrlStore};
use chrono::Utc;
use rand::Rng;
use url::Url;
use uuid::Uuid;

/// Base-36 digits, as used by the short codes.
const ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const CODE_LEN: usize = 6;
const FALLBACK_CODE_LEN: usize = 9;
const MAX_ATTEMPTS: usize = 10;

#[derive(Debug, thiserror::Error)]
pub enum ShortenError {
    #[error("URL must not be empty.")]
    EmptyUrl,
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("URL must start with http:// or https://")]
    UnsupportedScheme,
}

/// Build a new record for `original_url`.
///
/// The short code is checked against `store` so it is unique within the
/// session. The record is returned, not inserted: callers prepend it.
///
/// `password` is accepted for protected links but is not stored on the record
/// or sent anywhere.
pub fn shorten(
    store: &UrlStore,
    short_base_url: &str,
    original_url: &str,
    is_password_protected: bool,
    password: Option<&str>,
) -> Result<UrlRecord, ShortenError> {
    let original_url = original_url.trim();
    if original_url.is_empty() {
        return Err(ShortenError::EmptyUrl);
    }

    let parsed = Url::parse(original_url)?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ShortenError::UnsupportedScheme);
    }

    if is_password_protected && password.is_some_and(|p| !p.is_empty()) {
        tracing::debug!("Password supplied for protected link; it is not forwarded");
    }

    let short_url = unique_short_url(store, short_base_url);

    Ok(UrlRecord {
        id: Uuid::new_v4().to_string(),
        original_url: original_url.to_owned(),
        short_url,
        clicks: 0,
        created_at: Utc::now(),
        is_password_protected,
        is_active: true,
        password_attempts: 0,
    })
}

/// Draw codes until one is not already in the store. Tries up to 10 times
/// before falling back to a longer code.
fn unique_short_url(store: &UrlStore, short_base_url: &str) -> String {
    for _ in 0..MAX_ATTEMPTS {
        let candidate = format!("{short_base_url}/{}", random_code(CODE_LEN));
        if !store.contains_short_url(&candidate) {
            return candidate;
        }
    }
    tracing::warn!(
        "No free {}-character code after {} attempts; using a longer one",
        CODE_LEN,
        MAX_ATTEMPTS
    );
    format!("{short_base_url}/{}", random_code(FALLBACK_CODE_LEN))
}

/// Generate a random base-36 string of the given length.
fn random_code(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect()
}
