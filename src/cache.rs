use crate::gate::PasswordGate;
use dashmap::DashMap;
use std::{
    sync::Arc,
    time::{Duration, Instant},
};
use uuid::Uuid;

/// Thread-safe holding area for password prompts between requests.
///
/// A gate parked here is waiting for the visitor to type a password. The
/// handler takes it out for the verification round-trip and parks it again
/// if the visitor is still at the prompt, so no entry is ever borrowed
/// across an await. Entries older than `ttl` are dropped.
#[derive(Clone, Debug)]
pub struct GateCache {
    inner: Arc<DashMap<String, (PasswordGate, Instant)>>,
    ttl: Duration,
}

impl GateCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: Arc::new(DashMap::new()),
            ttl,
        }
    }

    /// Park a gate under a fresh token and return the token.
    pub fn park(&self, gate: PasswordGate) -> String {
        let token = Uuid::new_v4().to_string();
        self.park_as(token.clone(), gate);
        token
    }

    /// Park a gate under an existing token (after a failed attempt).
    pub fn park_as(&self, token: String, gate: PasswordGate) {
        // Opportunistically prune abandoned prompts on every insert
        self.inner
            .retain(|_, (_, parked_at)| parked_at.elapsed() < self.ttl);
        self.inner.insert(token, (gate, Instant::now()));
        tracing::debug!("{} password prompt(s) parked", self.len());
    }

    /// Remove and return the gate for `token` if it exists, has not expired
    /// and belongs to `code`.
    pub fn take(&self, token: &str, code: &str) -> Option<PasswordGate> {
        let (_, (gate, parked_at)) = self
            .inner
            .remove_if(token, |_, (gate, _)| gate.code() == code)?;
        if parked_at.elapsed() >= self.ttl {
            tracing::debug!("Discarding expired password prompt for '{}'", code);
            return None;
        }
        Some(gate)
    }

    /// Number of prompts currently parked.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}
