use crate::models::{AuthMode, User};
use async_trait::async_trait;
use std::time::Duration;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("{0}")]
    Rejected(String),
}

/// Signs users in or registers them. Called only after the input has
/// passed [`crate::validation::validate`]; one attempt per call.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn authenticate(
        &self,
        email: &str,
        password: &str,
        mode: AuthMode,
    ) -> Result<User, AuthError>;
}

/// Accepts every validated credential after a fixed delay. There is no
/// account database behind it.
#[derive(Debug, Clone)]
pub struct LocalIdentityProvider {
    delay: Duration,
}

impl LocalIdentityProvider {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

#[async_trait]
impl IdentityProvider for LocalIdentityProvider {
    async fn authenticate(
        &self,
        email: &str,
        _password: &str,
        mode: AuthMode,
    ) -> Result<User, AuthError> {
        tokio::time::sleep(self.delay).await;

        let email = email.trim();
        if email.is_empty() {
            return Err(AuthError::Rejected("Email is required.".into()));
        }

        tracing::info!("Local {} for {}", mode.as_str(), email);
        Ok(User {
            id: Uuid::new_v4().to_string(),
            email: email.to_owned(),
        })
    }
}
