use crate::resolver::{LinkResolver, Lookup, Verification};

pub const NOT_FOUND_MESSAGE: &str = "URL not found";
pub const LOOKUP_FAILED_MESSAGE: &str = "Failed to access URL";
const INVALID_PASSWORD_MESSAGE: &str = "Invalid password";
const VERIFY_FAILED_MESSAGE: &str = "Failed to verify password. Please try again.";

/// Where one visit to a short link currently stands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateState {
    Idle,
    Checking,
    /// Waiting for the visitor to enter the link's password.
    Protected {
        attempts: u32,
        error: Option<String>,
    },
    /// Terminal: the visitor should be sent to `url`.
    Redirecting { url: String },
    /// Terminal: the visitor gave up on the prompt.
    NotFound,
    /// Terminal: the link could not be resolved.
    Failed { message: String },
}

impl GateState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            GateState::Redirecting { .. } | GateState::NotFound | GateState::Failed { .. }
        )
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum GateError {
    #[error("link has already been checked")]
    AlreadyChecked,
    #[error("link is not waiting for a password")]
    NotProtected,
}

/// The access flow for one short code.
///
/// Every network round-trip is triggered by an explicit call; nothing is
/// retried automatically. Attempt limits are the resolver's business.
#[derive(Debug, Clone)]
pub struct PasswordGate {
    code: String,
    state: GateState,
}

impl PasswordGate {
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            state: GateState::Idle,
        }
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn state(&self) -> &GateState {
        &self.state
    }

    /// Failed password attempts so far; zero outside the prompt.
    pub fn attempts(&self) -> u32 {
        match self.state {
            GateState::Protected { attempts, .. } => attempts,
            _ => 0,
        }
    }

    /// Ask the resolver about the code. Only valid from `Idle`.
    pub async fn check(&mut self, resolver: &dyn LinkResolver) -> Result<&GateState, GateError> {
        if self.state != GateState::Idle {
            return Err(GateError::AlreadyChecked);
        }
        self.state = GateState::Checking;

        self.state = match resolver.lookup(&self.code).await {
            Ok(Lookup::Found {
                requires_password: true,
                ..
            }) => GateState::Protected {
                attempts: 0,
                error: None,
            },
            Ok(Lookup::Found {
                requires_password: false,
                original_url: Some(url),
            }) => GateState::Redirecting { url },
            Ok(Lookup::Found {
                requires_password: false,
                original_url: None,
            }) => {
                tracing::warn!("Resolver found '{}' but gave no destination", self.code);
                failed(LOOKUP_FAILED_MESSAGE)
            }
            Ok(Lookup::NotFound) => failed(NOT_FOUND_MESSAGE),
            Err(e) => {
                tracing::error!("Lookup for '{}' failed: {}", self.code, e);
                failed(LOOKUP_FAILED_MESSAGE)
            }
        };

        Ok(&self.state)
    }

    /// Send a password attempt. Only valid from `Protected`.
    ///
    /// A blank password is ignored without contacting the resolver.
    pub async fn submit(
        &mut self,
        resolver: &dyn LinkResolver,
        password: &str,
    ) -> Result<&GateState, GateError> {
        let attempts = match &self.state {
            GateState::Protected { attempts, .. } => *attempts,
            _ => return Err(GateError::NotProtected),
        };

        if password.trim().is_empty() {
            return Ok(&self.state);
        }

        self.state = match resolver.verify(&self.code, password).await {
            Ok(Verification::Granted { original_url }) => {
                tracing::info!("Password accepted for '{}'", self.code);
                GateState::Redirecting { url: original_url }
            }
            Ok(Verification::Rejected {
                error,
                attempts: reported,
            }) => {
                let attempts = reported.unwrap_or(attempts + 1);
                tracing::info!("Password rejected for '{}' ({} attempt(s))", self.code, attempts);
                GateState::Protected {
                    attempts,
                    error: Some(error.unwrap_or_else(|| INVALID_PASSWORD_MESSAGE.to_owned())),
                }
            }
            Err(e) => {
                tracing::error!("Password verification for '{}' failed: {}", self.code, e);
                GateState::Protected {
                    attempts,
                    error: Some(VERIFY_FAILED_MESSAGE.to_owned()),
                }
            }
        };

        Ok(&self.state)
    }

    /// Abandon the flow. Terminal states are left as they are.
    pub fn cancel(&mut self) -> &GateState {
        if !self.state.is_terminal() {
            self.state = GateState::NotFound;
        }
        &self.state
    }
}

fn failed(message: &str) -> GateState {
    GateState::Failed {
        message: message.to_owned(),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::resolver::ResolveError;
    use async_trait::async_trait;
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex,
    };

    /// Scripted resolver: one lookup answer and a queue of verify answers.
    pub(crate) struct FakeResolver {
        lookup: Mutex<Option<Result<Lookup, ResolveError>>>,
        verifications: Mutex<Vec<Result<Verification, ResolveError>>>,
        pub(crate) verify_calls: AtomicUsize,
    }

    impl FakeResolver {
        pub(crate) fn new(lookup: Result<Lookup, ResolveError>) -> Self {
            Self {
                lookup: Mutex::new(Some(lookup)),
                verifications: Mutex::new(Vec::new()),
                verify_calls: AtomicUsize::new(0),
            }
        }

        pub(crate) fn protected() -> Self {
            Self::new(Ok(Lookup::Found {
                requires_password: true,
                original_url: None,
            }))
        }

        pub(crate) fn then_verify(self, answer: Result<Verification, ResolveError>) -> Self {
            self.verifications.lock().unwrap().insert(0, answer);
            self
        }
    }

    #[async_trait]
    impl LinkResolver for FakeResolver {
        async fn lookup(&self, _code: &str) -> Result<Lookup, ResolveError> {
            self.lookup
                .lock()
                .unwrap()
                .take()
                .unwrap_or(Ok(Lookup::NotFound))
        }

        async fn verify(&self, _code: &str, _password: &str) -> Result<Verification, ResolveError> {
            self.verify_calls.fetch_add(1, Ordering::SeqCst);
            self.verifications
                .lock()
                .unwrap()
                .pop()
                .unwrap_or(Err(ResolveError::Malformed("no scripted answer".into())))
        }
    }

    fn rejected(error: Option<&str>, attempts: Option<u32>) -> Result<Verification, ResolveError> {
        Ok(Verification::Rejected {
            error: error.map(str::to_owned),
            attempts,
        })
    }

    fn granted(url: &str) -> Result<Verification, ResolveError> {
        Ok(Verification::Granted {
            original_url: url.to_owned(),
        })
    }

    #[tokio::test]
    async fn open_link_redirects_immediately() {
        let resolver = FakeResolver::new(Ok(Lookup::Found {
            requires_password: false,
            original_url: Some("https://example.com".into()),
        }));
        let mut gate = PasswordGate::new("abc123");

        let state = gate.check(&resolver).await.unwrap();
        assert_eq!(
            *state,
            GateState::Redirecting {
                url: "https://example.com".into()
            }
        );
        assert!(state.is_terminal());
    }

    #[tokio::test]
    async fn protected_link_waits_for_password() {
        let resolver = FakeResolver::protected();
        let mut gate = PasswordGate::new("abc123");

        let state = gate.check(&resolver).await.unwrap();
        assert_eq!(
            *state,
            GateState::Protected {
                attempts: 0,
                error: None
            }
        );
        assert!(!state.is_terminal());
    }

    #[tokio::test]
    async fn missing_link_fails() {
        let resolver = FakeResolver::new(Ok(Lookup::NotFound));
        let mut gate = PasswordGate::new("nope");

        let state = gate.check(&resolver).await.unwrap();
        assert_eq!(
            *state,
            GateState::Failed {
                message: "URL not found".into()
            }
        );
    }

    #[tokio::test]
    async fn transport_error_during_lookup_fails() {
        let resolver = FakeResolver::new(Err(ResolveError::Malformed("boom".into())));
        let mut gate = PasswordGate::new("abc123");

        let state = gate.check(&resolver).await.unwrap();
        assert_eq!(
            *state,
            GateState::Failed {
                message: "Failed to access URL".into()
            }
        );
    }

    #[tokio::test]
    async fn check_twice_is_rejected() {
        let resolver = FakeResolver::protected();
        let mut gate = PasswordGate::new("abc123");
        gate.check(&resolver).await.unwrap();

        assert_eq!(gate.check(&resolver).await.unwrap_err(), GateError::AlreadyChecked);
    }

    #[tokio::test]
    async fn wrong_then_right_password() {
        let resolver = FakeResolver::protected()
            .then_verify(rejected(None, None))
            .then_verify(granted("https://example.com/secret"));
        let mut gate = PasswordGate::new("abc123");
        gate.check(&resolver).await.unwrap();

        let state = gate.submit(&resolver, "wrong").await.unwrap();
        assert_eq!(
            *state,
            GateState::Protected {
                attempts: 1,
                error: Some("Invalid password".into())
            }
        );

        assert_eq!(gate.attempts(), 1);

        let state = gate.submit(&resolver, "right").await.unwrap();
        assert_eq!(
            *state,
            GateState::Redirecting {
                url: "https://example.com/secret".into()
            }
        );
        assert_eq!(gate.attempts(), 0);
    }

    #[tokio::test]
    async fn server_reported_attempts_and_message_win() {
        let resolver = FakeResolver::protected()
            .then_verify(rejected(Some("Nope"), Some(4)))
            .then_verify(rejected(None, None));
        let mut gate = PasswordGate::new("abc123");
        gate.check(&resolver).await.unwrap();

        let state = gate.submit(&resolver, "a").await.unwrap();
        assert_eq!(
            *state,
            GateState::Protected {
                attempts: 4,
                error: Some("Nope".into())
            }
        );

        // Without a server count the local one keeps climbing.
        let state = gate.submit(&resolver, "b").await.unwrap();
        assert_eq!(
            *state,
            GateState::Protected {
                attempts: 5,
                error: Some("Invalid password".into())
            }
        );
    }

    #[tokio::test]
    async fn transport_error_during_verify_keeps_prompt() {
        let resolver = FakeResolver::protected()
            .then_verify(rejected(None, None))
            .then_verify(Err(ResolveError::Malformed("bad body".into())));
        let mut gate = PasswordGate::new("abc123");
        gate.check(&resolver).await.unwrap();
        gate.submit(&resolver, "first").await.unwrap();

        let state = gate.submit(&resolver, "second").await.unwrap();
        assert_eq!(
            *state,
            GateState::Protected {
                attempts: 1,
                error: Some("Failed to verify password. Please try again.".into())
            }
        );
    }

    #[tokio::test]
    async fn blank_password_is_not_sent() {
        let resolver = FakeResolver::protected();
        let mut gate = PasswordGate::new("abc123");
        gate.check(&resolver).await.unwrap();

        gate.submit(&resolver, "   ").await.unwrap();
        assert_eq!(resolver.verify_calls.load(Ordering::SeqCst), 0);
        assert_eq!(
            *gate.state(),
            GateState::Protected {
                attempts: 0,
                error: None
            }
        );
    }

    #[tokio::test]
    async fn submit_before_check_is_rejected() {
        let resolver = FakeResolver::protected();
        let mut gate = PasswordGate::new("abc123");
        assert_eq!(
            gate.submit(&resolver, "pw").await.unwrap_err(),
            GateError::NotProtected
        );
    }

    #[tokio::test]
    async fn cancel_from_prompt_is_not_found() {
        let resolver = FakeResolver::protected();
        let mut gate = PasswordGate::new("abc123");
        gate.check(&resolver).await.unwrap();

        assert_eq!(*gate.cancel(), GateState::NotFound);
        assert_eq!(
            gate.submit(&resolver, "pw").await.unwrap_err(),
            GateError::NotProtected
        );
    }

    #[tokio::test]
    async fn cancel_keeps_terminal_states() {
        let resolver = FakeResolver::new(Ok(Lookup::NotFound));
        let mut gate = PasswordGate::new("nope");
        gate.check(&resolver).await.unwrap();

        assert!(matches!(gate.cancel(), GateState::Failed { .. }));
    }
}
