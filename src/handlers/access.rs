use crate::{
    gate::{GateState, PasswordGate, LOOKUP_FAILED_MESSAGE, NOT_FOUND_MESSAGE},
    AppState,
};
use askama::Template;
use axum::{
    extract::{Form, Path, State},
    http::{header::LOCATION, HeaderValue, StatusCode},
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use std::sync::Arc;

// ── Template structs ───────────────────────────────────────────────────────

#[derive(Template)]
#[template(path = "unlock.html")]
struct UnlockTemplate {
    code: String,
    token: String,
    error: Option<String>,
    attempts_label: Option<String>,
}

#[derive(Template)]
#[template(path = "access_error.html")]
struct AccessErrorTemplate {
    message: String,
    home_url: String,
}

// ── Form types ─────────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct UnlockForm {
    token: String,
    password: String,
}

#[derive(Deserialize)]
pub struct CancelForm {
    token: String,
}

// ── Handlers ───────────────────────────────────────────────────────────────

/// GET /:code
///
/// 1. Ask the resolver about the code.
/// 2. Open links redirect straight away.
/// 3. Protected links park a gate and show the password prompt.
/// 4. Anything else shows the not-found page.
pub async fn access(State(state): State<Arc<AppState>>, Path(code): Path<String>) -> Response {
    if !is_valid_code(&code) {
        return not_found(&state, NOT_FOUND_MESSAGE);
    }

    let mut gate = PasswordGate::new(code.clone());
    if let Err(e) = gate.check(state.resolver.as_ref()).await {
        tracing::error!("Fresh gate for '{}' refused to check: {}", code, e);
        return (StatusCode::INTERNAL_SERVER_ERROR, "Internal error").into_response();
    }

    respond(&state, gate, None)
}

/// POST /:code/unlock
pub async fn unlock(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
    Form(form): Form<UnlockForm>,
) -> Response {
    if !is_valid_code(&code) {
        return not_found(&state, NOT_FOUND_MESSAGE);
    }

    let Some(mut gate) = state.gates.take(&form.token, &code) else {
        // Prompt expired or was never issued: start over.
        return Redirect::to(&format!("/{code}")).into_response();
    };

    if let Err(e) = gate.submit(state.resolver.as_ref(), &form.password).await {
        tracing::error!("Parked gate for '{}' was not at the prompt: {}", code, e);
        return Redirect::to(&format!("/{code}")).into_response();
    }

    respond(&state, gate, Some(form.token))
}

/// POST /:code/cancel
pub async fn cancel(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
    Form(form): Form<CancelForm>,
) -> Response {
    if !is_valid_code(&code) {
        return not_found(&state, NOT_FOUND_MESSAGE);
    }

    if let Some(mut gate) = state.gates.take(&form.token, &code) {
        gate.cancel();
        tracing::debug!("Password prompt for '{}' cancelled", code);
    }
    Redirect::to(&state.config.home_url).into_response()
}

// ── Helpers ────────────────────────────────────────────────────────────────

/// Turn a gate's state into the page or redirect the visitor should see.
/// Gates still at the prompt are parked again under `token`.
fn respond(state: &AppState, gate: PasswordGate, token: Option<String>) -> Response {
    match gate.state().clone() {
        GateState::Redirecting { url } => redirect_to(&url).unwrap_or_else(|| {
            tracing::warn!("Destination for '{}' is not a usable Location", gate.code());
            not_found(state, LOOKUP_FAILED_MESSAGE)
        }),
        GateState::Protected { error, .. } => {
            let code = gate.code().to_owned();
            let attempts = gate.attempts();
            let token = match token {
                Some(token) => {
                    state.gates.park_as(token.clone(), gate);
                    token
                }
                None => state.gates.park(gate),
            };
            UnlockTemplate {
                code,
                token,
                attempts_label: error.as_ref().and_then(|_| attempts_label(attempts)),
                error,
            }
            .into_response()
        }
        GateState::NotFound => Redirect::to(&state.config.home_url).into_response(),
        GateState::Failed { message } => not_found(state, &message),
        GateState::Idle | GateState::Checking => {
            tracing::error!("Gate for '{}' stopped mid-check", gate.code());
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal error").into_response()
        }
    }
}

/// 303 to a resolver-supplied destination, or `None` if it cannot be sent
/// as a header value.
fn redirect_to(url: &str) -> Option<Response> {
    let location = HeaderValue::try_from(url).ok()?;
    Some((StatusCode::SEE_OTHER, [(LOCATION, location)]).into_response())
}

fn not_found(state: &AppState, message: &str) -> Response {
    (
        StatusCode::NOT_FOUND,
        AccessErrorTemplate {
            message: message.to_owned(),
            home_url: state.config.home_url.clone(),
        },
    )
        .into_response()
}

/// Short codes are letters, digits, hyphens and underscores.
fn is_valid_code(code: &str) -> bool {
    !code.is_empty()
        && code
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// "(1 attempt)", "(3 attempts)", or nothing before the first failure.
fn attempts_label(attempts: u32) -> Option<String> {
    match attempts {
        0 => None,
        1 => Some("(1 attempt)".to_owned()),
        n => Some(format!("({n} attempts)")),
    }
}
