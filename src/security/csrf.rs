//! CSRF (Cross-Site Request Forgery) protection.
//!
//! One token per session, 32 random bytes hex-encoded. State-changing
//! methods must echo it back in a form field. A checked token is swapped
//! for a fresh one in the same store operation that checks it, so it can
//! be spent only once.

use axum::http::Method;
use rand::rngs::OsRng;
use rand::RngCore;
use subtle::ConstantTimeEq;

use crate::security::session::Session;

/// Session key holding the token.
pub const CSRF_SESSION_KEY: &str = "csrf_token";

/// Random bytes per token (hex-encoded to twice this length).
pub const CSRF_TOKEN_BYTES: usize = 32;

/// Methods the guard protects.
pub fn is_state_changing(method: &Method) -> bool {
    matches!(
        method.as_str(),
        "POST" | "PUT" | "PATCH" | "DELETE"
    )
}

/// Fresh random token.
pub fn generate_token() -> String {
    let mut bytes = [0u8; CSRF_TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// `<input type="hidden">` carrying `token` under `field_name`.
pub fn hidden_field(field_name: &str, token: &str) -> String {
    format!(
        "<input type=\"hidden\" name=\"{}\" value=\"{}\">",
        tera::escape_html(field_name),
        tera::escape_html(token)
    )
}

/// Current session token, created and stored on first use.
pub fn session_token(session: &Session) -> String {
    if let Some(token) = session.get(CSRF_SESSION_KEY).filter(|t| !t.is_empty()) {
        return token;
    }

    let fresh = generate_token();
    if session.replace_if(CSRF_SESSION_KEY, |current| current.map_or(true, str::is_empty), fresh.clone()) {
        fresh
    } else {
        // Another request stored one first.
        session.get(CSRF_SESSION_KEY).unwrap_or(fresh)
    }
}

/// Token guard bound to one session.
///
/// The guard touches the store only when a token is read, checked or
/// rotated, so sessions that never render a form stay empty.
#[derive(Debug)]
pub struct CsrfGuard {
    session: Session,
    field_name: String,
}

impl CsrfGuard {
    pub fn new(session: Session, field_name: impl Into<String>) -> Self {
        Self {
            session,
            field_name: field_name.into(),
        }
    }

    pub fn token(&self) -> String {
        session_token(&self.session)
    }

    pub fn field_name(&self) -> &str {
        &self.field_name
    }

    /// Hidden form field with the current token.
    pub fn field(&self) -> String {
        hidden_field(&self.field_name, &self.token())
    }

    /// Non-state-changing methods always pass. Otherwise the submitted
    /// token must be non-empty and equal to the session token.
    pub fn is_valid(&self, method: &Method, submitted: Option<&str>) -> bool {
        if !is_state_changing(method) {
            return true;
        }

        match (submitted, self.session.get(CSRF_SESSION_KEY)) {
            (Some(submitted), Some(stored)) if !submitted.is_empty() => tokens_match(&stored, submitted),
            _ => false,
        }
    }

    /// Check the submitted token and rotate it in one atomic step.
    ///
    /// Each token is accepted at most once: of several requests carrying the
    /// same token, only the first to reach the store passes.
    pub fn consume(&self, method: &Method, submitted: Option<&str>) -> bool {
        if !is_state_changing(method) {
            return true;
        }

        let Some(submitted) = submitted.filter(|s| !s.is_empty()) else {
            return false;
        };
        self.session.replace_if(
            CSRF_SESSION_KEY,
            |current| current.is_some_and(|stored| tokens_match(stored, submitted)),
            generate_token(),
        )
    }

    /// Replace the session token, if the session has one.
    pub fn regenerate(&self) {
        self.session
            .replace_if(CSRF_SESSION_KEY, |current| current.is_some(), generate_token());
    }
}

fn tokens_match(stored: &str, submitted: &str) -> bool {
    !stored.is_empty() && bool::from(stored.as_bytes().ct_eq(submitted.as_bytes()))
}
