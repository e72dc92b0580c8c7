//! Dispatch-time error definitions.

use std::path::PathBuf;

use thiserror::Error;

use crate::http::handler::HandlerError;

/// Failures that turn a matched request into a 500 response.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// Middleware resource does not exist.
    #[error("Middleware file not found: {}", path.display())]
    MiddlewareNotFound { path: PathBuf },

    /// Middleware resource exists but could not be read.
    #[error("Middleware file could not be read: {} ({reason})", path.display())]
    MiddlewareUnreadable { path: PathBuf, reason: String },

    /// Middleware resource loaded but did not yield a middleware.
    #[error("Middleware file '{}' must define a middleware. Returned: {value}", path.display())]
    MiddlewareContractViolation { path: PathBuf, value: String },

    /// Reference is neither a function nor a usable resource name.
    #[error("Middleware must be callable or a resource name. Got: {0}")]
    InvalidMiddlewareType(String),

    /// Resource handler does not exist.
    #[error("500 - Handler not found: {}", path.display())]
    HandlerNotFound { path: PathBuf },

    /// Handler failed while producing its reply.
    #[error("Server error: {0}")]
    Handler(#[from] HandlerError),
}

impl DispatchError {
    /// Message shown on the development error page.
    pub fn page_message(&self) -> String {
        match self {
            DispatchError::HandlerNotFound { .. } | DispatchError::Handler(_) => self.to_string(),
            other => format!("Server error: {}", other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_messages() {
        let err = DispatchError::HandlerNotFound { path: "/app/views/x.html".into() };
        assert_eq!(err.page_message(), "500 - Handler not found: /app/views/x.html");

        let err = DispatchError::from(HandlerError::new("boom"));
        assert_eq!(err.page_message(), "Server error: boom");

        let err = DispatchError::MiddlewareNotFound { path: "middlewares/auth.toml".into() };
        assert_eq!(err.page_message(), "Server error: Middleware file not found: middlewares/auth.toml");

        let err = DispatchError::MiddlewareUnreadable {
            path: "middlewares/auth.toml".into(),
            reason: "permission denied".into(),
        };
        assert_eq!(
            err.page_message(),
            "Server error: Middleware file could not be read: middlewares/auth.toml (permission denied)"
        );
    }
}
