//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate addresses and value ranges
//! - Reject names that would make resource resolution ambiguous
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: AppConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::AppConfig;

/// A single semantic problem found in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Check a parsed configuration for values serde cannot reject on its own.
pub fn validate_config(config: &AppConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }

    if !config.app.script_name.is_empty() && !config.app.script_name.starts_with('/') {
        errors.push(ValidationError::new(
            "app.script_name",
            "must be empty or start with '/'",
        ));
    }

    check_extension("middleware.extension", &config.middleware.extension, &mut errors);
    check_extension("handlers.extension", &config.handlers.extension, &mut errors);

    if config.csrf.field_name.trim().is_empty() {
        errors.push(ValidationError::new("csrf.field_name", "must not be empty"));
    }

    let cookie_name = &config.session.cookie_name;
    if cookie_name.is_empty()
        || cookie_name
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, ';' | ',' | '='))
    {
        errors.push(ValidationError::new(
            "session.cookie_name",
            format!("'{}' is not a valid cookie name", cookie_name),
        ));
    }

    if config.session.idle_timeout_secs == 0 {
        errors.push(ValidationError::new("session.idle_timeout_secs", "must be greater than 0"));
    }

    if config.session.sweep_interval_secs == 0 {
        errors.push(ValidationError::new("session.sweep_interval_secs", "must be greater than 0"));
    }

    if config.security.max_body_size == 0 {
        errors.push(ValidationError::new("security.max_body_size", "must be greater than 0"));
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::new("timeouts.request_secs", "must be greater than 0"));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("'{}' is not a socket address", config.observability.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_extension(field: &'static str, ext: &str, errors: &mut Vec<ValidationError>) {
    if ext.is_empty() {
        errors.push(ValidationError::new(field, "must not be empty"));
    } else if ext.starts_with('.') || ext.contains('/') {
        errors.push(ValidationError::new(
            field,
            format!("'{}' must be a bare extension such as \"toml\"", ext),
        ));
    }
}
