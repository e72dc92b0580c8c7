//! Response construction.
//!
//! # Responsibilities
//! - Represent what a handler or error page produced (`Reply`)
//! - Convert replies into axum responses
//!
//! # Design Decisions
//! - Replies are plain data so the dispatch core stays synchronous
//! - Bodies are text; handlers in this router render HTML, text or JSON

use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::http::handler::HandlerError;

/// A complete response: status, headers and body.
#[derive(Debug, Clone)]
pub struct Reply {
    status: StatusCode,
    headers: HeaderMap,
    body: String,
}

impl Reply {
    fn with_content_type(body: String, content_type: &'static str) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
        Self {
            status: StatusCode::OK,
            headers,
            body,
        }
    }

    pub fn html(body: impl Into<String>) -> Self {
        Self::with_content_type(body.into(), "text/html; charset=utf-8")
    }

    pub fn text(body: impl Into<String>) -> Self {
        Self::with_content_type(body.into(), "text/plain; charset=utf-8")
    }

    /// Serialize `value` as a JSON body.
    pub fn json<T: Serialize>(value: &T) -> Result<Self, HandlerError> {
        let body = serde_json::to_string(value)
            .map_err(|e| HandlerError::new(format!("failed to encode JSON response: {}", e)))?;
        Ok(Self::with_content_type(body, "application/json"))
    }

    /// `302 Found` pointing at `location`.
    pub fn redirect(location: &str) -> Self {
        let mut reply = Self::status(StatusCode::FOUND);
        if let Ok(value) = HeaderValue::from_str(location) {
            reply.headers.insert(header::LOCATION, value);
        }
        reply
    }

    /// Empty body with the given status.
    pub fn status(status: StatusCode) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: String::new(),
        }
    }

    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    pub fn status_code(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &str {
        &self.body
    }
}

impl IntoResponse for Reply {
    fn into_response(self) -> Response {
        let mut response = (self.status, self.body).into_response();
        for (name, value) in &self.headers {
            response.headers_mut().insert(name.clone(), value.clone());
        }
        response
    }
}
