//! Request handling.
//!
//! # Responsibilities
//! - Carry the method, path and posted form fields into the dispatcher
//! - Strip the mount point (base path) from the request path
//! - Expose bound parameters and the session to middleware and handlers
//! - Build absolute URLs for the application
//!
//! # Design Decisions
//! - The dispatcher sees a plain `IncomingRequest`, not an axum request,
//!   so the core runs on the blocking pool and is testable without a server
//! - The base path is derived from the entry script name, making the
//!   router mount-point agnostic

use axum::http::Method;

use crate::routing::matcher::Params;
use crate::security::csrf;
use crate::security::session::Session;

/// Posted `application/x-www-form-urlencoded` fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormData {
    fields: Vec<(String, String)>,
}

impl FormData {
    /// Decode an urlencoded body. Malformed input yields no fields.
    pub fn parse(body: &[u8]) -> Self {
        let fields = serde_urlencoded::from_bytes::<Vec<(String, String)>>(body).unwrap_or_default();
        Self { fields }
    }

    /// Value of a field. When a name repeats, the last value wins.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .rev()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.iter().any(|(n, _)| n == name)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<K, V> FromIterator<(K, V)> for FormData
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

/// What the dispatcher needs from an HTTP request.
#[derive(Debug, Clone)]
pub struct IncomingRequest {
    pub method: Method,
    /// Raw request path (no query string), still including the base path.
    pub path: String,
    pub form: FormData,
}

impl IncomingRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            form: FormData::default(),
        }
    }

    pub fn with_form(mut self, form: FormData) -> Self {
        self.form = form;
        self
    }
}

/// Per-request view handed to middleware and handlers.
pub struct RequestContext<'a> {
    method: &'a Method,
    path: &'a str,
    params: Params,
    form: &'a FormData,
    session: &'a Session,
    csrf_field_name: &'a str,
}

impl<'a> RequestContext<'a> {
    pub fn new(
        method: &'a Method,
        path: &'a str,
        params: Params,
        form: &'a FormData,
        session: &'a Session,
        csrf_field_name: &'a str,
    ) -> Self {
        Self {
            method,
            path,
            params,
            form,
            session,
            csrf_field_name,
        }
    }

    pub fn method(&self) -> &Method {
        self.method
    }

    /// Request path with the base path removed.
    pub fn path(&self) -> &str {
        self.path
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    /// Shorthand for `params().get(name)`.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name)
    }

    pub fn form(&self) -> &FormData {
        self.form
    }

    pub fn session(&self) -> &Session {
        self.session
    }

    /// Hidden input carrying the session's current CSRF token, creating
    /// the token if the session has none yet.
    pub fn csrf_field(&self) -> String {
        let token = csrf::session_token(self.session);
        csrf::hidden_field(self.csrf_field_name, &token)
    }
}

/// Base path derived from the entry script, always with a trailing `/`.
///
/// `/blog/index.php` → `/blog/`, `/index.php` → `/`.
pub fn base_path(script_name: &str) -> String {
    let script = script_name
        .strip_suffix("/index.php")
        .unwrap_or(script_name);
    let script = script.strip_suffix("/index").unwrap_or(script);

    let base = format!("/{}/", script.trim_matches('/'));
    if base == "//" {
        "/".to_string()
    } else {
        base
    }
}

/// Remove the base path from a request path, keeping its leading `/`.
pub fn strip_base<'a>(path: &'a str, base: &str) -> &'a str {
    match path.strip_prefix(base) {
        Some(_) => {
            let rest = &path[base.len() - 1..];
            if rest.is_empty() {
                "/"
            } else {
                rest
            }
        }
        None => path,
    }
}

/// Absolute base URL of the application, ending in `/`.
pub fn base_url(https: bool, host: Option<&str>, script_name: &str) -> String {
    let scheme = if https { "https" } else { "http" };
    let host = host.unwrap_or("localhost");
    let dir = match script_name.rfind('/') {
        Some(i) => script_name[..i].trim_end_matches(['/', '\\']),
        None => "",
    };
    format!("{}://{}{}/", scheme, host, dir)
}

/// Join a path onto a base URL.
pub fn url(base_url: &str, path: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), path.trim_start_matches('/'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_path_from_script_name() {
        assert_eq!(base_path("/index.php"), "/");
        assert_eq!(base_path(""), "/");
        assert_eq!(base_path("/blog/index.php"), "/blog/");
        assert_eq!(base_path("/blog/index"), "/blog/");
        assert_eq!(base_path("/apps/shop/"), "/apps/shop/");
    }

    #[test]
    fn test_strip_base() {
        assert_eq!(strip_base("/users/42", "/"), "/users/42");
        assert_eq!(strip_base("/blog/users/42", "/blog/"), "/users/42");
        assert_eq!(strip_base("/blog/", "/blog/"), "/");
        // Only a full base segment is stripped.
        assert_eq!(strip_base("/blog", "/blog/"), "/blog");
        assert_eq!(strip_base("/blogger/x", "/blog/"), "/blogger/x");
    }

    #[test]
    fn test_form_fields() {
        let form = FormData::parse(b"name=ada&csrf_token=abc&name=grace&empty=");
        assert_eq!(form.get("name"), Some("grace"));
        assert_eq!(form.get("csrf_token"), Some("abc"));
        assert_eq!(form.get("empty"), Some(""));
        assert!(form.contains("empty"));
        assert_eq!(form.get("missing"), None);
        assert!(FormData::parse(b"").is_empty());
    }

    #[test]
    fn test_url_helpers() {
        assert_eq!(base_url(false, Some("example.com"), "/index.php"), "http://example.com/");
        assert_eq!(base_url(true, Some("example.com"), "/blog/index.php"), "https://example.com/blog/");
        assert_eq!(base_url(false, None, ""), "http://localhost/");
        assert_eq!(url("http://example.com/blog/", "/posts/1"), "http://example.com/blog/posts/1");
        assert_eq!(url("http://example.com/", ""), "http://example.com/");
    }
}
