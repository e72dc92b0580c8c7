//! Route handlers.
//!
//! A handler is either an in-process function or the name of a tera
//! template rendered with the bound route parameters in its context.

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tera::Context;
use thiserror::Error;

use crate::http::request::RequestContext;
use crate::http::response::Reply;
use crate::http::views::render_template;
use crate::routing::matcher::Params;

/// Failure raised by a handler while producing its reply.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct HandlerError {
    message: String,
}

impl HandlerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<io::Error> for HandlerError {
    fn from(err: io::Error) -> Self {
        Self::new(err.to_string())
    }
}

impl From<tera::Error> for HandlerError {
    fn from(err: tera::Error) -> Self {
        // tera keeps the useful detail in the source chain.
        let mut message = err.to_string();
        let mut source = std::error::Error::source(&err);
        while let Some(cause) = source {
            message.push_str(": ");
            message.push_str(&cause.to_string());
            source = cause.source();
        }
        Self::new(message)
    }
}

pub type HandlerResult = Result<Reply, HandlerError>;

/// In-process handler.
pub trait Handler: Send + Sync {
    fn call(&self, ctx: &RequestContext<'_>) -> HandlerResult;
}

impl<F> Handler for F
where
    F: Fn(&RequestContext<'_>) -> HandlerResult + Send + Sync,
{
    fn call(&self, ctx: &RequestContext<'_>) -> HandlerResult {
        self(ctx)
    }
}

/// What a route dispatches to.
#[derive(Clone)]
pub enum HandlerRef {
    Func(Arc<dyn Handler>),
    /// Resource name, resolved by [`HandlerResolver`] at dispatch time.
    Resource(String),
}

impl HandlerRef {
    pub fn func<F>(f: F) -> Self
    where
        F: Fn(&RequestContext<'_>) -> HandlerResult + Send + Sync + 'static,
    {
        HandlerRef::Func(Arc::new(f))
    }

    pub fn resource(name: impl Into<String>) -> Self {
        HandlerRef::Resource(name.into())
    }
}

impl From<&str> for HandlerRef {
    fn from(name: &str) -> Self {
        HandlerRef::resource(name)
    }
}

impl From<String> for HandlerRef {
    fn from(name: String) -> Self {
        HandlerRef::Resource(name)
    }
}

impl fmt::Debug for HandlerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandlerRef::Func(_) => f.write_str("HandlerRef::Func(..)"),
            HandlerRef::Resource(name) => f.debug_tuple("HandlerRef::Resource").field(name).finish(),
        }
    }
}

impl fmt::Display for HandlerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandlerRef::Func(_) => f.write_str("<closure>"),
            HandlerRef::Resource(name) => f.write_str(name),
        }
    }
}

/// Resolves and renders resource handlers.
#[derive(Debug, Clone)]
pub struct HandlerResolver {
    root: PathBuf,
    extension: String,
}

impl HandlerResolver {
    pub fn new(root: impl Into<PathBuf>, extension: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            extension: extension.into(),
        }
    }

    /// Absolute and `./`/`../` paths are kept; bare names resolve under the
    /// application root. The default extension is appended when missing.
    pub fn resolve(&self, name: &str) -> PathBuf {
        let mut file = if is_absolute(name) || name.starts_with("./") || name.starts_with("../") {
            name.to_string()
        } else {
            self.root.join(name).to_string_lossy().into_owned()
        };

        let suffix = format!(".{}", self.extension);
        if !file.ends_with(&suffix) {
            file.push_str(&suffix);
        }
        PathBuf::from(file)
    }

    /// Render the resource as a template. Every route parameter is bound,
    /// absent optional ones as empty strings.
    ///
    /// Returns `Ok(None)` when the resource does not exist.
    pub fn render(&self, path: &Path, params: &Params) -> Result<Option<Reply>, HandlerError> {
        let source = match fs::read_to_string(path) {
            Ok(source) => source,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let mut context = Context::new();
        for (name, value) in params.iter() {
            context.insert(name, value.unwrap_or(""));
        }
        let body = render_template(&source, &context)?;
        Ok(Some(Reply::html(body)))
    }
}

fn is_absolute(name: &str) -> bool {
    if name.starts_with('/') {
        return true;
    }
    // Windows drive paths such as `C:\app` or `c:/app`.
    let bytes = name.as_bytes();
    bytes.len() >= 3 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':' && matches!(bytes[2], b'\\' | b'/')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::matcher::{split_path, PathPattern};

    #[test]
    fn test_resolve_handler_paths() {
        let resolver = HandlerResolver::new("/srv/app", "html");

        assert_eq!(resolver.resolve("views/about"), PathBuf::from("/srv/app/views/about.html"));
        assert_eq!(resolver.resolve("views/about.html"), PathBuf::from("/srv/app/views/about.html"));
        assert_eq!(resolver.resolve("/opt/page"), PathBuf::from("/opt/page.html"));
        assert_eq!(resolver.resolve("./local"), PathBuf::from("./local.html"));
        assert_eq!(resolver.resolve("../up.html"), PathBuf::from("../up.html"));
        assert_eq!(resolver.resolve("C:\\site\\page"), PathBuf::from("C:\\site\\page.html"));
    }

    #[test]
    fn test_render_binds_params() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("about.html");
        fs::write(&file, "<h1>About {{ username }}</h1>{% if username %}!{% endif %}").unwrap();
        let resolver = HandlerResolver::new(dir.path(), "html");

        let pattern = PathPattern::parse("about-us/{username?}");
        let params = pattern.matches(&split_path("/about-us/<ada>")).unwrap();
        let reply = resolver.render(&file, &params).unwrap().unwrap();
        assert_eq!(reply.body(), "<h1>About &lt;ada&gt;</h1>!");

        let params = pattern.matches(&split_path("/about-us")).unwrap();
        let reply = resolver.render(&file, &params).unwrap().unwrap();
        assert_eq!(reply.body(), "<h1>About </h1>");

        assert!(resolver.render(&dir.path().join("missing.html"), &params).unwrap().is_none());
    }

    #[test]
    fn test_render_reports_template_errors() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("page.html");
        fs::write(&file, "Hello {{ nobody }}").unwrap();
        let resolver = HandlerResolver::new(dir.path(), "html");

        let err = resolver.render(&file, &Params::default()).unwrap_err();
        assert!(err.message().contains("nobody"));
    }
}
