//! Middleware reference resolution.
//!
//! # Responsibilities
//! - Return in-process middleware as-is
//! - Map resource names to paths (default extension, middleware directory)
//! - Load resources and check they yield a middleware
//!
//! # Design Decisions
//! - Development mode: broken references are hard errors (rendered as 500)
//! - Production mode: broken references become pass-through middleware
//! - Resources are loaded per request; nothing is cached

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::Mode;
use crate::http::error::DispatchError;
use crate::http::middleware::loader::{FsMiddlewareLoader, Loaded, MiddlewareLoader};
use crate::http::middleware::{Middleware, MiddlewareRef, PassThrough};

/// Turns middleware references into callables.
#[derive(Clone)]
pub struct MiddlewareResolver {
    dir: PathBuf,
    extension: String,
    loader: Arc<dyn MiddlewareLoader>,
}

impl MiddlewareResolver {
    /// Resolver reading rule files from `dir`.
    pub fn new(dir: impl Into<PathBuf>, extension: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            extension: extension.into(),
            loader: Arc::new(FsMiddlewareLoader),
        }
    }

    pub fn with_loader(mut self, loader: Arc<dyn MiddlewareLoader>) -> Self {
        self.loader = loader;
        self
    }

    /// Path a resource name refers to.
    ///
    /// The default extension is appended when missing. Names without a `/`
    /// live in the middleware directory; others are used as given.
    pub fn resource_path(&self, name: &str) -> PathBuf {
        let suffix = format!(".{}", self.extension);
        let file = if name.ends_with(&suffix) {
            name.to_string()
        } else {
            format!("{}{}", name, suffix)
        };

        if file.contains('/') {
            PathBuf::from(file)
        } else {
            self.dir.join(file)
        }
    }

    /// Resolve a reference for the given mode.
    pub fn resolve(&self, mw: &MiddlewareRef, mode: Mode) -> Result<Arc<dyn Middleware>, DispatchError> {
        match mw {
            MiddlewareRef::Func(f) => Ok(Arc::clone(f)),
            MiddlewareRef::Resource(name) if name.trim().is_empty() => fallback(
                mode,
                DispatchError::InvalidMiddlewareType(format!("empty resource name {:?}", name)),
            ),
            MiddlewareRef::Resource(name) => {
                let path = self.resource_path(name);
                self.load(&path, mode)
            }
        }
    }

    fn load(&self, path: &Path, mode: Mode) -> Result<Arc<dyn Middleware>, DispatchError> {
        match self.loader.load(path) {
            Ok(Loaded::Callable(mw)) => Ok(mw),
            Ok(Loaded::Value(value)) => fallback(
                mode,
                DispatchError::MiddlewareContractViolation {
                    path: path.to_path_buf(),
                    value,
                },
            ),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                fallback(mode, DispatchError::MiddlewareNotFound { path: path.to_path_buf() })
            }
            Err(e) => fallback(
                mode,
                DispatchError::MiddlewareUnreadable {
                    path: path.to_path_buf(),
                    reason: e.to_string(),
                },
            ),
        }
    }
}

fn fallback(mode: Mode, err: DispatchError) -> Result<Arc<dyn Middleware>, DispatchError> {
    if mode.is_development() {
        return Err(err);
    }
    tracing::warn!(error = %err, "Substituting pass-through middleware");
    Ok(Arc::new(PassThrough))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::middleware::loader::MemoryMiddlewareLoader;
    use crate::http::request::{FormData, RequestContext};
    use crate::routing::matcher::Params;
    use crate::security::session::{MemorySessionStore, Session};
    use axum::http::Method;

    fn allows(mw: &Arc<dyn Middleware>) -> bool {
        let session = Session::new("s", Arc::new(MemorySessionStore::new()));
        let form = FormData::default();
        let method = Method::GET;
        let ctx = RequestContext::new(&method, "/", Params::default(), &form, &session, "csrf_token");
        mw.handle(&ctx)
    }

    fn deny_all(_: &RequestContext<'_>) -> bool {
        false
    }

    fn resolver() -> (MiddlewareResolver, Arc<MemoryMiddlewareLoader>) {
        let loader = Arc::new(MemoryMiddlewareLoader::new());
        let resolver = MiddlewareResolver::new("/app/middlewares", "toml").with_loader(loader.clone());
        (resolver, loader)
    }

    #[test]
    fn test_resource_paths() {
        let (resolver, _) = resolver();
        assert_eq!(resolver.resource_path("auth"), PathBuf::from("/app/middlewares/auth.toml"));
        assert_eq!(resolver.resource_path("auth.toml"), PathBuf::from("/app/middlewares/auth.toml"));
        assert_eq!(resolver.resource_path("custom/auth"), PathBuf::from("custom/auth.toml"));
        assert_eq!(resolver.resource_path("/etc/mw/auth.toml"), PathBuf::from("/etc/mw/auth.toml"));
    }

    #[test]
    fn test_function_resolves_as_is() {
        let (resolver, _) = resolver();
        let deny = MiddlewareRef::func(|_| false);
        let mw = resolver.resolve(&deny, Mode::Development).unwrap();
        assert!(!allows(&mw));
    }

    #[test]
    fn test_loaded_resource() {
        let (resolver, loader) = resolver();
        loader.insert("/app/middlewares/deny.toml", Loaded::Callable(Arc::new(deny_all)));

        let mw = resolver.resolve(&"deny".into(), Mode::Production).unwrap();
        assert!(!allows(&mw));
    }

    #[test]
    fn test_missing_resource_by_mode() {
        let (resolver, _) = resolver();
        let missing = MiddlewareRef::from("ghost");

        let err = resolver.resolve(&missing, Mode::Development).err().unwrap();
        assert!(matches!(err, DispatchError::MiddlewareNotFound { ref path } if path == Path::new("/app/middlewares/ghost.toml")));

        let mw = resolver.resolve(&missing, Mode::Production).unwrap();
        assert!(allows(&mw));
    }

    #[test]
    fn test_contract_violation_by_mode() {
        let (resolver, loader) = resolver();
        loader.insert("/app/middlewares/bad.toml", Loaded::Value("42".into()));
        let bad = MiddlewareRef::from("bad");

        let err = resolver.resolve(&bad, Mode::Development).err().unwrap();
        assert!(err.to_string().contains("Returned: 42"));
        assert!(allows(&resolver.resolve(&bad, Mode::Production).unwrap()));
    }

    struct Unreadable;

    impl MiddlewareLoader for Unreadable {
        fn load(&self, _: &Path) -> io::Result<Loaded> {
            Err(io::Error::new(io::ErrorKind::PermissionDenied, "permission denied"))
        }
    }

    #[test]
    fn test_unreadable_resource_is_not_reported_missing() {
        let resolver = MiddlewareResolver::new("/app/middlewares", "toml").with_loader(Arc::new(Unreadable));
        let locked = MiddlewareRef::from("locked");

        let err = resolver.resolve(&locked, Mode::Development).err().unwrap();
        assert!(matches!(err, DispatchError::MiddlewareUnreadable { ref reason, .. } if reason == "permission denied"));
        assert!(err.to_string().contains("/app/middlewares/locked.toml"));
        assert!(allows(&resolver.resolve(&locked, Mode::Production).unwrap()));
    }

    #[test]
    fn test_blank_name_is_invalid_type() {
        let (resolver, _) = resolver();
        let blank = MiddlewareRef::from("  ");

        let err = resolver.resolve(&blank, Mode::Development).err().unwrap();
        assert!(matches!(err, DispatchError::InvalidMiddlewareType(_)));
        assert!(allows(&resolver.resolve(&blank, Mode::Production).unwrap()));
    }
}
