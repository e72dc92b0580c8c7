//! Middleware resource loading.
//!
//! A middleware resource is a TOML rule document:
//!
//! ```toml
//! # middlewares/admin.toml
//! require_session = ["is_admin"]
//! deny_methods = ["DELETE"]
//! ```
//!
//! A document without any rule key does not describe a callable and is
//! reported back as a plain value.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use serde::Deserialize;

use crate::http::middleware::Middleware;
use crate::http::request::RequestContext;

/// Result of evaluating a middleware resource.
#[derive(Clone)]
pub enum Loaded {
    Callable(Arc<dyn Middleware>),
    /// The resource evaluated to something that is not a middleware.
    Value(String),
}

/// Loads middleware resources by resolved path.
pub trait MiddlewareLoader: Send + Sync {
    /// `Err` with `ErrorKind::NotFound` when the resource does not exist.
    fn load(&self, path: &Path) -> io::Result<Loaded>;
}

/// Declarative middleware rules. Every present rule must pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RuleSet {
    /// Only these methods may continue.
    pub allow_methods: Option<Vec<String>>,
    /// These methods are denied.
    pub deny_methods: Option<Vec<String>>,
    /// Parameters that must be bound to a value.
    pub require_params: Option<Vec<String>>,
    /// Session keys that must hold a non-empty value.
    pub require_session: Option<Vec<String>>,
}

impl RuleSet {
    fn is_empty(&self) -> bool {
        self.allow_methods.is_none()
            && self.deny_methods.is_none()
            && self.require_params.is_none()
            && self.require_session.is_none()
    }
}

impl Middleware for RuleSet {
    fn handle(&self, ctx: &RequestContext<'_>) -> bool {
        let method = ctx.method().as_str();

        if let Some(allowed) = &self.allow_methods {
            if !allowed.iter().any(|m| m == method) {
                return false;
            }
        }
        if let Some(denied) = &self.deny_methods {
            if denied.iter().any(|m| m == method) {
                return false;
            }
        }
        if let Some(params) = &self.require_params {
            if params.iter().any(|p| ctx.param(p).is_none()) {
                return false;
            }
        }
        if let Some(keys) = &self.require_session {
            let session = ctx.session();
            if keys
                .iter()
                .any(|k| session.get(k).map_or(true, |v| v.is_empty()))
            {
                return false;
            }
        }
        true
    }
}

/// Evaluate the text of a rule document.
pub fn evaluate_rules(source: &str) -> Loaded {
    match toml::from_str::<RuleSet>(source) {
        Ok(rules) if !rules.is_empty() => Loaded::Callable(Arc::new(rules)),
        Ok(_) => Loaded::Value(source.trim().to_string()),
        Err(e) => Loaded::Value(format!("unparseable rule document ({})", e.message())),
    }
}

/// Reads rule documents from disk on every load.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsMiddlewareLoader;

impl MiddlewareLoader for FsMiddlewareLoader {
    fn load(&self, path: &Path) -> io::Result<Loaded> {
        let source = fs::read_to_string(path)?;
        Ok(evaluate_rules(&source))
    }
}

/// In-memory loader keyed by resolved path, for embedding compiled
/// middleware under resource names.
#[derive(Default)]
pub struct MemoryMiddlewareLoader {
    entries: DashMap<PathBuf, Loaded>,
}

impl MemoryMiddlewareLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, path: impl Into<PathBuf>, loaded: Loaded) {
        self.entries.insert(path.into(), loaded);
    }
}

impl MiddlewareLoader for MemoryMiddlewareLoader {
    fn load(&self, path: &Path) -> io::Result<Loaded> {
        self.entries
            .get(path)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, path.display().to_string()))
    }
}
