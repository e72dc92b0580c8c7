//! Route registration and lookup.
//!
//! # Responsibilities
//! - Register routes through a chaining builder (`Routes`)
//! - Apply group prefixes and middleware to the routes a group adds
//! - Freeze the result into an immutable `RouteTable`
//! - Look up the first route matching a method and path
//!
//! # Design Decisions
//! - Registration returns a `RouteHandle` so extra middleware targets an
//!   explicit route instead of hidden builder state
//! - Order is significant: first match wins
//! - Immutable after `build()` (shared via Arc, no locks)

use std::fmt;

use axum::http::Method;
use thiserror::Error;

use crate::http::handler::HandlerRef;
use crate::http::middleware::MiddlewareRef;
use crate::routing::matcher::{Params, PathPattern};

/// Errors raised while building the route table.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouteError {
    /// `Routes::middleware` was called with no route to attach to.
    #[error("cannot attach middleware: no route was registered since the last group boundary")]
    InvalidBuilderState,

    /// A literal or required segment follows an optional parameter.
    #[error("route '{pattern}': segment '{segment}' follows an optional parameter")]
    RequiredAfterOptional { pattern: String, segment: String },
}

/// HTTP method a route answers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RouteMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Any,
}

impl RouteMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            RouteMethod::Get => "GET",
            RouteMethod::Post => "POST",
            RouteMethod::Put => "PUT",
            RouteMethod::Patch => "PATCH",
            RouteMethod::Delete => "DELETE",
            RouteMethod::Any => "ANY",
        }
    }

    /// `ANY` accepts every method; others compare exactly (case-sensitive).
    pub fn matches(self, method: &Method) -> bool {
        self == RouteMethod::Any || self.as_str() == method.as_str()
    }
}

impl fmt::Display for RouteMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A registered route.
#[derive(Debug, Clone)]
pub struct Route {
    method: RouteMethod,
    pattern: PathPattern,
    handler: HandlerRef,
    middleware: Vec<MiddlewareRef>,
}

impl Route {
    pub fn method(&self) -> RouteMethod {
        self.method
    }

    pub fn pattern(&self) -> &PathPattern {
        &self.pattern
    }

    pub fn handler(&self) -> &HandlerRef {
        &self.handler
    }

    /// Route middleware with group middleware already merged in front.
    pub fn middleware(&self) -> &[MiddlewareRef] {
        &self.middleware
    }

    fn check_pattern(&self) -> Result<(), RouteError> {
        match self.pattern.first_segment_after_optional() {
            Some(segment) => Err(RouteError::RequiredAfterOptional {
                pattern: self.pattern.to_string(),
                segment: segment.to_string(),
            }),
            None => Ok(()),
        }
    }
}

/// Attributes shared by every route registered inside a group.
#[derive(Debug, Clone, Default)]
pub struct GroupAttributes {
    prefix: Option<String>,
    middleware: Vec<MiddlewareRef>,
}

impl GroupAttributes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    pub fn middleware(mut self, mw: impl Into<MiddlewareRef>) -> Self {
        self.middleware.push(mw.into());
        self
    }
}

/// Handle to the route just registered.
pub struct RouteHandle<'a> {
    route: &'a mut Route,
}

impl RouteHandle<'_> {
    /// Append middleware to this route.
    pub fn middleware(self, mw: impl Into<MiddlewareRef>) -> Self {
        self.route.middleware.push(mw.into());
        self
    }
}

/// Route table builder.
#[derive(Debug, Default)]
pub struct Routes {
    routes: Vec<Route>,
    global_middleware: Vec<MiddlewareRef>,
    last_registered: Option<usize>,
}

impl Routes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a route with an initial middleware list.
    pub fn add(
        &mut self,
        method: RouteMethod,
        path: &str,
        handler: impl Into<HandlerRef>,
        middleware: Vec<MiddlewareRef>,
    ) -> Result<RouteHandle<'_>, RouteError> {
        let route = Route {
            method,
            pattern: PathPattern::parse(path),
            handler: handler.into(),
            middleware,
        };
        route.check_pattern()?;

        tracing::debug!(method = %method, pattern = %route.pattern, "Route registered");

        self.routes.push(route);
        let index = self.routes.len() - 1;
        self.last_registered = Some(index);
        Ok(RouteHandle {
            route: &mut self.routes[index],
        })
    }

    pub fn get(&mut self, path: &str, handler: impl Into<HandlerRef>) -> Result<RouteHandle<'_>, RouteError> {
        self.add(RouteMethod::Get, path, handler, Vec::new())
    }

    pub fn post(&mut self, path: &str, handler: impl Into<HandlerRef>) -> Result<RouteHandle<'_>, RouteError> {
        self.add(RouteMethod::Post, path, handler, Vec::new())
    }

    pub fn put(&mut self, path: &str, handler: impl Into<HandlerRef>) -> Result<RouteHandle<'_>, RouteError> {
        self.add(RouteMethod::Put, path, handler, Vec::new())
    }

    pub fn patch(&mut self, path: &str, handler: impl Into<HandlerRef>) -> Result<RouteHandle<'_>, RouteError> {
        self.add(RouteMethod::Patch, path, handler, Vec::new())
    }

    pub fn delete(&mut self, path: &str, handler: impl Into<HandlerRef>) -> Result<RouteHandle<'_>, RouteError> {
        self.add(RouteMethod::Delete, path, handler, Vec::new())
    }

    pub fn any(&mut self, path: &str, handler: impl Into<HandlerRef>) -> Result<RouteHandle<'_>, RouteError> {
        self.add(RouteMethod::Any, path, handler, Vec::new())
    }

    /// Append middleware to the most recently registered route.
    ///
    /// Fails with [`RouteError::InvalidBuilderState`] when nothing was
    /// registered since the builder was created or a group opened or closed.
    pub fn middleware(&mut self, mw: impl Into<MiddlewareRef>) -> Result<&mut Self, RouteError> {
        let index = self.last_registered.ok_or(RouteError::InvalidBuilderState)?;
        self.routes[index].middleware.push(mw.into());
        Ok(self)
    }

    /// Register routes inside `callback`, then prefix their paths and put
    /// the group middleware in front of theirs.
    ///
    /// On error every route the group registered is dropped again.
    pub fn group<F>(&mut self, attributes: GroupAttributes, callback: F) -> Result<&mut Self, RouteError>
    where
        F: FnOnce(&mut Routes) -> Result<(), RouteError>,
    {
        self.last_registered = None;
        let start = self.routes.len();

        let applied = callback(self).and_then(|()| self.apply_group(start, &attributes));
        self.last_registered = None;
        if let Err(e) = applied {
            self.routes.truncate(start);
            return Err(e);
        }

        let prefix = attributes.prefix.as_deref().unwrap_or("");

        tracing::debug!(
            prefix = %prefix,
            routes = self.routes.len() - start,
            middleware = attributes.middleware.len(),
            "Route group applied"
        );

        Ok(self)
    }

    fn apply_group(&mut self, start: usize, attributes: &GroupAttributes) -> Result<(), RouteError> {
        let prefix = attributes.prefix.as_deref().unwrap_or("");
        for route in &mut self.routes[start..] {
            route.pattern.prepend(prefix);
            if !attributes.middleware.is_empty() {
                let mut merged = attributes.middleware.clone();
                merged.append(&mut route.middleware);
                route.middleware = merged;
            }
            route.check_pattern()?;
        }
        Ok(())
    }

    /// Middleware that runs before route middleware on every matched request.
    pub fn add_global_middleware(&mut self, mw: impl Into<MiddlewareRef>) -> &mut Self {
        self.global_middleware.push(mw.into());
        self
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Freeze the registered routes.
    pub fn build(self) -> RouteTable {
        RouteTable {
            routes: self.routes,
            global_middleware: self.global_middleware,
        }
    }
}

/// Immutable, ordered route table.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    routes: Vec<Route>,
    global_middleware: Vec<MiddlewareRef>,
}

impl RouteTable {
    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    pub fn global_middleware(&self) -> &[MiddlewareRef] {
        &self.global_middleware
    }

    /// First route whose method and pattern both match.
    pub fn find(&self, method: &Method, segments: &[&str]) -> Option<(&Route, Params)> {
        self.routes
            .iter()
            .filter(|route| route.method.matches(method))
            .find_map(|route| route.pattern.matches(segments).map(|params| (route, params)))
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

impl fmt::Display for RouteTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for route in &self.routes {
            writeln!(
                f,
                "{:<7} {:<32} {} (middleware: {})",
                route.method,
                route.pattern.to_string(),
                route.handler,
                route.middleware.len()
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::response::Reply;
    use crate::routing::matcher::{split_path, Segment};

    fn ok(body: &'static str) -> HandlerRef {
        HandlerRef::func(move |_| Ok(Reply::text(body)))
    }

    fn segment_names(pattern: &PathPattern) -> Vec<String> {
        pattern
            .segments()
            .iter()
            .map(|s| match s {
                Segment::Literal(l) => l.clone(),
                Segment::Required(n) | Segment::Optional(n) => n.clone(),
            })
            .collect()
    }

    fn labels(route: &Route) -> Vec<String> {
        route
            .middleware()
            .iter()
            .map(|m| match m {
                MiddlewareRef::Resource(name) => name.clone(),
                MiddlewareRef::Func(_) => "<func>".into(),
            })
            .collect()
    }

    #[test]
    fn test_handle_attaches_middleware() {
        let mut routes = Routes::new();
        routes.get("/a", ok("a")).unwrap().middleware("auth").middleware("audit");
        routes.post("/b", ok("b")).unwrap();

        let table = routes.build();
        assert_eq!(labels(&table.routes()[0]), vec!["auth", "audit"]);
        assert!(table.routes()[1].middleware().is_empty());
    }

    #[test]
    fn test_builder_middleware_targets_last_route() {
        let mut routes = Routes::new();
        assert_eq!(routes.middleware("auth").unwrap_err(), RouteError::InvalidBuilderState);

        routes.get("/a", ok("a")).unwrap();
        routes.get("/b", ok("b")).unwrap();
        routes.middleware("auth").unwrap().middleware("audit").unwrap();

        let table = routes.build();
        assert!(table.routes()[0].middleware().is_empty());
        assert_eq!(labels(&table.routes()[1]), vec!["auth", "audit"]);
    }

    #[test]
    fn test_group_boundary_clears_last_route() {
        let mut routes = Routes::new();
        routes.get("/a", ok("a")).unwrap();
        routes
            .group(GroupAttributes::new().prefix("x"), |r| {
                assert_eq!(r.middleware("m").unwrap_err(), RouteError::InvalidBuilderState);
                r.get("/b", ok("b"))?;
                Ok(())
            })
            .unwrap();
        assert_eq!(routes.middleware("m").unwrap_err(), RouteError::InvalidBuilderState);
    }

    #[test]
    fn test_group_prefix_and_middleware() {
        let mut routes = Routes::new();
        routes
            .group(GroupAttributes::new().prefix("/admin/").middleware("admin"), |r| {
                r.get("/dashboard", ok("dash"))?.middleware("audit");
                r.get("/users/{id?}", ok("users"))?;
                Ok(())
            })
            .unwrap();
        routes.get("/", ok("home")).unwrap();

        let table = routes.build();
        let patterns: Vec<_> = table.routes().iter().map(|r| r.pattern().to_string()).collect();
        assert_eq!(patterns, vec!["/admin/dashboard", "/admin/users/{id?}", "/"]);
        assert_eq!(labels(&table.routes()[0]), vec!["admin", "audit"]);
        assert_eq!(labels(&table.routes()[1]), vec!["admin"]);
        assert!(table.routes()[2].middleware().is_empty());
    }

    #[test]
    fn test_nested_groups_compose_like_concatenation() {
        let mut nested = Routes::new();
        nested
            .group(GroupAttributes::new().prefix("admin").middleware("a1"), |r| {
                r.group(GroupAttributes::new().prefix("api").middleware("b1"), |r| {
                    r.get("/users", ok("u"))?.middleware("r1");
                    Ok(())
                })?;
                Ok(())
            })
            .unwrap();

        let mut flat = Routes::new();
        flat.add(
            RouteMethod::Get,
            "admin/api/users",
            ok("u"),
            vec!["a1".into(), "b1".into(), "r1".into()],
        )
        .unwrap();

        let nested = nested.build();
        let flat = flat.build();
        assert_eq!(nested.routes()[0].pattern(), flat.routes()[0].pattern());
        assert_eq!(labels(&nested.routes()[0]), labels(&flat.routes()[0]));
        assert_eq!(segment_names(nested.routes()[0].pattern()), vec!["admin", "api", "users"]);
    }

    #[test]
    fn test_empty_prefix_is_skipped() {
        let mut routes = Routes::new();
        routes
            .group(GroupAttributes::new().prefix("//"), |r| {
                r.get("/chat", ok("c"))?;
                Ok(())
            })
            .unwrap();
        assert_eq!(routes.build().routes()[0].pattern().to_string(), "/chat");
    }

    #[test]
    fn test_required_after_optional_rejected() {
        let mut routes = Routes::new();
        let err = routes.get("/{lang?}/docs", ok("d")).err().unwrap();
        assert_eq!(
            err,
            RouteError::RequiredAfterOptional {
                pattern: "/{lang?}/docs".into(),
                segment: "docs".into(),
            }
        );
        assert!(routes.is_empty());

        let err = routes
            .group(GroupAttributes::new().prefix("{lang?}"), |r| {
                r.get("/docs", ok("d"))?;
                Ok(())
            })
            .err()
            .unwrap();
        assert!(matches!(err, RouteError::RequiredAfterOptional { .. }));
        assert!(routes.is_empty());
    }

    #[test]
    fn test_failed_group_registers_nothing() {
        let mut routes = Routes::new();
        routes.get("/home", ok("home")).unwrap();

        let err = routes
            .group(GroupAttributes::new().prefix("admin").middleware("admin"), |r| {
                r.get("/dashboard", ok("dash"))?;
                r.get("/{lang?}/docs", ok("docs"))?;
                Ok(())
            })
            .err()
            .unwrap();
        assert!(matches!(err, RouteError::RequiredAfterOptional { .. }));

        let table = routes.build();
        assert_eq!(table.len(), 1);
        assert_eq!(table.routes()[0].pattern().to_string(), "/home");
        assert!(table.find(&Method::GET, &split_path("/dashboard")).is_none());
    }

    #[test]
    fn test_first_match_wins() {
        let mut routes = Routes::new();
        routes.get("/users/{id}", ok("param")).unwrap();
        routes.get("/users/me", ok("literal")).unwrap();
        let table = routes.build();

        let (route, params) = table.find(&Method::GET, &split_path("/users/me")).unwrap();
        assert_eq!(route.pattern().to_string(), "/users/{id}");
        assert_eq!(params.get("id"), Some("me"));
    }

    #[test]
    fn test_method_matching() {
        let mut routes = Routes::new();
        routes.post("/login", ok("post")).unwrap();
        routes.any("/ping", ok("any")).unwrap();
        let table = routes.build();

        assert!(table.find(&Method::GET, &split_path("/login")).is_none());
        assert!(table.find(&Method::POST, &split_path("/login")).is_some());
        assert!(table.find(&Method::OPTIONS, &split_path("/ping")).is_some());

        let lowercase = Method::from_bytes(b"post").unwrap();
        assert!(table.find(&lowercase, &split_path("/login")).is_none());
    }
}
