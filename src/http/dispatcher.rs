//! Request dispatch.
//!
//! # Responsibilities
//! - Strip the base path and find the first matching route
//! - Run global, then route middleware; first deny stops the request
//! - Check and rotate the CSRF token around state-changing requests
//! - Invoke the handler and turn every failure into an error page
//!
//! # Data Flow
//! ```text
//! IncomingRequest
//!     → strip_base → split_path → RouteTable::find ── none ──→ 404
//!     → middleware (global, group, route) ────────── deny ──→ 403
//!     → CsrfGuard::consume (check + rotate) ───── invalid ──→ 403
//!     → handler (function or resource) ───────────── error ──→ 500
//!     → CsrfGuard::regenerate (unchecked POST/PUT/PATCH/DELETE)
//!     → Reply
//! ```
//!
//! # Design Decisions
//! - Synchronous: middleware and resource handlers may touch the filesystem,
//!   so the server runs dispatch on the blocking pool
//! - `dispatch` never fails; errors become replies rendered per mode
//! - Unmatched paths skip global middleware

use std::sync::Arc;
use std::time::Instant;

use axum::http::StatusCode;

use crate::config::{AppConfig, CsrfConfig, Mode};
use crate::http::error::DispatchError;
use crate::http::handler::{HandlerRef, HandlerResolver};
use crate::http::middleware::{MiddlewareLoader, MiddlewareResolver};
use crate::http::request::{base_path, strip_base, IncomingRequest, RequestContext};
use crate::http::response::Reply;
use crate::http::views::ErrorPages;
use crate::observability::metrics;
use crate::routing::{split_path, Route, RouteTable};
use crate::security::csrf::{is_state_changing, CsrfGuard};
use crate::security::session::Session;

const MIDDLEWARE_DENIED: &str = "Access denied by middleware";
const CSRF_FAILED: &str = "CSRF token validation failed.";

/// How a matched request ended, short of an error.
enum Outcome {
    Handled(Reply),
    Denied,
    CsrfRejected,
}

/// Dispatches requests against a finished route table.
#[derive(Clone)]
pub struct Dispatcher {
    table: Arc<RouteTable>,
    middleware: MiddlewareResolver,
    handlers: HandlerResolver,
    errors: ErrorPages,
    csrf: CsrfConfig,
    base_path: String,
}

impl Dispatcher {
    pub fn new(table: RouteTable, config: &AppConfig) -> Self {
        Self {
            table: Arc::new(table),
            middleware: MiddlewareResolver::new(config.middleware_dir(), config.middleware.extension.clone()),
            handlers: HandlerResolver::new(config.app.root.clone(), config.handlers.extension.clone()),
            errors: ErrorPages::new(config.error_views_dir()),
            csrf: config.csrf.clone(),
            base_path: base_path(&config.app.script_name),
        }
    }

    /// Replace the filesystem middleware loader.
    pub fn with_middleware_loader(mut self, loader: Arc<dyn MiddlewareLoader>) -> Self {
        self.middleware = self.middleware.with_loader(loader);
        self
    }

    pub fn table(&self) -> &RouteTable {
        &self.table
    }

    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    /// Dispatch one request. Exactly one route runs, or none.
    pub fn dispatch(&self, request: &IncomingRequest, session: Session, mode: Mode) -> Reply {
        let started = Instant::now();
        let reply = self.dispatch_inner(request, &session, mode);
        metrics::record_dispatch(request.method.as_str(), reply.status_code().as_u16(), started);
        reply
    }

    fn dispatch_inner(&self, request: &IncomingRequest, session: &Session, mode: Mode) -> Reply {
        let path = strip_base(&request.path, &self.base_path);
        let segments = split_path(path);

        let Some((route, params)) = self.table.find(&request.method, &segments) else {
            tracing::debug!(method = %request.method, path = %path, "No route matched");
            return self.errors.render(StatusCode::NOT_FOUND, None, mode);
        };

        tracing::debug!(
            method = %request.method,
            path = %path,
            route = %route.pattern(),
            "Route matched"
        );

        let ctx = RequestContext::new(
            &request.method,
            path,
            params,
            &request.form,
            session,
            &self.csrf.field_name,
        );

        match self.run_route(route, &ctx, mode) {
            Ok(Outcome::Handled(reply)) => reply,
            Ok(Outcome::Denied) => {
                tracing::info!(method = %request.method, path = %path, "Request denied by middleware");
                metrics::record_middleware_denied();
                self.errors.render(StatusCode::FORBIDDEN, Some(MIDDLEWARE_DENIED), mode)
            }
            Ok(Outcome::CsrfRejected) => {
                tracing::warn!(method = %request.method, path = %path, "CSRF token validation failed");
                self.errors.render(StatusCode::FORBIDDEN, Some(CSRF_FAILED), mode)
            }
            Err(e) => {
                tracing::error!(method = %request.method, path = %path, error = %e, "Dispatch failed");
                let message = e.page_message();
                self.errors
                    .render(StatusCode::INTERNAL_SERVER_ERROR, Some(message.as_str()), mode)
            }
        }
    }

    fn run_route(&self, route: &Route, ctx: &RequestContext<'_>, mode: Mode) -> Result<Outcome, DispatchError> {
        let chain = self
            .table
            .global_middleware()
            .iter()
            .chain(route.middleware());

        for mw in chain {
            let middleware = self.middleware.resolve(mw, mode)?;
            if !middleware.handle(ctx) {
                return Ok(Outcome::Denied);
            }
        }

        let guard = CsrfGuard::new(ctx.session().clone(), self.csrf.field_name.clone());
        let submitted = ctx.form().get(&self.csrf.field_name);
        let checked = submitted.is_some() || self.csrf.require_token;
        // A checked token is rotated by `consume` before the handler runs.
        if checked && !guard.consume(ctx.method(), submitted) {
            return Ok(Outcome::CsrfRejected);
        }

        let reply = self.invoke(route.handler(), ctx)?;

        if !checked && is_state_changing(ctx.method()) {
            guard.regenerate();
        }
        Ok(Outcome::Handled(reply))
    }

    fn invoke(&self, handler: &HandlerRef, ctx: &RequestContext<'_>) -> Result<Reply, DispatchError> {
        match handler {
            HandlerRef::Func(f) => Ok(f.call(ctx)?),
            HandlerRef::Resource(name) => {
                let path = self.handlers.resolve(name);
                match self.handlers.render(&path, ctx.params()) {
                    Ok(Some(reply)) => Ok(reply),
                    Ok(None) => Err(DispatchError::HandlerNotFound { path }),
                    Err(e) => Err(DispatchError::Handler(e)),
                }
            }
        }
    }
}
