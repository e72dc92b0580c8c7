//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the axum Router with a catch-all handler feeding the dispatcher
//! - Wire up middleware (request ID, tracing, timeout, body limit, security headers)
//! - Read or issue the session cookie
//! - Decode urlencoded form bodies
//! - Bind server to listener and shut down gracefully

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{header, HeaderMap, HeaderValue, Request, StatusCode},
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use cookie::{Cookie, SameSite};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::http::dispatcher::Dispatcher;
use crate::http::request::{FormData, IncomingRequest};
use crate::routing::RouteTable;
use crate::security::headers::apply_security_headers;
use crate::security::session::{self, MemorySessionStore, Session, SessionStore};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
    pub sessions: Arc<dyn SessionStore>,
    pub config: Arc<AppConfig>,
}

/// HTTP front end for the dispatcher.
pub struct HttpServer {
    router: Router,
    config: Arc<AppConfig>,
    sessions: Arc<dyn SessionStore>,
}

impl HttpServer {
    /// Server over a finished route table with an in-memory session store.
    pub fn new(config: AppConfig, table: RouteTable) -> Self {
        let dispatcher = Dispatcher::new(table, &config);
        let sessions = Arc::new(MemorySessionStore::with_idle_timeout(config.session.idle_timeout()));
        Self::with_dispatcher(config, dispatcher, sessions)
    }

    pub fn with_dispatcher(config: AppConfig, dispatcher: Dispatcher, sessions: Arc<dyn SessionStore>) -> Self {
        let config = Arc::new(config);
        let state = AppState {
            dispatcher: Arc::new(dispatcher),
            sessions: Arc::clone(&sessions),
            config: Arc::clone(&config),
        };
        let router = Self::build_router(&config, state);
        Self {
            router,
            config,
            sessions,
        }
    }

    /// Build the axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &AppConfig, state: AppState) -> Router {
        let router = Router::new()
            .route("/", any(dispatch_handler))
            .route("/{*path}", any(dispatch_handler))
            .with_state(state)
            .layer(RequestBodyLimitLayer::new(config.security.max_body_size))
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid));

        if config.security.enable_headers {
            apply_security_headers(router)
        } else {
            router
        }
    }

    /// The fully layered router, for driving the server without a socket.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Serve until `shutdown` fires, then drain in-flight requests.
    ///
    /// Expired sessions are swept in the background for as long as the
    /// server runs.
    pub async fn run(self, listener: TcpListener, mut shutdown: broadcast::Receiver<()>) -> io::Result<()> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let sweeper = tokio::spawn(session::run_sweeper(
            Arc::clone(&self.sessions),
            self.config.session.sweep_interval(),
            shutdown.resubscribe(),
        ));

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        let served = axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
            })
            .await;

        sweeper.abort();
        served?;
        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Catch-all handler: turn the axum request into an `IncomingRequest` and
/// dispatch it on the blocking pool.
async fn dispatch_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let remote = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip());
    let mode = state.config.app.mode.resolve(remote);

    let cookie_name = state.config.session.cookie_name.as_str();
    let existing = session_cookie(request.headers(), cookie_name);
    let session_id = existing
        .clone()
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let (parts, body) = request.into_parts();
    let bytes = match axum::body::to_bytes(body, state.config.security.max_body_size).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(error = %e, "Request body rejected");
            return StatusCode::PAYLOAD_TOO_LARGE.into_response();
        }
    };

    let form = if is_form(&parts.headers) {
        FormData::parse(&bytes)
    } else {
        FormData::default()
    };
    let incoming = IncomingRequest::new(parts.method, parts.uri.path()).with_form(form);
    let session = Session::new(session_id.clone(), Arc::clone(&state.sessions));

    let dispatcher = Arc::clone(&state.dispatcher);
    let reply = match tokio::task::spawn_blocking(move || dispatcher.dispatch(&incoming, session, mode)).await {
        Ok(reply) => reply,
        Err(e) => {
            tracing::error!(error = %e, "Dispatch task failed");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let mut response = reply.into_response();
    if existing.is_none() {
        let cookie = Cookie::build((cookie_name.to_string(), session_id))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .build();
        if let Ok(value) = HeaderValue::from_str(&cookie.to_string()) {
            response.headers_mut().append(header::SET_COOKIE, value);
        }
    }
    response
}

/// Session id from the request cookies. Ids this server could not have
/// issued are ignored so a client cannot pick its own.
fn session_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(Cookie::split_parse)
        .filter_map(Result::ok)
        .find(|cookie| cookie.name() == name)
        .map(|cookie| cookie.value().to_string())
        .filter(|id| Uuid::parse_str(id).is_ok())
}

fn is_form(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.starts_with("application/x-www-form-urlencoded"))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_cookie_lookup() {
        let id = Uuid::new_v4().to_string();
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_str(&format!("theme=dark; switchyard_session={}", id)).unwrap(),
        );
        assert_eq!(session_cookie(&headers, "switchyard_session"), Some(id));
        assert_eq!(session_cookie(&headers, "other"), None);

        let mut forged = HeaderMap::new();
        forged.insert(header::COOKIE, HeaderValue::from_static("switchyard_session=chosen-by-client"));
        assert_eq!(session_cookie(&forged, "switchyard_session"), None);
    }

    #[test]
    fn test_form_content_type() {
        let mut headers = HeaderMap::new();
        assert!(!is_form(&headers));
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/x-www-form-urlencoded; charset=UTF-8"),
        );
        assert!(is_form(&headers));
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
        assert!(!is_form(&headers));
    }
}
