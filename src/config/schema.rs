//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the router.
//! All types derive Serde traits for deserialization from config files.

use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for the application.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Application settings (mode, root directory, entry script).
    pub app: ApplicationConfig,

    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Where middleware resources are looked up.
    pub middleware: MiddlewareConfig,

    /// How handler resources are resolved.
    pub handlers: HandlerConfig,

    /// Error view location.
    pub views: ViewConfig,

    /// CSRF protection settings.
    pub csrf: CsrfConfig,

    /// Session cookie settings.
    pub session: SessionConfig,

    /// Security hardening.
    pub security: SecurityConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Runtime mode used to decide how much error detail reaches the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Development,
    Production,
}

impl Mode {
    pub fn is_development(self) -> bool {
        self == Mode::Development
    }
}

/// Configured mode. `Auto` treats loopback clients as development.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ModeSetting {
    Development,
    Production,
    #[default]
    Auto,
}

impl ModeSetting {
    /// Resolve the effective mode for a client address.
    pub fn resolve(self, remote: Option<IpAddr>) -> Mode {
        match self {
            ModeSetting::Development => Mode::Development,
            ModeSetting::Production => Mode::Production,
            ModeSetting::Auto => match remote {
                Some(ip) if ip.is_loopback() => Mode::Development,
                _ => Mode::Production,
            },
        }
    }
}

/// Application settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ApplicationConfig {
    pub mode: ModeSetting,

    /// Application root; bare handler names and the default
    /// middleware/view directories resolve under it.
    pub root: PathBuf,

    /// Path of the entry script the router is mounted behind
    /// (e.g. "/blog/index.php"). Used to compute the base path.
    pub script_name: String,
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            mode: ModeSetting::Auto,
            root: PathBuf::from("."),
            script_name: "/index.php".to_string(),
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:8080".to_string(),
        }
    }
}

/// Middleware resource lookup.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MiddlewareConfig {
    /// Directory for bare middleware names, relative to `app.root`.
    pub dir: PathBuf,

    /// Extension appended to names that lack it (without the dot).
    pub extension: String,
}

impl Default for MiddlewareConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("middlewares"),
            extension: "toml".to_string(),
        }
    }
}

/// Handler resource lookup.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HandlerConfig {
    /// Extension appended to handler references that lack it (without the dot).
    pub extension: String,
}

impl Default for HandlerConfig {
    fn default() -> Self {
        Self {
            extension: "html".to_string(),
        }
    }
}

/// Error view settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ViewConfig {
    /// Views directory relative to `app.root`. Error pages live in `<dir>/errors`.
    pub dir: PathBuf,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("views"),
        }
    }
}

/// CSRF protection settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CsrfConfig {
    /// Form field carrying the submitted token.
    pub field_name: String,

    /// When false (the default), state-changing requests that omit the
    /// token field are not checked. When true, the field is mandatory.
    pub require_token: bool,
}

impl Default for CsrfConfig {
    fn default() -> Self {
        Self {
            field_name: "csrf_token".to_string(),
            require_token: false,
        }
    }
}

/// Session cookie and lifetime settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SessionConfig {
    pub cookie_name: String,

    /// Sessions untouched for this long are dropped.
    pub idle_timeout_secs: u64,

    /// How often expired sessions are swept from the store.
    pub sweep_interval_secs: u64,
}

impl SessionConfig {
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_name: "switchyard_session".to_string(),
            idle_timeout_secs: 1800,
            sweep_interval_secs: 60,
        }
    }
}

/// Security hardening configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Enable security headers.
    pub enable_headers: bool,
    /// Maximum body size in bytes.
    pub max_body_size: usize,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            enable_headers: true,
            max_body_size: 2 * 1024 * 1024, // 2MB
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}

impl AppConfig {
    /// Directory bare middleware names resolve into.
    pub fn middleware_dir(&self) -> PathBuf {
        self.app.root.join(&self.middleware.dir)
    }

    /// Directory holding `403.html`, `404.html` and `500.html`.
    pub fn error_views_dir(&self) -> PathBuf {
        self.app.root.join(&self.views.dir).join("errors")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auto_mode_uses_client_address() {
        let auto = ModeSetting::Auto;
        assert_eq!(auto.resolve(Some("127.0.0.1".parse().unwrap())), Mode::Development);
        assert_eq!(auto.resolve(Some("::1".parse().unwrap())), Mode::Development);
        assert_eq!(auto.resolve(Some("10.0.0.7".parse().unwrap())), Mode::Production);
        assert_eq!(auto.resolve(None), Mode::Production);

        let prod = ModeSetting::Production;
        assert_eq!(prod.resolve(Some("127.0.0.1".parse().unwrap())), Mode::Production);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: AppConfig = toml::from_str(
            r#"
            [app]
            mode = "production"

            [csrf]
            require_token = true
            "#,
        )
        .unwrap();

        assert_eq!(config.app.mode, ModeSetting::Production);
        assert_eq!(config.app.script_name, "/index.php");
        assert!(config.csrf.require_token);
        assert_eq!(config.csrf.field_name, "csrf_token");
        assert_eq!(config.middleware.extension, "toml");
        assert_eq!(config.error_views_dir(), PathBuf::from("./views/errors"));
    }
}
