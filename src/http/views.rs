//! View rendering with tera: error pages and resource handler templates.
//!
//! Templates are read from disk and compiled per render, so edits show up
//! on the next request. Autoescaping is always on.

use std::fs;
use std::path::{Path, PathBuf};

use axum::http::StatusCode;
use tera::{Context, Tera};

use crate::config::Mode;
use crate::http::response::Reply;

/// Page used when no `<status>.html` view exists or it fails to render.
const BUILTIN_PAGE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head><meta charset="utf-8"><title>{{ status_code }} | {{ status_text }}</title></head>
<body>
<main>
<h1>{{ status_code }} &bull; {{ status_text }}</h1>
{% if error %}<p>{{ error }}</p>{% endif %}
<a href="/">Home</a>
</main>
</body>
</html>
"#;

/// Render a template source with HTML autoescaping.
pub fn render_template(source: &str, context: &Context) -> tera::Result<String> {
    Tera::one_off(source, context, true)
}

/// Renders 403/404/500 pages from `<dir>/<status>.html`.
#[derive(Debug, Clone)]
pub struct ErrorPages {
    dir: PathBuf,
}

impl ErrorPages {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Development: the view with `error`, `status_code` and `status_text`
    /// bound. Production: status only.
    pub fn render(&self, status: StatusCode, error: Option<&str>, mode: Mode) -> Reply {
        if !mode.is_development() {
            return Reply::status(status);
        }

        let mut context = Context::new();
        context.insert("status_code", &status.as_u16());
        context.insert("status_text", status.canonical_reason().unwrap_or("Error"));
        context.insert("error", error.unwrap_or(""));

        let path = self.dir.join(format!("{}.html", status.as_u16()));
        let rendered = match fs::read_to_string(&path) {
            Ok(source) => render_template(&source, &context).or_else(|e| {
                tracing::warn!(path = %path.display(), error = ?e, "Error view failed to render");
                render_template(BUILTIN_PAGE, &context)
            }),
            Err(_) => render_template(BUILTIN_PAGE, &context),
        };

        match rendered {
            Ok(body) => Reply::html(body).with_status(status),
            Err(e) => {
                tracing::error!(error = ?e, "Built-in error page failed to render");
                Reply::status(status)
            }
        }
    }
}
