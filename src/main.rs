//! switchyard: minimal HTTP request router.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ─────────────▶ http::server ──▶ http::dispatcher ──▶ routing::RouteTable
//!                    (axum, layers,    │                   (first match wins)
//!                     session cookie)  ├─▶ middleware (global → group → route)
//!                                      ├─▶ security::csrf (state-changing methods)
//!                                      └─▶ handler (function or resource file)
//!     Client Response                       │
//!     ◀──────────────────────────────── Reply / error page (403, 404, 500)
//! ```

mod routes;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::net::TcpListener;

use switchyard::config::{load_config, AppConfig};
use switchyard::lifecycle::{signals, Shutdown};
use switchyard::observability::{logging, metrics};
use switchyard::routing::{RouteTable, Routes};
use switchyard::HttpServer;

#[derive(Parser)]
#[command(name = "switchyard")]
#[command(about = "Minimal HTTP request router", long_about = None)]
struct Cli {
    /// TOML configuration file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the application (default)
    Serve,
    /// Print the registered route table
    Routes,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => AppConfig::default(),
    };

    let mut routes = Routes::new();
    routes::register(&mut routes)?;
    let table = routes.build();

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Routes => {
            print!("{}", table);
            Ok(())
        }
        Commands::Serve => serve(config, table).await,
    }
}

async fn serve(config: AppConfig, table: RouteTable) -> Result<(), Box<dyn std::error::Error>> {
    logging::init_logging(&config.observability.log_level);

    tracing::info!("switchyard v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        mode = ?config.app.mode,
        root = %config.app.root.display(),
        routes = table.len(),
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => {
                if let Err(e) = metrics::init_metrics(addr) {
                    tracing::error!(error = %e, "Failed to start metrics endpoint");
                }
            }
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;

    let shutdown = Arc::new(Shutdown::new());
    signals::spawn_signal_listener(&shutdown);

    let server = HttpServer::new(config, table);
    server.run(listener, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
