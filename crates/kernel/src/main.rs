//! Campus Kernel
//!
//! HTTP server for the school entity catalog.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use axum::http::{HeaderValue, Method, header};
use clap::{Parser, Subcommand};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use campus_kernel::entity::Catalog;
use campus_kernel::models::hash_token;
use campus_kernel::{AppState, Config, build_router};

#[derive(Parser, Debug)]
#[command(name = "campus", version, about = "School entity REST service")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP server (default).
    Serve,
    /// Validate an entity catalog and list its entity types.
    Entities {
        /// Catalog file. Defaults to ENTITY_CATALOG or the built-in catalog.
        #[arg(long)]
        catalog: Option<PathBuf>,
    },
    /// Print the SHA-256 digest of a token for the token file.
    HashToken {
        token: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve().await,
        Command::Entities { catalog } => list_entities(catalog),
        Command::HashToken { token } => {
            println!("{}", hash_token(&token));
            Ok(())
        }
    }
}

async fn serve() -> Result<()> {
    init_tracing();

    info!("Starting Campus kernel");

    let config = Config::from_env().context("failed to load configuration")?;
    info!(port = config.port, "Configuration loaded");

    let state = AppState::new(&config)
        .await
        .context("failed to initialize application state")?;
    info!(
        entities = state.registry().len(),
        store = state.store_backend(),
        "Application state initialized"
    );

    let cors = build_cors_layer(&config);

    let app = build_router(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("failed to bind to address")?;

    info!(%addr, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("Server stopped");
    Ok(())
}

fn list_entities(path: Option<PathBuf>) -> Result<()> {
    let path = path.or_else(|| std::env::var("ENTITY_CATALOG").ok().map(PathBuf::from));
    let catalog = match &path {
        Some(path) => Catalog::from_file(path),
        None => Catalog::builtin(),
    }
    .context("failed to load entity catalog")?;

    for schema in &catalog.entities {
        let capabilities: Vec<&str> = schema.capabilities.iter().map(|c| c.as_str()).collect();
        println!(
            "{:<20} {:<20} fields={:<3} capabilities={}",
            schema.name,
            schema.label,
            schema.fields.len(),
            capabilities.join(",")
        );
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

fn build_cors_layer(config: &Config) -> CorsLayer {
    let methods = [
        Method::GET,
        Method::POST,
        Method::PUT,
        Method::PATCH,
        Method::DELETE,
        Method::OPTIONS,
    ];

    if config.cors_allowed_origins.len() == 1 && config.cors_allowed_origins[0] == "*" {
        CorsLayer::new()
            .allow_origin(tower_http::cors::Any)
            .allow_methods(methods)
            .allow_headers(tower_http::cors::Any)
    } else {
        let origins: Vec<HeaderValue> = config
            .cors_allowed_origins
            .iter()
            .filter_map(|o| match o.parse::<HeaderValue>() {
                Ok(v) => Some(v),
                Err(_) => {
                    warn!(origin = %o, "ignoring unparseable CORS origin");
                    None
                }
            })
            .collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(methods)
            .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug,sqlx=warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
