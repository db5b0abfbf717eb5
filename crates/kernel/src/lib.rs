//! Campus Kernel Library
//!
//! Entity catalog, query engine, storage backends and the HTTP surface.
//! The main entry point for running the server is the `campus` binary.

pub mod config;
pub mod db;
pub mod entity;
pub mod error;
pub mod metrics;
pub mod middleware;
pub mod models;
pub mod permissions;
pub mod query;
pub mod routes;
pub mod services;
pub mod state;
pub mod store;

pub use config::Config;
pub use error::{AppError, AppResult};
pub use routes::build_router;
pub use state::AppState;
