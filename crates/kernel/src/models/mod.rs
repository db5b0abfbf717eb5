//! Configuration-backed models.

pub mod api_token;

pub use api_token::{ApiToken, TokenRegistry, hash_token};
