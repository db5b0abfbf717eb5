//! HTTP middleware components.
//!
//! Bearer authentication, per-entity capability checks, and request metrics.

pub mod api_token;
pub mod authorize;
pub mod metrics;

pub use api_token::authenticate_api_token;
pub use authorize::{capability_for_method, require_entity_capability};
pub use metrics::track_metrics;
