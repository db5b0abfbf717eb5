//! Business logic services.

pub mod entity;

pub use entity::{EntityError, EntityService};
