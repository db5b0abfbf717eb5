//! Generic query engine.
//!
//! Filters, searches, sorts, and pages collections of entity documents.
//! Criteria are compiled once against the entity schema into a
//! [`Predicate`], which the in-memory [`QueryEngine`] evaluates directly and
//! the Postgres store translates to SQL via [`EntityQueryBuilder`].

mod engine;
mod error;
mod predicate;
mod sql;
mod types;
mod value;

pub use engine::{QueryEngine, SortKey};
pub use error::QueryError;
pub use predicate::{Clause, CompareOp, Condition, Predicate, SearchClause, TextOp};
pub use sql::{EntityQueryBuilder, EntityRecords};
pub use types::{
    FilterCriterion, FilterOperator, FilterValue, Paging, QueryRequest, QueryResult,
    SortDirection, parse_filters,
};
pub use value::{FieldValue, coerce, format_date, parse_date};
