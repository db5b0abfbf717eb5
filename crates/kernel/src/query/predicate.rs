//! Predicate compilation.
//!
//! Turns untyped filter criteria and a search term into typed clauses,
//! resolved against an entity schema. The compiled form is evaluated
//! directly by the in-memory engine and translated to SQL by the
//! Postgres store, so both backends share one set of validation rules.

use std::cmp::Ordering;

use tracing::debug;

use super::error::QueryError;
use super::types::{FilterCriterion, FilterOperator, FilterValue};
use super::value::{FieldValue, coerce};
use crate::entity::{Document, EntitySchema, FieldType};

/// Ordering and equality comparisons against a non-null value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
}

/// Substring operations on string fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextOp {
    Contains,
    StartsWith,
    EndsWith,
}

/// A typed condition on one field.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// `Ne` also matches null fields; every other op requires a value.
    Compare { op: CompareOp, value: FieldValue },
    IsNull,
    IsNotNull,
    /// `negated` (NotIn) also matches null fields.
    InSet {
        values: Vec<FieldValue>,
        negated: bool,
    },
    /// Case-sensitive substring match.
    Text { op: TextOp, needle: String },
}

/// One compiled filter criterion.
#[derive(Debug, Clone, PartialEq)]
pub struct Clause {
    pub field: String,
    pub field_type: FieldType,
    pub condition: Condition,
}

/// Case-insensitive search over a set of string fields.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchClause {
    pub fields: Vec<String>,
    /// Lowercased search term.
    pub needle: String,
}

/// Conjunction of clauses, AND-ed with an optional search disjunction.
///
/// An empty predicate matches every document.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Predicate {
    pub clauses: Vec<Clause>,
    pub search: Option<SearchClause>,
}

impl Predicate {
    /// Compile criteria and search term against a schema.
    ///
    /// Fails on the first invalid criterion; criteria are never skipped.
    pub fn compile(
        schema: &EntitySchema,
        filters: &[FilterCriterion],
        search_term: Option<&str>,
    ) -> Result<Self, QueryError> {
        let clauses = filters
            .iter()
            .map(|criterion| compile_criterion(schema, criterion))
            .collect::<Result<Vec<_>, _>>()?;

        let search = search_term.and_then(|term| {
            let fields: Vec<String> = schema.searchable_fields().map(|f| f.name.clone()).collect();
            if fields.is_empty() {
                debug!(entity = %schema.name, "no searchable fields, ignoring search term");
                return None;
            }
            Some(SearchClause {
                fields,
                needle: term.to_lowercase(),
            })
        });

        Ok(Self { clauses, search })
    }

    /// Evaluate against a document.
    pub fn matches(&self, document: &Document) -> bool {
        self.clauses.iter().all(|clause| clause.matches(document))
            && self.search.as_ref().is_none_or(|search| search.matches(document))
    }
}

impl Clause {
    pub fn matches(&self, document: &Document) -> bool {
        let actual = FieldValue::read(document.get(&self.field), self.field_type);

        match &self.condition {
            Condition::Compare { op, value } => {
                if actual.is_null() {
                    return *op == CompareOp::Ne;
                }
                let ordering = actual.compare(value);
                match op {
                    CompareOp::Eq => ordering == Ordering::Equal,
                    CompareOp::Ne => ordering != Ordering::Equal,
                    CompareOp::Gt => ordering == Ordering::Greater,
                    CompareOp::Ge => ordering != Ordering::Less,
                    CompareOp::Lt => ordering == Ordering::Less,
                    CompareOp::Le => ordering != Ordering::Greater,
                }
            }
            Condition::IsNull => actual.is_null(),
            Condition::IsNotNull => !actual.is_null(),
            Condition::InSet { values, negated } => {
                if actual.is_null() {
                    return *negated;
                }
                let found = values.iter().any(|v| actual.compare(v) == Ordering::Equal);
                found != *negated
            }
            Condition::Text { op, needle } => {
                let Some(haystack) = actual.as_str() else {
                    return false;
                };
                match op {
                    TextOp::Contains => haystack.contains(needle.as_str()),
                    TextOp::StartsWith => haystack.starts_with(needle.as_str()),
                    TextOp::EndsWith => haystack.ends_with(needle.as_str()),
                }
            }
        }
    }
}

impl SearchClause {
    pub fn matches(&self, document: &Document) -> bool {
        self.fields.iter().any(|field| {
            document
                .get(field)
                .and_then(|v| v.as_str())
                .is_some_and(|s| s.to_lowercase().contains(&self.needle))
        })
    }
}

fn compile_criterion(schema: &EntitySchema, criterion: &FilterCriterion) -> Result<Clause, QueryError> {
    let name = criterion.property_name.as_str();
    let field = schema.field(name).ok_or_else(|| {
        QueryError::InvalidFilter(format!("unknown property '{name}' on {}", schema.name))
    })?;

    let operator = criterion.operator;
    if !schema.accepts_operator(operator) {
        return Err(QueryError::InvalidFilter(format!(
            "operator {operator:?} is not supported on {}",
            schema.name
        )));
    }

    let field_type = field.field_type;
    let value = &criterion.value;

    let condition = match operator {
        FilterOperator::Equal | FilterOperator::NotEqual => {
            let coerced = coerce(value, field_type, name)?;
            match (operator, coerced.is_null()) {
                (FilterOperator::Equal, true) => Condition::IsNull,
                (_, true) => Condition::IsNotNull,
                (FilterOperator::Equal, false) => Condition::Compare {
                    op: CompareOp::Eq,
                    value: coerced,
                },
                (_, false) => Condition::Compare {
                    op: CompareOp::Ne,
                    value: coerced,
                },
            }
        }
        FilterOperator::GreaterThan
        | FilterOperator::GreaterThanOrEqual
        | FilterOperator::LessThan
        | FilterOperator::LessThanOrEqual => {
            let op = match operator {
                FilterOperator::GreaterThan => CompareOp::Gt,
                FilterOperator::GreaterThanOrEqual => CompareOp::Ge,
                FilterOperator::LessThan => CompareOp::Lt,
                _ => CompareOp::Le,
            };
            Condition::Compare {
                op,
                value: require_value(value, field_type, name, operator)?,
            }
        }
        FilterOperator::Contains | FilterOperator::StartsWith | FilterOperator::EndsWith => {
            if field_type != FieldType::String {
                return Err(QueryError::InvalidFilter(format!(
                    "operator {operator:?} requires a string property, '{name}' is {field_type}"
                )));
            }
            let op = match operator {
                FilterOperator::Contains => TextOp::Contains,
                FilterOperator::StartsWith => TextOp::StartsWith,
                _ => TextOp::EndsWith,
            };
            let needle = match require_value(value, field_type, name, operator)? {
                FieldValue::String(s) => s,
                other => other.to_json().to_string(),
            };
            Condition::Text { op, needle }
        }
        FilterOperator::In | FilterOperator::NotIn => {
            let items: &[FilterValue] = match value {
                FilterValue::List(items) => items,
                scalar => std::slice::from_ref(scalar),
            };
            let values = items
                .iter()
                .map(|item| require_value(item, field_type, name, operator))
                .collect::<Result<Vec<_>, _>>()?;
            Condition::InSet {
                values,
                negated: operator == FilterOperator::NotIn,
            }
        }
        FilterOperator::IsNull => Condition::IsNull,
        FilterOperator::IsNotNull => Condition::IsNotNull,
    };

    Ok(Clause {
        field: field.name.clone(),
        field_type,
        condition,
    })
}

/// Coerce a value that must not be null.
fn require_value(
    value: &FilterValue,
    field_type: FieldType,
    field: &str,
    operator: FilterOperator,
) -> Result<FieldValue, QueryError> {
    let coerced = coerce(value, field_type, field)?;
    if coerced.is_null() {
        return Err(QueryError::InvalidFilter(format!(
            "operator {operator:?} on '{field}' requires a non-null value"
        )));
    }
    Ok(coerced)
}
