//! Query engine types.
//!
//! Provides type definitions for list queries:
//! - FilterCriterion: one (field, operator, value) constraint
//! - FilterValue: loosely typed literal, coerced per field type at compile time
//! - QueryRequest: filters, search term, paging, and sort for one call
//! - QueryResult: one page of matches plus the pre-paging total

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::error::QueryError;

/// Comparison operators for filtering.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum FilterOperator {
    /// Exact match. A `null` value matches missing or null fields.
    Equal,
    /// Not equal. A `null` value matches present, non-null fields.
    NotEqual,
    GreaterThan,
    GreaterThanOrEqual,
    LessThan,
    LessThanOrEqual,
    /// Substring match (string fields only).
    Contains,
    /// Prefix match (string fields only).
    StartsWith,
    /// Suffix match (string fields only).
    EndsWith,
    /// Value in list.
    In,
    /// Value not in list.
    NotIn,
    /// Field is missing or null.
    IsNull,
    /// Field is present and not null.
    IsNotNull,
}

impl FilterOperator {
    /// Every supported operator.
    pub const ALL: [FilterOperator; 13] = [
        FilterOperator::Equal,
        FilterOperator::NotEqual,
        FilterOperator::GreaterThan,
        FilterOperator::GreaterThanOrEqual,
        FilterOperator::LessThan,
        FilterOperator::LessThanOrEqual,
        FilterOperator::Contains,
        FilterOperator::StartsWith,
        FilterOperator::EndsWith,
        FilterOperator::In,
        FilterOperator::NotIn,
        FilterOperator::IsNull,
        FilterOperator::IsNotNull,
    ];
}

/// Filter value as it arrives on the wire.
///
/// JSON objects are rejected. Dates arrive as strings and are only
/// recognised once coerced against a `date` field.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum FilterValue {
    #[default]
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
    Date(DateTime<Utc>),
    /// List of values (for In/NotIn operators).
    List(Vec<FilterValue>),
}

impl FilterValue {
    /// Short type name used in coercion errors.
    pub fn kind(&self) -> &'static str {
        match self {
            FilterValue::Null => "null",
            FilterValue::Boolean(_) => "boolean",
            FilterValue::Integer(_) => "integer",
            FilterValue::Float(_) => "number",
            FilterValue::String(_) => "string",
            FilterValue::Date(_) => "date",
            FilterValue::List(_) => "list",
        }
    }
}

impl TryFrom<serde_json::Value> for FilterValue {
    type Error = QueryError;

    fn try_from(value: serde_json::Value) -> Result<Self, Self::Error> {
        use serde_json::Value;

        Ok(match value {
            Value::Null => FilterValue::Null,
            Value::Bool(b) => FilterValue::Boolean(b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => FilterValue::Integer(i),
                None => FilterValue::Float(n.as_f64().ok_or_else(|| {
                    QueryError::InvalidFilter(format!("number {n} is out of range"))
                })?),
            },
            Value::String(s) => FilterValue::String(s),
            Value::Array(items) => FilterValue::List(
                items
                    .into_iter()
                    .map(FilterValue::try_from)
                    .collect::<Result<_, _>>()?,
            ),
            Value::Object(_) => {
                return Err(QueryError::InvalidFilter(
                    "filter values cannot be objects".to_string(),
                ));
            }
        })
    }
}

impl<'de> Deserialize<'de> for FilterValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        FilterValue::try_from(value).map_err(serde::de::Error::custom)
    }
}

impl Serialize for FilterValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            FilterValue::Null => serializer.serialize_none(),
            FilterValue::Boolean(b) => serializer.serialize_bool(*b),
            FilterValue::Integer(i) => serializer.serialize_i64(*i),
            FilterValue::Float(f) => serializer.serialize_f64(*f),
            FilterValue::String(s) => serializer.serialize_str(s),
            FilterValue::Date(d) => {
                serializer.serialize_str(&d.to_rfc3339_opts(SecondsFormat::AutoSi, true))
            }
            FilterValue::List(items) => items.serialize(serializer),
        }
    }
}

/// One filter constraint, in the wire shape
/// `{"PropertyName": ..., "Operator": ..., "Value": ...}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
pub struct FilterCriterion {
    /// Target field, matched case-sensitively against the schema.
    pub property_name: String,

    pub operator: FilterOperator,

    /// Omitted values deserialize as `null`.
    #[serde(default)]
    pub value: FilterValue,
}

impl FilterCriterion {
    pub fn new(
        property_name: impl Into<String>,
        operator: FilterOperator,
        value: impl Into<FilterValue>,
    ) -> Self {
        Self {
            property_name: property_name.into(),
            operator,
            value: value.into(),
        }
    }
}

impl From<&str> for FilterValue {
    fn from(value: &str) -> Self {
        FilterValue::String(value.to_string())
    }
}

impl From<String> for FilterValue {
    fn from(value: String) -> Self {
        FilterValue::String(value)
    }
}

impl From<i64> for FilterValue {
    fn from(value: i64) -> Self {
        FilterValue::Integer(value)
    }
}

impl From<f64> for FilterValue {
    fn from(value: f64) -> Self {
        FilterValue::Float(value)
    }
}

impl From<bool> for FilterValue {
    fn from(value: bool) -> Self {
        FilterValue::Boolean(value)
    }
}

impl From<DateTime<Utc>> for FilterValue {
    fn from(value: DateTime<Utc>) -> Self {
        FilterValue::Date(value)
    }
}

impl<T: Into<FilterValue>> From<Vec<T>> for FilterValue {
    fn from(values: Vec<T>) -> Self {
        FilterValue::List(values.into_iter().map(Into::into).collect())
    }
}

/// Parse the `filters` query-string value.
///
/// Absent, empty, or `null` means no filtering. Anything that is not a JSON
/// array of criteria is rejected as a whole.
pub fn parse_filters(raw: Option<&str>) -> Result<Vec<FilterCriterion>, QueryError> {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(Vec::new());
    };

    let parsed: Option<Vec<FilterCriterion>> =
        serde_json::from_str(raw).map_err(|e| QueryError::InvalidFilter(e.to_string()))?;

    Ok(parsed.unwrap_or_default())
}

/// Sort direction.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    /// Parse `asc`/`desc` case-insensitively. Absent or blank means ascending.
    pub fn parse(raw: Option<&str>) -> Result<Self, QueryError> {
        match raw.map(str::trim) {
            None | Some("") => Ok(SortDirection::Asc),
            Some(s) if s.eq_ignore_ascii_case("asc") => Ok(SortDirection::Asc),
            Some(s) if s.eq_ignore_ascii_case("desc") => Ok(SortDirection::Desc),
            Some(s) => Err(QueryError::InvalidArgument(format!(
                "sort order '{s}' invalid, expected 'asc' or 'desc'"
            ))),
        }
    }
}

/// Offset-based slice derived from a validated request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Paging {
    pub offset: u64,
    pub limit: u64,
}

/// Parameters of one list call.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryRequest {
    /// Criteria combined with AND, applied in order.
    pub filters: Vec<FilterCriterion>,

    /// Case-insensitive substring matched against searchable fields.
    pub search_term: Option<String>,

    /// 1-indexed page number.
    pub page_number: i64,

    /// Items per page.
    pub page_size: i64,

    /// Field to order by. `None` keeps insertion order.
    pub sort_field: Option<String>,

    pub sort_order: SortDirection,
}

impl QueryRequest {
    /// Create an unfiltered request for the given page.
    pub fn new(page_number: i64, page_size: i64) -> Self {
        Self {
            filters: Vec::new(),
            search_term: None,
            page_number,
            page_size,
            sort_field: None,
            sort_order: SortDirection::Asc,
        }
    }

    pub fn with_filter(mut self, criterion: FilterCriterion) -> Self {
        self.filters.push(criterion);
        self
    }

    pub fn with_search(mut self, term: impl Into<String>) -> Self {
        self.search_term = Some(term.into());
        self
    }

    pub fn sorted_by(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
        self.sort_field = Some(field.into());
        self.sort_order = direction;
        self
    }

    /// Validate paging and compute the slice.
    pub fn paging(&self) -> Result<Paging, QueryError> {
        if self.page_size < 1 {
            return Err(QueryError::InvalidArgument("page size invalid".to_string()));
        }
        if self.page_number < 1 {
            return Err(QueryError::InvalidArgument("page number invalid".to_string()));
        }

        // Both operands are positive here.
        let limit = self.page_size.unsigned_abs();
        let offset = (self.page_number - 1).unsigned_abs().saturating_mul(limit);

        Ok(Paging { offset, limit })
    }

    /// Search term with surrounding whitespace removed, if non-empty.
    pub fn effective_search(&self) -> Option<&str> {
        self.search_term
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

/// Result of a list query.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QueryResult<T> {
    /// Matches before paging.
    pub total_count: u64,

    /// Echoed page number (1-indexed).
    pub page_number: i64,

    /// Echoed page size.
    pub page_size: i64,

    pub total_pages: u64,

    pub items: Vec<T>,
}

impl<T> QueryResult<T> {
    /// Create a result with paging calculations.
    pub fn new(items: Vec<T>, total_count: u64, page_number: i64, page_size: i64) -> Self {
        let total_pages = match u64::try_from(page_size) {
            Ok(size) if size > 0 => total_count.div_ceil(size),
            _ => 0,
        };

        Self {
            total_count,
            page_number,
            page_size,
            total_pages,
            items,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn parse_filters_wire_format() {
        let raw = r#"[{"PropertyName":"Status","Operator":"Equal","Value":"Active"},
                      {"PropertyName":"Age","Operator":"GreaterThan","Value":12}]"#;
        let filters = parse_filters(Some(raw)).unwrap();

        assert_eq!(filters.len(), 2);
        assert_eq!(filters[0].property_name, "Status");
        assert_eq!(filters[0].operator, FilterOperator::Equal);
        assert_eq!(filters[0].value, FilterValue::String("Active".to_string()));
        assert_eq!(filters[1].value, FilterValue::Integer(12));
    }

    #[test]
    fn parse_filters_absent_or_empty_means_no_filtering() {
        assert!(parse_filters(None).unwrap().is_empty());
        assert!(parse_filters(Some("")).unwrap().is_empty());
        assert!(parse_filters(Some("   ")).unwrap().is_empty());
        assert!(parse_filters(Some("null")).unwrap().is_empty());
        assert!(parse_filters(Some("[]")).unwrap().is_empty());
    }

    #[test]
    fn parse_filters_rejects_malformed_payloads() {
        for raw in [
            "not json",
            r#"{"PropertyName":"Status","Operator":"Equal","Value":"x"}"#,
            r#"[{"PropertyName":"Status","Operator":"Like","Value":"x"}]"#,
            r#"[{"Operator":"Equal","Value":"x"}]"#,
            r#"[{"PropertyName":"Status","Operator":"Equal","Value":{"a":1}}]"#,
            r#"[{"PropertyName":"Status","Operator":"Equal","Value":"x","Extra":1}]"#,
        ] {
            let err = parse_filters(Some(raw)).unwrap_err();
            assert!(
                matches!(err, QueryError::InvalidFilter(_)),
                "expected InvalidFilter for {raw}: {err:?}"
            );
        }
    }

    #[test]
    fn missing_value_is_null() {
        let filters =
            parse_filters(Some(r#"[{"PropertyName":"Email","Operator":"IsNull"}]"#)).unwrap();
        assert_eq!(filters[0].value, FilterValue::Null);
    }

    #[test]
    fn list_values_parse_recursively() {
        let filters = parse_filters(Some(
            r#"[{"PropertyName":"Grade","Operator":"In","Value":[1, 2.5, "3"]}]"#,
        ))
        .unwrap();
        assert_eq!(
            filters[0].value,
            FilterValue::List(vec![
                FilterValue::Integer(1),
                FilterValue::Float(2.5),
                FilterValue::String("3".to_string()),
            ])
        );
    }

    #[test]
    fn sort_direction_parse() {
        assert_eq!(SortDirection::parse(None).unwrap(), SortDirection::Asc);
        assert_eq!(SortDirection::parse(Some("")).unwrap(), SortDirection::Asc);
        assert_eq!(SortDirection::parse(Some("ASC")).unwrap(), SortDirection::Asc);
        assert_eq!(SortDirection::parse(Some("Desc")).unwrap(), SortDirection::Desc);
        assert!(matches!(
            SortDirection::parse(Some("sideways")),
            Err(QueryError::InvalidArgument(_))
        ));
    }

    #[test]
    fn paging_validation() {
        assert_eq!(
            QueryRequest::new(3, 10).paging().unwrap(),
            Paging {
                offset: 20,
                limit: 10
            }
        );

        let err = QueryRequest::new(1, 0).paging().unwrap_err();
        assert_eq!(err, QueryError::InvalidArgument("page size invalid".to_string()));

        let err = QueryRequest::new(1, -5).paging().unwrap_err();
        assert_eq!(err, QueryError::InvalidArgument("page size invalid".to_string()));

        let err = QueryRequest::new(0, 10).paging().unwrap_err();
        assert_eq!(err, QueryError::InvalidArgument("page number invalid".to_string()));
    }

    #[test]
    fn paging_offset_saturates() {
        let paging = QueryRequest::new(i64::MAX, i64::MAX).paging().unwrap();
        assert_eq!(paging.offset, u64::MAX);
    }

    #[test]
    fn effective_search_trims() {
        assert_eq!(QueryRequest::new(1, 1).effective_search(), None);
        assert_eq!(QueryRequest::new(1, 1).with_search("   ").effective_search(), None);
        assert_eq!(
            QueryRequest::new(1, 1).with_search("  john ").effective_search(),
            Some("john")
        );
    }

    #[test]
    fn query_result_paging() {
        let result = QueryResult::new(vec![1, 2, 3, 4, 5], 25, 3, 10);
        assert_eq!(result.total_count, 25);
        assert_eq!(result.total_pages, 3);

        let result: QueryResult<i32> = QueryResult::new(vec![], 0, 1, 10);
        assert_eq!(result.total_pages, 0);
    }

    #[test]
    fn query_result_serializes_camel_case() {
        let result = QueryResult::new(vec!["a"], 1, 1, 10);
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "totalCount": 1,
                "pageNumber": 1,
                "pageSize": 10,
                "totalPages": 1,
                "items": ["a"]
            })
        );
    }
}
