//! In-memory query execution.
//!
//! Applies a [`QueryRequest`] to a collection of records of one entity type:
//! filter, count, sort, then slice. Read-only and reentrant; callers hand in
//! a consistent snapshot.

use std::cmp::Ordering;

use super::error::QueryError;
use super::predicate::Predicate;
use super::types::{QueryRequest, QueryResult, SortDirection};
use super::value::FieldValue;
use crate::entity::{Document, EntitySchema, FieldType, Record};

/// Resolved sort specification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    pub field: String,
    pub field_type: FieldType,
    pub direction: SortDirection,
}

impl SortKey {
    /// Resolve the request's sort field against the schema.
    ///
    /// Returns `None` when no sort field was given.
    pub fn resolve(schema: &EntitySchema, request: &QueryRequest) -> Result<Option<Self>, QueryError> {
        let Some(name) = request
            .sort_field
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
        else {
            return Ok(None);
        };

        let field = schema
            .field(name)
            .ok_or_else(|| QueryError::InvalidSortField(name.to_string()))?;

        Ok(Some(Self {
            field: field.name.clone(),
            field_type: field.field_type,
            direction: request.sort_order,
        }))
    }

    /// Compare two field values in this key's direction.
    ///
    /// Descending reverses the comparator; the caller's tie-break is not
    /// affected.
    pub fn compare(&self, a: &FieldValue, b: &FieldValue) -> Ordering {
        let ordering = a.compare(b);
        match self.direction {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        }
    }
}

/// Stateless executor for list queries over in-memory records.
pub struct QueryEngine;

impl QueryEngine {
    /// Execute a request against a source collection.
    ///
    /// Validation happens before any record is touched: paging, then
    /// filters and search, then the sort field. Equal sort keys fall back to
    /// insertion order, so repeated calls over unchanged data return the
    /// same page.
    pub fn execute<'a, I>(
        schema: &EntitySchema,
        source: I,
        request: &QueryRequest,
    ) -> Result<QueryResult<Document>, QueryError>
    where
        I: IntoIterator<Item = &'a Record>,
    {
        let paging = request.paging()?;
        let predicate = Predicate::compile(schema, &request.filters, request.effective_search())?;
        let sort = SortKey::resolve(schema, request)?;

        let matched: Vec<&Record> = source
            .into_iter()
            .filter(|record| predicate.matches(&record.document))
            .collect();
        let total_count = matched.len() as u64;

        let ordered: Vec<&Record> = match sort {
            Some(key) => {
                let mut keyed: Vec<(FieldValue, &Record)> = matched
                    .into_iter()
                    .map(|record| {
                        let value =
                            FieldValue::read(record.document.get(&key.field), key.field_type);
                        (value, record)
                    })
                    .collect();
                keyed.sort_by(|(a, ra), (b, rb)| {
                    key.compare(a, b).then_with(|| ra.seq.cmp(&rb.seq))
                });
                keyed.into_iter().map(|(_, record)| record).collect()
            }
            None => {
                let mut matched = matched;
                matched.sort_by_key(|record| record.seq);
                matched
            }
        };

        let offset = usize::try_from(paging.offset).unwrap_or(usize::MAX);
        let limit = usize::try_from(paging.limit).unwrap_or(usize::MAX);

        let items = ordered
            .into_iter()
            .skip(offset)
            .take(limit)
            .map(|record| record.document.clone())
            .collect();

        Ok(QueryResult::new(
            items,
            total_count,
            request.page_number,
            request.page_size,
        ))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::entity::FieldDefinition;
    use crate::query::{FilterCriterion, FilterOperator};
    use serde_json::json;

    fn schema() -> EntitySchema {
        let field = |name: &str, field_type, searchable| FieldDefinition {
            name: name.to_string(),
            field_type,
            required: false,
            searchable,
            system: false,
        };
        EntitySchema::new(
            "students",
            "Student",
            vec![
                field("Name", FieldType::String, true),
                field("Status", FieldType::String, false),
                field("Rank", FieldType::Integer, false),
            ],
        )
    }

    fn records(count: u64) -> Vec<Record> {
        (0..count)
            .map(|i| Record {
                seq: i + 1,
                document: json!({
                    "Name": format!("Student {i:02}"),
                    "Status": if i % 2 == 0 { "Active" } else { "Inactive" },
                    "Rank": i % 3,
                    "CreatedAt": format!("2024-01-{:02}T00:00:00Z", 1 + i % 5),
                })
                .as_object()
                .cloned()
                .unwrap(),
            })
            .collect()
    }

    fn names(result: &QueryResult<Document>) -> Vec<String> {
        result
            .items
            .iter()
            .map(|d| d["Name"].as_str().unwrap().to_string())
            .collect()
    }

    #[test]
    fn third_page_of_twenty_five() {
        let data = records(25);
        let result = QueryEngine::execute(&schema(), &data, &QueryRequest::new(3, 10)).unwrap();

        assert_eq!(result.total_count, 25);
        assert_eq!(result.items.len(), 5);
        assert_eq!(result.page_number, 3);
        assert_eq!(result.page_size, 10);
        assert_eq!(result.total_pages, 3);
        assert_eq!(names(&result)[0], "Student 20");
    }

    #[test]
    fn page_length_matches_formula() {
        let data = records(23);
        for page_size in 1..=7_i64 {
            for page_number in 1..=30_i64 {
                let result = QueryEngine::execute(
                    &schema(),
                    &data,
                    &QueryRequest::new(page_number, page_size),
                )
                .unwrap();
                let expected = (23 - (page_number - 1) * page_size).clamp(0, page_size);
                assert_eq!(result.items.len() as i64, expected);
                assert_eq!(result.total_count, 23);
            }
        }
    }

    #[test]
    fn page_past_the_end_keeps_total() {
        let data = records(25);
        let result = QueryEngine::execute(&schema(), &data, &QueryRequest::new(9, 10)).unwrap();
        assert!(result.items.is_empty());
        assert_eq!(result.total_count, 25);
    }

    #[test]
    fn invalid_paging_is_rejected() {
        let data = records(3);
        for request in [QueryRequest::new(1, 0), QueryRequest::new(1, -1), QueryRequest::new(0, 5)] {
            let err = QueryEngine::execute(&schema(), &data, &request).unwrap_err();
            assert!(matches!(err, QueryError::InvalidArgument(_)));
        }
    }

    #[test]
    fn unknown_sort_field_is_rejected() {
        let data = records(3);
        let request = QueryRequest::new(1, 10).sorted_by("Nickname", SortDirection::Asc);
        let err = QueryEngine::execute(&schema(), &data, &request).unwrap_err();
        assert_eq!(err, QueryError::InvalidSortField("Nickname".to_string()));
    }

    #[test]
    fn filter_and_search_both_apply() {
        let mut data = records(4);
        data.push(Record {
            seq: 100,
            document: json!({"Name": "Johnny Active", "Status": "Active"})
                .as_object()
                .cloned()
                .unwrap(),
        });
        data.push(Record {
            seq: 101,
            document: json!({"Name": "JOHN Inactive", "Status": "Inactive"})
                .as_object()
                .cloned()
                .unwrap(),
        });

        let request = QueryRequest::new(1, 10)
            .with_filter(FilterCriterion::new("Status", FilterOperator::Equal, "Active"))
            .with_search("john");
        let result = QueryEngine::execute(&schema(), &data, &request).unwrap();

        assert_eq!(result.total_count, 1);
        assert_eq!(names(&result), vec!["Johnny Active"]);
    }

    #[test]
    fn adding_a_filter_never_increases_total() {
        let data = records(30);
        let base = QueryRequest::new(1, 5)
            .with_filter(FilterCriterion::new("Status", FilterOperator::Equal, "Active"));
        let narrower = base
            .clone()
            .with_filter(FilterCriterion::new("Rank", FilterOperator::GreaterThan, 0_i64));

        let all = QueryEngine::execute(&schema(), &data, &QueryRequest::new(1, 5)).unwrap();
        let base = QueryEngine::execute(&schema(), &data, &base).unwrap();
        let narrower = QueryEngine::execute(&schema(), &data, &narrower).unwrap();

        assert!(base.total_count <= all.total_count);
        assert!(narrower.total_count <= base.total_count);
    }

    #[test]
    fn descending_sort_keeps_insertion_order_for_ties() {
        let data = records(10);
        let request = QueryRequest::new(1, 10).sorted_by("CreatedAt", SortDirection::Desc);
        let first = QueryEngine::execute(&schema(), &data, &request).unwrap();
        let second = QueryEngine::execute(&schema(), &data, &request).unwrap();

        assert_eq!(first, second);
        // Days 5,4,3,2,1; each day holds two students in insertion order.
        assert_eq!(
            names(&first),
            vec![
                "Student 04", "Student 09", "Student 03", "Student 08", "Student 02",
                "Student 07", "Student 01", "Student 06", "Student 00", "Student 05",
            ]
        );
    }

    #[test]
    fn ascending_sort_puts_nulls_first() {
        let mut data = records(3);
        data.push(Record {
            seq: 50,
            document: json!({"Name": "No Rank"}).as_object().cloned().unwrap(),
        });
        let request = QueryRequest::new(1, 10).sorted_by("Rank", SortDirection::Asc);
        let result = QueryEngine::execute(&schema(), &data, &request).unwrap();
        assert_eq!(names(&result)[0], "No Rank");

        let request = QueryRequest::new(1, 10).sorted_by("Rank", SortDirection::Desc);
        let result = QueryEngine::execute(&schema(), &data, &request).unwrap();
        assert_eq!(names(&result).last().unwrap(), "No Rank");
    }

    #[test]
    fn unsorted_results_follow_insertion_order() {
        let mut data = records(5);
        data.reverse();
        let result = QueryEngine::execute(&schema(), &data, &QueryRequest::new(1, 10)).unwrap();
        assert_eq!(names(&result)[0], "Student 00");
        assert_eq!(names(&result)[4], "Student 04");
    }

    #[test]
    fn blank_sort_field_means_unsorted() {
        let data = records(3);
        let request = QueryRequest::new(1, 10).sorted_by("  ", SortDirection::Desc);
        let result = QueryEngine::execute(&schema(), &data, &request).unwrap();
        assert_eq!(names(&result)[0], "Student 00");
    }

    #[test]
    fn source_is_not_mutated() {
        let data = records(5);
        let before = data.clone();
        let request = QueryRequest::new(1, 2).sorted_by("Name", SortDirection::Desc);
        QueryEngine::execute(&schema(), &data, &request).unwrap();
        assert_eq!(data, before);
    }
}
