//! SQL translation of compiled queries using SeaQuery.
//!
//! Documents live in a single JSONB column of `entity_records`. Each field
//! access is a `document->>'Field'` extraction cast to the field's declared
//! type, so comparisons and ordering follow the same rules as the
//! in-memory engine:
//! - strings compare byte-wise (`COLLATE "C"`)
//! - missing and JSON-null fields are SQL `NULL`
//! - `NotEqual`/`NotIn` also match `NULL`
//! - ascending sorts put `NULL` first, descending puts it last
//! - ties fall back to insertion order (`seq ASC`)

use sea_query::{
    Alias, Cond, Expr, ExprTrait, Iden, NullOrdering, Order, PostgresQueryBuilder, Query,
    SelectStatement, SimpleExpr,
};

use super::engine::SortKey;
use super::predicate::{Clause, CompareOp, Condition, Predicate, SearchClause, TextOp};
use super::types::{Paging, SortDirection};
use super::value::{FieldValue, format_date};
use crate::entity::FieldType;

/// Table holding every entity's documents.
#[derive(Iden)]
pub enum EntityRecords {
    Table,
    Entity,
    Seq,
    Document,
}

/// Builds list and count statements for one entity type.
pub struct EntityQueryBuilder<'a> {
    entity: &'a str,
    predicate: &'a Predicate,
    sort: Option<&'a SortKey>,
}

impl<'a> EntityQueryBuilder<'a> {
    pub fn new(entity: &'a str, predicate: &'a Predicate, sort: Option<&'a SortKey>) -> Self {
        Self {
            entity,
            predicate,
            sort,
        }
    }

    /// Build the page query, selecting `document`.
    pub fn build(&self, paging: Paging) -> String {
        let mut query = Query::select();
        query
            .column(EntityRecords::Document)
            .from(EntityRecords::Table);

        self.add_filters(&mut query);

        if let Some(sort) = self.sort {
            let order = match sort.direction {
                SortDirection::Asc => Order::Asc,
                SortDirection::Desc => Order::Desc,
            };
            let nulls = match sort.direction {
                SortDirection::Asc => NullOrdering::First,
                SortDirection::Desc => NullOrdering::Last,
            };
            query.order_by_expr_with_nulls(typed_field(&sort.field, sort.field_type), order, nulls);
        }
        query.order_by(EntityRecords::Seq, Order::Asc);

        // Postgres rejects offsets beyond BIGINT.
        let max = i64::MAX.unsigned_abs();
        query.limit(paging.limit.min(max));
        query.offset(paging.offset.min(max));

        query.to_string(PostgresQueryBuilder)
    }

    /// Build the total-count query for the same predicate.
    pub fn build_count(&self) -> String {
        let mut query = Query::select();
        query
            .expr(Expr::col(EntityRecords::Seq).count())
            .from(EntityRecords::Table);

        self.add_filters(&mut query);

        query.to_string(PostgresQueryBuilder)
    }

    fn add_filters(&self, query: &mut SelectStatement) {
        query.and_where(Expr::col(EntityRecords::Entity).eq(self.entity));

        for clause in &self.predicate.clauses {
            query.and_where(clause_expr(clause));
        }
        if let Some(search) = &self.predicate.search {
            query.and_where(search_cond(search).into());
        }
    }
}

/// Raw text extraction, `NULL` for missing or JSON-null fields.
fn text_field(field: &str) -> String {
    format!("(\"document\"->>'{field}')")
}

/// Extraction cast to the declared type.
fn typed_field(field: &str, field_type: FieldType) -> SimpleExpr {
    let text = text_field(field);
    Expr::cust(match field_type {
        FieldType::String => format!("{text} COLLATE \"C\""),
        FieldType::Integer | FieldType::Float => format!("{text}::numeric"),
        FieldType::Boolean => format!("{text}::boolean"),
        FieldType::Date => format!("{text}::timestamptz"),
        FieldType::Uuid => format!("{text}::uuid"),
    })
}

fn value_expr(value: &FieldValue) -> SimpleExpr {
    match value {
        FieldValue::Null => Expr::cust("NULL"),
        FieldValue::Boolean(b) => Expr::val(*b).into(),
        FieldValue::Integer(i) => Expr::val(*i).into(),
        FieldValue::Float(f) => Expr::val(*f).into(),
        FieldValue::String(s) => Expr::val(s.as_str()).into(),
        FieldValue::Date(d) => Expr::val(format_date(d)).cast_as(Alias::new("timestamptz")),
        FieldValue::Uuid(u) => Expr::val(u.to_string()).cast_as(Alias::new("uuid")),
    }
}

fn clause_expr(clause: &Clause) -> SimpleExpr {
    let field = || typed_field(&clause.field, clause.field_type);
    let is_null = || Expr::cust(format!("{} IS NULL", text_field(&clause.field)));

    match &clause.condition {
        Condition::Compare { op, value } => {
            let value = value_expr(value);
            match op {
                CompareOp::Eq => field().eq(value),
                CompareOp::Ne => Cond::any().add(is_null()).add(field().ne(value)).into(),
                CompareOp::Gt => field().gt(value),
                CompareOp::Ge => field().gte(value),
                CompareOp::Lt => field().lt(value),
                CompareOp::Le => field().lte(value),
            }
        }
        Condition::IsNull => is_null(),
        Condition::IsNotNull => Expr::cust(format!("{} IS NOT NULL", text_field(&clause.field))),
        Condition::InSet { values, negated } => {
            if values.is_empty() {
                return Expr::cust(if *negated { "TRUE" } else { "FALSE" });
            }
            let values: Vec<SimpleExpr> = values.iter().map(value_expr).collect();
            if *negated {
                Cond::any().add(is_null()).add(field().is_not_in(values)).into()
            } else {
                field().is_in(values)
            }
        }
        Condition::Text { op, needle } => {
            let escaped = escape_like_wildcards(needle);
            let pattern = match op {
                TextOp::Contains => format!("%{escaped}%"),
                TextOp::StartsWith => format!("{escaped}%"),
                TextOp::EndsWith => format!("%{escaped}"),
            };
            Expr::cust(text_field(&clause.field)).like(pattern)
        }
    }
}

fn search_cond(search: &SearchClause) -> Cond {
    let pattern = format!("%{}%", escape_like_wildcards(&search.needle));
    search.fields.iter().fold(Cond::any(), |cond, field| {
        cond.add(Expr::cust_with_values(
            format!("{} ILIKE $1", text_field(field)),
            [pattern.clone()],
        ))
    })
}

/// Escape SQL LIKE wildcard characters (`%`, `_`, `\`) in a value.
fn escape_like_wildcards(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::entity::{EntitySchema, FieldDefinition};
    use crate::query::{FilterCriterion, FilterOperator, FilterValue, QueryRequest};

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
                field("Email", FieldType::String, true),
                field("Age", FieldType::Integer, false),
            ],
        )
    }

    fn compile(filters: Vec<FilterCriterion>, search: Option<&str>) -> Predicate {
        Predicate::compile(&schema(), &filters, search).unwrap()
    }

    #[test]
    fn page_query_scopes_to_entity_and_pages() {
        let predicate = compile(vec![], None);
        let sql = EntityQueryBuilder::new("students", &predicate, None).build(Paging {
            offset: 20,
            limit: 10,
        });

        assert!(sql.contains("FROM \"entity_records\""));
        assert!(sql.contains("\"entity\" = 'students'"));
        assert!(sql.contains("ORDER BY \"seq\" ASC"));
        assert!(sql.contains("LIMIT 10"));
        assert!(sql.contains("OFFSET 20"));
    }

    #[test]
    fn count_query_has_no_paging() {
        let predicate = compile(vec![], None);
        let sql = EntityQueryBuilder::new("students", &predicate, None).build_count();

        assert!(sql.contains("COUNT(\"seq\")"));
        assert!(!sql.contains("LIMIT"));
        assert!(!sql.contains("ORDER BY"));
    }

    #[test]
    fn typed_comparisons() {
        let predicate = compile(
            vec![
                FilterCriterion::new("Age", FilterOperator::GreaterThan, 12_i64),
                FilterCriterion::new("Name", FilterOperator::Equal, "Ada"),
            ],
            None,
        );
        let sql = EntityQueryBuilder::new("students", &predicate, None).build_count();

        assert!(sql.contains("(\"document\"->>'Age')::numeric > 12"));
        assert!(sql.contains("(\"document\"->>'Name') COLLATE \"C\" = 'Ada'"));
    }

    #[test]
    fn not_equal_includes_nulls() {
        let predicate = compile(
            vec![FilterCriterion::new("Name", FilterOperator::NotEqual, "Ada")],
            None,
        );
        let sql = EntityQueryBuilder::new("students", &predicate, None).build_count();

        assert!(sql.contains("(\"document\"->>'Name') IS NULL OR"));
        assert!(sql.contains("<> 'Ada'"));
    }

    #[test]
    fn empty_in_list_matches_nothing() {
        let predicate = compile(
            vec![FilterCriterion::new(
                "Age",
                FilterOperator::In,
                FilterValue::List(vec![]),
            )],
            None,
        );
        let sql = EntityQueryBuilder::new("students", &predicate, None).build_count();
        assert!(sql.contains("FALSE"));
    }

    #[test]
    fn like_patterns_escape_wildcards() {
        let predicate = compile(
            vec![FilterCriterion::new("Email", FilterOperator::StartsWith, "a_b%")],
            None,
        );
        let sql = EntityQueryBuilder::new("students", &predicate, None).build_count();
        assert!(sql.contains("LIKE"));
        assert!(sql.contains("a\\\\_b\\\\%%") || sql.contains("a\\_b\\%%"));
    }

    #[test]
    fn search_is_ilike_over_searchable_fields() {
        let predicate = compile(vec![], Some("John"));
        let sql = EntityQueryBuilder::new("students", &predicate, None).build_count();

        assert!(sql.contains("(\"document\"->>'Name') ILIKE '%john%'"));
        assert!(sql.contains("(\"document\"->>'Email') ILIKE '%john%'"));
        assert!(!sql.contains("'Age') ILIKE"));
    }

    #[test]
    fn sort_uses_null_ordering_and_seq_tiebreak() {
        let predicate = compile(vec![], None);
        let request = QueryRequest::new(1, 10).sorted_by("Age", SortDirection::Desc);
        let sort = SortKey::resolve(&schema(), &request).unwrap().unwrap();
        let sql = EntityQueryBuilder::new("students", &predicate, Some(&sort))
            .build(request.paging().unwrap());

        assert!(sql.contains("ORDER BY (\"document\"->>'Age')::numeric DESC NULLS LAST, \"seq\" ASC"));
    }

    #[test]
    fn huge_offsets_are_clamped() {
        let predicate = compile(vec![], None);
        let sql = EntityQueryBuilder::new("students", &predicate, None).build(Paging {
            offset: u64::MAX,
            limit: 10,
        });
        assert!(sql.contains(&format!("OFFSET {}", i64::MAX)));
    }

    #[test]
    fn escape_like_wildcards_works() {
        assert_eq!(escape_like_wildcards("100%"), "100\\%");
        assert_eq!(escape_like_wildcards("a_b"), "a\\_b");
        assert_eq!(escape_like_wildcards("a\\b"), "a\\\\b");
    }
}
