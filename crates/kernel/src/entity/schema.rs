//! Entity schema types.
//!
//! An [`EntitySchema`] describes one record type: its fields, their declared
//! types, which of them take part in free-text search, and which filter
//! operators and capabilities the type offers.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::permissions::Capability;
use crate::query::FilterOperator;

/// Primary key field present on every entity.
pub const ID_FIELD: &str = "Id";

/// Creation timestamp maintained by the service.
pub const CREATED_AT_FIELD: &str = "CreatedAt";

/// Last modification timestamp maintained by the service.
pub const UPDATED_AT_FIELD: &str = "UpdatedAt";

/// Declared type of an entity field.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Integer,
    Float,
    Boolean,
    /// Timestamp, stored as RFC 3339 UTC.
    Date,
    Uuid,
}

impl FieldType {
    /// Lowercase name used in catalogs and error messages.
    pub fn as_str(self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Integer => "integer",
            FieldType::Float => "float",
            FieldType::Boolean => "boolean",
            FieldType::Date => "date",
            FieldType::Uuid => "uuid",
        }
    }
}

impl std::fmt::Display for FieldType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single field definition.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FieldDefinition {
    /// Field name, matched case-sensitively.
    pub name: String,

    /// Declared value type.
    #[serde(rename = "type")]
    pub field_type: FieldType,

    /// Whether create/update bodies must carry a non-null value.
    #[serde(default)]
    pub required: bool,

    /// Whether the free-text search term is matched against this field.
    #[serde(default)]
    pub searchable: bool,

    /// System fields are maintained by the service and never written by clients.
    #[serde(default, skip_deserializing)]
    pub system: bool,
}

impl FieldDefinition {
    fn system(name: &str, field_type: FieldType) -> Self {
        Self {
            name: name.to_string(),
            field_type,
            required: false,
            searchable: false,
            system: true,
        }
    }
}

/// Schema of one entity type.
#[derive(Debug, Clone, Serialize)]
pub struct EntitySchema {
    /// Machine name, also the path segment under `/api/`.
    pub name: String,

    /// Human-readable label.
    pub label: String,

    /// All fields, system fields first.
    pub fields: Vec<FieldDefinition>,

    /// Actions this entity type offers.
    pub capabilities: Vec<Capability>,

    /// Filter operators accepted for this entity type.
    pub operators: Vec<FilterOperator>,
}

impl EntitySchema {
    /// Build a schema, prepending the system fields.
    pub fn new(
        name: impl Into<String>,
        label: impl Into<String>,
        fields: Vec<FieldDefinition>,
    ) -> Self {
        let mut all = vec![
            FieldDefinition::system(ID_FIELD, FieldType::Uuid),
            FieldDefinition::system(CREATED_AT_FIELD, FieldType::Date),
            FieldDefinition::system(UPDATED_AT_FIELD, FieldType::Date),
        ];
        all.extend(fields.into_iter().map(|mut f| {
            f.system = false;
            f
        }));

        Self {
            name: name.into(),
            label: label.into(),
            fields: all,
            capabilities: Capability::ALL.to_vec(),
            operators: FilterOperator::ALL.to_vec(),
        }
    }

    /// Restrict the offered capabilities.
    pub fn with_capabilities(mut self, capabilities: Vec<Capability>) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Restrict the accepted filter operators.
    pub fn with_operators(mut self, operators: Vec<FilterOperator>) -> Self {
        self.operators = operators;
        self
    }

    /// Look up a field by exact name.
    pub fn field(&self, name: &str) -> Option<&FieldDefinition> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Fields the search term is matched against.
    pub fn searchable_fields(&self) -> impl Iterator<Item = &FieldDefinition> {
        self.fields.iter().filter(|f| f.searchable)
    }

    /// Fields clients may write.
    pub fn writable_fields(&self) -> impl Iterator<Item = &FieldDefinition> {
        self.fields.iter().filter(|f| !f.system)
    }

    pub fn supports(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }

    pub fn accepts_operator(&self, operator: FilterOperator) -> bool {
        self.operators.contains(&operator)
    }

    /// Check naming and uniqueness rules.
    ///
    /// Returns a list of problems. Empty list means valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if !is_valid_entity_name(&self.name) {
            errors.push(format!("entity name '{}' contains invalid characters", self.name));
        }

        let mut seen = HashSet::new();
        for field in &self.fields {
            if !is_valid_field_name(&field.name) {
                errors.push(format!(
                    "{}: field '{}' contains invalid characters",
                    self.name, field.name
                ));
            }
            if !seen.insert(field.name.as_str()) {
                errors.push(format!("{}: duplicate field '{}'", self.name, field.name));
            }
            if field.searchable && field.field_type != FieldType::String {
                errors.push(format!(
                    "{}: searchable field '{}' must be a string",
                    self.name, field.name
                ));
            }
        }

        if self.capabilities.is_empty() {
            errors.push(format!("{}: no capabilities", self.name));
        }

        errors
    }
}

/// Field names are identifiers: a letter or underscore followed by
/// alphanumerics or underscores. They are interpolated into JSONB paths.
pub fn is_valid_field_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Entity names are lowercase path segments (letters, digits, `_`, `-`).
pub fn is_valid_entity_name(name: &str) -> bool {
    !name.is_empty()
        && name.starts_with(|c: char| c.is_ascii_lowercase())
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-')
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn field(name: &str, field_type: FieldType) -> FieldDefinition {
        FieldDefinition {
            name: name.to_string(),
            field_type,
            required: false,
            searchable: false,
            system: false,
        }
    }

    #[test]
    fn system_fields_are_prepended() {
        let schema = EntitySchema::new("students", "Student", vec![field("Name", FieldType::String)]);
        let names: Vec<&str> = schema.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["Id", "CreatedAt", "UpdatedAt", "Name"]);
        assert!(schema.field("Id").unwrap().system);
        assert!(!schema.field("Name").unwrap().system);
        assert_eq!(schema.writable_fields().count(), 1);
    }

    #[test]
    fn field_lookup_is_case_sensitive() {
        let schema = EntitySchema::new("students", "Student", vec![field("Name", FieldType::String)]);
        assert!(schema.field("Name").is_some());
        assert!(schema.field("name").is_none());
    }

    #[test]
    fn validate_rejects_duplicates_and_bad_names() {
        let schema = EntitySchema::new(
            "Students!",
            "Student",
            vec![
                field("Name", FieldType::String),
                field("Name", FieldType::String),
                field("bad-name", FieldType::String),
                field("Id", FieldType::Uuid),
            ],
        );
        let errors = schema.validate();
        assert!(errors.iter().any(|e| e.contains("entity name")));
        assert!(errors.iter().any(|e| e.contains("duplicate field 'Name'")));
        assert!(errors.iter().any(|e| e.contains("duplicate field 'Id'")));
        assert!(errors.iter().any(|e| e.contains("'bad-name'")));
    }

    #[test]
    fn validate_rejects_non_string_searchable_field() {
        let mut age = field("Age", FieldType::Integer);
        age.searchable = true;
        let schema = EntitySchema::new("students", "Student", vec![age]);
        assert_eq!(schema.validate().len(), 1);
    }

    #[test]
    fn field_name_rules() {
        assert!(is_valid_field_name("FirstName"));
        assert!(is_valid_field_name("_internal"));
        assert!(is_valid_field_name("Line2"));
        assert!(!is_valid_field_name("2ndLine"));
        assert!(!is_valid_field_name("a'b"));
        assert!(!is_valid_field_name(""));
    }

    #[test]
    fn entity_name_rules() {
        assert!(is_valid_entity_name("students"));
        assert!(is_valid_entity_name("report-cards"));
        assert!(is_valid_entity_name("exam_results"));
        assert!(!is_valid_entity_name("Students"));
        assert!(!is_valid_entity_name("-x"));
        assert!(!is_valid_entity_name(""));
    }

    #[test]
    fn field_type_serialization() {
        let json = serde_json::to_string(&FieldType::Date).unwrap();
        assert_eq!(json, "\"date\"");
        let parsed: FieldType = serde_json::from_str("\"boolean\"").unwrap();
        assert_eq!(parsed, FieldType::Boolean);
    }
}
