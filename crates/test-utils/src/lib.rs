//! Campus test utilities.
//!
//! Helpers for integration testing: entity body builders, token fixtures,
//! list query strings, and assertion utilities.

use serde_json::{Map, Value as JsonValue, json};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Raw admin token used by router tests.
pub const ADMIN_TOKEN: &str = "test-admin-token";

/// Create a student body with the required fields set.
pub fn test_student(first_name: &str, last_name: &str) -> TestEntity {
    TestEntity::new()
        .with_field("FirstName", json!(first_name))
        .with_field("LastName", json!(last_name))
}

/// A JSON entity body builder.
#[derive(Debug, Clone, Default)]
pub struct TestEntity {
    pub fields: Map<String, JsonValue>,
}

impl TestEntity {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a single field.
    pub fn with_field(mut self, name: &str, value: JsonValue) -> Self {
        self.fields.insert(name.to_string(), value);
        self
    }

    /// Set the `Status` field.
    pub fn with_status(self, status: &str) -> Self {
        self.with_field("Status", json!(status))
    }

    /// Set the `Email` field.
    pub fn with_email(self, email: &str) -> Self {
        self.with_field("Email", json!(email))
    }

    /// Set the `GradeLevel` field.
    pub fn with_grade(self, grade: i64) -> Self {
        self.with_field("GradeLevel", json!(grade))
    }

    /// Set `Id`, as required on PUT bodies.
    pub fn with_id(self, id: Uuid) -> Self {
        self.with_field("Id", json!(id.to_string()))
    }

    pub fn build(self) -> JsonValue {
        JsonValue::Object(self.fields)
    }
}

/// A token file entry builder.
#[derive(Debug, Clone)]
pub struct TestToken {
    pub name: String,
    pub raw: String,
    pub permissions: Vec<String>,
    pub admin: bool,
}

/// Create a non-admin token with the given permission strings.
pub fn test_token(name: &str, raw: &str, permissions: &[&str]) -> TestToken {
    TestToken {
        name: name.to_string(),
        raw: raw.to_string(),
        permissions: permissions.iter().map(|s| s.to_string()).collect(),
        admin: false,
    }
}

impl TestToken {
    /// Grant every capability on every entity.
    pub fn admin(mut self) -> Self {
        self.admin = true;
        self
    }

    /// `Authorization` header value for this token.
    pub fn bearer(&self) -> String {
        bearer(&self.raw)
    }

    /// TOML `[[token]]` table for this token.
    pub fn to_toml(&self) -> String {
        let permissions: Vec<String> = self
            .permissions
            .iter()
            .map(|p| format!("\"{p}\""))
            .collect();
        format!(
            "[[token]]\nname = \"{}\"\ntoken_sha256 = \"{}\"\npermissions = [{}]\nadmin = {}\n\n",
            self.name,
            sha256_hex(&self.raw),
            permissions.join(", "),
            self.admin
        )
    }
}

/// Render a token file from entries.
pub fn token_file(tokens: &[TestToken]) -> String {
    tokens.iter().map(TestToken::to_toml).collect()
}

/// `Authorization` header value for a raw token.
pub fn bearer(raw: &str) -> String {
    format!("Bearer {raw}")
}

/// Lowercase hex SHA-256 of a string.
pub fn sha256_hex(raw: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(raw.as_bytes());
    hex::encode(hasher.finalize())
}

/// One filter criterion in wire format.
pub fn filter(property: &str, operator: &str, value: JsonValue) -> JsonValue {
    json!({ "PropertyName": property, "Operator": operator, "Value": value })
}

/// Build a list URI for an entity from query parameters.
///
/// Values are percent-encoded, so filter JSON can be passed as is.
pub fn list_uri(entity: &str, params: &[(&str, String)]) -> String {
    if params.is_empty() {
        return format!("/api/{entity}");
    }
    let query: Vec<String> = params
        .iter()
        .map(|(k, v)| format!("{k}={}", urlencoding::encode(v)))
        .collect();
    format!("/api/{entity}?{}", query.join("&"))
}

/// Encode filter criteria as the `filters` query parameter value.
pub fn filters_param(criteria: &[JsonValue]) -> String {
    JsonValue::Array(criteria.to_vec()).to_string()
}

/// Assertion helpers for JSON content.
pub mod assert {
    use serde_json::Value;

    /// Assert that a JSON value has a specific key.
    pub fn has_key(value: &Value, key: &str) {
        assert!(
            value.get(key).is_some(),
            "Expected JSON to have key '{key}', got: {value}"
        );
    }

    /// Assert that an error body carries a message containing `needle`.
    pub fn error_contains(value: &Value, needle: &str) {
        let message = value["error"].as_str().unwrap_or_default();
        assert!(
            message.contains(needle),
            "Expected error containing '{needle}', got: {value}"
        );
    }

    /// Collect a string field from every item of a list result.
    pub fn item_strings(result: &Value, field: &str) -> Vec<String> {
        result["items"]
            .as_array()
            .map(|items| {
                items
                    .iter()
                    .map(|item| item[field].as_str().unwrap_or_default().to_string())
                    .collect()
            })
            .unwrap_or_default()
    }
}
