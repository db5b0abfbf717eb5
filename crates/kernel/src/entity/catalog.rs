//! Entity catalog loading.
//!
//! A catalog is a TOML document with one `[[entity]]` table per entity type.
//! The school catalog is embedded in the binary; `ENTITY_CATALOG` points at
//! a replacement file.

use std::collections::HashSet;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use super::schema::{EntitySchema, FieldDefinition};
use crate::permissions::Capability;
use crate::query::FilterOperator;

/// Built-in school catalog.
const SCHOOL_CATALOG: &str = include_str!("../../catalog/school.toml");

/// Path segments under `/api/` taken by fixed routes.
const RESERVED_NAMES: &[&str] = &["entities"];

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to read catalog {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("failed to parse catalog: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid catalog: {}", .0.join("; "))]
    Invalid(Vec<String>),
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CatalogFile {
    #[serde(default, rename = "entity")]
    entities: Vec<EntityDefinition>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct EntityDefinition {
    name: String,
    label: String,
    #[serde(default)]
    capabilities: Option<Vec<Capability>>,
    #[serde(default)]
    operators: Option<Vec<FilterOperator>>,
    #[serde(default)]
    fields: Vec<FieldDefinition>,
}

/// A validated set of entity schemas, in declaration order.
#[derive(Debug, Clone)]
pub struct Catalog {
    pub entities: Vec<EntitySchema>,
}

impl Catalog {
    /// The embedded school catalog.
    pub fn builtin() -> Result<Self, CatalogError> {
        Self::from_toml(SCHOOL_CATALOG)
    }

    pub fn from_file(path: &Path) -> Result<Self, CatalogError> {
        let raw = std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&raw)
    }

    /// Parse and validate a catalog document.
    ///
    /// All problems are collected before failing.
    pub fn from_toml(raw: &str) -> Result<Self, CatalogError> {
        let file: CatalogFile = toml::from_str(raw)?;

        let mut errors = Vec::new();
        let mut seen = HashSet::new();
        let mut entities = Vec::with_capacity(file.entities.len());

        for def in file.entities {
            let mut schema = EntitySchema::new(def.name, def.label, def.fields);
            if let Some(capabilities) = def.capabilities {
                schema = schema.with_capabilities(capabilities);
            }
            if let Some(operators) = def.operators {
                schema = schema.with_operators(operators);
            }

            if RESERVED_NAMES.contains(&schema.name.as_str()) {
                errors.push(format!("entity name '{}' is reserved", schema.name));
            }
            if !seen.insert(schema.name.clone()) {
                errors.push(format!("duplicate entity '{}'", schema.name));
            }
            errors.extend(schema.validate());
            entities.push(schema);
        }

        if entities.is_empty() {
            errors.push("catalog declares no entities".to_string());
        }

        if errors.is_empty() {
            Ok(Self { entities })
        } else {
            Err(CatalogError::Invalid(errors))
        }
    }
}
