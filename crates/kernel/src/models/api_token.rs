//! API token registry.
//!
//! Tokens are never stored in plaintext. The token file holds SHA-256
//! digests; a raw token is hashed on each request and looked up by digest.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use sha2::{Digest, Sha256};

use crate::permissions::{ANONYMOUS_NAME, Grant, Principal};

/// Principal name given to the `ADMIN_TOKEN` bearer.
pub const ADMIN_TOKEN_NAME: &str = "admin";

/// A configured API token.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ApiToken {
    pub name: String,
    /// Lowercase hex SHA-256 of the raw token.
    pub token_sha256: String,
    #[serde(default)]
    pub permissions: Vec<String>,
    #[serde(default)]
    pub admin: bool,
}

impl ApiToken {
    pub fn principal(&self) -> Principal {
        Principal {
            name: self.name.clone(),
            is_admin: self.admin,
            permissions: self.permissions.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct TokenFile {
    #[serde(default, rename = "token")]
    tokens: Vec<ApiToken>,
}

/// Known bearer tokens, keyed by digest.
#[derive(Debug, Clone, Default)]
pub struct TokenRegistry {
    by_digest: HashMap<String, ApiToken>,
}

impl TokenRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a token file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read token file {}", path.display()))?;
        Self::from_toml(&raw).with_context(|| format!("invalid token file {}", path.display()))
    }

    /// Parse a token file from TOML source.
    pub fn from_toml(raw: &str) -> Result<Self> {
        let file: TokenFile = toml::from_str(raw).context("failed to parse token file")?;
        let mut registry = Self::new();
        for token in file.tokens {
            registry.insert(token)?;
        }
        Ok(registry)
    }

    /// Register an admin principal for a raw token.
    pub fn with_admin_token(mut self, raw: &str) -> Result<Self> {
        if raw.trim().is_empty() {
            bail!("ADMIN_TOKEN must not be empty");
        }
        self.insert(ApiToken {
            name: ADMIN_TOKEN_NAME.to_string(),
            token_sha256: hash_token(raw),
            permissions: Vec::new(),
            admin: true,
        })?;
        Ok(self)
    }

    /// Add a token after validating its digest and permission strings.
    ///
    /// Principal names must be unique: permission grants are cached by name.
    pub fn insert(&mut self, mut token: ApiToken) -> Result<()> {
        token.token_sha256 = token.token_sha256.trim().to_ascii_lowercase();

        if token.name.trim().is_empty() {
            bail!("token name must not be empty");
        }
        if token.name == ANONYMOUS_NAME {
            bail!("token name '{ANONYMOUS_NAME}' is reserved");
        }
        if token.token_sha256.len() != 64 || hex::decode(&token.token_sha256).is_err() {
            bail!("token '{}': token_sha256 must be 64 hex characters", token.name);
        }
        if let Some(bad) = token.permissions.iter().find(|p| Grant::parse(p).is_none()) {
            bail!("token '{}': invalid permission '{bad}'", token.name);
        }

        let names: HashSet<&str> = self.by_digest.values().map(|t| t.name.as_str()).collect();
        if names.contains(token.name.as_str()) {
            bail!("duplicate token name '{}'", token.name);
        }
        if self.by_digest.contains_key(&token.token_sha256) {
            bail!("token '{}' duplicates another token's digest", token.name);
        }

        self.by_digest.insert(token.token_sha256.clone(), token);
        Ok(())
    }

    /// Find the token matching a raw bearer value.
    pub fn find_by_token(&self, raw: &str) -> Option<&ApiToken> {
        self.by_digest.get(&hash_token(raw))
    }

    /// Resolve a raw bearer value to its principal.
    pub fn lookup(&self, raw: &str) -> Option<Principal> {
        self.find_by_token(raw).map(ApiToken::principal)
    }

    pub fn len(&self) -> usize {
        self.by_digest.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_digest.is_empty()
    }
}

/// Hash a raw token with SHA-256 for storage and lookup.
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}
