//! Capability checks with DashMap-based caching.
//!
//! Permission strings have the form `<capability> <entity>`, for example
//! `read students` or `delete *` (every entity).

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

/// Name of the principal used for requests without a token. Reserved.
pub const ANONYMOUS_NAME: &str = "anonymous";

/// An action on an entity type.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Capability {
    Create,
    Read,
    Update,
    Delete,
}

impl Capability {
    pub const ALL: [Capability; 4] = [
        Capability::Create,
        Capability::Read,
        Capability::Update,
        Capability::Delete,
    ];

    /// Lowercase name used in permission strings and metrics labels.
    pub fn as_str(self) -> &'static str {
        match self {
            Capability::Create => "create",
            Capability::Read => "read",
            Capability::Update => "update",
            Capability::Delete => "delete",
        }
    }

    fn parse(raw: &str) -> Option<Self> {
        Capability::ALL.into_iter().find(|c| c.as_str() == raw)
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A parsed permission string.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Grant {
    pub capability: Capability,
    /// `None` applies to every entity.
    pub entity: Option<String>,
}

impl Grant {
    /// Parse `<capability> <entity|*>`.
    pub fn parse(raw: &str) -> Option<Self> {
        let mut parts = raw.split_whitespace();
        let capability = Capability::parse(parts.next()?)?;
        let entity = match parts.next()? {
            "*" => None,
            name => Some(name.to_string()),
        };
        if parts.next().is_some() {
            return None;
        }
        Some(Self { capability, entity })
    }
}

/// The caller of a request, resolved from its bearer token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub name: String,
    pub is_admin: bool,
    pub permissions: Vec<String>,
}

impl Principal {
    /// Caller without a token. Holds no capabilities.
    pub fn anonymous() -> Self {
        Self {
            name: ANONYMOUS_NAME.to_string(),
            is_admin: false,
            permissions: Vec::new(),
        }
    }

    pub fn is_anonymous(&self) -> bool {
        !self.is_admin && self.permissions.is_empty() && self.name == ANONYMOUS_NAME
    }
}

/// Permission service with fast DashMap-based lookups.
#[derive(Clone, Default)]
pub struct PermissionService {
    inner: Arc<PermissionServiceInner>,
}

#[derive(Default)]
struct PermissionServiceInner {
    /// Principal name -> parsed grants.
    cache: DashMap<String, Arc<HashSet<Grant>>>,
}

impl PermissionService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check whether a principal may perform `capability` on `entity`.
    ///
    /// Admins may do anything. Unparseable permission strings grant nothing.
    pub fn principal_can(&self, principal: &Principal, capability: Capability, entity: &str) -> bool {
        if principal.is_admin {
            return true;
        }

        let grants = self.grants(principal);
        grants.iter().any(|grant| {
            grant.capability == capability
                && grant.entity.as_deref().is_none_or(|name| name == entity)
        })
    }

    fn grants(&self, principal: &Principal) -> Arc<HashSet<Grant>> {
        // Never cached, so a token sharing the name cannot lend it grants.
        if principal.is_anonymous() {
            return Arc::default();
        }

        if let Some(cached) = self.inner.cache.get(&principal.name) {
            return Arc::clone(&cached);
        }

        let grants: Arc<HashSet<Grant>> = Arc::new(
            principal
                .permissions
                .iter()
                .filter_map(|raw| Grant::parse(raw))
                .collect(),
        );
        self.inner
            .cache
            .insert(principal.name.clone(), Arc::clone(&grants));
        grants
    }

    /// Number of cached principals (for monitoring).
    pub fn cache_size(&self) -> usize {
        self.inner.cache.len()
    }
}
