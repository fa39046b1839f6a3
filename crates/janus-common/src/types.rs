//! Core type definitions for janus
//!
//! This module defines the resource object model shared by both backing
//! stores: identity and bookkeeping metadata, list containers, table
//! projections, and the per-operation option structs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Kind and API version identification for a resource object.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeMeta {
    /// Resource kind (e.g. "SavedView")
    pub kind: String,
    /// API group and version (e.g. "views/v0alpha1")
    pub api_version: String,
}

impl TypeMeta {
    /// Create a new type meta
    pub fn new(kind: impl Into<String>, api_version: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            api_version: api_version.into(),
        }
    }
}

/// Identity and bookkeeping metadata carried by every resource object.
///
/// Identity for cross-store matching is `(namespace, name)`. `uid` and
/// `resource_version` are store-local: each backing store assigns its own.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectMeta {
    /// Object name, unique within a namespace
    pub name: String,
    /// Namespace the object lives in
    pub namespace: String,
    /// Store-assigned stable identifier, empty until the store accepts a create
    #[serde(default)]
    pub uid: String,
    /// Opaque, monotonic, store-local version token for optimistic concurrency
    #[serde(default)]
    pub resource_version: String,
    /// User labels
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    /// User annotations
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
    /// Set by the store when it accepts the create
    #[serde(default)]
    pub creation_timestamp: Option<DateTime<Utc>>,
    /// Set by the store on every accepted update
    #[serde(default)]
    pub update_timestamp: Option<DateTime<Utc>>,
}

/// A resource object: typed metadata plus an opaque spec payload.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceObject {
    #[serde(flatten)]
    pub type_meta: TypeMeta,
    pub meta: ObjectMeta,
    /// Resource-specific payload, opaque to the storage layer
    #[serde(default)]
    pub spec: serde_json::Value,
}

impl ResourceObject {
    /// Create a new object with the given kind, API version, and name
    pub fn new(
        kind: impl Into<String>,
        api_version: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            type_meta: TypeMeta::new(kind, api_version),
            meta: ObjectMeta {
                name: name.into(),
                ..ObjectMeta::default()
            },
            spec: serde_json::Value::Null,
        }
    }

    /// Set the namespace
    #[must_use]
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.meta.namespace = namespace.into();
        self
    }

    /// Set the spec payload
    #[must_use]
    pub fn with_spec(mut self, spec: serde_json::Value) -> Self {
        self.spec = spec;
        self
    }

    /// Add a label
    #[must_use]
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.meta.labels.insert(key.into(), value.into());
        self
    }

    /// Add an annotation
    #[must_use]
    pub fn with_annotation(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.meta.annotations.insert(key.into(), value.into());
        self
    }

    /// Object name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.meta.name
    }
}

/// List-level metadata: the store's version at list time plus an opaque
/// continuation cursor for paginated reads.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListMeta {
    #[serde(default)]
    pub resource_version: String,
    #[serde(default)]
    pub continue_token: Option<String>,
}

/// An ordered sequence of resource objects plus list metadata.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceList {
    pub meta: ListMeta,
    pub items: Vec<ResourceObject>,
}

impl ResourceList {
    /// Names of all items, in list order
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.items.iter().map(|o| o.meta.name.as_str()).collect()
    }

    /// Number of items
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the list is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// A column in a table projection
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableColumn {
    pub name: String,
    /// Column value type (e.g. "string", "date")
    pub column_type: String,
}

/// A single table row; cells are positionally aligned with the columns
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TableRow {
    pub cells: Vec<serde_json::Value>,
}

/// Tabular projection of a list of resource objects
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Table {
    #[serde(default)]
    pub columns: Vec<TableColumn>,
    #[serde(default)]
    pub rows: Vec<TableRow>,
}

impl Default for TableColumn {
    fn default() -> Self {
        Self {
            name: String::new(),
            column_type: "string".to_string(),
        }
    }
}

/// Options for create operations
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateOptions {
    /// Validate and report, but do not persist
    #[serde(default)]
    pub dry_run: bool,
}

/// Options for single-object reads
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetOptions {
    /// Minimum resource version the read must reflect, if any
    #[serde(default)]
    pub resource_version: Option<String>,
}

/// Options for list operations
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListOptions {
    /// Maximum number of items to return; unlimited when absent
    #[serde(default)]
    pub limit: Option<usize>,
    /// Continuation cursor from a previous list response
    #[serde(default)]
    pub continue_token: Option<String>,
    /// Label selector of the form `k=v,k2=v2`; all pairs must match
    #[serde(default)]
    pub label_selector: Option<String>,
    /// Minimum resource version the list must reflect, if any
    #[serde(default)]
    pub resource_version: Option<String>,
}

impl ListOptions {
    /// A list bounded to at most `limit` items
    #[must_use]
    pub fn limited(limit: usize) -> Self {
        Self {
            limit: Some(limit),
            ..Self::default()
        }
    }
}

/// Options for update operations
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateOptions {
    /// Validate and report, but do not persist
    #[serde(default)]
    pub dry_run: bool,
}

/// Options for delete operations
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteOptions {
    /// Seconds the store may wait before hard-deleting, if it supports it
    #[serde(default)]
    pub grace_period_seconds: Option<u64>,
}
