//! Model schemas and the registry they are looked up in.
//!
//! The registry is plain read-only data handed to every translation call.
//! Nothing here is global; callers own the registry and share it however
//! they like (typically behind an `Arc`).

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Declared type of a model attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttributeType {
    String,
    Number,
    Boolean,
    /// Structured value, possibly transported as JSON text
    Json,
    /// Reference to another record's primary key
    #[serde(alias = "identifier")]
    Ref,
}

impl AttributeType {
    /// Whether values of this type are parsed from JSON text on write
    pub fn is_structured(&self) -> bool {
        matches!(self, AttributeType::Json)
    }

    /// Whether values of this type hold native identifiers
    pub fn is_identifier(&self) -> bool {
        matches!(self, AttributeType::Ref)
    }
}

fn default_primary_key() -> String {
    "id".to_string()
}

/// Schema of a single model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelSchema {
    /// Generic name of the primary key attribute
    #[serde(default = "default_primary_key")]
    pub primary_key: String,

    /// Declared attribute types, keyed by attribute name
    #[serde(default)]
    pub attributes: BTreeMap<String, AttributeType>,
}

impl Default for ModelSchema {
    fn default() -> Self {
        Self {
            primary_key: default_primary_key(),
            attributes: BTreeMap::new(),
        }
    }
}

impl ModelSchema {
    /// Create an empty schema with the default `id` primary key
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style: declare an attribute
    #[must_use]
    pub fn with_attribute(mut self, name: impl Into<String>, ty: AttributeType) -> Self {
        self.attributes.insert(name.into(), ty);
        self
    }

    /// Builder-style: rename the primary key
    #[must_use]
    pub fn with_primary_key(mut self, name: impl Into<String>) -> Self {
        self.primary_key = name.into();
        self
    }

    /// Declared type of an attribute, if any
    pub fn attribute_type(&self, name: &str) -> Option<AttributeType> {
        self.attributes.get(name).copied()
    }

    pub fn is_primary_key(&self, name: &str) -> bool {
        self.primary_key == name
    }
}

/// Every registered model, keyed by identity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModelRegistry {
    models: HashMap<String, ModelSchema>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a model (replaces an existing one with the same identity)
    pub fn register(&mut self, identity: impl Into<String>, schema: ModelSchema) {
        self.models.insert(identity.into(), schema);
    }

    /// Builder-style: register a model
    #[must_use]
    pub fn with_model(mut self, identity: impl Into<String>, schema: ModelSchema) -> Self {
        self.register(identity, schema);
        self
    }

    pub fn get(&self, identity: &str) -> Option<&ModelSchema> {
        self.models.get(identity)
    }

    /// Registered identities, sorted
    pub fn identities(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.models.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}
