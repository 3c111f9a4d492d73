//! Database schema validation.
//!
//! The database must declare five properties with fixed types before any
//! document operation runs. The validated result is cached as an immutable
//! [`SchemaDescriptor`] and replaced wholesale on revalidation.

use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;

use crate::config::PropertyNames;
use crate::document::Category;
use crate::error::SchemaError;
use crate::remote::RemoteDatabase;

/// Remote property types the document properties require.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyKind {
    /// Page title.
    Title,
    /// Single select.
    Select,
    /// Multi select.
    MultiSelect,
    /// URL.
    Url,
    /// Date.
    Date,
}

impl PropertyKind {
    /// Type name used by the remote.
    pub fn as_str(&self) -> &'static str {
        match self {
            PropertyKind::Title => "title",
            PropertyKind::Select => "select",
            PropertyKind::MultiSelect => "multi_select",
            PropertyKind::Url => "url",
            PropertyKind::Date => "date",
        }
    }
}

/// A validated database schema.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SchemaDescriptor {
    /// Database id as reported by the remote.
    pub database_id: String,
    /// Database title.
    pub database_title: String,
    /// Required property names.
    #[serde(skip)]
    pub names: PropertyNames,
    /// The five required properties, in check order.
    pub properties: Vec<(String, PropertyKind)>,
    /// Category options declared by the database, in declaration order.
    pub category_options: Vec<String>,
}

impl SchemaDescriptor {
    /// Whether `category` may be written to the database.
    ///
    /// The five defaults are always accepted; anything else must be a
    /// declared option.
    pub fn accepts_category(&self, category: &Category) -> bool {
        category.is_default() || self.category_options.iter().any(|o| o == category.as_str())
    }
}

/// Validates a database definition, failing on the first violated check.
pub fn validate(
    database: &RemoteDatabase,
    names: &PropertyNames,
) -> Result<SchemaDescriptor, SchemaError> {
    let required = [
        (&names.title, PropertyKind::Title),
        (&names.category, PropertyKind::Select),
        (&names.tags, PropertyKind::MultiSelect),
        (&names.url, PropertyKind::Url),
        (&names.created, PropertyKind::Date),
    ];

    for (name, _) in &required {
        if !database.properties.contains_key(name.as_str()) {
            return Err(SchemaError::MissingProperty {
                name: name.to_string(),
            });
        }
    }

    for (name, kind) in &required {
        let actual = &database.properties[name.as_str()].kind;
        if actual != kind.as_str() {
            return Err(SchemaError::TypeMismatch {
                name: name.to_string(),
                expected: kind.as_str().to_string(),
                actual: actual.clone(),
            });
        }
    }

    let category_options: Vec<String> = database.properties[names.category.as_str()]
        .select
        .as_ref()
        .map(|s| s.options.iter().map(|o| o.name.clone()).collect())
        .unwrap_or_default();

    let missing: Vec<String> = Category::DEFAULTS
        .iter()
        .map(|c| c.as_str())
        .filter(|c| !category_options.iter().any(|o| o == c))
        .map(str::to_string)
        .collect();
    if !missing.is_empty() {
        return Err(SchemaError::MissingCategoryOptions {
            name: names.category.clone(),
            missing,
        });
    }

    Ok(SchemaDescriptor {
        database_id: database.id.clone(),
        database_title: database.title_text(),
        names: names.clone(),
        properties: required
            .iter()
            .map(|(name, kind)| (name.to_string(), *kind))
            .collect(),
        category_options,
    })
}

/// Holds the current descriptor. Readers get an `Arc` snapshot; writers
/// swap the whole value.
#[derive(Debug, Default)]
pub struct SchemaCache {
    current: RwLock<Option<Arc<SchemaDescriptor>>>,
}

impl SchemaCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current descriptor, if validated.
    pub fn get(&self) -> Option<Arc<SchemaDescriptor>> {
        self.current.read().clone()
    }

    /// Replaces the descriptor.
    pub fn replace(&self, descriptor: SchemaDescriptor) -> Arc<SchemaDescriptor> {
        let descriptor = Arc::new(descriptor);
        *self.current.write() = Some(descriptor.clone());
        descriptor
    }

    /// Drops the descriptor; document operations are refused until the next
    /// successful validation.
    pub fn clear(&self) {
        *self.current.write() = None;
    }
}
