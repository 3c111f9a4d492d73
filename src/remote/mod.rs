//! Remote store access.
//!
//! [`RemoteStore`] is the seam between the document engine and the hosted
//! database. [`HttpRemote`] implements it over the Notion REST API with
//! retry and backoff; tests substitute their own implementations.

mod http;

#[cfg(test)]
pub(crate) mod fake;

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

use crate::document::DocumentId;
use crate::error::RemoteError;

pub use http::HttpRemote;

/// Property values of a page, keyed by property name, in wire format.
pub type RemotePropertyMap = Map<String, JsonValue>;

/// Operations the document engine needs from the remote store.
///
/// Implementations own retry and backoff: a returned error is final for
/// that call.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Reads the database definition.
    async fn retrieve_database(&self) -> Result<RemoteDatabase, RemoteError>;

    /// Creates a page in the database with the given properties and body.
    async fn create_page(
        &self,
        properties: RemotePropertyMap,
        children: Vec<JsonValue>,
    ) -> Result<RemotePage, RemoteError>;

    /// Reads a page's properties.
    async fn get_page(&self, id: &DocumentId) -> Result<RemotePage, RemoteError>;

    /// Reads one page of a block's children.
    async fn get_block_children(
        &self,
        id: &DocumentId,
        cursor: Option<&str>,
    ) -> Result<BlockPage, RemoteError>;

    /// Appends children to a block (at most 100 per call).
    async fn append_block_children(
        &self,
        id: &DocumentId,
        children: Vec<JsonValue>,
    ) -> Result<(), RemoteError>;

    /// Reads one page of database query results.
    async fn query_database(
        &self,
        request: &QueryRequest,
        cursor: Option<&str>,
    ) -> Result<QueryPage, RemoteError>;

    /// Cheap liveness probe. Defaults to reading the database definition.
    async fn ping(&self) -> Result<(), RemoteError> {
        self.retrieve_database().await.map(|_| ())
    }
}

/// A database definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteDatabase {
    /// Database id.
    pub id: String,
    /// Database title as rich text.
    #[serde(default)]
    pub title: Vec<JsonValue>,
    /// Property definitions keyed by name.
    #[serde(default)]
    pub properties: BTreeMap<String, PropertyDefinition>,
}

impl RemoteDatabase {
    /// Plain-text database title.
    pub fn title_text(&self) -> String {
        crate::blocks::plain_text(&JsonValue::Array(self.title.clone()))
    }
}

/// A property definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyDefinition {
    /// Property type (`title`, `select`, `multi_select`, `url`, `date`, …).
    #[serde(rename = "type")]
    pub kind: String,
    /// Options of a select property.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub select: Option<SelectOptions>,
    /// Options of a multi-select property.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub multi_select: Option<SelectOptions>,
}

/// Declared select options.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SelectOptions {
    /// Options in declaration order.
    #[serde(default)]
    pub options: Vec<SelectOption>,
}

/// One select option.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectOption {
    /// Option name.
    pub name: String,
}

/// A page as returned by the remote.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemotePage {
    /// Page id.
    pub id: String,
    /// Web URL of the page.
    #[serde(default)]
    pub url: Option<String>,
    /// Creation time recorded by the remote.
    #[serde(default)]
    pub created_time: Option<DateTime<Utc>>,
    /// Last edit time recorded by the remote.
    #[serde(default)]
    pub last_edited_time: Option<DateTime<Utc>>,
    /// Whether the page is archived.
    #[serde(default)]
    pub archived: bool,
    /// Property values.
    #[serde(default)]
    pub properties: RemotePropertyMap,
}

/// One page of query results.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryPage {
    /// Pages in remote order.
    #[serde(default)]
    pub results: Vec<RemotePage>,
    /// Cursor for the next page.
    #[serde(default)]
    pub next_cursor: Option<String>,
    /// Whether more results exist.
    #[serde(default)]
    pub has_more: bool,
}

impl QueryPage {
    /// Cursor to continue from, if more results exist.
    pub fn cursor(&self) -> Option<&str> {
        if self.has_more {
            self.next_cursor.as_deref()
        } else {
            None
        }
    }
}

/// One page of block children.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BlockPage {
    /// Blocks in order.
    #[serde(default)]
    pub results: Vec<JsonValue>,
    /// Cursor for the next page.
    #[serde(default)]
    pub next_cursor: Option<String>,
    /// Whether more blocks exist.
    #[serde(default)]
    pub has_more: bool,
}

impl BlockPage {
    /// Cursor to continue from, if more blocks exist.
    pub fn cursor(&self) -> Option<&str> {
        if self.has_more {
            self.next_cursor.as_deref()
        } else {
            None
        }
    }
}

/// Body of a database query, minus the cursor.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryRequest {
    /// Filter expression.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<JsonValue>,
    /// Sort expressions.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sorts: Vec<JsonValue>,
    /// Results per page.
    pub page_size: u32,
}

impl QueryRequest {
    /// Request body including the cursor.
    pub fn body(&self, cursor: Option<&str>) -> JsonValue {
        let mut body = serde_json::to_value(self).unwrap_or_else(|_| JsonValue::Object(Map::new()));
        if let (Some(cursor), Some(obj)) = (cursor, body.as_object_mut()) {
            obj.insert(
                "start_cursor".to_string(),
                JsonValue::String(cursor.to_string()),
            );
        }
        body
    }
}
