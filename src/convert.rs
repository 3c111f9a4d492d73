//! Conversion utilities between tool arguments, documents and JSON results.

use serde_json::{json, Map, Value as JsonValue};

use crate::blocks::render_text;
use crate::document::DocumentRecord;
use crate::error::{McpError, Result};
use crate::query::SearchResults;

/// Helper to get a required string argument from JSON arguments.
pub fn get_string_arg(args: &Map<String, JsonValue>, name: &str) -> Result<String> {
    args.get(name)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| McpError::MissingArg(name.to_string()))
}

/// Helper to get an optional string argument from JSON arguments.
///
/// Blank strings count as absent.
pub fn get_optional_string(args: &Map<String, JsonValue>, name: &str) -> Option<String> {
    args.get(name)
        .and_then(|v| v.as_str())
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
}

/// Helper to get an optional u64 argument from JSON arguments.
///
/// Present but not a non-negative integer is an error.
pub fn get_optional_u64(args: &Map<String, JsonValue>, name: &str) -> Result<Option<u64>> {
    match args.get(name) {
        None | Some(JsonValue::Null) => Ok(None),
        Some(v) => v.as_u64().map(Some).ok_or_else(|| McpError::InvalidArg {
            name: name.to_string(),
            reason: "expected a non-negative integer".to_string(),
        }),
    }
}

/// Helper to get an optional boolean argument.
pub fn get_optional_bool(args: &Map<String, JsonValue>, name: &str) -> Option<bool> {
    args.get(name).and_then(|v| v.as_bool())
}

/// Helper to get a list of strings.
///
/// Accepts an array of strings or a single comma-separated string.
pub fn get_string_list(args: &Map<String, JsonValue>, name: &str) -> Result<Vec<String>> {
    match args.get(name) {
        None | Some(JsonValue::Null) => Ok(Vec::new()),
        Some(JsonValue::String(s)) => Ok(s.split(',').map(|t| t.to_string()).collect()),
        Some(JsonValue::Array(items)) => items
            .iter()
            .map(|v| {
                v.as_str().map(|s| s.to_string()).ok_or_else(|| McpError::InvalidArg {
                    name: name.to_string(),
                    reason: "expected an array of strings".to_string(),
                })
            })
            .collect(),
        Some(_) => Err(McpError::InvalidArg {
            name: name.to_string(),
            reason: "expected an array of strings".to_string(),
        }),
    }
}

/// Convert a document's properties to JSON for a tool result.
pub fn record_to_json(record: &DocumentRecord) -> JsonValue {
    let mut obj = Map::new();
    if let Some(id) = &record.id {
        obj.insert("id".to_string(), JsonValue::String(id.to_string()));
        obj.insert("page_url".to_string(), JsonValue::String(id.page_url()));
    }
    obj.insert("title".to_string(), JsonValue::String(record.title.clone()));
    obj.insert(
        "category".to_string(),
        JsonValue::String(record.category.to_string()),
    );
    obj.insert(
        "tags".to_string(),
        JsonValue::Array(record.tags.iter().cloned().map(JsonValue::String).collect()),
    );
    obj.insert(
        "url".to_string(),
        record.url.clone().map_or(JsonValue::Null, JsonValue::String),
    );
    obj.insert(
        "created".to_string(),
        record
            .created
            .map_or(JsonValue::Null, |c| JsonValue::String(c.to_rfc3339())),
    );
    JsonValue::Object(obj)
}

/// Convert a document including its rendered body.
pub fn document_to_json(record: &DocumentRecord) -> JsonValue {
    let mut value = record_to_json(record);
    if let Some(obj) = value.as_object_mut() {
        obj.insert(
            "content".to_string(),
            JsonValue::String(render_text(&record.body)),
        );
        obj.insert("block_count".to_string(), json!(record.body.len()));
    }
    value
}

/// Convert search results, surfacing truncation.
pub fn search_to_json(results: &SearchResults) -> JsonValue {
    json!({
        "count": results.documents.len(),
        "documents": results.documents.iter().map(record_to_json).collect::<Vec<_>>(),
        "truncated": results.is_truncated(),
        "truncation": results.truncation.map(|t| json!({
            "detail": t,
            "message": t.to_string(),
        })),
        "pages_read": results.pages_read,
    })
}
