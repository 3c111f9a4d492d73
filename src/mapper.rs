//! Property mapping between [`DocumentRecord`] and the remote wire format.

use chrono::{DateTime, NaiveDate, Utc};
use serde_json::{json, Value as JsonValue};
use tracing::warn;

use crate::blocks::{plain_text, rich_text};
use crate::document::{normalize_tags, Category, DocumentId, DocumentRecord};
use crate::error::CallerError;
use crate::remote::{RemotePage, RemotePropertyMap};
use crate::schema::SchemaDescriptor;

/// Encodes a record's properties.
///
/// Rejects invalid titles, categories and tags. A malformed URL is dropped
/// with a warning. A missing creation date becomes "now".
pub fn to_remote(
    record: &DocumentRecord,
    schema: &SchemaDescriptor,
) -> Result<RemotePropertyMap, CallerError> {
    record.validate_title()?;
    if !schema.accepts_category(&record.category) {
        return Err(CallerError::InvalidCategory(
            record.category.as_str().to_string(),
        ));
    }
    let tags = normalize_tags(&record.tags)?;
    let names = &schema.names;

    let mut properties = RemotePropertyMap::new();
    properties.insert(
        names.title.clone(),
        json!({ "title": rich_text(record.title.trim()) }),
    );
    properties.insert(
        names.category.clone(),
        json!({ "select": { "name": record.category.as_str() } }),
    );
    properties.insert(
        names.tags.clone(),
        json!({
            "multi_select": tags.iter().map(|t| json!({ "name": t })).collect::<Vec<_>>()
        }),
    );

    if let Some(url) = record.url.as_deref() {
        match url::Url::parse(url.trim()) {
            Ok(_) => {
                properties.insert(names.url.clone(), json!({ "url": url.trim() }));
            }
            Err(e) => {
                warn!(url, error = %e, "Dropping malformed document URL");
            }
        }
    }

    let created = record.created.unwrap_or_else(Utc::now);
    properties.insert(
        names.created.clone(),
        json!({ "date": { "start": created.to_rfc3339() } }),
    );

    Ok(properties)
}

/// Decodes a record from property values.
///
/// Absent or null properties become empty values; nothing here fails.
pub fn from_remote(properties: &RemotePropertyMap, schema: &SchemaDescriptor) -> DocumentRecord {
    let names = &schema.names;
    let prop = |name: &str| properties.get(name).filter(|v| !v.is_null());

    let title = prop(&names.title)
        .and_then(|p| p.get("title"))
        .map(plain_text)
        .unwrap_or_default();

    let category = prop(&names.category)
        .and_then(|p| p.get("select"))
        .and_then(|s| s.get("name"))
        .and_then(|n| n.as_str())
        .map(Category::from_remote_name)
        .unwrap_or_default();

    let tags = prop(&names.tags)
        .and_then(|p| p.get("multi_select"))
        .and_then(|m| m.as_array())
        .map(|options| {
            options
                .iter()
                .filter_map(|o| o.get("name").and_then(|n| n.as_str()))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    let url = prop(&names.url)
        .and_then(|p| p.get("url"))
        .and_then(|u| u.as_str())
        .filter(|u| !u.is_empty())
        .map(str::to_string);

    let created = prop(&names.created)
        .and_then(|p| p.get("date"))
        .and_then(|d| d.get("start"))
        .and_then(|s| s.as_str())
        .and_then(parse_date);

    DocumentRecord {
        id: None,
        title,
        category,
        tags,
        url,
        created,
        body: Vec::new(),
    }
}

/// Decodes a full page: properties plus id, falling back to the page's
/// creation time when the date property is empty.
pub fn from_page(page: &RemotePage, schema: &SchemaDescriptor) -> DocumentRecord {
    let mut record = from_remote(&page.properties, schema);
    record.id = DocumentId::parse(&page.id).ok();
    if record.created.is_none() {
        record.created = page.created_time;
    }
    record
}

/// Parses a date property start value: RFC 3339 or a bare date.
fn parse_date(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

/// Block payloads for a body, skipping blocks with no wire form.
///
/// Blocks with more text than one block can carry are split.
pub fn body_to_remote(body: &[crate::blocks::Block]) -> Vec<JsonValue> {
    body.iter()
        .flat_map(|b| b.split_oversized())
        .filter_map(|b| b.to_remote())
        .collect()
}
