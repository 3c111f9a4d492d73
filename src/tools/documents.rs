//! Document tools.
//!
//! - `create_document`: save a document with properties and a text body
//! - `get_document`: fetch a document and its body by page id
//! - `search_documents`: find documents by title, tag or category

use serde_json::{json, Map, Value as JsonValue};
use tracing::debug;

use crate::blocks::{parse_text, Block};
use crate::convert::{
    document_to_json, get_optional_string, get_optional_u64, get_string_arg, get_string_list,
    search_to_json,
};
use crate::document::{Category, DocumentRecord, SearchQuery, SortOrder};
use crate::error::{McpError, Result};
use crate::schema;
use crate::session::McpSession;
use crate::tools::ToolDef;

/// Get all document tool definitions.
pub fn tools() -> Vec<ToolDef> {
    vec![
        ToolDef::new(
            "create_document",
            "Save a document to the Notion knowledge base. The title becomes the page title and \
             the content becomes the page body: blank lines separate paragraphs, and '#', '- ', \
             '1. ', '> ' and ``` fences produce headings, list items, quotes and code blocks. \
             Category must be one of General, Code, Tutorial, Reference or Methodology (or an \
             extra option the database declares); defaults to General. Returns the new page id \
             and link.",
            json!({
                "type": "object",
                "properties": {
                    "title": {
                        "type": "string",
                        "description": "Document title, at most 200 characters"
                    },
                    "content": {
                        "type": "string",
                        "description": "Document body text"
                    },
                    "category": {
                        "type": "string",
                        "description": "General, Code, Tutorial, Reference or Methodology"
                    },
                    "tags": {
                        "type": "array",
                        "items": { "type": "string" },
                        "description": "Free-form labels; commas are not allowed inside a tag"
                    },
                    "url": {
                        "type": "string",
                        "description": "Source URL; ignored if malformed"
                    },
                    "notes": {
                        "type": "string",
                        "description": "Extra notes, appended under a 'Notes' heading"
                    }
                },
                "required": ["title", "content"]
            }),
        ),
        ToolDef::new(
            "get_document",
            "Fetch a document by its page id (32 hex digits, dashes optional). Returns the \
             properties, the page link and the body rendered as text.",
            schema!(object {
                required: { "page_id": string }
            }),
        ),
        ToolDef::new(
            "search_documents",
            "Search documents by title text, tags and category. At least one criterion is \
             required; all given criteria must match. Tag matching is case-insensitive. Results \
             are capped (limit, at most 100); when more documents match, 'truncated' is true. \
             Use sort 'created_desc' or 'created_asc' to order by creation date.",
            json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "Text the title must contain"
                    },
                    "tag": { "type": "string" },
                    "tags": {
                        "type": "array",
                        "items": { "type": "string" },
                        "description": "Every tag must be present"
                    },
                    "category": {
                        "type": "string",
                        "description": "General, Code, Tutorial, Reference, Methodology, or an \
                                        extra option the database declares"
                    },
                    "limit": {
                        "type": "integer",
                        "description": "Maximum results, 1 to 100"
                    },
                    "sort": {
                        "type": "string",
                        "description": "created_desc or created_asc"
                    }
                },
                "required": []
            }),
        ),
    ]
}

/// Dispatch a document tool call.
pub async fn dispatch(
    session: &McpSession,
    name: &str,
    args: Map<String, JsonValue>,
) -> Result<JsonValue> {
    match name {
        "create_document" => dispatch_create(session, args).await,
        "get_document" => dispatch_get(session, args).await,
        "search_documents" => dispatch_search(session, args).await,
        _ => Err(McpError::UnknownTool(name.to_string())),
    }
}

// ── Create ───────────────────────────────────────────────────────────────

/// Builds the record a `create_document` call describes. Performs no I/O.
pub(crate) fn record_from_args(args: &Map<String, JsonValue>) -> Result<DocumentRecord> {
    let title = get_string_arg(args, "title")?;
    let content = get_string_arg(args, "content")?;
    let category = get_optional_string(args, "category")
        .map(|c| Category::from_remote_name(&c))
        .unwrap_or_default();

    let mut body = parse_text(&content);
    if let Some(notes) = get_optional_string(args, "notes") {
        body.push(Block::heading(2, "Notes"));
        body.extend(parse_text(&notes));
    }

    let mut record = DocumentRecord::new(title, category)
        .with_tags(get_string_list(args, "tags")?)?
        .with_body(body);
    if let Some(url) = get_optional_string(args, "url") {
        record = record.with_url(url);
    }
    Ok(record)
}

async fn dispatch_create(session: &McpSession, args: Map<String, JsonValue>) -> Result<JsonValue> {
    let record = record_from_args(&args)?;
    let created = session.engine().create_document(record).await?;
    Ok(json!({
        "created": true,
        "document": document_to_json(&created),
    }))
}

// ── Get ──────────────────────────────────────────────────────────────────

async fn dispatch_get(session: &McpSession, args: Map<String, JsonValue>) -> Result<JsonValue> {
    let page_id = get_string_arg(&args, "page_id")?;
    let document = session.engine().get_document(&page_id).await?;
    Ok(document_to_json(&document))
}

// ── Search ───────────────────────────────────────────────────────────────

/// Builds the query a `search_documents` call describes. Performs no I/O.
pub(crate) fn query_from_args(args: &Map<String, JsonValue>) -> Result<SearchQuery> {
    let mut builder = SearchQuery::builder();
    if let Some(text) = get_optional_string(args, "query") {
        builder = builder.title(text);
    }
    if let Some(tag) = get_optional_string(args, "tag") {
        builder = builder.tag(tag);
    }
    for tag in get_string_list(args, "tags")? {
        builder = builder.tag(tag);
    }
    if let Some(category) = get_optional_string(args, "category") {
        builder = builder.category(Category::from_remote_name(&category));
    }
    if let Some(limit) = get_optional_u64(args, "limit")? {
        builder = builder.limit(usize::try_from(limit).unwrap_or(usize::MAX));
    }
    if let Some(sort) = get_optional_string(args, "sort") {
        let order: SortOrder = sort.parse().map_err(|reason| McpError::InvalidArg {
            name: "sort".to_string(),
            reason,
        })?;
        builder = builder.sort(order);
    }
    Ok(builder.build()?)
}

async fn dispatch_search(session: &McpSession, args: Map<String, JsonValue>) -> Result<JsonValue> {
    let query = query_from_args(&args)?;
    debug!(?query, "Searching documents");
    let results = session.engine().search_documents(&query).await?;
    Ok(search_to_json(&results))
}
