//! Admin tools: schema revalidation and server status.

use serde_json::{json, Map, Value as JsonValue};

use crate::convert::get_optional_bool;
use crate::error::{McpError, Result};
use crate::schema;
use crate::session::McpSession;
use crate::tools::ToolDef;

/// Get all admin tool definitions.
pub fn tools() -> Vec<ToolDef> {
    vec![
        ToolDef::new(
            "revalidate_schema",
            "Re-read the database definition and check it still has the required Title, \
             Category, Tags, URL and Created properties. Run this after changing the database \
             in Notion. If the check fails, document tools are disabled until it passes.",
            schema!(object {}),
        ),
        ToolDef::new(
            "store_status",
            "Get server status: uptime, request counters, the validated schema and the target \
             database. Pass probe=true to also check that Notion is reachable.",
            schema!(object {
                optional: { "probe": boolean }
            }),
        ),
    ]
}

/// Dispatch an admin tool call.
pub async fn dispatch(
    session: &McpSession,
    name: &str,
    args: Map<String, JsonValue>,
) -> Result<JsonValue> {
    match name {
        "revalidate_schema" => dispatch_revalidate(session).await,
        "store_status" => dispatch_status(session, args).await,
        _ => Err(McpError::UnknownTool(name.to_string())),
    }
}

async fn dispatch_revalidate(session: &McpSession) -> Result<JsonValue> {
    let descriptor = session.engine().validate_schema().await?;
    Ok(json!({
        "validated": true,
        "schema": serde_json::to_value(&*descriptor)?,
    }))
}

async fn dispatch_status(session: &McpSession, args: Map<String, JsonValue>) -> Result<JsonValue> {
    let engine = session.engine();
    let config = engine.config();

    let schema = match engine.schema() {
        Some(descriptor) => json!({
            "validated": true,
            "database_title": descriptor.database_title,
            "category_options": descriptor.category_options,
        }),
        None => json!({ "validated": false }),
    };

    let mut status = json!({
        "server": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "stats": serde_json::to_value(session.stats())?,
        "schema": schema,
        "database_id": config.database_id,
        "api_version": config.api_version,
        "max_results": config.max_results,
    });

    if get_optional_bool(&args, "probe").unwrap_or(false) {
        let health = engine.health().await;
        status["health"] = serde_json::to_value(health)?;
    }

    Ok(status)
}
