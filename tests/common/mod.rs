//! Shared fixtures for the HTTP-level tests.

#![allow(dead_code)]

use std::time::Duration;

use notion_docstore_mcp::{DocumentEngine, RetryConfig, StoreConfig};
use serde_json::{json, Value};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const TOKEN: &str = "secret_test_token";
pub const DATABASE_ID: &str = "db-id";
pub const PAGE_ID: &str = "1429989f-e8ac-4eff-bc8f-57f56486db54";

/// Configuration pointing at the mock server, with millisecond backoff.
pub fn config(server: &MockServer) -> StoreConfig {
    StoreConfig::new(TOKEN, DATABASE_ID)
        .unwrap()
        .with_base_url(server.uri())
        .with_retry(
            RetryConfig::new(3)
                .with_initial_delay(Duration::from_millis(1))
                .with_max_delay(Duration::from_millis(10)),
        )
}

pub fn engine(server: &MockServer) -> DocumentEngine {
    DocumentEngine::connect(config(server)).unwrap()
}

/// A database definition that passes validation.
pub fn database_json() -> Value {
    let options: Vec<Value> = ["General", "Code", "Tutorial", "Reference", "Methodology"]
        .iter()
        .enumerate()
        .map(|(i, name)| json!({ "id": i.to_string(), "name": name, "color": "default" }))
        .collect();
    json!({
        "object": "database",
        "id": DATABASE_ID,
        "title": [{ "type": "text", "text": { "content": "Documents" }, "plain_text": "Documents" }],
        "properties": {
            "Title": { "id": "title", "name": "Title", "type": "title", "title": {} },
            "Category": { "id": "c", "name": "Category", "type": "select", "select": { "options": options } },
            "Tags": { "id": "t", "name": "Tags", "type": "multi_select", "multi_select": { "options": [] } },
            "URL": { "id": "u", "name": "URL", "type": "url", "url": {} },
            "Created": { "id": "d", "name": "Created", "type": "date", "date": {} }
        }
    })
}

/// A page as the remote returns it.
pub fn page_json(id: &str, title: &str, category: &str, tags: &[&str]) -> Value {
    json!({
        "object": "page",
        "id": id,
        "url": format!("https://www.notion.so/{}", id.replace('-', "")),
        "created_time": "2024-05-01T12:00:00.000Z",
        "last_edited_time": "2024-05-01T12:00:00.000Z",
        "archived": false,
        "properties": {
            "Title": { "id": "title", "type": "title", "title": [
                { "type": "text", "text": { "content": title }, "plain_text": title }
            ]},
            "Category": { "id": "c", "type": "select", "select": { "name": category } },
            "Tags": { "id": "t", "type": "multi_select", "multi_select":
                tags.iter().map(|t| json!({ "name": t })).collect::<Vec<_>>()
            },
            "URL": { "id": "u", "type": "url", "url": null },
            "Created": { "id": "d", "type": "date", "date": { "start": "2024-05-01T12:00:00.000Z", "end": null } }
        }
    })
}

/// Page id number `n` in dashed form.
pub fn page_id(n: u32) -> String {
    let hex = format!("{:032x}", n);
    format!(
        "{}-{}-{}-{}-{}",
        &hex[..8],
        &hex[8..12],
        &hex[12..16],
        &hex[16..20],
        &hex[20..]
    )
}

pub fn error_json(status: u16, code: &str, message: &str) -> Value {
    json!({ "object": "error", "status": status, "code": code, "message": message })
}

/// Mounts a valid database definition.
pub async fn mount_database(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path(format!("/databases/{}", DATABASE_ID)))
        .respond_with(ResponseTemplate::new(200).set_body_json(database_json()))
        .mount(server)
        .await;
}

/// Engine with a validated schema.
pub async fn validated_engine(server: &MockServer) -> DocumentEngine {
    mount_database(server).await;
    let engine = engine(server);
    engine.validate_schema().await.unwrap();
    engine
}
