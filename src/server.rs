//! MCP server over stdio.
//!
//! Reads newline-delimited JSON-RPC 2.0 messages. `tools/call` requests run
//! in their own task so slow remote calls do not block the reader; every
//! response goes through one writer task. `notifications/cancelled` cancels
//! the matching in-flight call.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value as JsonValue};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::{McpError, Result};
use crate::session::McpSession;
use crate::tools::ToolRegistry;

/// MCP protocol revision this server speaks.
pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// JSON-RPC 2.0 request or notification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    /// Protocol version, always "2.0".
    pub jsonrpc: String,
    /// Request id; absent for notifications.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<JsonValue>,
    /// Method name.
    pub method: String,
    /// Method parameters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<JsonValue>,
}

/// JSON-RPC 2.0 response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    /// Protocol version, always "2.0".
    pub jsonrpc: String,
    /// Id of the request this answers; null when it could not be read.
    pub id: JsonValue,
    /// Result on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<JsonValue>,
    /// Error on failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

/// JSON-RPC 2.0 error object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcError {
    /// Error code.
    pub code: i64,
    /// Human-readable message.
    pub message: String,
    /// Extra detail.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<JsonValue>,
}

impl JsonRpcResponse {
    /// Successful response.
    pub fn success(id: JsonValue, result: JsonValue) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    /// Error response.
    pub fn error(id: JsonValue, code: i64, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.into(),
                data: None,
            }),
        }
    }
}

type Outbox = mpsc::UnboundedSender<JsonRpcResponse>;

/// MCP server.
pub struct McpServer {
    session: Arc<McpSession>,
    registry: Arc<ToolRegistry>,
    in_flight: Arc<Mutex<HashMap<String, CancellationToken>>>,
}

impl McpServer {
    /// Create a server for a session.
    pub fn new(session: McpSession) -> Self {
        Self {
            session: Arc::new(session),
            registry: Arc::new(ToolRegistry::new()),
            in_flight: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Serve on stdin/stdout until stdin closes.
    pub async fn run(&self) -> Result<()> {
        self.serve(tokio::io::stdin(), tokio::io::stdout()).await
    }

    /// Serve on any reader/writer pair until the reader reaches EOF.
    ///
    /// Waits for in-flight tool calls to answer before returning.
    pub async fn serve<R, W>(&self, reader: R, writer: W) -> Result<()>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let writer_task = tokio::spawn(write_responses(rx, writer));

        let mut lines = BufReader::new(reader).lines();
        while let Some(line) = lines.next_line().await? {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            self.handle_message(line, &tx);
        }
        info!("Input closed, shutting down");

        drop(tx);
        writer_task
            .await
            .map_err(|e| McpError::Internal(format!("writer task failed: {}", e)))?
    }

    /// Handle one incoming message. Responses are sent to `tx`.
    pub fn handle_message(&self, message: &str, tx: &Outbox) {
        let value: JsonValue = match serde_json::from_str(message) {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "Unparseable message");
                send(tx, JsonRpcResponse::error(JsonValue::Null, -32700, format!("Parse error: {}", e)));
                return;
            }
        };
        let request: JsonRpcRequest = match serde_json::from_value(value) {
            Ok(r) => r,
            Err(e) => {
                send(tx, JsonRpcResponse::error(JsonValue::Null, -32600, format!("Invalid request: {}", e)));
                return;
            }
        };

        match request.id.clone() {
            None => self.handle_notification(&request),
            Some(id) => self.handle_request(id, request, tx),
        }
    }

    fn handle_notification(&self, request: &JsonRpcRequest) {
        match request.method.as_str() {
            "notifications/initialized" | "initialized" => debug!("Client initialized"),
            "notifications/cancelled" => {
                let Some(target) = request.params.as_ref().and_then(|p| p.get("requestId")) else {
                    return;
                };
                let key = target.to_string();
                if let Some(token) = self.in_flight.lock().get(&key) {
                    info!(request_id = %key, "Cancelling request");
                    token.cancel();
                }
            }
            other => debug!(method = other, "Ignoring notification"),
        }
    }

    fn handle_request(&self, id: JsonValue, request: JsonRpcRequest, tx: &Outbox) {
        debug!(method = %request.method, id = %id, "Request");
        let response = match request.method.as_str() {
            "initialize" => {
                info!("Client connected");
                JsonRpcResponse::success(
                    id,
                    json!({
                        "protocolVersion": PROTOCOL_VERSION,
                        "capabilities": { "tools": { "listChanged": false } },
                        "serverInfo": {
                            "name": env!("CARGO_PKG_NAME"),
                            "version": env!("CARGO_PKG_VERSION"),
                        }
                    }),
                )
            }
            "ping" => JsonRpcResponse::success(id, json!({})),
            "tools/list" => JsonRpcResponse::success(id, json!({ "tools": self.registry.tools() })),
            "tools/call" => return self.spawn_tool_call(id, request.params, tx),
            other => JsonRpcResponse::error(id, -32601, format!("Method not found: {}", other)),
        };
        send(tx, response);
    }

    fn spawn_tool_call(&self, id: JsonValue, params: Option<JsonValue>, tx: &Outbox) {
        let params = params.unwrap_or(JsonValue::Null);
        let Some(name) = params.get("name").and_then(|n| n.as_str()).map(str::to_string) else {
            send(tx, JsonRpcResponse::error(id, -32602, "Invalid params: missing tool name"));
            return;
        };
        let args = match params.get("arguments") {
            None | Some(JsonValue::Null) => Map::new(),
            Some(JsonValue::Object(map)) => map.clone(),
            Some(_) => {
                send(tx, JsonRpcResponse::error(id, -32602, "Invalid params: arguments must be an object"));
                return;
            }
        };

        let key = id.to_string();
        let token = CancellationToken::new();
        {
            let mut in_flight = self.in_flight.lock();
            if in_flight.contains_key(&key) {
                warn!(request_id = %key, "Rejecting reused in-flight request id");
                drop(in_flight);
                send(tx, JsonRpcResponse::error(id, -32600, "Invalid request: id is already in flight"));
                return;
            }
            in_flight.insert(key.clone(), token.clone());
        }

        let session = self.session.clone();
        let registry = self.registry.clone();
        let in_flight = self.in_flight.clone();
        let tx = tx.clone();
        tokio::spawn(async move {
            // Dispatch is polled first so a cancelled call is still counted.
            let result = tokio::select! {
                biased;
                result = registry.dispatch(&session, &name, args) => result,
                _ = token.cancelled() => {
                    session.record_outcome(false);
                    Err(McpError::Cancelled)
                }
            };
            in_flight.lock().remove(&key);
            send(&tx, tool_response(id, &name, result));
        });
    }
}

/// Builds the response to a tool call.
///
/// Argument and lookup failures are protocol errors; everything else is a
/// tool result flagged with `isError`.
fn tool_response(id: JsonValue, tool: &str, result: Result<JsonValue>) -> JsonRpcResponse {
    match result {
        Ok(value) => {
            let text = serde_json::to_string_pretty(&value).unwrap_or_else(|_| value.to_string());
            JsonRpcResponse::success(
                id,
                json!({
                    "content": [{ "type": "text", "text": text }],
                    "isError": false
                }),
            )
        }
        Err(
            e @ (McpError::UnknownTool(_)
            | McpError::MissingArg(_)
            | McpError::InvalidArg { .. }
            | McpError::Cancelled),
        ) => {
            debug!(tool, error = %e, "Tool call rejected");
            JsonRpcResponse::error(id, e.error_code(), e.to_string())
        }
        Err(e) => {
            error!(tool, kind = e.kind(), error = %e, "Tool call failed");
            JsonRpcResponse::success(
                id,
                json!({
                    "content": [{ "type": "text", "text": format!("[{}] {}", e.kind(), e) }],
                    "isError": true
                }),
            )
        }
    }
}

fn send(tx: &Outbox, response: JsonRpcResponse) {
    if tx.send(response).is_err() {
        warn!("Response dropped, writer is gone");
    }
}

async fn write_responses<W>(mut rx: mpsc::UnboundedReceiver<JsonRpcResponse>, mut writer: W) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(response) = rx.recv().await {
        let mut line = serde_json::to_string(&response)?;
        line.push('\n');
        writer.write_all(line.as_bytes()).await?;
        writer.flush().await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::config::StoreConfig;
    use crate::engine::DocumentEngine;
    use crate::remote::fake::FakeRemote;

    fn server() -> McpServer {
        server_with(FakeRemote::new())
    }

    fn server_with(remote: FakeRemote) -> McpServer {
        let config = StoreConfig::new("secret", "db").unwrap();
        let engine = DocumentEngine::with_remote(config, Arc::new(remote));
        McpServer::new(McpSession::new(Arc::new(engine)))
    }

    async fn slow_search_server() -> McpServer {
        let mut remote = FakeRemote::new();
        remote.query_delay = Duration::from_secs(30);
        let server = server_with(remote);
        server.session.engine().validate_schema().await.unwrap();
        server
    }

    fn search_call(id: JsonValue) -> String {
        json!({
            "jsonrpc": "2.0", "id": id, "method": "tools/call",
            "params": { "name": "search_documents", "arguments": { "tag": "x" } }
        })
        .to_string()
    }

    async fn validated_server() -> McpServer {
        let server = server();
        server.session.engine().validate_schema().await.unwrap();
        server
    }

    async fn roundtrip(server: &McpServer, message: JsonValue) -> JsonRpcResponse {
        let (tx, mut rx) = mpsc::unbounded_channel();
        server.handle_message(&message.to_string(), &tx);
        tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap()
    }

    #[tokio::test]
    async fn initialize_reports_server_info() {
        let response = roundtrip(
            &server(),
            json!({ "jsonrpc": "2.0", "id": 1, "method": "initialize", "params": {} }),
        )
        .await;
        let result = response.result.unwrap();
        assert_eq!(result["protocolVersion"], PROTOCOL_VERSION);
        assert_eq!(result["serverInfo"]["name"], "notion-docstore-mcp");
    }

    #[tokio::test]
    async fn tools_list() {
        let response = roundtrip(
            &server(),
            json!({ "jsonrpc": "2.0", "id": "a", "method": "tools/list" }),
        )
        .await;
        assert_eq!(response.id, json!("a"));
        assert_eq!(response.result.unwrap()["tools"].as_array().unwrap().len(), 5);
    }

    #[tokio::test]
    async fn unknown_method() {
        let response = roundtrip(
            &server(),
            json!({ "jsonrpc": "2.0", "id": 2, "method": "resources/list" }),
        )
        .await;
        assert_eq!(response.error.unwrap().code, -32601);
    }

    #[tokio::test]
    async fn parse_error() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        server().handle_message("{not json", &tx);
        let response = rx.recv().await.unwrap();
        assert_eq!(response.id, JsonValue::Null);
        assert_eq!(response.error.unwrap().code, -32700);
    }

    #[tokio::test]
    async fn notifications_get_no_response() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        server().handle_message(
            r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#,
            &tx,
        );
        drop(tx);
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn tool_call_success() {
        let server = validated_server().await;
        let response = roundtrip(
            &server,
            json!({
                "jsonrpc": "2.0", "id": 3, "method": "tools/call",
                "params": { "name": "store_status", "arguments": {} }
            }),
        )
        .await;
        let result = response.result.unwrap();
        assert_eq!(result["isError"], false);
        let text = result["content"][0]["text"].as_str().unwrap();
        let status: JsonValue = serde_json::from_str(text).unwrap();
        assert_eq!(status["schema"]["validated"], true);
    }

    #[tokio::test]
    async fn tool_failure_is_flagged() {
        let server = server();
        let response = roundtrip(
            &server,
            json!({
                "jsonrpc": "2.0", "id": 4, "method": "tools/call",
                "params": { "name": "search_documents", "arguments": { "tag": "x" } }
            }),
        )
        .await;
        let result = response.result.unwrap();
        assert_eq!(result["isError"], true);
        assert!(result["content"][0]["text"]
            .as_str()
            .unwrap()
            .starts_with("[not_validated]"));
    }

    #[tokio::test]
    async fn bad_arguments_are_protocol_errors() {
        let server = validated_server().await;
        let response = roundtrip(
            &server,
            json!({
                "jsonrpc": "2.0", "id": 5, "method": "tools/call",
                "params": { "name": "get_document", "arguments": {} }
            }),
        )
        .await;
        assert_eq!(response.error.unwrap().code, -32602);

        let response = roundtrip(
            &server,
            json!({
                "jsonrpc": "2.0", "id": 6, "method": "tools/call",
                "params": { "name": "no_such_tool" }
            }),
        )
        .await;
        assert_eq!(response.error.unwrap().code, -32601);
    }

    #[tokio::test]
    async fn serve_answers_every_request() {
        let server = validated_server().await;
        let input = [
            json!({ "jsonrpc": "2.0", "id": 1, "method": "initialize", "params": {} }),
            json!({ "jsonrpc": "2.0", "method": "notifications/initialized" }),
            json!({
                "jsonrpc": "2.0", "id": 2, "method": "tools/call",
                "params": { "name": "create_document",
                            "arguments": { "title": "Intro to X", "content": "Hi", "tags": ["x"] } }
            }),
            json!({ "jsonrpc": "2.0", "id": 3, "method": "ping" }),
        ]
        .iter()
        .map(|m| m.to_string())
        .collect::<Vec<_>>()
        .join("\n");

        let (client, server_end) = tokio::io::duplex(64 * 1024);
        let (mut client_read, mut client_write) = tokio::io::split(client);
        let (server_read, server_write) = tokio::io::split(server_end);

        client_write.write_all(input.as_bytes()).await.unwrap();
        client_write.shutdown().await.unwrap();
        drop(client_write);

        server.serve(server_read, server_write).await.unwrap();

        let mut output = String::new();
        tokio::io::AsyncReadExt::read_to_string(&mut client_read, &mut output)
            .await
            .unwrap();
        let responses: Vec<JsonRpcResponse> = output
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(responses.len(), 3);
        let created = responses.iter().find(|r| r.id == json!(2)).unwrap();
        assert_eq!(created.result.as_ref().unwrap()["isError"], false);
    }

    #[tokio::test]
    async fn cancelled_call_answers_with_error() {
        let server = slow_search_server().await;
        let (tx, mut rx) = mpsc::unbounded_channel();

        server.handle_message(&search_call(json!(7)), &tx);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(server.in_flight.lock().len(), 1);

        server.handle_message(
            &json!({
                "jsonrpc": "2.0", "method": "notifications/cancelled",
                "params": { "requestId": 7, "reason": "user abort" }
            })
            .to_string(),
            &tx,
        );

        let response = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(response.id, json!(7));
        let error = response.error.unwrap();
        assert_eq!(error.message, "request cancelled");
        assert!(server.in_flight.lock().is_empty());
        assert_eq!(server.session.stats().requests_failed, 1);
    }

    #[tokio::test]
    async fn cancel_for_unknown_id_is_ignored() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        server().handle_message(
            r#"{"jsonrpc":"2.0","method":"notifications/cancelled","params":{"requestId":99}}"#,
            &tx,
        );
        drop(tx);
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn reused_in_flight_id_is_rejected() {
        let server = slow_search_server().await;
        let (tx, mut rx) = mpsc::unbounded_channel();

        server.handle_message(&search_call(json!("dup")), &tx);
        server.handle_message(&search_call(json!("dup")), &tx);
        let rejected = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(rejected.id, json!("dup"));
        assert_eq!(rejected.error.unwrap().code, -32600);

        // The original call is still cancellable.
        server.handle_message(
            r#"{"jsonrpc":"2.0","method":"notifications/cancelled","params":{"requestId":"dup"}}"#,
            &tx,
        );
        let cancelled = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(cancelled.error.unwrap().message, "request cancelled");
        assert!(server.in_flight.lock().is_empty());
    }
}
