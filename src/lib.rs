//! # notion-docstore-mcp
//!
//! MCP (Model Context Protocol) server that stores and searches documents in
//! a Notion database.
//!
//! This crate exposes document operations as tools for AI agents. It
//! implements the MCP protocol over stdin/stdout using JSON-RPC 2.0 and
//! talks to the Notion REST API.
//!
//! ## Tools
//!
//! `create_document`, `get_document`, `search_documents`,
//! `revalidate_schema`, `store_status`
//!
//! The target database must declare `Title` (title), `Category` (select with
//! the options General, Code, Tutorial, Reference and Methodology), `Tags`
//! (multi-select), `URL` (url) and `Created` (date). The schema is checked at
//! startup and document tools are refused until it passes.
//!
//! ## Usage
//!
//! ```json
//! {
//!   "mcpServers": {
//!     "notion-docs": {
//!       "command": "/path/to/notion-docstore-mcp",
//!       "env": {
//!         "NOTION_INTERNAL_INTEGRATION_SECRET": "secret_...",
//!         "NOTION_DATABASE_ID": "..."
//!       }
//!     }
//!   }
//! }
//! ```
//!
//! ## Library Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use notion_docstore_mcp::{DocumentEngine, McpServer, McpSession, StoreConfig};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = StoreConfig::new("secret_...", "database-id")?;
//! let engine = DocumentEngine::connect(config)?;
//! engine.validate_schema().await?;
//!
//! let server = McpServer::new(McpSession::new(Arc::new(engine)));
//! server.run().await?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod blocks;
pub mod classify;
pub mod config;
mod convert;
pub mod document;
pub mod engine;
mod error;
pub mod mapper;
pub mod query;
pub mod remote;
pub mod schema;
mod server;
mod session;
mod tools;

pub use config::{PropertyNames, RetryConfig, StoreConfig};
pub use convert::{document_to_json, record_to_json, search_to_json};
pub use document::{Category, DocumentId, DocumentRecord, SearchQuery, SortOrder};
pub use engine::{DocumentEngine, HealthReport};
pub use error::{CallerError, McpError, RemoteError, Result, SchemaError, StoreError, StoreResult};
pub use query::{SearchResults, TruncationWarning};
pub use server::{JsonRpcError, JsonRpcRequest, JsonRpcResponse, McpServer};
pub use session::{McpSession, StatsSnapshot};
pub use tools::{ToolDef, ToolRegistry};
