//! Error types for the document store.
//!
//! Errors are layered the way requests flow through the server:
//!
//! - [`CallerError`]: bad input, rejected before any network call
//! - [`SchemaError`]: the remote database does not have the expected shape
//! - [`RemoteError`]: a classified failure reported by the remote store
//! - [`StoreError`]: everything the document engine can return
//! - [`McpError`]: tool and transport layer errors

use std::time::Duration;

use thiserror::Error;

/// Result type for MCP operations.
pub type Result<T> = std::result::Result<T, McpError>;

/// Result type for document engine operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Invalid input from the caller. Never retried, never reaches the network.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CallerError {
    /// Title is empty or whitespace.
    #[error("title must not be empty")]
    EmptyTitle,

    /// Title exceeds the maximum length.
    #[error("title is {len} characters long, the maximum is {max}")]
    TitleTooLong {
        /// Length of the rejected title in characters.
        len: usize,
        /// Maximum accepted length.
        max: usize,
    },

    /// Category is not one of the known categories or the database's options.
    #[error("invalid category '{0}': expected one of General, Code, Tutorial, Reference, Methodology")]
    InvalidCategory(String),

    /// Tag cannot be stored as a multi-select option.
    #[error("invalid tag '{tag}': {reason}")]
    InvalidTag {
        /// The offending tag.
        tag: String,
        /// Why it was rejected.
        reason: String,
    },

    /// Page id is not 32 hex digits (dashes allowed).
    #[error("invalid page id '{0}': expected 32 hexadecimal digits")]
    InvalidPageId(String),

    /// Search query has no title, tag or category criterion.
    #[error("search needs a title query, a tag or a category")]
    EmptyQuery,

    /// Result limit outside the accepted range.
    #[error("invalid limit {0}: must be between 1 and {max}", max = crate::query::MAX_LIMIT)]
    InvalidLimit(usize),
}

/// The remote database failed validation. Fatal at startup.
///
/// Only the first violated check is reported.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchemaError {
    /// The database could not be read.
    #[error("database unreachable: {0}")]
    Unreachable(RemoteError),

    /// A required property is missing.
    #[error("database is missing required property '{name}'")]
    MissingProperty {
        /// Property name.
        name: String,
    },

    /// A required property has the wrong type.
    #[error("property '{name}' has type '{actual}', expected '{expected}'")]
    TypeMismatch {
        /// Property name.
        name: String,
        /// Expected remote type.
        expected: String,
        /// Declared remote type.
        actual: String,
    },

    /// The category select is missing some of the default options.
    #[error("property '{name}' is missing select options: {}", missing.join(", "))]
    MissingCategoryOptions {
        /// Property name.
        name: String,
        /// Options that were not declared.
        missing: Vec<String>,
    },
}

/// A classified remote failure.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RemoteError {
    /// 401: bad or missing credential.
    #[error("unauthorized: {message}")]
    Unauthorized {
        /// Remote-reported message.
        message: String,
    },

    /// 404: the database or page does not exist or is not shared with the integration.
    #[error("not found: {message}")]
    NotFound {
        /// Remote-reported message.
        message: String,
    },

    /// 400: the request was malformed.
    #[error("validation failed{}: {message}", property.as_ref().map(|p| format!(" for property '{}'", p)).unwrap_or_default())]
    Validation {
        /// Remote-reported message, verbatim.
        message: String,
        /// Offending property, when the message names one.
        property: Option<String>,
    },

    /// 429: back off before retrying.
    #[error("rate limited{}: {message}", retry_after.map(|d| format!(" (retry after {}s)", d.as_secs())).unwrap_or_default())]
    RateLimited {
        /// Remote-reported message.
        message: String,
        /// Retry-After hint.
        retry_after: Option<Duration>,
    },

    /// 5xx, timeout or connection failure. Safe to retry.
    #[error("transient failure: {message}")]
    Transient {
        /// Description of the failure.
        message: String,
    },

    /// Anything else.
    #[error("unexpected response (status {status}): {body}")]
    Unknown {
        /// HTTP status, 0 when no response was received.
        status: u16,
        /// Raw response body.
        body: String,
    },
}

impl RemoteError {
    /// Returns true if the retry policy applies to this error.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            RemoteError::Transient { .. } | RemoteError::RateLimited { .. }
        )
    }

    /// Short machine-readable name of the category.
    pub fn kind(&self) -> &'static str {
        match self {
            RemoteError::Unauthorized { .. } => "unauthorized",
            RemoteError::NotFound { .. } => "not_found",
            RemoteError::Validation { .. } => "validation",
            RemoteError::RateLimited { .. } => "rate_limited",
            RemoteError::Transient { .. } => "transient",
            RemoteError::Unknown { .. } => "unknown",
        }
    }
}

/// Errors returned by the document engine.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Schema validation failed.
    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),

    /// Caller input was rejected.
    #[error("invalid request: {0}")]
    Caller(#[from] CallerError),

    /// The remote store reported a failure.
    #[error("remote error: {0}")]
    Remote(#[from] RemoteError),

    /// No successful schema validation yet.
    #[error("database schema has not been validated; document operations are disabled")]
    NotValidated,

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// HTTP client could not be built.
    #[error("http client error: {0}")]
    Http(#[from] reqwest::Error),
}

impl StoreError {
    /// Short machine-readable name of the category.
    pub fn kind(&self) -> &'static str {
        match self {
            StoreError::Schema(_) => "schema",
            StoreError::Caller(_) => "invalid_request",
            StoreError::Remote(e) => e.kind(),
            StoreError::NotValidated => "not_validated",
            StoreError::Config(_) => "config",
            StoreError::Http(_) => "http_client",
        }
    }
}

/// Errors that can occur in the MCP server.
#[derive(Error, Debug)]
pub enum McpError {
    /// Unknown tool name.
    #[error("unknown tool: {0}")]
    UnknownTool(String),

    /// Required argument missing.
    #[error("missing required argument: {0}")]
    MissingArg(String),

    /// Argument has the wrong type or value.
    #[error("invalid argument '{name}': {reason}")]
    InvalidArg {
        /// Argument name.
        name: String,
        /// What was wrong.
        reason: String,
    },

    /// Document engine failure.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Request was cancelled by the client.
    #[error("request cancelled")]
    Cancelled,

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error on the transport.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<CallerError> for McpError {
    fn from(e: CallerError) -> Self {
        McpError::Store(StoreError::Caller(e))
    }
}

impl McpError {
    /// Category name reported to the client alongside the message.
    pub fn kind(&self) -> &'static str {
        match self {
            McpError::UnknownTool(_) => "unknown_tool",
            McpError::MissingArg(_) | McpError::InvalidArg { .. } => "invalid_arguments",
            McpError::Store(e) => e.kind(),
            McpError::Cancelled => "cancelled",
            McpError::Json(_) => "json",
            McpError::Io(_) => "io",
            McpError::Internal(_) => "internal",
        }
    }

    /// JSON-RPC error code for protocol-level failures.
    pub fn error_code(&self) -> i64 {
        match self {
            McpError::UnknownTool(_) => -32601,
            McpError::MissingArg(_) | McpError::InvalidArg { .. } => -32602,
            McpError::Json(_) => -32700,
            _ => -32603,
        }
    }
}
