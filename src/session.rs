//! MCP session management.
//!
//! Holds the shared document engine and per-process request statistics.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use serde::Serialize;

use crate::engine::DocumentEngine;

/// MCP session state.
///
/// Shared by every in-flight request; all fields are safe to use
/// concurrently.
pub struct McpSession {
    /// Document engine
    engine: Arc<DocumentEngine>,
    /// Process start
    started: Instant,
    stats: RequestStats,
}

#[derive(Default)]
struct RequestStats {
    total: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
    per_tool: Mutex<BTreeMap<String, u64>>,
}

/// Snapshot of request counters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatsSnapshot {
    /// Tool calls received.
    pub requests_total: u64,
    /// Tool calls that returned a result.
    pub requests_succeeded: u64,
    /// Tool calls that returned an error.
    pub requests_failed: u64,
    /// Calls per tool name.
    pub tools_called: BTreeMap<String, u64>,
    /// Seconds since the session started.
    pub uptime_secs: u64,
}

impl McpSession {
    /// Create a new MCP session around a document engine.
    pub fn new(engine: Arc<DocumentEngine>) -> Self {
        Self {
            engine,
            started: Instant::now(),
            stats: RequestStats::default(),
        }
    }

    /// Get the document engine.
    pub fn engine(&self) -> &DocumentEngine {
        &self.engine
    }

    /// Record the start of a tool call.
    pub fn record_call(&self, tool: &str) {
        self.stats.total.fetch_add(1, Ordering::Relaxed);
        *self.stats.per_tool.lock().entry(tool.to_string()).or_insert(0) += 1;
    }

    /// Record the outcome of a tool call.
    pub fn record_outcome(&self, success: bool) {
        let counter = if success {
            &self.stats.succeeded
        } else {
            &self.stats.failed
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Current counters.
    pub fn stats(&self) -> StatsSnapshot {
        StatsSnapshot {
            requests_total: self.stats.total.load(Ordering::Relaxed),
            requests_succeeded: self.stats.succeeded.load(Ordering::Relaxed),
            requests_failed: self.stats.failed.load(Ordering::Relaxed),
            tools_called: self.stats.per_tool.lock().clone(),
            uptime_secs: self.started.elapsed().as_secs(),
        }
    }
}
