//! notion-docstore-mcp binary.
//!
//! Validates the database schema, then serves MCP over stdin/stdout.
//! Logs go to stderr (and optionally a file); stdout carries the protocol.

use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{error, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use notion_docstore_mcp::{
    DocumentEngine, McpServer, McpSession, RetryConfig, StoreConfig, StoreError,
};

/// MCP server that stores and searches documents in a Notion database.
#[derive(Parser, Debug)]
#[command(name = "notion-docstore-mcp", version, about)]
struct Cli {
    /// Notion integration secret
    #[arg(long, env = "NOTION_INTERNAL_INTEGRATION_SECRET", hide_env_values = true)]
    token: String,

    /// Target database id
    #[arg(long, env = "NOTION_DATABASE_ID")]
    database_id: String,

    /// Notion-Version header value
    #[arg(long, env = "NOTION_API_VERSION", default_value = notion_docstore_mcp::config::DEFAULT_API_VERSION)]
    api_version: String,

    /// API base URL
    #[arg(long, env = "NOTION_BASE_URL", default_value = notion_docstore_mcp::config::DEFAULT_BASE_URL)]
    base_url: String,

    /// Per-request timeout in seconds
    #[arg(long, default_value_t = 30)]
    timeout_secs: u64,

    /// Retries for transient failures and rate limits
    #[arg(long, default_value_t = 3)]
    max_retries: u32,

    /// Default cap on search results
    #[arg(long, default_value_t = 100)]
    max_results: usize,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Also write logs to this file
    #[arg(long)]
    log_file: Option<String>,
}

impl Cli {
    fn store_config(&self) -> Result<StoreConfig, StoreError> {
        Ok(StoreConfig::new(&self.token, &self.database_id)?
            .with_api_version(&self.api_version)
            .with_base_url(&self.base_url)
            .with_timeout(Duration::from_secs(self.timeout_secs.max(1)))
            .with_retry(RetryConfig::new(self.max_retries))
            .with_max_results(self.max_results))
    }
}

fn init_logging(verbose: u8, log_file: Option<&str>) -> Option<WorkerGuard> {
    let default_level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("notion_docstore_mcp={}", default_level).into());

    let registry = tracing_subscriber::registry().with(env_filter).with(
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(false),
    );

    if let Some(path) = log_file {
        let path = Path::new(path);
        let dir = path.parent().unwrap_or(Path::new("."));
        let file_name = path
            .file_name()
            .and_then(|f| f.to_str())
            .unwrap_or("notion-docstore-mcp.log");
        let file_appender = tracing_appender::rolling::never(dir, file_name);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(non_blocking)
                    .with_ansi(false),
            )
            .init();
        Some(guard)
    } else {
        registry.init();
        None
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let _log_guard = init_logging(cli.verbose, cli.log_file.as_deref());

    let config = match cli.store_config() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Invalid configuration");
            return ExitCode::FAILURE;
        }
    };
    info!(?config, "Starting notion-docstore-mcp");

    let engine = match DocumentEngine::connect(config) {
        Ok(engine) => engine,
        Err(e) => {
            error!(error = %e, "Failed to create remote client");
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = engine.validate_schema().await {
        error!(error = %e, "Database schema validation failed");
        return ExitCode::FAILURE;
    }

    let server = McpServer::new(McpSession::new(Arc::new(engine)));
    match server.run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Server error");
            ExitCode::FAILURE
        }
    }
}
