//! Document engine.
//!
//! Every document operation runs the same pipeline: check the cached schema,
//! map the record to wire properties, call the remote (which retries), and
//! map the result back.

use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::blocks::Block;
use crate::config::{StoreConfig, MAX_PAGE_SIZE};
use crate::document::{DocumentId, DocumentRecord, SearchQuery};
use crate::error::{CallerError, RemoteError, SchemaError, StoreError, StoreResult};
use crate::mapper::{body_to_remote, from_page, to_remote};
use crate::query::{self, SearchLimits, SearchResults};
use crate::remote::{HttpRemote, RemoteStore};
use crate::schema::{validate, SchemaCache, SchemaDescriptor};

/// Most children the remote accepts in a single create or append call.
pub const MAX_CHILDREN_PER_REQUEST: usize = MAX_PAGE_SIZE as usize;

/// Result of a health probe.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthReport {
    /// Whether the remote answered.
    pub healthy: bool,
    /// Whether a validated schema is cached.
    pub schema_validated: bool,
    /// Probe round-trip time.
    pub latency_ms: u64,
    /// Failure description when unhealthy.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Document store facade shared by all tool handlers.
pub struct DocumentEngine {
    remote: Arc<dyn RemoteStore>,
    schema: SchemaCache,
    config: StoreConfig,
}

impl DocumentEngine {
    /// Creates an engine talking to the configured database over HTTP.
    ///
    /// No request is made until [`validate_schema`](Self::validate_schema).
    pub fn connect(config: StoreConfig) -> StoreResult<Self> {
        let remote = HttpRemote::new(&config)?;
        Ok(Self::with_remote(config, Arc::new(remote)))
    }

    /// Creates an engine over any remote store.
    pub fn with_remote(config: StoreConfig, remote: Arc<dyn RemoteStore>) -> Self {
        Self {
            remote,
            schema: SchemaCache::new(),
            config,
        }
    }

    /// Engine configuration.
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Current schema descriptor, if validated.
    pub fn schema(&self) -> Option<Arc<SchemaDescriptor>> {
        self.schema.get()
    }

    /// Reads the database definition and validates it.
    ///
    /// On success the cached descriptor is replaced. On failure the cached
    /// descriptor survives only if the database was unreachable for a
    /// retryable reason; any other failure clears it.
    pub async fn validate_schema(&self) -> StoreResult<Arc<SchemaDescriptor>> {
        let result = match self.remote.retrieve_database().await {
            Ok(database) => validate(&database, &self.config.properties),
            Err(e) => Err(SchemaError::Unreachable(e)),
        };

        match result {
            Ok(descriptor) => {
                let descriptor = self.schema.replace(descriptor);
                info!(
                    database = %descriptor.database_title,
                    categories = descriptor.category_options.len(),
                    "Database schema validated"
                );
                Ok(descriptor)
            }
            Err(SchemaError::Unreachable(e)) if e.is_retryable() && self.schema.get().is_some() => {
                warn!(error = %e, "Schema revalidation failed, keeping previous schema");
                Err(SchemaError::Unreachable(e).into())
            }
            Err(e) => {
                if self.schema.get().is_some() {
                    warn!(error = %e, "Schema revalidation failed, disabling document operations");
                }
                self.schema.clear();
                Err(e.into())
            }
        }
    }

    fn require_schema(&self) -> StoreResult<Arc<SchemaDescriptor>> {
        self.schema.get().ok_or(StoreError::NotValidated)
    }

    /// Creates a document and returns it with its remote id.
    ///
    /// Caller errors are raised before any request. A body longer than one
    /// request allows is appended in follow-up batches.
    pub async fn create_document(&self, record: DocumentRecord) -> StoreResult<DocumentRecord> {
        let schema = self.require_schema()?;
        let properties = to_remote(&record, &schema)?;
        let mut children = body_to_remote(&record.body);
        let rest = if children.len() > MAX_CHILDREN_PER_REQUEST {
            children.split_off(MAX_CHILDREN_PER_REQUEST)
        } else {
            Vec::new()
        };

        let page = self.remote.create_page(properties, children).await?;
        let id = DocumentId::parse(&page.id).map_err(|_| RemoteError::Unknown {
            status: 200,
            body: format!("created page has malformed id '{}'", page.id),
        })?;

        for batch in rest.chunks(MAX_CHILDREN_PER_REQUEST) {
            if let Err(e) = self.remote.append_block_children(&id, batch.to_vec()).await {
                warn!(id = %id, error = %e, "Page created but body is incomplete");
                return Err(e.into());
            }
        }

        let mut created = from_page(&page, &schema);
        created.id = Some(id);
        created.body = record.body;
        info!(
            id = ?created.id,
            title = %created.title,
            category = %created.category,
            blocks = created.body.len(),
            "Document created"
        );
        Ok(created)
    }

    /// Fetches a document with its full body.
    pub async fn get_document(&self, page_id: &str) -> StoreResult<DocumentRecord> {
        let id = DocumentId::parse(page_id)?;
        let schema = self.require_schema()?;

        let page = self.remote.get_page(&id).await?;
        let mut record = from_page(&page, &schema);
        record.id = Some(id.clone());
        record.body = self.read_body(&id).await?;

        debug!(id = %id, blocks = record.body.len(), "Document fetched");
        Ok(record)
    }

    async fn read_body(&self, id: &DocumentId) -> StoreResult<Vec<Block>> {
        let mut body = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let page = self.remote.get_block_children(id, cursor.as_deref()).await?;
            body.extend(page.results.iter().map(Block::from_remote));
            match page.cursor() {
                Some(next) => cursor = Some(next.to_string()),
                None => return Ok(body),
            }
        }
    }

    /// Searches the database.
    pub async fn search_documents(&self, query: &SearchQuery) -> StoreResult<SearchResults> {
        let schema = self.require_schema()?;
        if let Some(category) = query.category() {
            if !schema.accepts_category(category) {
                return Err(CallerError::InvalidCategory(category.to_string()).into());
            }
        }
        let limits = SearchLimits {
            page_size: self.config.page_size,
            max_results: self.config.max_results,
            max_pages: self.config.max_pages,
        };
        let results = query::search(self.remote.as_ref(), &schema, query, limits).await?;
        info!(
            matches = results.documents.len(),
            pages = results.pages_read,
            truncated = results.is_truncated(),
            "Search completed"
        );
        Ok(results)
    }

    /// Probes the remote with a short timeout.
    pub async fn health(&self) -> HealthReport {
        let started = Instant::now();
        let probe = self.remote.ping().await;
        let latency_ms = started.elapsed().as_millis() as u64;
        HealthReport {
            healthy: probe.is_ok(),
            schema_validated: self.schema.get().is_some(),
            latency_ms,
            error: probe.err().map(|e| e.to_string()),
        }
    }
}
