//! In-memory remote store for unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value as JsonValue};

use super::{
    BlockPage, PropertyDefinition, QueryPage, QueryRequest, RemoteDatabase, RemotePage,
    RemotePropertyMap, RemoteStore, SelectOption, SelectOptions,
};
use crate::document::DocumentId;
use crate::error::RemoteError;

/// Stores pages in memory. Ignores query filters: the query engine filters
/// locally, so every page is a candidate.
pub(crate) struct FakeRemote {
    pub database: Mutex<Result<RemoteDatabase, RemoteError>>,
    pub pages: Mutex<Vec<RemotePage>>,
    pub blocks: Mutex<HashMap<String, Vec<JsonValue>>>,
    pub page_size: usize,
    /// Simulated latency of each query call.
    pub query_delay: Duration,
    calls: AtomicUsize,
    writes: AtomicUsize,
    next_id: AtomicUsize,
}

impl FakeRemote {
    pub fn new() -> Self {
        Self {
            database: Mutex::new(Ok(valid_database(&[]))),
            pages: Mutex::new(Vec::new()),
            blocks: Mutex::new(HashMap::new()),
            page_size: 2,
            query_delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
            writes: AtomicUsize::new(0),
            next_id: AtomicUsize::new(1),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn call(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

/// A database that passes validation, with optional extra categories.
pub(crate) fn valid_database(extra_categories: &[&str]) -> RemoteDatabase {
    let mut categories: Vec<SelectOption> = ["General", "Code", "Tutorial", "Reference", "Methodology"]
        .iter()
        .chain(extra_categories.iter())
        .map(|name| SelectOption {
            name: name.to_string(),
        })
        .collect();
    categories.dedup();

    let def = |kind: &str| PropertyDefinition {
        kind: kind.to_string(),
        select: None,
        multi_select: None,
    };

    let mut properties = std::collections::BTreeMap::new();
    properties.insert("Title".to_string(), def("title"));
    properties.insert(
        "Category".to_string(),
        PropertyDefinition {
            select: Some(SelectOptions {
                options: categories,
            }),
            ..def("select")
        },
    );
    properties.insert(
        "Tags".to_string(),
        PropertyDefinition {
            multi_select: Some(SelectOptions::default()),
            ..def("multi_select")
        },
    );
    properties.insert("URL".to_string(), def("url"));
    properties.insert("Created".to_string(), def("date"));

    RemoteDatabase {
        id: "db".to_string(),
        title: vec![json!({ "plain_text": "Documents" })],
        properties,
    }
}

#[async_trait]
impl RemoteStore for FakeRemote {
    async fn retrieve_database(&self) -> Result<RemoteDatabase, RemoteError> {
        self.call();
        self.database.lock().clone()
    }

    async fn create_page(
        &self,
        properties: RemotePropertyMap,
        children: Vec<JsonValue>,
    ) -> Result<RemotePage, RemoteError> {
        self.call();
        self.writes.fetch_add(1, Ordering::SeqCst);
        let n = self.next_id.fetch_add(1, Ordering::SeqCst);
        let id = format!("{:032x}", n);
        let id = DocumentId::parse(&id)
            .map(String::from)
            .unwrap_or(id);
        let page = RemotePage {
            id: id.clone(),
            url: Some(format!("https://www.notion.so/{}", id)),
            created_time: None,
            last_edited_time: None,
            archived: false,
            properties,
        };
        // Newest first, like the remote's default ordering.
        self.pages.lock().insert(0, page.clone());
        self.blocks.lock().insert(id, children);
        Ok(page)
    }

    async fn get_page(&self, id: &DocumentId) -> Result<RemotePage, RemoteError> {
        self.call();
        self.pages
            .lock()
            .iter()
            .find(|p| p.id == id.as_str())
            .cloned()
            .ok_or_else(|| RemoteError::NotFound {
                message: format!("Could not find page with ID: {}.", id),
            })
    }

    async fn get_block_children(
        &self,
        id: &DocumentId,
        cursor: Option<&str>,
    ) -> Result<BlockPage, RemoteError> {
        self.call();
        let blocks = self.blocks.lock();
        let all = blocks.get(id.as_str()).ok_or_else(|| RemoteError::NotFound {
            message: format!("Could not find block with ID: {}.", id),
        })?;
        let start: usize = cursor.and_then(|c| c.parse().ok()).unwrap_or(0);
        let end = (start + self.page_size).min(all.len());
        Ok(BlockPage {
            results: all[start..end].to_vec(),
            next_cursor: (end < all.len()).then(|| end.to_string()),
            has_more: end < all.len(),
        })
    }

    async fn append_block_children(
        &self,
        id: &DocumentId,
        children: Vec<JsonValue>,
    ) -> Result<(), RemoteError> {
        self.call();
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.blocks
            .lock()
            .entry(id.as_str().to_string())
            .or_default()
            .extend(children);
        Ok(())
    }

    async fn query_database(
        &self,
        _request: &QueryRequest,
        cursor: Option<&str>,
    ) -> Result<QueryPage, RemoteError> {
        self.call();
        if !self.query_delay.is_zero() {
            tokio::time::sleep(self.query_delay).await;
        }
        let pages = self.pages.lock();
        let start: usize = cursor.and_then(|c| c.parse().ok()).unwrap_or(0);
        let end = (start + self.page_size).min(pages.len());
        Ok(QueryPage {
            results: pages[start..end].to_vec(),
            next_cursor: (end < pages.len()).then(|| end.to_string()),
            has_more: end < pages.len(),
        })
    }
}
