//! Search over the database.
//!
//! Title and category are sent to the remote as a filter; tags are matched
//! locally because the remote compares option names case-sensitively.
//! Results are drained across pages until the cap or the page budget is hit.

use std::collections::HashSet;

use serde::Serialize;
use serde_json::{json, Value as JsonValue};
use tracing::{debug, warn};

use crate::document::{DocumentRecord, SearchQuery, SortOrder};
use crate::error::RemoteError;
use crate::mapper::from_page;
use crate::remote::{QueryRequest, RemoteStore};
use crate::schema::SchemaDescriptor;

/// Largest per-call result cap a caller may ask for.
pub const MAX_LIMIT: usize = 100;

/// Pagination bounds for one search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchLimits {
    /// Results per remote page.
    pub page_size: u32,
    /// Cap applied when the query sets none.
    pub max_results: usize,
    /// Most remote pages read per search.
    pub max_pages: usize,
}

/// Why a result set is incomplete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum TruncationWarning {
    /// More documents matched than the cap allows.
    ResultCap {
        /// The cap that applied.
        cap: usize,
    },
    /// The page budget ran out while the remote still had results.
    PageBudget {
        /// Pages read.
        pages: usize,
    },
}

impl std::fmt::Display for TruncationWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TruncationWarning::ResultCap { cap } => {
                write!(f, "more than {} documents matched; showing the first {}", cap, cap)
            }
            TruncationWarning::PageBudget { pages } => write!(
                f,
                "stopped after {} result pages; more documents may match",
                pages
            ),
        }
    }
}

/// Outcome of a search.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct SearchResults {
    /// Matching documents, in result order.
    pub documents: Vec<DocumentRecord>,
    /// Set when the result is incomplete.
    pub truncation: Option<TruncationWarning>,
    /// Remote pages read.
    pub pages_read: usize,
}

impl SearchResults {
    /// Whether the result is incomplete.
    pub fn is_truncated(&self) -> bool {
        self.truncation.is_some()
    }
}

/// Builds the remote query body for a search.
pub fn build_request(query: &SearchQuery, schema: &SchemaDescriptor, page_size: u32) -> QueryRequest {
    let names = &schema.names;
    let mut filters: Vec<JsonValue> = Vec::new();

    if let Some(title) = query.title_text() {
        filters.push(json!({
            "property": names.title,
            "title": { "contains": title }
        }));
    }
    if let Some(category) = query.category() {
        filters.push(json!({
            "property": names.category,
            "select": { "equals": category.as_str() }
        }));
    }

    let filter = match filters.len() {
        0 => None,
        1 => filters.pop(),
        _ => Some(json!({ "and": filters })),
    };

    let sorts = match query.sort() {
        Some(order) => vec![json!({
            "property": names.created,
            "direction": match order {
                SortOrder::CreatedDescending => "descending",
                SortOrder::CreatedAscending => "ascending",
            }
        })],
        None => Vec::new(),
    };

    QueryRequest {
        filter,
        sorts,
        page_size,
    }
}

/// Runs a search, draining remote pages.
///
/// A failed page is retried by the remote client with its own cursor; an
/// error here means the whole search failed.
pub async fn search(
    remote: &dyn RemoteStore,
    schema: &SchemaDescriptor,
    query: &SearchQuery,
    limits: SearchLimits,
) -> Result<SearchResults, RemoteError> {
    let cap = query.limit().unwrap_or(limits.max_results).max(1);
    let max_pages = limits.max_pages.max(1);
    let request = build_request(query, schema, limits.page_size);

    let mut results = SearchResults::default();
    let mut seen: HashSet<String> = HashSet::new();
    let mut cursor: Option<String> = None;

    loop {
        let page = remote.query_database(&request, cursor.as_deref()).await?;
        results.pages_read += 1;
        debug!(
            page = results.pages_read,
            returned = page.results.len(),
            has_more = page.has_more,
            "Read query page"
        );

        for remote_page in &page.results {
            if remote_page.archived || !seen.insert(remote_page.id.clone()) {
                continue;
            }
            let record = from_page(remote_page, schema);
            if query.matches(&record) {
                results.documents.push(record);
            }
        }

        if results.documents.len() > cap {
            results.documents.truncate(cap);
            results.truncation = Some(TruncationWarning::ResultCap { cap });
            break;
        }

        match page.cursor() {
            Some(next) if results.pages_read >= max_pages => {
                debug!(cursor = next, "Page budget exhausted");
                results.truncation = Some(TruncationWarning::PageBudget {
                    pages: results.pages_read,
                });
                break;
            }
            Some(next) => cursor = Some(next.to_string()),
            None => break,
        }
    }

    if let Some(warning) = &results.truncation {
        warn!(%warning, returned = results.documents.len(), "Search results truncated");
    }
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PropertyNames;
    use crate::document::Category;
    use crate::mapper::to_remote;
    use crate::remote::fake::{valid_database, FakeRemote};
    use crate::schema::validate;

    fn schema() -> SchemaDescriptor {
        validate(&valid_database(&[]), &PropertyNames::default()).unwrap()
    }

    fn limits() -> SearchLimits {
        SearchLimits {
            page_size: 2,
            max_results: 100,
            max_pages: 50,
        }
    }

    async fn seed(remote: &FakeRemote, schema: &SchemaDescriptor, title: &str, tags: &[&str]) {
        let record = DocumentRecord::new(title, Category::Code)
            .with_tags(tags)
            .unwrap();
        remote
            .create_page(to_remote(&record, schema).unwrap(), Vec::new())
            .await
            .unwrap();
    }

    #[test]
    fn filter_combines_title_and_category() {
        let query = SearchQuery::title("intro")
            .category(Category::Tutorial)
            .tag("x")
            .build()
            .unwrap();
        let request = build_request(&query, &schema(), 100);
        assert_eq!(
            request.filter,
            Some(json!({ "and": [
                { "property": "Title", "title": { "contains": "intro" } },
                { "property": "Category", "select": { "equals": "Tutorial" } }
            ]}))
        );
        assert!(request.sorts.is_empty());
    }

    #[test]
    fn tag_only_query_has_no_remote_filter() {
        let query = SearchQuery::tag("x").sort(SortOrder::CreatedAscending).build().unwrap();
        let request = build_request(&query, &schema(), 100);
        assert_eq!(request.filter, None);
        assert_eq!(
            request.sorts,
            vec![json!({ "property": "Created", "direction": "ascending" })]
        );
    }

    #[tokio::test]
    async fn drains_every_page() {
        let remote = FakeRemote::new();
        let schema = schema();
        for i in 0..5 {
            seed(&remote, &schema, &format!("doc {}", i), &["rust"]).await;
        }

        let query = SearchQuery::tag("RUST").build().unwrap();
        let results = search(&remote, &schema, &query, limits()).await.unwrap();

        assert_eq!(results.documents.len(), 5);
        assert_eq!(results.pages_read, 3);
        assert_eq!(results.truncation, None);
        let ids: HashSet<_> = results.documents.iter().map(|d| d.id.clone()).collect();
        assert_eq!(ids.len(), 5);
    }

    #[tokio::test]
    async fn local_tag_filter_skips_non_matching() {
        let remote = FakeRemote::new();
        let schema = schema();
        seed(&remote, &schema, "a", &["rust"]).await;
        seed(&remote, &schema, "b", &["python"]).await;
        seed(&remote, &schema, "c", &["Rust", "async"]).await;

        let query = SearchQuery::tag("rust").build().unwrap();
        let results = search(&remote, &schema, &query, limits()).await.unwrap();
        let titles: Vec<_> = results.documents.iter().map(|d| d.title.as_str()).collect();
        assert_eq!(titles, vec!["c", "a"]);
    }

    #[tokio::test]
    async fn cap_truncates_with_warning() {
        let remote = FakeRemote::new();
        let schema = schema();
        for i in 0..5 {
            seed(&remote, &schema, &format!("doc {}", i), &["rust"]).await;
        }

        let query = SearchQuery::tag("rust").limit(3).build().unwrap();
        let results = search(&remote, &schema, &query, limits()).await.unwrap();
        assert_eq!(results.documents.len(), 3);
        assert_eq!(results.truncation, Some(TruncationWarning::ResultCap { cap: 3 }));
    }

    #[tokio::test]
    async fn exactly_cap_is_not_truncated() {
        let remote = FakeRemote::new();
        let schema = schema();
        for i in 0..4 {
            seed(&remote, &schema, &format!("doc {}", i), &["rust"]).await;
        }

        let query = SearchQuery::tag("rust").limit(4).build().unwrap();
        let results = search(&remote, &schema, &query, limits()).await.unwrap();
        assert_eq!(results.documents.len(), 4);
        assert!(!results.is_truncated());
    }

    #[tokio::test]
    async fn page_budget_is_reported() {
        let remote = FakeRemote::new();
        let schema = schema();
        for i in 0..5 {
            seed(&remote, &schema, &format!("doc {}", i), &["rust"]).await;
        }

        let query = SearchQuery::tag("rust").build().unwrap();
        let limits = SearchLimits {
            max_pages: 2,
            ..limits()
        };
        let results = search(&remote, &schema, &query, limits).await.unwrap();
        assert_eq!(results.documents.len(), 4);
        assert_eq!(results.truncation, Some(TruncationWarning::PageBudget { pages: 2 }));
    }

    #[tokio::test]
    async fn duplicates_across_pages_are_dropped() {
        let remote = FakeRemote::new();
        let schema = schema();
        seed(&remote, &schema, "a", &["rust"]).await;
        seed(&remote, &schema, "b", &["rust"]).await;
        {
            // A page shifting between cursors shows up twice.
            let mut pages = remote.pages.lock();
            let first = pages[0].clone();
            pages.push(first);
        }

        let query = SearchQuery::tag("rust").build().unwrap();
        let results = search(&remote, &schema, &query, limits()).await.unwrap();
        assert_eq!(results.documents.len(), 2);
        assert_eq!(results.pages_read, 2);
    }

    #[test]
    fn truncation_messages() {
        assert!(TruncationWarning::ResultCap { cap: 10 }
            .to_string()
            .contains("first 10"));
        assert_eq!(
            serde_json::to_value(TruncationWarning::PageBudget { pages: 3 }).unwrap(),
            json!({ "reason": "page_budget", "pages": 3 })
        );
    }
}
