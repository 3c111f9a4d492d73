//! Store configuration.

use std::fmt;
use std::time::Duration;

use crate::error::{StoreError, StoreResult};

/// Default Notion API base URL.
pub const DEFAULT_BASE_URL: &str = "https://api.notion.com/v1";

/// Default Notion API version header value.
pub const DEFAULT_API_VERSION: &str = "2022-06-28";

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Maximum page size the remote accepts for queries and block listings.
pub const MAX_PAGE_SIZE: u32 = 100;

/// Configuration for the document store.
#[derive(Clone)]
pub struct StoreConfig {
    /// Integration secret sent as the bearer credential.
    pub token: String,
    /// Target database id.
    pub database_id: String,
    /// Value of the `Notion-Version` header.
    pub api_version: String,
    /// API base URL (overridable for tests and proxies).
    pub base_url: String,
    /// Timeout for each HTTP request.
    pub timeout: Duration,
    /// Timeout for the health probe.
    pub health_timeout: Duration,
    /// Retry policy for transient failures.
    pub retry: RetryConfig,
    /// Page size for database queries.
    pub page_size: u32,
    /// Default cap on search results.
    pub max_results: usize,
    /// Maximum number of query pages read per search.
    pub max_pages: usize,
    /// Names of the required database properties.
    pub properties: PropertyNames,
}

impl StoreConfig {
    /// Creates a configuration with defaults for everything but the credentials.
    ///
    /// Fails if the token or database id is empty.
    pub fn new(token: impl Into<String>, database_id: impl Into<String>) -> StoreResult<Self> {
        let token = token.into().trim().to_string();
        let database_id = database_id.into().trim().to_string();
        if token.is_empty() {
            return Err(StoreError::Config(
                "integration token is required".to_string(),
            ));
        }
        if database_id.is_empty() {
            return Err(StoreError::Config("database id is required".to_string()));
        }
        Ok(Self {
            token,
            database_id,
            api_version: DEFAULT_API_VERSION.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
            health_timeout: Duration::from_secs(10),
            retry: RetryConfig::default(),
            page_size: MAX_PAGE_SIZE,
            max_results: 100,
            max_pages: 50,
            properties: PropertyNames::default(),
        })
    }

    /// Sets the API version.
    pub fn with_api_version(mut self, version: impl Into<String>) -> Self {
        self.api_version = version.into();
        self
    }

    /// Sets the API base URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Sets the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the retry configuration.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Sets the query page size, clamped to `1..=100`.
    pub fn with_page_size(mut self, size: u32) -> Self {
        self.page_size = size.clamp(1, MAX_PAGE_SIZE);
        self
    }

    /// Sets the default search result cap.
    pub fn with_max_results(mut self, max: usize) -> Self {
        self.max_results = max.max(1);
        self
    }

    /// Sets the page budget per search.
    pub fn with_max_pages(mut self, max: usize) -> Self {
        self.max_pages = max.max(1);
        self
    }

    /// Sets the required property names.
    pub fn with_properties(mut self, properties: PropertyNames) -> Self {
        self.properties = properties;
        self
    }
}

impl fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreConfig")
            .field("token", &"<redacted>")
            .field("database_id", &self.database_id)
            .field("api_version", &self.api_version)
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .field("health_timeout", &self.health_timeout)
            .field("retry", &self.retry)
            .field("page_size", &self.page_size)
            .field("max_results", &self.max_results)
            .field("max_pages", &self.max_pages)
            .field("properties", &self.properties)
            .finish()
    }
}

/// Names of the five properties the database must declare.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyNames {
    /// Title property.
    pub title: String,
    /// Category select.
    pub category: String,
    /// Tags multi-select.
    pub tags: String,
    /// Source URL.
    pub url: String,
    /// Creation date.
    pub created: String,
}

impl Default for PropertyNames {
    fn default() -> Self {
        Self {
            title: "Title".to_string(),
            category: "Category".to_string(),
            tags: "Tags".to_string(),
            url: "URL".to_string(),
            created: "Created".to_string(),
        }
    }
}

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Upper bound for any single delay.
    pub max_delay: Duration,
}

impl RetryConfig {
    /// Creates a retry configuration with the given retry count.
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
        }
    }

    /// Creates a configuration with no retries.
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    /// Sets the initial delay.
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Sets the maximum delay.
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Delay before retry number `retry` (0-indexed): `initial * 2^retry`, capped.
    pub fn delay_for_retry(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry.min(16));
        self.initial_delay
            .saturating_mul(factor)
            .min(self.max_delay)
    }

    /// Delay honoring a server hint, still capped.
    pub fn delay_with_hint(&self, retry: u32, hint: Option<Duration>) -> Duration {
        match hint {
            Some(hint) => hint.min(self.max_delay),
            None => self.delay_for_retry(retry),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::new(3)
    }
}
