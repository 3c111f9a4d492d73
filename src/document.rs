//! Document records and search queries.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::blocks::Block;
use crate::error::CallerError;

/// Maximum title length in characters.
pub const MAX_TITLE_CHARS: usize = 200;

/// Document category.
///
/// The five named variants are the categories every database must declare.
/// `Other` carries an extra option the database declares beyond those.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum Category {
    /// Uncategorized documents.
    #[default]
    General,
    /// Code snippets and source listings.
    Code,
    /// Step-by-step guides.
    Tutorial,
    /// Reference material.
    Reference,
    /// Processes and methods.
    Methodology,
    /// An additional option declared by the database.
    Other(String),
}

impl Category {
    /// The categories the database must declare.
    pub const DEFAULTS: [Category; 5] = [
        Category::General,
        Category::Code,
        Category::Tutorial,
        Category::Reference,
        Category::Methodology,
    ];

    /// Option name as stored remotely.
    pub fn as_str(&self) -> &str {
        match self {
            Category::General => "General",
            Category::Code => "Code",
            Category::Tutorial => "Tutorial",
            Category::Reference => "Reference",
            Category::Methodology => "Methodology",
            Category::Other(name) => name,
        }
    }

    /// Parses an option name, mapping unknown names to `Other`.
    ///
    /// Matching of the default names is case-insensitive.
    pub fn from_remote_name(name: &str) -> Self {
        name.parse()
            .unwrap_or_else(|_| Category::Other(name.to_string()))
    }

    /// Returns true for the five default categories.
    pub fn is_default(&self) -> bool {
        !matches!(self, Category::Other(_))
    }
}

impl FromStr for Category {
    type Err = CallerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "general" => Ok(Category::General),
            "code" => Ok(Category::Code),
            "tutorial" => Ok(Category::Tutorial),
            "reference" => Ok(Category::Reference),
            "methodology" => Ok(Category::Methodology),
            _ => Err(CallerError::InvalidCategory(s.to_string())),
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Category {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Category {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        Ok(Category::from_remote_name(&name))
    }
}

/// Remote page identifier.
///
/// Stored in canonical dashed form (8-4-4-4-12, lowercase).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DocumentId(String);

impl DocumentId {
    /// Parses a page id, with or without dashes.
    pub fn parse(raw: &str) -> Result<Self, CallerError> {
        let compact: String = raw.trim().chars().filter(|c| *c != '-').collect();
        if compact.len() != 32 || !compact.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(CallerError::InvalidPageId(raw.to_string()));
        }
        let compact = compact.to_ascii_lowercase();
        Ok(Self(format!(
            "{}-{}-{}-{}-{}",
            &compact[..8],
            &compact[8..12],
            &compact[12..16],
            &compact[16..20],
            &compact[20..]
        )))
    }

    /// Dashed id.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Direct link to the page in the Notion web app.
    pub fn page_url(&self) -> String {
        format!("https://www.notion.so/{}", self.0)
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for DocumentId {
    type Error = CallerError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<DocumentId> for String {
    fn from(id: DocumentId) -> Self {
        id.0
    }
}

/// A document stored in the database.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DocumentRecord {
    /// Remote page id, absent until created.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<DocumentId>,
    /// Document title.
    pub title: String,
    /// Document category.
    #[serde(default)]
    pub category: Category,
    /// Tags, an open vocabulary.
    #[serde(default)]
    pub tags: BTreeSet<String>,
    /// Source URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Creation timestamp; mapping fills in "now" when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,
    /// Page body.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub body: Vec<Block>,
}

impl DocumentRecord {
    /// Creates a record with a title and category.
    pub fn new(title: impl Into<String>, category: Category) -> Self {
        Self {
            title: title.into(),
            category,
            ..Default::default()
        }
    }

    /// Adds tags, normalized with [`normalize_tags`].
    pub fn with_tags<I, S>(mut self, tags: I) -> Result<Self, CallerError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.tags.extend(normalize_tags(tags)?);
        Ok(self)
    }

    /// Sets the source URL.
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Sets the creation timestamp.
    pub fn with_created(mut self, created: DateTime<Utc>) -> Self {
        self.created = Some(created);
        self
    }

    /// Sets the body.
    pub fn with_body(mut self, body: Vec<Block>) -> Self {
        self.body = body;
        self
    }

    /// Checks title constraints.
    pub fn validate_title(&self) -> Result<(), CallerError> {
        let title = self.title.trim();
        if title.is_empty() {
            return Err(CallerError::EmptyTitle);
        }
        let len = title.chars().count();
        if len > MAX_TITLE_CHARS {
            return Err(CallerError::TitleTooLong {
                len,
                max: MAX_TITLE_CHARS,
            });
        }
        Ok(())
    }

    /// Case-insensitive tag membership.
    pub fn has_tag(&self, tag: &str) -> bool {
        let wanted = tag.trim().to_lowercase();
        self.tags.iter().any(|t| t.to_lowercase() == wanted)
    }
}

/// Normalizes tags: trims, drops blanks, collapses duplicates.
///
/// Commas are rejected; multi-select option names cannot contain them.
pub fn normalize_tags<I, S>(tags: I) -> Result<BTreeSet<String>, CallerError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out = BTreeSet::new();
    for tag in tags {
        let tag = tag.as_ref().trim();
        if tag.is_empty() {
            continue;
        }
        if tag.contains(',') {
            return Err(CallerError::InvalidTag {
                tag: tag.to_string(),
                reason: "tags cannot contain commas".to_string(),
            });
        }
        out.insert(tag.to_string());
    }
    Ok(out)
}

/// Explicit ordering for search results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    /// Newest first by creation date.
    CreatedDescending,
    /// Oldest first by creation date.
    CreatedAscending,
}

impl FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "created_desc" | "created_descending" | "newest" => Ok(SortOrder::CreatedDescending),
            "created_asc" | "created_ascending" | "oldest" => Ok(SortOrder::CreatedAscending),
            other => Err(format!(
                "unknown sort '{}', expected created_desc or created_asc",
                other
            )),
        }
    }
}

/// A search over the database. Built per call, never mutated after `build`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SearchQuery {
    title: Option<String>,
    tags: Vec<String>,
    category: Option<Category>,
    sort: Option<SortOrder>,
    limit: Option<usize>,
}

impl SearchQuery {
    /// Matches titles containing `text`, case-insensitively.
    pub fn title(text: impl Into<String>) -> SearchQueryBuilder {
        SearchQueryBuilder::default().title(text)
    }

    /// Matches documents carrying `tag`.
    pub fn tag(tag: impl Into<String>) -> SearchQueryBuilder {
        SearchQueryBuilder::default().tag(tag)
    }

    /// Starts an empty builder.
    pub fn builder() -> SearchQueryBuilder {
        SearchQueryBuilder::default()
    }

    /// Title substring, if any.
    pub fn title_text(&self) -> Option<&str> {
        self.title.as_deref()
    }

    /// Required tags.
    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    /// Category filter, if any.
    pub fn category(&self) -> Option<&Category> {
        self.category.as_ref()
    }

    /// Explicit ordering, if any.
    pub fn sort(&self) -> Option<SortOrder> {
        self.sort
    }

    /// Per-call result cap, if any.
    pub fn limit(&self) -> Option<usize> {
        self.limit
    }

    /// Local match on the criteria the remote filter cannot express exactly.
    pub fn matches(&self, record: &DocumentRecord) -> bool {
        if let Some(title) = &self.title {
            if !record.title.to_lowercase().contains(&title.to_lowercase()) {
                return false;
            }
        }
        if let Some(category) = &self.category {
            if &record.category != category {
                return false;
            }
        }
        self.tags.iter().all(|t| record.has_tag(t))
    }
}

/// Builder for [`SearchQuery`].
#[derive(Debug, Clone, Default)]
pub struct SearchQueryBuilder {
    query: SearchQuery,
}

impl SearchQueryBuilder {
    /// Sets the title substring.
    pub fn title(mut self, text: impl Into<String>) -> Self {
        self.query.title = Some(text.into());
        self
    }

    /// Adds a required tag.
    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.query.tags.push(tag.into());
        self
    }

    /// Restricts to a category.
    pub fn category(mut self, category: Category) -> Self {
        self.query.category = Some(category);
        self
    }

    /// Requests an explicit ordering.
    pub fn sort(mut self, sort: SortOrder) -> Self {
        self.query.sort = Some(sort);
        self
    }

    /// Caps the number of results for this call.
    pub fn limit(mut self, limit: usize) -> Self {
        self.query.limit = Some(limit);
        self
    }

    /// Validates and returns the query.
    pub fn build(self) -> Result<SearchQuery, CallerError> {
        let mut query = self.query;
        query.title = query
            .title
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());
        query.tags = normalize_tags(&query.tags)?.into_iter().collect();

        if query.title.is_none() && query.tags.is_empty() && query.category.is_none() {
            return Err(CallerError::EmptyQuery);
        }
        if let Some(limit) = query.limit {
            if limit == 0 || limit > crate::query::MAX_LIMIT {
                return Err(CallerError::InvalidLimit(limit));
            }
        }
        Ok(query)
    }
}
