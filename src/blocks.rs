//! Page body blocks.
//!
//! Tool callers send and receive plain text. Text is split into blocks with a
//! small markdown-like notation and rendered back with the same notation:
//!
//! | Text | Block |
//! |------|-------|
//! | `# `, `## `, `### ` | heading 1–3 |
//! | `- ` or `* ` | bulleted item |
//! | `1. ` | numbered item |
//! | `> ` | quote |
//! | ```` ```lang ```` fences | code |
//! | `---` | divider |
//! | anything else | paragraph (blank line separated) |

use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};

/// Maximum characters in one rich-text segment.
pub const MAX_RICH_TEXT_CHARS: usize = 2000;

/// Maximum rich-text segments in one block.
pub const MAX_RICH_TEXT_SEGMENTS: usize = 100;

/// Most text one block can carry.
pub const MAX_BLOCK_TEXT_CHARS: usize = MAX_RICH_TEXT_CHARS * MAX_RICH_TEXT_SEGMENTS;

/// Language used for code blocks without a recognised language.
pub const PLAIN_TEXT_LANGUAGE: &str = "plain text";

// Subset of the remote's code language enum that callers commonly use.
const CODE_LANGUAGES: &[&str] = &[
    "bash", "c", "c#", "c++", "css", "diff", "docker", "go", "graphql", "html", "java",
    "javascript", "json", "kotlin", "lua", "makefile", "markdown", "python", "ruby", "rust",
    "scala", "shell", "sql", "swift", "toml", "typescript", "yaml",
];

/// One unit of page body content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    /// Plain paragraph.
    Paragraph {
        /// Text content.
        text: String,
    },
    /// Heading, level 1 to 3.
    Heading {
        /// Heading level.
        level: u8,
        /// Text content.
        text: String,
    },
    /// Bulleted list item.
    BulletedItem {
        /// Text content.
        text: String,
    },
    /// Numbered list item.
    NumberedItem {
        /// Text content.
        text: String,
    },
    /// Quotation.
    Quote {
        /// Text content.
        text: String,
    },
    /// Code listing.
    Code {
        /// Remote language name.
        language: String,
        /// Source text.
        text: String,
    },
    /// Horizontal rule.
    Divider,
    /// A remote block kind this crate does not model.
    Unsupported {
        /// Remote block type.
        kind: String,
    },
}

impl Block {
    /// Paragraph block.
    pub fn paragraph(text: impl Into<String>) -> Self {
        Block::Paragraph { text: text.into() }
    }

    /// Heading block, level clamped to 1..=3.
    pub fn heading(level: u8, text: impl Into<String>) -> Self {
        Block::Heading {
            level: level.clamp(1, 3),
            text: text.into(),
        }
    }

    /// Code block; unknown languages fall back to plain text.
    pub fn code(language: &str, text: impl Into<String>) -> Self {
        Block::Code {
            language: normalize_language(language),
            text: text.into(),
        }
    }

    /// Text carried by the block, if it has any.
    pub fn text(&self) -> Option<&str> {
        match self {
            Block::Paragraph { text }
            | Block::Heading { text, .. }
            | Block::BulletedItem { text }
            | Block::NumberedItem { text }
            | Block::Quote { text }
            | Block::Code { text, .. } => Some(text),
            Block::Divider | Block::Unsupported { .. } => None,
        }
    }

    fn with_text(&self, text: String) -> Self {
        match self {
            Block::Paragraph { .. } => Block::Paragraph { text },
            Block::Heading { level, .. } => Block::Heading { level: *level, text },
            Block::BulletedItem { .. } => Block::BulletedItem { text },
            Block::NumberedItem { .. } => Block::NumberedItem { text },
            Block::Quote { .. } => Block::Quote { text },
            Block::Code { language, .. } => Block::Code {
                language: language.clone(),
                text,
            },
            other => other.clone(),
        }
    }

    /// Splits a block whose text exceeds [`MAX_BLOCK_TEXT_CHARS`] into
    /// consecutive blocks of the same kind. No text is dropped.
    pub fn split_oversized(&self) -> Vec<Block> {
        let Some(text) = self.text() else {
            return vec![self.clone()];
        };
        if text.chars().count() <= MAX_BLOCK_TEXT_CHARS {
            return vec![self.clone()];
        }
        let chars: Vec<char> = text.chars().collect();
        chars
            .chunks(MAX_BLOCK_TEXT_CHARS)
            .map(|chunk| self.with_text(chunk.iter().collect()))
            .collect()
    }

    /// Encodes the block in the remote wire format.
    ///
    /// `Unsupported` blocks have no wire form and yield `None`.
    pub fn to_remote(&self) -> Option<JsonValue> {
        let (kind, body) = match self {
            Block::Paragraph { text } => ("paragraph", json!({ "rich_text": rich_text(text) })),
            Block::Heading { level, text } => {
                let kind = match level {
                    1 => "heading_1",
                    2 => "heading_2",
                    _ => "heading_3",
                };
                (kind, json!({ "rich_text": rich_text(text) }))
            }
            Block::BulletedItem { text } => (
                "bulleted_list_item",
                json!({ "rich_text": rich_text(text) }),
            ),
            Block::NumberedItem { text } => (
                "numbered_list_item",
                json!({ "rich_text": rich_text(text) }),
            ),
            Block::Quote { text } => ("quote", json!({ "rich_text": rich_text(text) })),
            Block::Code { language, text } => (
                "code",
                json!({ "rich_text": rich_text(text), "language": language }),
            ),
            Block::Divider => ("divider", json!({})),
            Block::Unsupported { .. } => return None,
        };
        Some(json!({ "object": "block", "type": kind, kind: body }))
    }

    /// Decodes a block from the remote wire format.
    pub fn from_remote(value: &JsonValue) -> Self {
        let kind = value.get("type").and_then(|t| t.as_str()).unwrap_or("");
        let body = value.get(kind);
        let text = || body.map(plain_text).unwrap_or_default();
        match kind {
            "paragraph" => Block::Paragraph { text: text() },
            "heading_1" => Block::heading(1, text()),
            "heading_2" => Block::heading(2, text()),
            "heading_3" => Block::heading(3, text()),
            "bulleted_list_item" => Block::BulletedItem { text: text() },
            "numbered_list_item" => Block::NumberedItem { text: text() },
            "quote" => Block::Quote { text: text() },
            "code" => Block::Code {
                language: body
                    .and_then(|b| b.get("language"))
                    .and_then(|l| l.as_str())
                    .unwrap_or(PLAIN_TEXT_LANGUAGE)
                    .to_string(),
                text: text(),
            },
            "divider" => Block::Divider,
            other => Block::Unsupported {
                kind: other.to_string(),
            },
        }
    }
}

fn normalize_language(language: &str) -> String {
    let lang = language.trim().to_lowercase();
    let lang = match lang.as_str() {
        "rs" => "rust",
        "py" => "python",
        "js" => "javascript",
        "ts" => "typescript",
        "sh" | "zsh" => "shell",
        "yml" => "yaml",
        "md" => "markdown",
        other => other,
    };
    if CODE_LANGUAGES.contains(&lang) {
        lang.to_string()
    } else {
        PLAIN_TEXT_LANGUAGE.to_string()
    }
}

/// Splits text into rich-text segments of at most [`MAX_RICH_TEXT_CHARS`].
pub fn rich_text(text: &str) -> JsonValue {
    let chars: Vec<char> = text.chars().collect();
    if chars.is_empty() {
        return JsonValue::Array(vec![]);
    }
    let segments = chars
        .chunks(MAX_RICH_TEXT_CHARS)
        .map(|chunk| {
            let content: String = chunk.iter().collect();
            json!({ "type": "text", "text": { "content": content } })
        })
        .collect();
    JsonValue::Array(segments)
}

/// Concatenates the text of a `rich_text` (or `title`) array holder.
///
/// Reads `plain_text` and falls back to `text.content`.
pub fn plain_text(holder: &JsonValue) -> String {
    let items = holder
        .get("rich_text")
        .or_else(|| holder.get("title"))
        .unwrap_or(holder);
    items
        .as_array()
        .map(|arr| arr.iter().map(segment_text).collect())
        .unwrap_or_default()
}

fn segment_text(segment: &JsonValue) -> &str {
    segment
        .get("plain_text")
        .and_then(|t| t.as_str())
        .or_else(|| {
            segment
                .get("text")
                .and_then(|t| t.get("content"))
                .and_then(|c| c.as_str())
        })
        .unwrap_or("")
}

/// Parses plain text into blocks.
pub fn parse_text(text: &str) -> Vec<Block> {
    let mut blocks = Vec::new();
    let mut paragraph: Vec<&str> = Vec::new();
    let mut code: Option<(String, Vec<&str>)> = None;

    fn flush(paragraph: &mut Vec<&str>, blocks: &mut Vec<Block>) {
        if !paragraph.is_empty() {
            blocks.push(Block::paragraph(paragraph.join("\n")));
            paragraph.clear();
        }
    }

    for line in text.lines() {
        if let Some((language, lines)) = code.as_mut() {
            if line.trim_start().starts_with("```") {
                blocks.push(Block::code(language, lines.join("\n")));
                code = None;
            } else {
                lines.push(line);
            }
            continue;
        }

        let trimmed = line.trim();
        if let Some(language) = trimmed.strip_prefix("```") {
            flush(&mut paragraph, &mut blocks);
            code = Some((language.trim().to_string(), Vec::new()));
        } else if trimmed.is_empty() {
            flush(&mut paragraph, &mut blocks);
        } else if trimmed == "---" {
            flush(&mut paragraph, &mut blocks);
            blocks.push(Block::Divider);
        } else if let Some((level, rest)) = heading(trimmed) {
            flush(&mut paragraph, &mut blocks);
            blocks.push(Block::heading(level, rest));
        } else if let Some(rest) = trimmed
            .strip_prefix("- ")
            .or_else(|| trimmed.strip_prefix("* "))
        {
            flush(&mut paragraph, &mut blocks);
            blocks.push(Block::BulletedItem {
                text: rest.to_string(),
            });
        } else if let Some(rest) = numbered(trimmed) {
            flush(&mut paragraph, &mut blocks);
            blocks.push(Block::NumberedItem {
                text: rest.to_string(),
            });
        } else if let Some(rest) = trimmed.strip_prefix("> ") {
            flush(&mut paragraph, &mut blocks);
            blocks.push(Block::Quote {
                text: rest.to_string(),
            });
        } else {
            paragraph.push(line.trim_end());
        }
    }

    // Unterminated fence keeps its content.
    if let Some((language, lines)) = code {
        blocks.push(Block::code(&language, lines.join("\n")));
    }
    flush(&mut paragraph, &mut blocks);
    blocks
}

fn heading(line: &str) -> Option<(u8, &str)> {
    let hashes = line.chars().take_while(|c| *c == '#').count();
    if (1..=3).contains(&hashes) {
        line[hashes..].strip_prefix(' ').map(|rest| (hashes as u8, rest.trim()))
    } else {
        None
    }
}

fn numbered(line: &str) -> Option<&str> {
    let digits = line.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits == 0 {
        return None;
    }
    line[digits..].strip_prefix(". ")
}

/// Renders blocks back to text. Unsupported blocks are skipped.
pub fn render_text(blocks: &[Block]) -> String {
    let mut parts = Vec::with_capacity(blocks.len());
    let mut number = 0;
    for block in blocks {
        if !matches!(block, Block::NumberedItem { .. }) {
            number = 0;
        }
        let part = match block {
            Block::Paragraph { text } => text.clone(),
            Block::Heading { level, text } => {
                format!("{} {}", "#".repeat(*level as usize), text)
            }
            Block::BulletedItem { text } => format!("- {}", text),
            Block::NumberedItem { text } => {
                number += 1;
                format!("{}. {}", number, text)
            }
            Block::Quote { text } => format!("> {}", text),
            Block::Code { language, text } => {
                let lang = if language == PLAIN_TEXT_LANGUAGE {
                    ""
                } else {
                    language.as_str()
                };
                format!("```{}\n{}\n```", lang, text)
            }
            Block::Divider => "---".to_string(),
            Block::Unsupported { .. } => continue,
        };
        parts.push(part);
    }
    parts.join("\n\n")
}
