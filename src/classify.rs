//! Classification of remote failures.
//!
//! Every non-success response is mapped to exactly one [`RemoteError`]
//! variant. Transport failures (no response at all) become `Transient`.

use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;
use serde::Deserialize;
use tracing::error;

use crate::error::RemoteError;

/// Error body returned by the remote API.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Maps an HTTP status and response body to a [`RemoteError`].
///
/// `retry_after` is the parsed `Retry-After` header, if any.
pub fn classify(status: u16, retry_after: Option<Duration>, body: &str) -> RemoteError {
    let parsed: Option<ErrorBody> = serde_json::from_str(body).ok();
    let message = parsed
        .as_ref()
        .and_then(|b| b.message.clone())
        .unwrap_or_else(|| body.trim().to_string());
    let code = parsed.as_ref().and_then(|b| b.code.as_deref());

    match status {
        401 => RemoteError::Unauthorized { message },
        404 => RemoteError::NotFound { message },
        400 => RemoteError::Validation {
            property: offending_property(&message),
            message,
        },
        429 => RemoteError::RateLimited {
            message,
            retry_after,
        },
        500..=599 => RemoteError::Transient {
            message: format!("status {} ({}): {}", status, code.unwrap_or("server_error"), message),
        },
        _ => {
            error!(status, body, "Unclassified remote failure");
            RemoteError::Unknown {
                status,
                body: body.to_string(),
            }
        }
    }
}

/// Maps a transport failure (no usable response) to a [`RemoteError`].
pub fn classify_transport(err: &reqwest::Error) -> RemoteError {
    let what = if err.is_timeout() {
        "request timed out"
    } else if err.is_connect() {
        "connection failed"
    } else {
        "request failed"
    };
    RemoteError::Transient {
        message: format!("{}: {}", what, err),
    }
}

/// Parses a `Retry-After` header given in seconds.
pub fn parse_retry_after(value: Option<&str>) -> Option<Duration> {
    value
        .and_then(|v| v.trim().parse::<f64>().ok())
        .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
}

/// Extracts the property name a validation message complains about.
///
/// Recognises `body.properties.<Name>.…` paths and messages that start with
/// the property name (`Tags is expected to be multi_select.`,
/// `Colour is not a property that exists.`).
pub fn offending_property(message: &str) -> Option<String> {
    static PATH: OnceLock<Regex> = OnceLock::new();
    static LEADING: OnceLock<Regex> = OnceLock::new();

    let path = PATH.get_or_init(|| Regex::new(r"properties\.([^.\s]+)").expect("static regex"));
    if let Some(caps) = path.captures(message) {
        return Some(caps[1].to_string());
    }

    let leading = LEADING.get_or_init(|| {
        Regex::new(r"^(.+?) (?:is expected to be|is not a property that exists|should be)")
            .expect("static regex")
    });
    leading
        .captures(message)
        .map(|caps| caps[1].trim().to_string())
}
