//! Error classification shared by every HTTP provider

use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{Response, StatusCode};
use shelfmark_core::LlmError;
use std::time::Duration;
use tracing::warn;

/// Maps a `reqwest` send/receive failure onto the transport class
pub(crate) fn transport_error(vendor: &str, error: reqwest::Error) -> LlmError {
    if error.is_timeout() {
        LlmError::Transport(format!("{vendor} request timed out: {error}"))
    } else {
        LlmError::Transport(format!("{vendor} request failed: {error}"))
    }
}

fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

/// Returns the response if successful, otherwise a classified error
pub(crate) async fn check_status(vendor: &str, response: Response) -> Result<Response, LlmError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    if status == StatusCode::TOO_MANY_REQUESTS {
        return Err(LlmError::RateLimited {
            retry_after: retry_after(response.headers()),
        });
    }

    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());
    Err(LlmError::Api {
        status: status.as_u16(),
        message: format!("{vendor} API error: {body}"),
    })
}

/// Deserializes a JSON body, classifying failures as malformed responses
pub(crate) async fn parse_json<T: serde::de::DeserializeOwned>(
    vendor: &str,
    response: Response,
) -> Result<T, LlmError> {
    let text = response
        .text()
        .await
        .map_err(|e| transport_error(vendor, e))?;
    serde_json::from_str(&text).map_err(|e| {
        LlmError::MalformedResponse(format!("{vendor}: failed to parse response: {e}"))
    })
}

/// One line of a batch results file
#[derive(Debug)]
pub(crate) enum JsonlLine<T> {
    Parsed(T),
    /// The line names its sub-request but does not match the expected shape
    Unreadable { custom_id: String, error: String },
}

/// Parses newline-delimited batch results one line at a time
///
/// A line that fails to deserialize still yields its `custom_id` when it has
/// one, so the caller can fail that sub-request alone. Lines without a usable
/// `custom_id` are dropped with a warning; their sub-requests end up missing.
pub(crate) fn parse_jsonl<T: serde::de::DeserializeOwned>(
    vendor: &str,
    body: &str,
) -> Vec<JsonlLine<T>> {
    body.lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| match serde_json::from_str::<T>(line) {
            Ok(parsed) => Some(JsonlLine::Parsed(parsed)),
            Err(error) => {
                let custom_id = serde_json::from_str::<serde_json::Value>(line)
                    .ok()
                    .and_then(|value| value.get("custom_id")?.as_str().map(str::to_string));
                match custom_id {
                    Some(custom_id) => {
                        warn!(vendor, %custom_id, %error, "Unreadable batch result line");
                        Some(JsonlLine::Unreadable {
                            custom_id,
                            error: format!("{vendor}: unreadable result: {error}"),
                        })
                    }
                    None => {
                        warn!(vendor, %error, "Dropping batch result line without a custom_id");
                        None
                    }
                }
            }
        })
        .collect()
}
