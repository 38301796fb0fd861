//! HTTP plumbing shared by the REST sources.

use std::time::Duration;

use crate::error::{Error, Result};

/// User agent sent with every source request.
pub const USER_AGENT: &str = concat!("wsync/", env!("CARGO_PKG_VERSION"));

/// Per-request timeout.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Longest slice of an error body echoed into error messages.
const BODY_SNIPPET_CHARS: usize = 200;

/// Build the HTTP client for a source.
///
/// # Errors
///
/// Returns `SourceUnavailable` if the TLS backend cannot be initialised.
pub fn client(source_name: &str) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(REQUEST_TIMEOUT)
        .build()
        .map_err(|e| Error::source_unavailable(source_name, format!("cannot build HTTP client: {e}")))
}

/// Send a request and decode its JSON body.
///
/// # Errors
///
/// Network failures, non-2xx statuses and undecodable bodies all come back
/// as `SourceUnavailable`.
pub async fn send_json(
    source_name: &str,
    request: reqwest::RequestBuilder,
) -> Result<serde_json::Value> {
    let response = request
        .send()
        .await
        .map_err(|e| Error::source_unavailable(source_name, format!("request failed: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(Error::source_unavailable(
            source_name,
            format!("HTTP {status}: {}", snippet(&body)),
        ));
    }

    response
        .json()
        .await
        .map_err(|e| Error::source_unavailable(source_name, format!("malformed response body: {e}")))
}

/// Trim an error body to something fit for a log line.
fn snippet(body: &str) -> &str {
    let body = body.trim();
    match body.char_indices().nth(BODY_SNIPPET_CHARS) {
        Some((idx, _)) => &body[..idx],
        None => body,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snippet_truncates_on_char_boundary() {
        let long = "é".repeat(500);
        let s = snippet(&long);
        assert_eq!(s.chars().count(), BODY_SNIPPET_CHARS);

        assert_eq!(snippet("  short body \n"), "short body");
    }

    #[test]
    fn test_client_builds() {
        assert!(client("test").is_ok());
    }
}
