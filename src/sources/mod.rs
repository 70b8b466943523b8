//! Upstream HTTP clients and the shared request plumbing they sit on.

use std::borrow::Cow;
use std::sync::OnceLock;
use std::time::Duration;

use reqwest::header::{ACCEPT, HeaderValue};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware, RequestBuilder};
use reqwest_retry::{RetryTransientMiddleware, policies::ExponentialBackoff};
use serde::de::DeserializeOwned;
use tracing::warn;

use crate::error::RepurposeError;

pub(crate) mod clinicaltrials;
pub(crate) mod mychem;
pub(crate) mod pubchem;
pub(crate) mod rate_limit;

const ERROR_BODY_MAX_BYTES: usize = 2048;
pub(crate) const DEFAULT_MAX_BODY_BYTES: usize = 8 * 1024 * 1024;
const MAX_RETRIES: u32 = 2;

static HTTP_CLIENT: OnceLock<ClientWithMiddleware> = OnceLock::new();

pub(crate) fn env_base(default: &'static str, env_var: &str) -> Cow<'static, str> {
    crate::config::env_value(env_var)
        .map(Cow::Owned)
        .unwrap_or_else(|| Cow::Borrowed(default))
}

pub(crate) fn join_endpoint(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// Returns a shared HTTP client with retry and rate-limit middleware.
///
/// - Retry: 2 retries with exponential backoff for transient errors
/// - Rate limit: per-upstream minimum spacing between requests
pub(crate) fn shared_client() -> Result<ClientWithMiddleware, RepurposeError> {
    if let Some(client) = HTTP_CLIENT.get() {
        return Ok(client.clone());
    }

    let base_client = reqwest::Client::builder()
        .timeout(Duration::from_secs(15))
        .connect_timeout(Duration::from_secs(5))
        .user_agent(concat!("repurpose/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(RepurposeError::HttpClientInit)?;

    let retry_policy = ExponentialBackoff::builder().build_with_max_retries(MAX_RETRIES);

    let client = ClientBuilder::new(base_client)
        .with(RetryTransientMiddleware::new_with_policy(retry_policy))
        .with(rate_limit::RateLimitMiddleware::new())
        .build();

    match HTTP_CLIENT.set(client.clone()) {
        Ok(()) => Ok(client),
        Err(_) => HTTP_CLIENT.get().cloned().ok_or_else(|| RepurposeError::Api {
            api: "http-client".into(),
            message: "Shared HTTP client initialization race".into(),
        }),
    }
}

pub(crate) fn body_excerpt(bytes: &[u8]) -> String {
    let full = String::from_utf8_lossy(bytes);

    let truncated: &str = if full.len() > ERROR_BODY_MAX_BYTES {
        let mut end = ERROR_BODY_MAX_BYTES;
        while end > 0 && !full.is_char_boundary(end) {
            end -= 1;
        }
        &full[..end]
    } else {
        full.as_ref()
    };

    let mut s = truncated.trim().replace(['\n', '\r', '\t'], " ");
    if full.len() > ERROR_BODY_MAX_BYTES {
        s.push_str(" …");
    }
    s
}

pub(crate) fn ensure_json_content_type(
    api: &str,
    content_type: Option<&HeaderValue>,
    body: &[u8],
) -> Result<(), RepurposeError> {
    let Some(content_type) = content_type else {
        return Ok(());
    };

    let raw = match content_type.to_str() {
        Ok(v) => v.trim(),
        Err(_) => {
            warn!(
                source = api,
                "Response content-type header was not valid UTF-8; attempting JSON parse"
            );
            return Ok(());
        }
    };
    if raw.is_empty() {
        return Ok(());
    }

    let media_type = raw
        .split(';')
        .next()
        .map(str::trim)
        .unwrap_or_default()
        .to_ascii_lowercase();
    if matches!(media_type.as_str(), "text/html" | "application/xhtml+xml") {
        return Err(RepurposeError::Api {
            api: api.to_string(),
            message: format!(
                "Unexpected HTML response (content-type: {raw}): {}",
                body_excerpt(body)
            ),
        });
    }

    let is_json = media_type == "application/json"
        || media_type == "text/json"
        || media_type.ends_with("+json");
    if !is_json {
        warn!(
            source = api,
            content_type = raw,
            "Unexpected non-JSON content type; attempting JSON parse for compatibility"
        );
    }

    Ok(())
}

pub(crate) async fn read_limited_body(
    mut resp: reqwest::Response,
    api: &str,
) -> Result<Vec<u8>, RepurposeError> {
    let mut body: Vec<u8> = Vec::new();

    while let Some(chunk) = resp.chunk().await? {
        let next_len = body.len().saturating_add(chunk.len());
        if next_len > DEFAULT_MAX_BODY_BYTES {
            return Err(RepurposeError::Api {
                api: api.to_string(),
                message: format!("Response body exceeded {DEFAULT_MAX_BODY_BYTES} bytes"),
            });
        }
        body.extend_from_slice(&chunk);
    }

    Ok(body)
}

/// Sends `req` and decodes a JSON body, turning non-2xx, HTML and oversized
/// responses into [`RepurposeError::Api`].
pub(crate) async fn get_json<T: DeserializeOwned>(
    api: &str,
    req: RequestBuilder,
) -> Result<T, RepurposeError> {
    get_json_opt(api, req).await?.ok_or_else(|| RepurposeError::Api {
        api: api.to_string(),
        message: format!("HTTP {}", reqwest::StatusCode::NOT_FOUND),
    })
}

/// Like [`get_json`], but maps HTTP 404 to `Ok(None)`.
pub(crate) async fn get_json_opt<T: DeserializeOwned>(
    api: &str,
    req: RequestBuilder,
) -> Result<Option<T>, RepurposeError> {
    let resp = req.header(ACCEPT, "application/json").send().await?;
    let status = resp.status();
    if status == reqwest::StatusCode::NOT_FOUND {
        return Ok(None);
    }
    let content_type = resp.headers().get(reqwest::header::CONTENT_TYPE).cloned();
    let bytes = read_limited_body(resp, api).await?;
    if !status.is_success() {
        let excerpt = body_excerpt(&bytes);
        return Err(RepurposeError::Api {
            api: api.to_string(),
            message: format!("HTTP {status}: {excerpt}"),
        });
    }
    ensure_json_content_type(api, content_type.as_ref(), &bytes)?;
    serde_json::from_slice(&bytes)
        .map(Some)
        .map_err(|source| RepurposeError::ApiJson {
            api: api.to_string(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn ensure_json_content_type_rejects_html() {
        let err = ensure_json_content_type(
            "pubchem",
            Some(&HeaderValue::from_static("text/html; charset=utf-8")),
            b"<html><body>upstream error</body></html>",
        )
        .expect_err("html should be rejected");
        let msg = err.to_string();
        assert!(msg.contains("pubchem"));
        assert!(msg.contains("HTML"));
    }

    #[test]
    fn ensure_json_content_type_allows_non_json_compat_mode() {
        let ok = ensure_json_content_type(
            "pubchem",
            Some(&HeaderValue::from_static("text/plain")),
            b"{\"ok\":true}",
        );
        assert!(ok.is_ok());
    }

    #[test]
    fn body_excerpt_flattens_and_truncates() {
        assert_eq!(body_excerpt(b"line one\nline two\t"), "line one line two");

        let long = "x".repeat(ERROR_BODY_MAX_BYTES + 10);
        let excerpt = body_excerpt(long.as_bytes());
        assert!(excerpt.ends_with(" …"));
    }

    #[test]
    fn join_endpoint_normalizes_slashes() {
        assert_eq!(
            join_endpoint("https://example.org/api/", "/studies"),
            "https://example.org/api/studies"
        );
    }

    #[tokio::test]
    async fn get_json_reports_status_and_excerpt() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/missing"))
            .respond_with(ResponseTemplate::new(400).set_body_string("bad compound name"))
            .mount(&server)
            .await;

        let client = shared_client().unwrap();
        let url = format!("{}/missing", server.uri());
        let err = get_json::<serde_json::Value>("test-api", client.get(&url))
            .await
            .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("test-api"));
        assert!(msg.contains("400"));
        assert!(msg.contains("bad compound name"));
    }

    #[tokio::test]
    async fn get_json_opt_maps_not_found_to_none() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/gone"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = shared_client().unwrap();
        let url = format!("{}/gone", server.uri());
        let value = get_json_opt::<serde_json::Value>("test-api", client.get(&url))
            .await
            .unwrap();
        assert!(value.is_none());
    }
}
