use std::env;
use std::time::{Duration, Instant};

use futures::StreamExt;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Client as ReqwestClient, Response, header};
use serde::Deserialize;
use url::Url;

use crate::completion::{Completion, CompletionOptions, CompletionService, Fragment, FragmentStream};
use crate::error::{Error, Result};
use crate::observability::{
    CLIENT_RATE_LIMITED, CLIENT_REQUEST_DURATION, CLIENT_REQUEST_ERRORS, CLIENT_REQUESTS,
    STREAM_HEARTBEATS,
};
use crate::sse::process_sse;
use crate::types::{ChatCompletion, CompletionParams, QueryMessage};

/// Default endpoint for the hosted API.
pub const DEFAULT_API_URL: &str = "https://api.openai.com/v1/";
/// Environment variable consulted when no key is configured.
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);
const API_KEY_PREFIX: &str = "sk-";

/// True when `key` looks like a hosted-API secret key.
///
/// The check is syntactic only: the key must start with `sk-`, have something
/// after the prefix and contain no whitespace.
pub fn is_valid_api_key(key: &str) -> bool {
    key.len() > API_KEY_PREFIX.len()
        && key.starts_with(API_KEY_PREFIX)
        && !key.chars().any(char::is_whitespace)
}

/// Client for an OpenAI-compatible chat-completions API.
#[derive(Debug, Clone)]
pub struct OpenAi {
    api_key: String,
    client: ReqwestClient,
    base_url: String,
    timeout: Duration,
}

impl OpenAi {
    /// Create a new client against the default endpoint.
    ///
    /// The API key can be provided directly or read from the OPENAI_API_KEY
    /// environment variable.
    pub fn new(api_key: Option<String>) -> Result<Self> {
        Self::with_options(api_key, None, None)
    }

    /// Create a new client with custom settings.
    ///
    /// Keys are only checked for the `sk-` shape against the default endpoint;
    /// self-hosted compatible servers use their own key formats.
    pub fn with_options(
        api_key: Option<String>,
        base_url: Option<String>,
        timeout: Option<Duration>,
    ) -> Result<Self> {
        let api_key = match api_key {
            Some(key) => key,
            None => env::var(API_KEY_ENV).map_err(|_| {
                Error::authentication(format!(
                    "API key not provided and {API_KEY_ENV} environment variable not set"
                ))
            })?,
        };

        let base_url = match base_url {
            Some(url) if url.ends_with('/') => url,
            Some(url) => format!("{url}/"),
            None => DEFAULT_API_URL.to_string(),
        };
        Url::parse(&base_url)
            .map_err(|e| Error::url(format!("Invalid base URL {base_url:?}: {e}"), Some(e)))?;

        if base_url == DEFAULT_API_URL && !is_valid_api_key(&api_key) {
            return Err(Error::authentication(format!(
                "API key must start with {API_KEY_PREFIX:?}"
            )));
        }

        let timeout = timeout.unwrap_or(DEFAULT_TIMEOUT);
        let client = ReqwestClient::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                Error::http_client(
                    format!("Failed to build HTTP client: {e}"),
                    Some(Box::new(e)),
                )
            })?;

        Ok(Self {
            api_key,
            client,
            base_url,
            timeout,
        })
    }

    /// The endpoint this client posts to.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn completions_url(&self) -> Result<Url> {
        Ok(Url::parse(&self.base_url)?.join("chat/completions")?)
    }

    /// Create and return default headers for API requests.
    fn default_headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));
        let bearer = HeaderValue::from_str(&format!("Bearer {}", self.api_key))
            .map_err(|_| Error::authentication("API key contains invalid header characters"))?;
        headers.insert(header::AUTHORIZATION, bearer);
        Ok(headers)
    }

    /// Process API response errors and convert to our Error type
    async fn process_error_response(response: Response) -> Error {
        let status_code = response.status().as_u16();

        let request_id = response
            .headers()
            .get("x-request-id")
            .and_then(|val| val.to_str().ok())
            .map(String::from);

        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|val| val.to_str().ok())
            .and_then(|val| val.parse::<u64>().ok());

        let error_body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                return Error::http_client(
                    format!("Failed to read error response: {e}"),
                    Some(Box::new(e)),
                );
            }
        };

        error_from_status(status_code, &error_body, request_id, retry_after)
    }

    async fn post(&self, params: &CompletionParams) -> Result<Response> {
        let url = self.completions_url()?;
        let mut headers = self.default_headers()?;
        if params.stream {
            headers.insert(
                header::ACCEPT,
                HeaderValue::from_static("text/event-stream"),
            );
        }

        CLIENT_REQUESTS.click();
        tracing::debug!(
            url = %url,
            model = %params.model,
            messages = params.messages.len(),
            stream = params.stream,
            "posting completion request"
        );
        let started = Instant::now();
        let response = self
            .client
            .post(url)
            .headers(headers)
            .json(params)
            .send()
            .await
            .map_err(|e| {
                CLIENT_REQUEST_ERRORS.click();
                if e.is_timeout() {
                    Error::timeout(
                        format!("Request timed out: {e}"),
                        Some(self.timeout.as_secs_f64()),
                    )
                } else if e.is_connect() {
                    Error::connection(format!("Connection error: {e}"), Some(Box::new(e)))
                } else {
                    Error::http_client(format!("Request failed: {e}"), Some(Box::new(e)))
                }
            })?;
        CLIENT_REQUEST_DURATION.add(started.elapsed().as_secs_f64());

        if !response.status().is_success() {
            CLIENT_REQUEST_ERRORS.click();
            let err = Self::process_error_response(response).await;
            if err.is_rate_limit() {
                CLIENT_RATE_LIMITED.click();
            }
            return Err(err);
        }
        Ok(response)
    }

    /// Send a conversation and wait for the whole answer.
    pub async fn send(&self, params: CompletionParams) -> Result<ChatCompletion> {
        let params = params.with_stream(false);
        let response = self.post(&params).await?;
        response.json::<ChatCompletion>().await.map_err(|e| {
            Error::serialization(format!("Failed to parse response: {e}"), Some(Box::new(e)))
        })
    }

    /// Send a conversation and receive the answer as it is generated.
    pub async fn stream(&self, params: CompletionParams) -> Result<FragmentStream> {
        let params = params.with_stream(true);
        let response = self.post(&params).await?;
        let chunks = process_sse(response.bytes_stream());
        let fragments = chunks.map(|chunk| {
            chunk.map(|chunk| match chunk.content() {
                Some(text) => Fragment::text(text),
                None => {
                    STREAM_HEARTBEATS.click();
                    Fragment::heartbeat()
                }
            })
        });
        Ok(Box::pin(fragments))
    }
}

#[async_trait::async_trait]
impl CompletionService for OpenAi {
    async fn complete(
        &self,
        payload: Vec<QueryMessage>,
        options: &CompletionOptions,
    ) -> Result<Completion> {
        let params = CompletionParams::new(options.model.clone(), payload)
            .with_temperature(options.temperature);
        if options.mode.is_stream() {
            Ok(Completion::Stream(self.stream(params).await?))
        } else {
            Ok(Completion::Full(self.send(params).await?.text()))
        }
    }
}

/// Map an unsuccessful HTTP status and body to an [`Error`].
fn error_from_status(
    status_code: u16,
    error_body: &str,
    request_id: Option<String>,
    retry_after: Option<u64>,
) -> Error {
    #[derive(Deserialize)]
    struct ErrorResponse {
        error: Option<ErrorDetail>,
    }

    #[derive(Deserialize)]
    struct ErrorDetail {
        #[serde(rename = "type")]
        error_type: Option<String>,
        message: Option<String>,
        param: Option<String>,
    }

    let detail = serde_json::from_str::<ErrorResponse>(error_body)
        .ok()
        .and_then(|e| e.error);
    let error_type = detail.as_ref().and_then(|e| e.error_type.clone());
    let error_message = detail
        .as_ref()
        .and_then(|e| e.message.clone())
        .unwrap_or_else(|| error_body.to_string());
    let error_param = detail.as_ref().and_then(|e| e.param.clone());

    match status_code {
        400 => Error::bad_request(error_message, error_param),
        401 => Error::authentication(error_message),
        403 => Error::permission(error_message),
        404 => Error::not_found(error_message),
        408 => Error::timeout(error_message, None),
        429 => Error::rate_limit(error_message, retry_after),
        500 => Error::internal_server(error_message, request_id),
        502..=504 => Error::service_unavailable(error_message, retry_after),
        _ => Error::api(status_code, error_type, error_message, request_id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_creation() {
        let client = OpenAi::new(Some("sk-test-key".to_string())).unwrap();
        assert_eq!(client.api_key, "sk-test-key");
        assert_eq!(client.base_url, DEFAULT_API_URL);
        assert_eq!(client.timeout, DEFAULT_TIMEOUT);

        let client = OpenAi::with_options(
            Some("local-key".to_string()),
            Some("http://localhost:8080/v1".to_string()),
            Some(Duration::from_secs(30)),
        )
        .unwrap();
        assert_eq!(client.base_url(), "http://localhost:8080/v1/");
        assert_eq!(client.timeout, Duration::from_secs(30));
        assert_eq!(
            client.completions_url().unwrap().as_str(),
            "http://localhost:8080/v1/chat/completions"
        );
    }

    #[test]
    fn reject_malformed_key_for_default_endpoint() {
        let err = OpenAi::new(Some("not-a-key".to_string())).unwrap_err();
        assert!(err.is_authentication());
    }

    #[test]
    fn reject_invalid_base_url() {
        let err = OpenAi::with_options(
            Some("sk-x".to_string()),
            Some("not a url".to_string()),
            None,
        )
        .unwrap_err();
        assert!(matches!(err, Error::Url { .. }));
    }

    #[test]
    fn api_key_validation() {
        assert!(is_valid_api_key("sk-abc123"));
        assert!(!is_valid_api_key("sk-"));
        assert!(!is_valid_api_key("abc123"));
        assert!(!is_valid_api_key("sk-abc 123"));
        assert!(!is_valid_api_key(""));
    }

    #[test]
    fn default_headers_carry_bearer() {
        let client = OpenAi::new(Some("sk-test".to_string())).unwrap();
        let headers = client.default_headers().unwrap();
        assert_eq!(headers[header::AUTHORIZATION], "Bearer sk-test");
    }

    #[test]
    fn status_mapping() {
        let body = r#"{"error":{"type":"requests","message":"Slow down","param":null}}"#;
        let err = error_from_status(429, body, None, Some(20));
        assert!(err.is_rate_limit());
        assert_eq!(
            err.to_string(),
            "Rate limit exceeded: Slow down (retry after 20 seconds)"
        );

        assert!(error_from_status(401, "nope", None, None).is_authentication());
        assert!(error_from_status(408, "", None, None).is_timeout());
        assert!(error_from_status(500, "", None, None).is_server_error());
        assert!(error_from_status(503, "", None, None).is_server_error());
        assert!(matches!(
            error_from_status(404, "", None, None),
            Error::NotFound { .. }
        ));

        let err = error_from_status(418, "teapot", Some("req_1".to_string()), None);
        assert_eq!(err.status_code(), Some(418));
        assert_eq!(err.request_id(), Some("req_1"));
    }

    #[test]
    fn status_mapping_uses_raw_body_when_not_json() {
        let err = error_from_status(400, "plain failure", None, None);
        assert!(err.to_string().contains("plain failure"));
    }
}
