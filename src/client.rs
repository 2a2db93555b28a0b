//! HTTP client for the Anthropic Messages API.
//!
//! [`Anthropic::send`] makes a one-shot request; [`Anthropic::stream`] opens a
//! server-sent event stream.  Non-success statuses map onto [`Error`] variants.

use std::env;
use std::fmt;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::Stream;
use futures::stream::StreamExt;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Client as ReqwestClient, Response, header};
use serde::Deserialize;
use url::Url;

use crate::client_logger::ClientLogger;
use crate::error::{Error, Result};
use crate::observability::{CLIENT_REQUEST_DURATION, CLIENT_REQUEST_ERRORS, CLIENT_REQUESTS};
use crate::sse::process_sse;
use crate::types::{MessagesRequest, ResponseMessage, StreamEvent};

const DEFAULT_API_URL: &str = "https://api.anthropic.com/v1/";
const ANTHROPIC_API_VERSION: &str = "2023-06-01";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Environment variables consulted, in order, when no API key is given.
const API_KEY_VARS: [&str; 2] = ["ARCHITECT_API_KEY", "ANTHROPIC_API_KEY"];

/// A boxed stream of parsed server-sent events.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<StreamEvent>> + Send>>;

/// Client for the Anthropic Messages API.
///
/// The client is cheap to clone; clones share the underlying connection pool.
#[derive(Clone)]
pub struct Anthropic {
    api_key: String,
    client: ReqwestClient,
    base_url: Url,
    timeout: Duration,
    logger: Option<Arc<dyn ClientLogger>>,
}

impl fmt::Debug for Anthropic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Anthropic")
            .field("base_url", &self.base_url.as_str())
            .field("timeout", &self.timeout)
            .field("logger", &self.logger.is_some())
            .finish_non_exhaustive()
    }
}

impl Anthropic {
    /// Create a new client.
    ///
    /// The API key can be provided directly or read from the `ARCHITECT_API_KEY`
    /// or `ANTHROPIC_API_KEY` environment variables.
    pub fn new(api_key: Option<String>) -> Result<Self> {
        Self::with_options(api_key, None, None)
    }

    /// Create a new client with custom settings.
    ///
    /// `timeout` bounds connection setup for every request and the whole of a
    /// one-shot request.  Streams are not cut off by it; the conversation
    /// controller applies its own per-fragment timeout.
    pub fn with_options(
        api_key: Option<String>,
        base_url: Option<String>,
        timeout: Option<Duration>,
    ) -> Result<Self> {
        let api_key = match api_key {
            Some(key) => key,
            None => API_KEY_VARS
                .iter()
                .find_map(|var| env::var(var).ok())
                .ok_or_else(|| {
                    Error::authentication(
                        "API key not provided and neither ARCHITECT_API_KEY nor ANTHROPIC_API_KEY is set",
                    )
                })?,
        };
        let base_url = parse_base_url(base_url.as_deref().unwrap_or(DEFAULT_API_URL))?;

        let timeout = timeout.unwrap_or(DEFAULT_TIMEOUT);
        let client = ReqwestClient::builder()
            .connect_timeout(timeout)
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
            logger: None,
        })
    }

    /// Attach a logger that observes every request, response, and stream event.
    pub fn with_logger(mut self, logger: Arc<dyn ClientLogger>) -> Self {
        self.logger = Some(logger);
        self
    }

    /// The base URL requests are resolved against.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Create and return default headers for API requests.
    fn default_headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));
        let api_key = HeaderValue::from_str(&self.api_key)
            .map_err(|_| Error::authentication("API key contains invalid header characters"))?;
        headers.insert("x-api-key", api_key);
        headers.insert(
            "anthropic-version",
            HeaderValue::from_static(ANTHROPIC_API_VERSION),
        );
        Ok(headers)
    }

    fn messages_url(&self) -> Result<Url> {
        Ok(self.base_url.join("messages")?)
    }

    /// Process API response errors and convert to our Error type.
    async fn process_error_response(response: Response) -> Error {
        let status_code = response.status().as_u16();

        let request_id = response
            .headers()
            .get("request-id")
            .or_else(|| response.headers().get("x-request-id"))
            .and_then(|val| val.to_str().ok())
            .map(String::from);

        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|val| val.to_str().ok())
            .and_then(|val| val.parse::<u64>().ok());

        #[derive(Deserialize)]
        struct ErrorResponse {
            error: Option<ErrorDetail>,
        }

        #[derive(Deserialize)]
        struct ErrorDetail {
            #[serde(rename = "type")]
            error_type: Option<String>,
            message: Option<String>,
        }

        let error_body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                return Error::http_client(
                    format!("Failed to read error response: {e}"),
                    Some(Box::new(e)),
                );
            }
        };

        let detail = serde_json::from_str::<ErrorResponse>(&error_body)
            .ok()
            .and_then(|parsed| parsed.error);
        let error_type = detail.as_ref().and_then(|e| e.error_type.clone());
        let error_message = detail
            .and_then(|e| e.message)
            .unwrap_or_else(|| error_body.clone());

        tracing::warn!(status_code, ?error_type, ?request_id, "API request failed");

        match status_code {
            400 => Error::bad_request(error_message, None),
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

    fn map_send_error(&self, e: reqwest::Error) -> Error {
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
    }

    /// POST a request and return the successful response, or the mapped error.
    async fn post(
        &self,
        request: &MessagesRequest,
        headers: HeaderMap,
        timeout: Option<Duration>,
    ) -> Result<Response> {
        CLIENT_REQUESTS.click();
        if let Some(logger) = &self.logger {
            logger.log_request(request);
        }
        let start = Instant::now();
        let mut builder = self
            .client
            .post(self.messages_url()?)
            .headers(headers)
            .json(request);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let result = builder.send().await;
        CLIENT_REQUEST_DURATION.add(start.elapsed().as_secs_f64());

        let response = match result {
            Ok(response) => response,
            Err(e) => {
                CLIENT_REQUEST_ERRORS.click();
                return Err(self.map_send_error(e));
            }
        };
        tracing::debug!(status = %response.status(), stream = request.stream, "API response");
        if !response.status().is_success() {
            CLIENT_REQUEST_ERRORS.click();
            return Err(Self::process_error_response(response).await);
        }
        Ok(response)
    }

    /// Send a request to the API and wait for the complete response.
    pub async fn send(&self, request: &MessagesRequest) -> Result<ResponseMessage> {
        let mut request = request.clone();
        request.stream = false;
        let response = self
            .post(&request, self.default_headers()?, Some(self.timeout))
            .await?;

        let message = response.json::<ResponseMessage>().await.map_err(|e| {
            Error::serialization(format!("Failed to parse response: {e}"), Some(Box::new(e)))
        })?;
        if let Some(logger) = &self.logger {
            logger.log_response(&message);
        }
        Ok(message)
    }

    /// Send a request to the API and get a streaming response.
    ///
    /// Returns a stream of [`StreamEvent`]s that can be processed incrementally.
    pub async fn stream(&self, request: &MessagesRequest) -> Result<EventStream> {
        let request = request.clone().streaming();

        let mut headers = self.default_headers()?;
        headers.insert(
            header::ACCEPT,
            HeaderValue::from_static("text/event-stream"),
        );
        let response = self.post(&request, headers, None).await?;

        let events = process_sse(response.bytes_stream());
        match self.logger.clone() {
            Some(logger) => Ok(Box::pin(events.inspect(move |event| {
                if let Ok(event) = event {
                    logger.log_stream_event(event);
                }
            }))),
            None => Ok(Box::pin(events)),
        }
    }
}

fn parse_base_url(base_url: &str) -> Result<Url> {
    let mut url = Url::parse(base_url)?;
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MessageParam;

    #[test]
    fn client_creation() {
        let client = Anthropic::new(Some("test-key".to_string())).unwrap();
        assert_eq!(client.api_key, "test-key");
        assert_eq!(client.base_url.as_str(), DEFAULT_API_URL);
        assert_eq!(client.timeout, DEFAULT_TIMEOUT);

        let client = Anthropic::with_options(
            Some("test-key".to_string()),
            Some("https://custom-api.example.com/v1".to_string()),
            Some(Duration::from_secs(30)),
        )
        .unwrap();
        assert_eq!(client.base_url.as_str(), "https://custom-api.example.com/v1/");
        assert_eq!(
            client.messages_url().unwrap().as_str(),
            "https://custom-api.example.com/v1/messages"
        );
        assert_eq!(client.timeout, Duration::from_secs(30));
    }

    #[test]
    fn invalid_base_url() {
        let err = Anthropic::with_options(
            Some("test-key".to_string()),
            Some("not a url".to_string()),
            None,
        )
        .unwrap_err();
        assert!(matches!(err, Error::Url { .. }));
    }

    #[test]
    fn invalid_api_key_header() {
        let client = Anthropic::new(Some("bad\nkey".to_string())).unwrap();
        assert!(client.default_headers().unwrap_err().is_authentication());
    }

    #[test]
    fn debug_hides_api_key() {
        let client = Anthropic::new(Some("sk-secret".to_string())).unwrap();
        assert!(!format!("{client:?}").contains("sk-secret"));
    }

    #[tokio::test]
    async fn connection_refused_maps_to_error() {
        let client = Anthropic::with_options(
            Some("test-key".to_string()),
            Some("http://127.0.0.1:9/".to_string()),
            Some(Duration::from_secs(2)),
        )
        .unwrap();
        let request = MessagesRequest::new("claude-haiku-4-5", 8, vec![MessageParam::user("hi")]);
        let err = client.send(&request).await.unwrap_err();
        assert!(err.is_connection() || err.is_timeout() || matches!(err, Error::HttpClient { .. }));
    }

    #[tokio::test]
    #[ignore] // Requires a real API key.
    async fn live_stream() {
        let Ok(client) = Anthropic::new(None) else {
            println!("Skipping live_stream: no API key set");
            return;
        };
        let request = MessagesRequest::new(
            "claude-haiku-4-5",
            32,
            vec![MessageParam::user("Reply with a short greeting.")],
        );
        let mut stream = client.stream(&request).await.unwrap();
        let mut text = String::new();
        while let Some(event) = stream.next().await {
            if let Some(delta) = event.unwrap().text_delta() {
                text.push_str(delta);
            }
        }
        assert!(!text.is_empty());
    }
}
