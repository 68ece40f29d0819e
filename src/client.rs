use crate::constants::{
    API_PATH, API_URL_ENV, CAPTION_ENDPOINT, CAPTION_URL_ENDPOINT, DEFAULT_API_BASE,
    REQUEST_TIMEOUT, USER_AGENT,
};
use crate::error::{CaptionError, Result};
use crate::retry::{send_with_retry, RetryPolicy};
use crate::settings::{CaptionSettings, CaptionStyle, Captions, Tone};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Base of the caption API, e.g. `https://captions.example.com/api`.
    pub api_base: String,
    pub timeout: Duration,
    pub retry: RetryPolicy,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            timeout: REQUEST_TIMEOUT,
            retry: RetryPolicy::default(),
        }
    }
}

impl ClientConfig {
    /// Resolves the API base from an optional service URL override.
    /// `Some(url)` maps to `{url}/api`; `None` keeps the local default.
    pub fn new(service_url: Option<String>) -> Self {
        let api_base = service_url
            .filter(|url| !url.trim().is_empty())
            .map(|url| format!("{}{}", url.trim_end_matches('/'), API_PATH))
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string());

        Self {
            api_base,
            ..Self::default()
        }
    }

    pub fn from_env() -> Self {
        Self::new(std::env::var(API_URL_ENV).ok())
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

/// Joins an API base and an endpoint path with exactly one slash.
pub fn build_endpoint_url(api_base: &str, endpoint: &str) -> String {
    format!(
        "{}/{}",
        api_base.trim_end_matches('/'),
        endpoint.trim_start_matches('/')
    )
}

#[derive(Debug, Clone, Serialize)]
struct CaptionRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    image: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    url: Option<&'a str>,
    styles: &'a BTreeSet<CaptionStyle>,
    tone: Tone,
    max_length: u32,
}

impl<'a> CaptionRequest<'a> {
    fn for_image(image: &'a str, settings: &'a CaptionSettings) -> Self {
        Self {
            image: Some(image),
            url: None,
            styles: &settings.styles,
            tone: settings.tone,
            max_length: settings.max_length,
        }
    }

    fn for_url(url: &'a str, settings: &'a CaptionSettings) -> Self {
        Self {
            image: None,
            url: Some(url),
            styles: &settings.styles,
            tone: settings.tone,
            max_length: settings.max_length,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptionMetadata {
    pub processing_time: f64,
    pub model_used: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptionResponse {
    #[serde(default)]
    pub image_id: Option<String>,
    pub captions: Captions,
    #[serde(default)]
    pub metadata: Option<CaptionMetadata>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    detail: Option<serde_json::Value>,
    error: Option<String>,
}

/// The remote caption generator, one call per image.
#[async_trait]
pub trait CaptionService: Send + Sync {
    /// Captions an encoded image (a data URI).
    async fn generate_caption(
        &self,
        image: &str,
        settings: &CaptionSettings,
    ) -> Result<CaptionResponse>;

    /// Captions an image the service fetches itself.
    async fn generate_caption_from_url(
        &self,
        _url: &str,
        _settings: &CaptionSettings,
    ) -> Result<CaptionResponse> {
        Err(CaptionError::InvalidSettings(
            "this caption service does not accept image URLs".to_string(),
        ))
    }
}

/// HTTP client for `POST /caption` and `POST /caption-url`.
///
/// Every call runs through [`send_with_retry`] with the configured policy.
/// The underlying `reqwest::Client` holds no per-request state.
#[derive(Debug, Clone)]
pub struct HttpCaptionService {
    http: Client,
    config: ClientConfig,
}

impl HttpCaptionService {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| CaptionError::Network(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { http, config })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    async fn post_once(&self, url: &str, body: &CaptionRequest<'_>) -> Result<CaptionResponse> {
        let response = self
            .http
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        let payload = response.bytes().await.map_err(|e| self.transport_error(e))?;
        debug!(url, status = status.as_u16(), bytes = payload.len(), "caption service replied");

        if !status.is_success() {
            let message = error_message(status, &payload);
            return Err(if status.is_server_error() {
                CaptionError::Server {
                    status: status.as_u16(),
                    message,
                }
            } else {
                CaptionError::Client {
                    status: status.as_u16(),
                    message,
                }
            });
        }

        serde_json::from_slice(&payload).map_err(|e| CaptionError::InvalidResponse(e.to_string()))
    }

    fn transport_error(&self, err: reqwest::Error) -> CaptionError {
        if err.is_builder() {
            CaptionError::InvalidSettings(format!("invalid request to caption service: {}", err))
        } else if err.is_timeout() {
            CaptionError::Timeout(self.config.timeout)
        } else {
            CaptionError::Network(err.to_string())
        }
    }

    async fn post_with_retry(&self, endpoint: &str, body: CaptionRequest<'_>) -> Result<CaptionResponse> {
        let url = build_endpoint_url(&self.config.api_base, endpoint);
        send_with_retry(&self.config.retry, || self.post_once(&url, &body)).await
    }
}

#[async_trait]
impl CaptionService for HttpCaptionService {
    async fn generate_caption(
        &self,
        image: &str,
        settings: &CaptionSettings,
    ) -> Result<CaptionResponse> {
        self.post_with_retry(CAPTION_ENDPOINT, CaptionRequest::for_image(image, settings))
            .await
    }

    async fn generate_caption_from_url(
        &self,
        url: &str,
        settings: &CaptionSettings,
    ) -> Result<CaptionResponse> {
        self.post_with_retry(CAPTION_URL_ENDPOINT, CaptionRequest::for_url(url, settings))
            .await
    }
}

/// Human-readable message for an error response: the service's `detail` or
/// `error` field when present, otherwise the status reason.
fn error_message(status: StatusCode, body: &[u8]) -> String {
    let from_body = serde_json::from_slice::<ErrorBody>(body)
        .ok()
        .and_then(|body| match (body.detail, body.error) {
            (Some(serde_json::Value::String(detail)), _) => Some(detail),
            (Some(detail), _) => Some(detail.to_string()),
            (None, error) => error,
        });

    from_body.unwrap_or_else(|| {
        status
            .canonical_reason()
            .unwrap_or("Request failed")
            .to_string()
    })
}
