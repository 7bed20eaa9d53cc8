//! Minimal Ollama API client.
//!
//! This crate provides a focused client for a local Ollama server with:
//! - Non-streaming and streaming text generation (`/api/generate`)
//! - Model listing for pre-flight checks (`/api/tags`)
//! - Newline-delimited JSON parsing that survives chunk boundaries

use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use std::time::Duration;
use thiserror::Error;
use tokio_stream::Stream;

/// Default address of a locally running Ollama server.
pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";
const DEFAULT_MODEL: &str = "gemma3:27b";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// Errors that can occur when using the Ollama client.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Model not found on server: {0}")]
    ModelNotFound(String),

    #[error("Failed to parse response: {0}")]
    Parse(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Ollama API client.
#[derive(Clone)]
pub struct Ollama {
    client: reqwest::Client,
    base_url: String,
    model: String,
    timeout: Duration,
}

impl Ollama {
    /// Create a client for the server at `base_url`.
    pub fn new(base_url: impl AsRef<str>) -> Result<Self, Error> {
        let base_url = base_url.as_ref().trim_end_matches('/').to_string();
        reqwest::Url::parse(&base_url)
            .map_err(|e| Error::Config(format!("Invalid server URL '{base_url}': {e}")))?;

        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url,
            model: DEFAULT_MODEL.to_string(),
            timeout: DEFAULT_TIMEOUT,
        })
    }

    /// Create a client for the default local server.
    pub fn local() -> Result<Self, Error> {
        Self::new(DEFAULT_BASE_URL)
    }

    /// Set the default model for this client.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the per-request timeout. Covers the whole response body, so it must
    /// be generous for large context windows.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Send a generation request and wait for the full response.
    pub async fn generate(&self, request: GenerateRequest) -> Result<GenerateResponse, Error> {
        let api_request = self.build_api_request(&request, false);

        let response = self
            .client
            .post(format!("{}/api/generate", self.base_url))
            .timeout(self.timeout)
            .json(&api_request)
            .send()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        let response = self.check_status(response, &api_request.model).await?;

        let api_response: ApiGenerateLine = response
            .json()
            .await
            .map_err(|e| self.map_body_error(e))?;

        if let Some(error) = api_response.error {
            return Err(Error::Api {
                status: 200,
                message: error,
            });
        }

        let usage = api_response.usage();
        Ok(GenerateResponse {
            model: api_response.model,
            text: api_response.response,
            done_reason: api_response.done_reason.as_deref().map(StopReason::parse),
            usage,
        })
    }

    /// Send a generation request and stream the response as it is produced.
    pub async fn generate_stream(
        &self,
        request: GenerateRequest,
    ) -> Result<Pin<Box<dyn Stream<Item = Result<GenerateChunk, Error>> + Send>>, Error> {
        let api_request = self.build_api_request(&request, true);

        let response = self
            .client
            .post(format!("{}/api/generate", self.base_url))
            .timeout(self.timeout)
            .json(&api_request)
            .send()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        let response = self.check_status(response, &api_request.model).await?;
        let timeout = self.timeout;

        // Lines and multi-byte characters can straddle network chunks, so keep
        // the unfinished tail as raw bytes. The trailing `None` flushes it.
        let stream = response
            .bytes_stream()
            .map(Some)
            .chain(futures::stream::once(futures::future::ready(None)))
            .scan(Vec::new(), move |buffer, item| {
                let chunks = match item {
                    Some(Ok(bytes)) => {
                        buffer.extend_from_slice(&bytes);
                        parse_ndjson_buffered(buffer)
                    }
                    Some(Err(e)) if e.is_timeout() => vec![Err(Error::Timeout(timeout))],
                    Some(Err(e)) => vec![Err(Error::Network(e.to_string()))],
                    None => parse_ndjson_tail(buffer),
                };
                futures::future::ready(Some(chunks))
            })
            .flat_map(futures::stream::iter);

        Ok(Box::pin(stream))
    }

    /// List the models installed on the server.
    pub async fn list_models(&self) -> Result<Vec<ModelInfo>, Error> {
        let response = self
            .client
            .get(format!("{}/api/tags", self.base_url))
            .timeout(Duration::from_secs(30))
            .send()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        let response = self.check_status(response, &self.model).await?;

        let tags: ApiTags = response
            .json()
            .await
            .map_err(|e| Error::Parse(e.to_string()))?;

        Ok(tags
            .models
            .into_iter()
            .map(|m| ModelInfo {
                name: m.name,
                size: m.size,
            })
            .collect())
    }

    /// Fail with [`Error::ModelNotFound`] unless `model` is installed.
    ///
    /// A bare name matches its `:latest` tag.
    pub async fn ensure_model(&self, model: &str) -> Result<(), Error> {
        let models = self.list_models().await?;
        if models.iter().any(|m| m.matches(model)) {
            Ok(())
        } else {
            Err(Error::ModelNotFound(model.to_string()))
        }
    }

    fn build_api_request(&self, request: &GenerateRequest, stream: bool) -> ApiGenerateRequest {
        ApiGenerateRequest {
            model: request.model.clone().unwrap_or_else(|| self.model.clone()),
            prompt: request.prompt.clone(),
            system: request.system.clone(),
            stream,
            options: request.options.clone(),
        }
    }

    async fn check_status(
        &self,
        response: reqwest::Response,
        model: &str,
    ) -> Result<reqwest::Response, Error> {
        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ApiErrorBody>(&body)
            .map(|e| e.error)
            .unwrap_or(body);

        if status == 404 && message.contains("not found") {
            return Err(Error::ModelNotFound(model.to_string()));
        }

        Err(Error::Api { status, message })
    }

    fn map_transport_error(&self, e: reqwest::Error) -> Error {
        if e.is_timeout() {
            Error::Timeout(self.timeout)
        } else if e.is_connect() {
            Error::Network(format!(
                "cannot reach Ollama at {} (is the server running?): {e}",
                self.base_url
            ))
        } else {
            Error::Network(e.to_string())
        }
    }

    fn map_body_error(&self, e: reqwest::Error) -> Error {
        if e.is_timeout() {
            Error::Timeout(self.timeout)
        } else {
            Error::Parse(e.to_string())
        }
    }
}

// ============================================================================
// Public types
// ============================================================================

/// A text-generation request.
#[derive(Debug, Clone, Default)]
pub struct GenerateRequest {
    pub model: Option<String>,
    pub prompt: String,
    pub system: Option<String>,
    pub options: Options,
}

impl GenerateRequest {
    /// Create a new request for the given prompt.
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Default::default()
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.options.temperature = Some(temperature);
        self
    }

    /// Context window size in tokens (`num_ctx`).
    pub fn with_context_window(mut self, num_ctx: u32) -> Self {
        self.options.num_ctx = Some(num_ctx);
        self
    }

    /// Maximum tokens to generate (`num_predict`); `-1` means unbounded.
    pub fn with_max_tokens(mut self, num_predict: i32) -> Self {
        self.options.num_predict = Some(num_predict);
        self
    }

    pub fn with_stop(mut self, stop: Vec<String>) -> Self {
        self.options.stop = Some(stop);
        self
    }
}

/// Sampling and runtime options understood by the server.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Options {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_ctx: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_predict: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop: Option<Vec<String>>,
}

/// A complete generation response.
#[derive(Debug, Clone)]
pub struct GenerateResponse {
    pub model: String,
    pub text: String,
    pub done_reason: Option<StopReason>,
    pub usage: Usage,
}

/// One piece of a streamed response.
#[derive(Debug, Clone)]
pub struct GenerateChunk {
    pub text: String,
    pub done: bool,
    pub done_reason: Option<StopReason>,
    /// Only present on the final chunk.
    pub usage: Option<Usage>,
}

/// Why the model stopped generating.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Stop,
    Length,
    Load,
    Unknown,
}

impl StopReason {
    fn parse(s: &str) -> Self {
        match s {
            "stop" => StopReason::Stop,
            "length" => StopReason::Length,
            "load" => StopReason::Load,
            _ => StopReason::Unknown,
        }
    }
}

/// Token usage and timing reported by the server.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Usage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_duration: Option<Duration>,
}

/// A model installed on the server.
#[derive(Debug, Clone)]
pub struct ModelInfo {
    pub name: String,
    pub size: u64,
}

impl ModelInfo {
    fn matches(&self, requested: &str) -> bool {
        self.name == requested
            || (!requested.contains(':') && self.name == format!("{requested}:latest"))
    }
}

// ============================================================================
// Internal API types
// ============================================================================

#[derive(Debug, Serialize)]
struct ApiGenerateRequest {
    model: String,
    prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    stream: bool,
    options: Options,
}

/// A response object; the same shape is used for the single non-streaming
/// body and for every streamed line.
#[derive(Debug, Deserialize)]
struct ApiGenerateLine {
    #[serde(default)]
    model: String,
    #[serde(default)]
    response: String,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    done_reason: Option<String>,
    #[serde(default)]
    prompt_eval_count: Option<u64>,
    #[serde(default)]
    eval_count: Option<u64>,
    #[serde(default)]
    total_duration: Option<u64>,
    #[serde(default)]
    error: Option<String>,
}

impl ApiGenerateLine {
    fn usage(&self) -> Usage {
        Usage {
            prompt_tokens: self.prompt_eval_count.unwrap_or(0),
            completion_tokens: self.eval_count.unwrap_or(0),
            total_duration: self.total_duration.map(Duration::from_nanos),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: String,
}

#[derive(Debug, Deserialize)]
struct ApiTags {
    #[serde(default)]
    models: Vec<ApiModel>,
}

#[derive(Debug, Deserialize)]
struct ApiModel {
    name: String,
    #[serde(default)]
    size: u64,
}

/// Parse complete JSON lines from a buffer, leaving any trailing partial line
/// in place for the next network chunk. Lines are only decoded once their
/// newline has arrived.
fn parse_ndjson_buffered(buffer: &mut Vec<u8>) -> Vec<Result<GenerateChunk, Error>> {
    let mut chunks = Vec::new();

    while let Some(newline_pos) = buffer.iter().position(|&b| b == b'\n') {
        let line: Vec<u8> = buffer.drain(..=newline_pos).collect();
        chunks.extend(parse_ndjson_line(&line));
    }

    chunks
}

/// Parse whatever is left once the body has ended without a final newline.
fn parse_ndjson_tail(buffer: &mut Vec<u8>) -> Vec<Result<GenerateChunk, Error>> {
    let line = std::mem::take(buffer);
    parse_ndjson_line(&line).into_iter().collect()
}

fn parse_ndjson_line(bytes: &[u8]) -> Option<Result<GenerateChunk, Error>> {
    let line = match std::str::from_utf8(bytes) {
        Ok(line) => line.trim(),
        Err(e) => return Some(Err(Error::Parse(format!("stream line: {e}")))),
    };
    if line.is_empty() {
        return None;
    }

    Some(match serde_json::from_str::<ApiGenerateLine>(line) {
        Ok(parsed) => convert_line(parsed),
        Err(e) => Err(Error::Parse(format!("stream line: {e}"))),
    })
}

fn convert_line(line: ApiGenerateLine) -> Result<GenerateChunk, Error> {
    if let Some(error) = line.error {
        return Err(Error::Api {
            status: 200,
            message: error,
        });
    }

    let usage = line.done.then(|| line.usage());
    Ok(GenerateChunk {
        text: line.response,
        done: line.done,
        done_reason: line.done_reason.as_deref().map(StopReason::parse),
        usage,
    })
}
