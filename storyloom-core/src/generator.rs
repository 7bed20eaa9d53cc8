//! The boundary between the pipelines and a language model.
//!
//! Pipelines only see [`TextGenerator`]: one prompt in, one complete response
//! out. [`OllamaGenerator`] is the production implementation; tests use
//! [`crate::testing::MockGenerator`].

use crate::config::GenerationConfig;
use crate::error::{ConfigError, GeneratorError, Stage, StoryError};
use crate::progress::{noop_progress, ProgressReporter};
use async_trait::async_trait;
use futures::StreamExt;
use ollama::{GenerateRequest, Ollama, StopReason};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Produces a completion for a prompt.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Run one prompt to completion and return the generated text.
    async fn generate(&self, prompt: &str) -> Result<String, GeneratorError>;

    /// Name used in logs.
    fn name(&self) -> &str;
}

/// Generator backed by an Ollama server.
pub struct OllamaGenerator {
    client: Ollama,
    config: GenerationConfig,
    progress: Arc<dyn ProgressReporter>,
}

impl OllamaGenerator {
    /// Validate `config` and build a client for its endpoint.
    pub fn new(config: GenerationConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let client = Ollama::new(&config.endpoint)
            .map_err(|e| ConfigError::InvalidEndpoint(e.to_string()))?
            .with_model(&config.model)
            .with_timeout(config.timeout);

        Ok(Self {
            client,
            config,
            progress: noop_progress(),
        })
    }

    /// Receive streamed text sizes while a response is being produced.
    pub fn with_progress(mut self, progress: Arc<dyn ProgressReporter>) -> Self {
        self.progress = progress;
        self
    }

    pub fn config(&self) -> &GenerationConfig {
        &self.config
    }

    /// Check that the server is reachable and has the configured model.
    pub async fn check(&self) -> Result<(), GeneratorError> {
        self.client.ensure_model(&self.config.model).await?;
        Ok(())
    }

    fn request(&self, prompt: &str) -> GenerateRequest {
        GenerateRequest::new(prompt)
            .with_temperature(self.config.temperature)
            .with_context_window(self.config.context_window)
            .with_max_tokens(self.config.max_output_tokens)
            .with_stop(self.config.stop.clone())
    }

    async fn generate_streamed(&self, request: GenerateRequest) -> Result<String, GeneratorError> {
        let mut stream = self.client.generate_stream(request).await?;
        let mut text = String::new();
        let mut finished = false;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            if !chunk.text.is_empty() {
                self.progress.text_received(chunk.text.chars().count());
                text.push_str(&chunk.text);
            }
            if chunk.done {
                finished = true;
                log_stop_reason(chunk.done_reason);
                if let Some(usage) = chunk.usage {
                    debug!(
                        prompt_tokens = usage.prompt_tokens,
                        completion_tokens = usage.completion_tokens,
                        "Streamed generation finished"
                    );
                }
                break;
            }
        }

        if !finished {
            return Err(GeneratorError::IncompleteStream {
                received: text.chars().count(),
            });
        }
        Ok(text)
    }
}

#[async_trait]
impl TextGenerator for OllamaGenerator {
    async fn generate(&self, prompt: &str) -> Result<String, GeneratorError> {
        let request = self.request(prompt);

        let text = if self.config.stream {
            self.generate_streamed(request).await?
        } else {
            let response = self.client.generate(request).await?;
            log_stop_reason(response.done_reason);
            debug!(
                prompt_tokens = response.usage.prompt_tokens,
                completion_tokens = response.usage.completion_tokens,
                "Generation finished"
            );
            self.progress.text_received(response.text.chars().count());
            response.text
        };

        if text.trim().is_empty() {
            return Err(GeneratorError::EmptyResponse);
        }
        Ok(text)
    }

    fn name(&self) -> &str {
        &self.config.model
    }
}

/// Run one chunk's model call, tagging failures with the chunk position.
/// Cancellation aborts an in-flight call as well as pending ones. A blank
/// response is a failure whichever backend produced it.
pub(crate) async fn call_for_chunk<G>(
    generator: &G,
    prompt: &str,
    stage: Stage,
    index: usize,
    total: usize,
    cancel: &CancellationToken,
) -> crate::error::Result<String>
where
    G: TextGenerator + ?Sized,
{
    let cancelled = || StoryError::Cancelled {
        stage,
        completed: index - 1,
        total,
    };

    if cancel.is_cancelled() {
        warn!(%stage, chunk = index, total, "Cancelled before chunk");
        return Err(cancelled());
    }

    tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            warn!(%stage, chunk = index, total, "Cancelled during model call");
            Err(cancelled())
        }
        result = generator.generate(prompt) => result
            .and_then(|text| {
                if text.trim().is_empty() {
                    Err(GeneratorError::EmptyResponse)
                } else {
                    Ok(text)
                }
            })
            .map_err(|source| StoryError::Backend {
                stage,
                chunk: index,
                total,
                source,
            }),
    }
}

fn log_stop_reason(reason: Option<StopReason>) {
    if reason == Some(StopReason::Length) {
        warn!("Model stopped at its output limit; the response may be truncated");
    }
}
