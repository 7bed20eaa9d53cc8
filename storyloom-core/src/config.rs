//! Backend and pipeline settings.

use crate::error::ConfigError;
use crate::splitter::{DEFAULT_GROUP_SIZE, DEFAULT_MAX_TOKENS};
use std::time::Duration;

/// Default target length of the summary, in tokens.
pub const DEFAULT_SUMMARY_LENGTH: usize = 75_000;

/// Ask the backend for unbounded output.
pub const UNBOUNDED_OUTPUT: i32 = -1;

const DEFAULT_MODEL: &str = "gemma3:27b";
const DEFAULT_CONTEXT_WINDOW: u32 = 128_000;
const DEFAULT_STOP_TOKENS: [&str; 3] = ["<|im_end|>", "<|end_of_text|>", "<|eot_id|>"];

/// How each model call is made.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationConfig {
    /// Model name as known to the Ollama server.
    pub model: String,

    /// Base URL of the Ollama server.
    pub endpoint: String,

    pub temperature: f32,

    /// Maximum output tokens, or [`UNBOUNDED_OUTPUT`].
    pub max_output_tokens: i32,

    /// Context window requested from the server.
    pub context_window: u32,

    /// Sequences that end generation.
    pub stop: Vec<String>,

    /// Upper bound on a single model call.
    pub timeout: Duration,

    /// Stream tokens as they are produced instead of waiting for the body.
    pub stream: bool,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            endpoint: ollama::DEFAULT_BASE_URL.to_string(),
            temperature: 1.0,
            max_output_tokens: UNBOUNDED_OUTPUT,
            context_window: DEFAULT_CONTEXT_WINDOW,
            stop: DEFAULT_STOP_TOKENS.iter().map(|s| s.to_string()).collect(),
            timeout: Duration::from_secs(30 * 60),
            stream: false,
        }
    }
}

impl GenerationConfig {
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_context_window(mut self, tokens: u32) -> Self {
        self.context_window = tokens;
        self
    }

    pub fn with_max_output_tokens(mut self, tokens: i32) -> Self {
        self.max_output_tokens = tokens;
        self
    }

    pub fn with_stop(mut self, stop: Vec<String>) -> Self {
        self.stop = stop;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_stream(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }

    /// Check values the server would otherwise reject mid-run.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.temperature.is_finite() || !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::InvalidTemperature(self.temperature));
        }
        if self.context_window == 0 {
            return Err(ConfigError::ZeroContextWindow);
        }
        let endpoint = self.endpoint.trim();
        if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
            return Err(ConfigError::InvalidEndpoint(self.endpoint.clone()));
        }
        Ok(())
    }
}

/// Chunking and length settings for the two pipelines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Estimated tokens per background chunk.
    pub max_tokens_per_chunk: usize,

    /// Events per chapter-generation call.
    pub event_group_size: usize,

    /// Target summary length in tokens, stated in the summary prompts.
    pub summary_length: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_tokens_per_chunk: DEFAULT_MAX_TOKENS,
            event_group_size: DEFAULT_GROUP_SIZE,
            summary_length: DEFAULT_SUMMARY_LENGTH,
        }
    }
}

impl PipelineConfig {
    pub fn with_max_tokens_per_chunk(mut self, tokens: usize) -> Self {
        self.max_tokens_per_chunk = tokens;
        self
    }

    pub fn with_event_group_size(mut self, size: usize) -> Self {
        self.event_group_size = size;
        self
    }

    pub fn with_summary_length(mut self, tokens: usize) -> Self {
        self.summary_length = tokens;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_tokens_per_chunk == 0 {
            return Err(ConfigError::ZeroTokenLimit);
        }
        if self.event_group_size == 0 {
            return Err(ConfigError::ZeroGroupSize);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generation_defaults() {
        let config = GenerationConfig::default();
        assert_eq!(config.model, "gemma3:27b");
        assert_eq!(config.endpoint, "http://localhost:11434");
        assert_eq!(config.temperature, 1.0);
        assert_eq!(config.max_output_tokens, -1);
        assert_eq!(config.context_window, 128_000);
        assert_eq!(config.stop.len(), 3);
        assert!(!config.stream);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_generation_builder() {
        let config = GenerationConfig::default()
            .with_model("llama3")
            .with_endpoint("http://gpu-box:11434")
            .with_temperature(0.7)
            .with_stream(true);
        assert_eq!(config.model, "llama3");
        assert_eq!(config.endpoint, "http://gpu-box:11434");
        assert!(config.stream);
    }

    #[test]
    fn test_generation_validation() {
        let hot = GenerationConfig::default().with_temperature(3.5);
        assert!(matches!(hot.validate(), Err(ConfigError::InvalidTemperature(_))));

        let no_ctx = GenerationConfig::default().with_context_window(0);
        assert!(matches!(no_ctx.validate(), Err(ConfigError::ZeroContextWindow)));

        let bad_url = GenerationConfig::default().with_endpoint("localhost:11434");
        assert!(matches!(bad_url.validate(), Err(ConfigError::InvalidEndpoint(_))));
    }

    #[test]
    fn test_pipeline_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.max_tokens_per_chunk, 75_000);
        assert_eq!(config.event_group_size, 5);
        assert_eq!(config.summary_length, 75_000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_pipeline_rejects_zero_sizes() {
        let config = PipelineConfig::default().with_max_tokens_per_chunk(0);
        assert!(matches!(config.validate(), Err(ConfigError::ZeroTokenLimit)));

        let config = PipelineConfig::default().with_event_group_size(0);
        assert!(matches!(config.validate(), Err(ConfigError::ZeroGroupSize)));
    }
}
