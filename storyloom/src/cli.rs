//! Command-line arguments.

use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use storyloom_core::{GenerationConfig, PipelineConfig, SessionConfig};

/// Summarize a long story and write its next chapter with a local LLM
#[derive(Debug, Parser)]
#[command(name = "storyloom", version, about, long_about = None)]
pub struct Cli {
    /// Background story to summarize
    #[arg(long, env = "STORYLOOM_STORY", required_unless_present_any = ["check", "skip_summary"])]
    pub story: Option<PathBuf>,

    /// Instructions file with the key events for the new chapter
    #[arg(long, env = "STORYLOOM_INSTRUCTIONS", required_unless_present = "check")]
    pub instructions: Option<PathBuf>,

    /// Where to save the summary (an existing file is never overwritten)
    #[arg(long, env = "STORYLOOM_SAVE_SUMMARY", default_value = "summary.txt")]
    pub save_summary: PathBuf,

    /// Where to save the new chapter
    #[arg(long, env = "STORYLOOM_NEW_CHAPTER", default_value = "new_chapter.txt")]
    pub new_chapter: PathBuf,

    /// Summary from an earlier run to build on
    #[arg(long, env = "STORYLOOM_PRIOR_SUMMARY")]
    pub prior_summary: Option<PathBuf>,

    /// Use the prior summary as-is instead of summarizing the story
    #[arg(long, env = "STORYLOOM_SKIP_SUMMARY", requires = "prior_summary")]
    pub skip_summary: bool,

    /// Ollama model name
    #[arg(long, env = "STORYLOOM_MODEL", default_value = "gemma3:27b")]
    pub model: String,

    /// Ollama server URL
    #[arg(long, env = "STORYLOOM_OLLAMA_URL", default_value = "http://localhost:11434")]
    pub ollama_url: String,

    /// Maximum estimated tokens per background chunk
    #[arg(long, env = "STORYLOOM_CHUNK_SIZE", default_value_t = 75_000)]
    pub chunk_size: usize,

    /// Key events per generation call. Lower number = longer story
    #[arg(long, env = "STORYLOOM_KEY_EVENT_CHUNK_SIZE", default_value_t = 5)]
    pub key_event_chunk_size: usize,

    /// Target summary length in tokens
    #[arg(long, env = "STORYLOOM_SUMMARY_LENGTH", default_value_t = 75_000)]
    pub summary_length: usize,

    /// Context window requested from the model
    #[arg(long, env = "STORYLOOM_CONTEXT_WINDOW", default_value_t = 128_000)]
    pub context_window: u32,

    /// Sampling temperature
    #[arg(long, env = "STORYLOOM_TEMPERATURE", default_value_t = 1.0)]
    pub temperature: f32,

    /// Timeout for a single model call, in seconds
    #[arg(long, env = "STORYLOOM_TIMEOUT_SECS", default_value_t = 1800)]
    pub timeout_secs: u64,

    /// File replacing the default chapter style instructions
    #[arg(long, env = "STORYLOOM_STYLE")]
    pub style: Option<PathBuf>,

    /// Stream tokens from the model as they are generated
    #[arg(long, env = "STORYLOOM_STREAM")]
    pub stream: bool,

    /// Only check that the server is reachable and the model is installed
    #[arg(long, env = "STORYLOOM_CHECK")]
    pub check: bool,

    /// Log progress (-v) or prompts and token counts (-vv) to stderr
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    pub fn generation_config(&self) -> GenerationConfig {
        GenerationConfig::default()
            .with_model(&self.model)
            .with_endpoint(&self.ollama_url)
            .with_temperature(self.temperature)
            .with_context_window(self.context_window)
            .with_timeout(Duration::from_secs(self.timeout_secs))
            .with_stream(self.stream)
    }

    pub fn session_config(&self) -> SessionConfig {
        let pipeline = PipelineConfig::default()
            .with_max_tokens_per_chunk(self.chunk_size)
            .with_event_group_size(self.key_event_chunk_size)
            .with_summary_length(self.summary_length);

        let mut config = SessionConfig::new(
            self.story.clone().unwrap_or_default(),
            self.instructions.clone().unwrap_or_default(),
        )
        .with_summary_path(&self.save_summary)
        .with_chapter_path(&self.new_chapter)
        .with_skip_summary(self.skip_summary)
        .with_pipeline(pipeline);

        if let Some(prior) = &self.prior_summary {
            config = config.with_prior_summary(prior);
        }
        if let Some(style) = &self.style {
            config = config.with_style(style);
        }
        config
    }

    /// Log filter for the chosen verbosity. `RUST_LOG` still takes precedence.
    pub fn log_directive(&self) -> &'static str {
        match self.verbose {
            0 => "warn",
            1 => "storyloom=info,storyloom_core=info,ollama=info",
            _ => "storyloom=debug,storyloom_core=debug,ollama=debug",
        }
    }
}
