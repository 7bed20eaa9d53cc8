//! Summarize a long story and write a new chapter for it with a local LLM.
//!
//! This crate provides:
//! - Token-bounded splitting of background text and grouping of key events
//! - A rolling summarization pipeline that stays inside the context window
//! - A chapter pipeline that writes a few events at a time
//! - An Ollama-backed generator and a mock for tests
//!
//! # Quick Start
//!
//! ```ignore
//! use storyloom_core::{GenerationConfig, OllamaGenerator, SessionConfig, StorySession};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let generator = OllamaGenerator::new(GenerationConfig::default())?;
//!     let config = SessionConfig::new("story.txt", "instructions.txt");
//!
//!     let report = StorySession::new(&generator, config)?.run().await?;
//!     println!("{}", report.chapter);
//!     Ok(())
//! }
//! ```

pub mod chapter;
pub mod config;
pub mod error;
pub mod events;
pub mod generator;
pub mod persist;
pub mod progress;
pub mod prompts;
pub mod session;
pub mod splitter;
pub mod summarizer;
pub mod testing;
pub mod tokens;

// Primary public API
pub use chapter::{Chapter, ChapterGenerator};
pub use config::{GenerationConfig, PipelineConfig};
pub use error::{ConfigError, GeneratorError, InputFormatError, Result, Stage, StoryError};
pub use events::EventList;
pub use generator::{OllamaGenerator, TextGenerator};
pub use progress::{noop_progress, NoopProgressReporter, ProgressReporter};
pub use prompts::PromptSet;
pub use session::{RunReport, SessionConfig, StoryInputs, StorySession};
pub use splitter::{event_groups, Chunk, EventGroups, TextChunks, TextSplitter};
pub use summarizer::{Summarizer, Summary};
pub use testing::MockGenerator;
pub use tokens::{CharRatioEstimator, TokenEstimator, WordCountEstimator};

// Re-export so callers can build a token without depending on tokio-util
pub use tokio_util::sync::CancellationToken;
