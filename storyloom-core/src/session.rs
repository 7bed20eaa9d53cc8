//! A complete run: load inputs, summarize, write the chapter, save outputs.
//!
//! This is the main entry point for the binary and for library users that
//! work with files rather than strings.

use crate::chapter::{Chapter, ChapterGenerator};
use crate::config::PipelineConfig;
use crate::error::{ConfigError, Result};
use crate::events::EventList;
use crate::generator::TextGenerator;
use crate::persist::{next_available_path, read_input, write_outputs, Output};
use crate::progress::{noop_progress, ProgressReporter};
use crate::prompts::PromptSet;
use crate::splitter::TextSplitter;
use crate::summarizer::{Summarizer, Summary};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Configuration for a run.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Background text to summarize.
    pub story_path: PathBuf,

    /// Instructions listing the key events.
    pub instructions_path: PathBuf,

    /// Where to save the summary. Never overwritten; see [`crate::persist::next_available_path`].
    pub summary_path: PathBuf,

    /// Where to save the chapter. Overwritten.
    pub chapter_path: PathBuf,

    /// Summary from an earlier run to build on.
    pub prior_summary_path: Option<PathBuf>,

    /// Use the prior summary as-is and skip summarization.
    pub skip_summary: bool,

    /// Replacement chapter style instructions.
    pub style_path: Option<PathBuf>,

    pub pipeline: PipelineConfig,
}

impl SessionConfig {
    /// Create a config with default output paths.
    pub fn new(story_path: impl Into<PathBuf>, instructions_path: impl Into<PathBuf>) -> Self {
        Self {
            story_path: story_path.into(),
            instructions_path: instructions_path.into(),
            summary_path: PathBuf::from("summary.txt"),
            chapter_path: PathBuf::from("new_chapter.txt"),
            prior_summary_path: None,
            skip_summary: false,
            style_path: None,
            pipeline: PipelineConfig::default(),
        }
    }

    pub fn with_summary_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.summary_path = path.into();
        self
    }

    pub fn with_chapter_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.chapter_path = path.into();
        self
    }

    pub fn with_prior_summary(mut self, path: impl Into<PathBuf>) -> Self {
        self.prior_summary_path = Some(path.into());
        self
    }

    pub fn with_skip_summary(mut self, skip: bool) -> Self {
        self.skip_summary = skip;
        self
    }

    pub fn with_style(mut self, path: impl Into<PathBuf>) -> Self {
        self.style_path = Some(path.into());
        self
    }

    pub fn with_pipeline(mut self, pipeline: PipelineConfig) -> Self {
        self.pipeline = pipeline;
        self
    }

    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        self.pipeline.validate()?;
        if self.skip_summary && self.prior_summary_path.is_none() {
            return Err(ConfigError::SkipWithoutPriorSummary);
        }
        Ok(())
    }
}

/// Everything a run reads before the first model call.
#[derive(Debug, Clone)]
pub struct StoryInputs {
    pub background: String,
    pub events: EventList,
    pub prior_summary: Option<Summary>,
    pub style: Option<String>,
}

/// What a successful run produced.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub summary: Summary,
    pub chapter: Chapter,

    /// Where the summary was saved; may differ from the requested path.
    pub summary_path: PathBuf,
    pub chapter_path: PathBuf,

    pub summary_chunks: usize,
    pub event_groups: usize,
    pub elapsed: Duration,
}

impl RunReport {
    /// Total number of model calls made.
    pub fn model_calls(&self) -> usize {
        self.summary_chunks + self.event_groups
    }
}

/// A single summarize-then-write run.
pub struct StorySession<'a, G: ?Sized> {
    generator: &'a G,
    config: SessionConfig,
    progress: Arc<dyn ProgressReporter>,
    cancel: CancellationToken,
}

impl<'a, G> StorySession<'a, G>
where
    G: TextGenerator + ?Sized,
{
    /// Create a session. Fails on invalid configuration before touching any file.
    pub fn new(generator: &'a G, config: SessionConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            generator,
            config,
            progress: noop_progress(),
            cancel: CancellationToken::new(),
        })
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressReporter>) -> Self {
        self.progress = progress;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Read and parse every input file.
    pub async fn load_inputs(&self) -> Result<StoryInputs> {
        let config = &self.config;

        let background = if config.skip_summary {
            String::new()
        } else {
            read_input("story", &config.story_path).await?
        };

        let instructions = read_input("instructions", &config.instructions_path).await?;
        let events = EventList::parse(&instructions)?;

        let prior_summary = match &config.prior_summary_path {
            Some(path) => Some(Summary::from_text(
                read_input("prior summary", path).await?.trim(),
            )),
            None => None,
        };

        let style = match &config.style_path {
            Some(path) => Some(read_input("style", path).await?),
            None => None,
        };

        Ok(StoryInputs {
            background,
            events,
            prior_summary,
            style,
        })
    }

    /// Run both pipelines and save the results.
    ///
    /// Nothing is written unless both pipelines succeed.
    pub async fn run(&self) -> Result<RunReport> {
        let start = Instant::now();
        let inputs = self.load_inputs().await?;
        info!(
            background_bytes = inputs.background.len(),
            events = inputs.events.len(),
            "Loaded inputs"
        );

        let mut prompts = PromptSet::new(self.config.pipeline.summary_length);
        if let Some(style) = &inputs.style {
            prompts = prompts.with_chapter_style(style.as_str());
        }

        let summary = self.summarize(&prompts, &inputs).await?;

        let chapter = ChapterGenerator::new(self.generator, &prompts)
            .with_group_size(self.config.pipeline.event_group_size)
            .with_progress(self.progress.clone())
            .with_cancellation(self.cancel.clone())
            .generate(summary.as_str(), &inputs.events)
            .await?;
        let event_groups = inputs
            .events
            .len()
            .div_ceil(self.config.pipeline.event_group_size);

        let summary_path = next_available_path(&self.config.summary_path).await?;
        let chapter_text = format!("{}\n", chapter.text());
        write_outputs(&[
            Output {
                path: &summary_path,
                contents: summary.as_str(),
                fresh: true,
            },
            Output {
                path: &self.config.chapter_path,
                contents: &chapter_text,
                fresh: false,
            },
        ])
        .await?;
        info!(
            summary = %summary_path.display(),
            chapter = %self.config.chapter_path.display(),
            "Outputs saved"
        );

        Ok(RunReport {
            summary_chunks: summary.chunks(),
            summary,
            chapter,
            summary_path,
            chapter_path: self.config.chapter_path.clone(),
            event_groups,
            elapsed: start.elapsed(),
        })
    }

    async fn summarize(&self, prompts: &PromptSet, inputs: &StoryInputs) -> Result<Summary> {
        let prior = inputs.prior_summary.clone().unwrap_or_default();
        if self.config.skip_summary {
            info!("Reusing prior summary without summarization");
            return Ok(prior);
        }

        let splitter = TextSplitter::new(self.config.pipeline.max_tokens_per_chunk)?;
        Summarizer::new(self.generator, prompts, splitter)
            .with_progress(self.progress.clone())
            .with_cancellation(self.cancel.clone())
            .resume(&prior, &inputs.background)
            .await
    }
}
