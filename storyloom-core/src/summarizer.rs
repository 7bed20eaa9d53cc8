//! Condensing a long background text into one summary.
//!
//! The text is split into token-bounded chunks and folded into a running
//! summary one chunk at a time. Each model response replaces the running
//! summary, so the prompt always carries the whole summary so far and the
//! final response is the complete summary.

use crate::error::{Result, Stage};
use crate::generator::{call_for_chunk, TextGenerator};
use crate::progress::{noop_progress, ProgressReporter};
use crate::prompts::PromptSet;
use crate::splitter::{numbered, TextSplitter};
use crate::tokens::{TokenEstimator, WordCountEstimator};
use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// A condensed background.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Summary {
    text: String,
    chunks: usize,
}

impl Summary {
    /// Wrap existing summary text, e.g. loaded from a previous run.
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            chunks: 0,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn into_string(self) -> String {
        self.text
    }

    /// Number of background chunks folded in by this run.
    pub fn chunks(&self) -> usize {
        self.chunks
    }

    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Runs the summarization pipeline.
pub struct Summarizer<'a, G: ?Sized, E = WordCountEstimator> {
    generator: &'a G,
    prompts: &'a PromptSet,
    splitter: TextSplitter<E>,
    progress: Arc<dyn ProgressReporter>,
    cancel: CancellationToken,
}

impl<'a, G, E> Summarizer<'a, G, E>
where
    G: TextGenerator + ?Sized,
    E: TokenEstimator,
{
    pub fn new(generator: &'a G, prompts: &'a PromptSet, splitter: TextSplitter<E>) -> Self {
        Self {
            generator,
            prompts,
            splitter,
            progress: noop_progress(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressReporter>) -> Self {
        self.progress = progress;
        self
    }

    /// Stop before the next chunk (or during the current call) once `cancel` fires.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Summarize `text` from scratch.
    pub async fn summarize(&self, text: &str) -> Result<Summary> {
        self.resume(&Summary::default(), text).await
    }

    /// Fold `text` into an existing summary.
    ///
    /// With an empty text no model call is made and the prior summary comes
    /// back unchanged.
    pub async fn resume(&self, prior: &Summary, text: &str) -> Result<Summary> {
        let chunks = self.splitter.split(text);
        let total = chunks.clone().count();
        info!(
            chunks = total,
            max_tokens = self.splitter.max_tokens(),
            generator = self.generator.name(),
            "Summarizing background"
        );

        let mut running = prior.as_str().to_string();
        for chunk in numbered(chunks) {
            self.progress
                .chunk_started(Stage::Summary, chunk.index, chunk.total);
            if running.trim().is_empty() {
                info!("Creating summary from chunk {} of {}", chunk.index, chunk.total);
            } else {
                info!("Refining summary with chunk {} of {}", chunk.index, chunk.total);
            }

            let prompt = self.prompts.summary_prompt(&running, chunk.content);
            debug!(
                chunk_tokens = self.splitter.estimate(chunk.content),
                prompt_tokens = self.splitter.estimate(&prompt),
                "Sending summary prompt"
            );

            let response = call_for_chunk(
                self.generator,
                &prompt,
                Stage::Summary,
                chunk.index,
                chunk.total,
                &self.cancel,
            )
            .await?;

            running = response.trim().to_string();
            self.progress
                .chunk_finished(Stage::Summary, chunk.index, chunk.total);
        }

        Ok(Summary {
            text: running,
            chunks: total,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoryError;
    use crate::testing::MockGenerator;

    fn splitter(limit: usize) -> TextSplitter {
        TextSplitter::new(limit).unwrap()
    }

    #[tokio::test]
    async fn test_one_call_per_chunk() {
        let mock = MockGenerator::new();
        let prompts = PromptSet::new(100);
        let summarizer = Summarizer::new(&mock, &prompts, splitter(3));

        let summary = summarizer.summarize("a b c d e f g").await.unwrap();

        assert_eq!(mock.call_count(), 3);
        assert_eq!(summary.chunks(), 3);
        assert_eq!(summary.as_str(), "response 3");
    }

    #[tokio::test]
    async fn test_each_prompt_carries_previous_output() {
        let mock = MockGenerator::with_responses(["first pass", "second pass"]);
        let prompts = PromptSet::new(100);
        let summarizer = Summarizer::new(&mock, &prompts, splitter(2));

        let summary = summarizer.summarize("one two three four").await.unwrap();
        let sent = mock.prompts();

        assert_eq!(sent.len(), 2);
        assert!(sent[0].contains("Text: \"one two \""));
        assert!(!sent[0].contains("Current story summary"));
        assert!(sent[1].contains("Current story summary:\n\"first pass\""));
        assert!(sent[1].contains("\"three four\""));
        assert_eq!(summary.as_str(), "second pass");
    }

    #[tokio::test]
    async fn test_empty_text_makes_no_calls() {
        let mock = MockGenerator::new();
        let prompts = PromptSet::default();
        let summarizer = Summarizer::new(&mock, &prompts, splitter(10));

        let summary = summarizer.summarize("").await.unwrap();
        assert_eq!(mock.call_count(), 0);
        assert!(summary.is_empty());

        let prior = Summary::from_text("Earlier events.");
        let resumed = summarizer.resume(&prior, "").await.unwrap();
        assert_eq!(resumed.as_str(), "Earlier events.");
    }

    #[tokio::test]
    async fn test_resume_starts_with_refine_wording() {
        let mock = MockGenerator::new();
        let prompts = PromptSet::default();
        let summarizer = Summarizer::new(&mock, &prompts, splitter(10));

        let prior = Summary::from_text("The story so far.");
        summarizer.resume(&prior, "New pages.").await.unwrap();

        let sent = mock.prompts();
        assert!(sent[0].contains("Current story summary:\n\"The story so far.\""));
    }

    #[tokio::test]
    async fn test_failure_names_chunk() {
        let mock = MockGenerator::new().fail_on_call(2, "connection reset");
        let prompts = PromptSet::default();
        let summarizer = Summarizer::new(&mock, &prompts, splitter(1));

        let err = summarizer.summarize("x y z").await.unwrap_err();

        assert_eq!(err.failed_chunk(), Some((Stage::Summary, 2, 3)));
        assert_eq!(mock.call_count(), 2);
    }

    #[tokio::test]
    async fn test_cancelled_before_first_chunk() {
        let mock = MockGenerator::new();
        let prompts = PromptSet::default();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let summarizer =
            Summarizer::new(&mock, &prompts, splitter(1)).with_cancellation(cancel);

        let err = summarizer.summarize("x y").await.unwrap_err();

        assert!(matches!(
            err,
            StoryError::Cancelled {
                stage: Stage::Summary,
                completed: 0,
                total: 2
            }
        ));
        assert_eq!(mock.call_count(), 0);
    }
}
