//! Writing a new chapter from a summary and a list of key events.
//!
//! Events are handled a few at a time. Each call sees the summary, the
//! chapter written so far, and the next group of events, and its response is
//! appended as a new section.

use crate::error::{Result, Stage};
use crate::events::EventList;
use crate::generator::{call_for_chunk, TextGenerator};
use crate::progress::{noop_progress, ProgressReporter};
use crate::prompts::PromptSet;
use crate::splitter::{numbered, DEFAULT_GROUP_SIZE};
use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// A generated chapter, one section per event group.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Chapter {
    sections: Vec<String>,
}

impl Chapter {
    pub fn sections(&self) -> &[String] {
        &self.sections
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    /// The chapter text, sections separated by a blank line.
    pub fn text(&self) -> String {
        self.sections.join("\n\n")
    }

    fn push_section(&mut self, section: &str) {
        self.sections.push(section.trim().to_string());
    }
}

impl fmt::Display for Chapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text())
    }
}

/// Runs the chapter generation pipeline.
pub struct ChapterGenerator<'a, G: ?Sized> {
    generator: &'a G,
    prompts: &'a PromptSet,
    group_size: usize,
    progress: Arc<dyn ProgressReporter>,
    cancel: CancellationToken,
}

impl<'a, G> ChapterGenerator<'a, G>
where
    G: TextGenerator + ?Sized,
{
    pub fn new(generator: &'a G, prompts: &'a PromptSet) -> Self {
        Self {
            generator,
            prompts,
            group_size: DEFAULT_GROUP_SIZE,
            progress: noop_progress(),
            cancel: CancellationToken::new(),
        }
    }

    /// Events per model call. Zero is rejected when generation starts.
    pub fn with_group_size(mut self, group_size: usize) -> Self {
        self.group_size = group_size;
        self
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressReporter>) -> Self {
        self.progress = progress;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Write a chapter covering every event, in order.
    pub async fn generate(&self, summary: &str, events: &EventList) -> Result<Chapter> {
        let groups = events.groups(self.group_size)?;
        info!(
            events = events.len(),
            groups = groups.len(),
            generator = self.generator.name(),
            "Generating chapter"
        );

        let mut chapter = Chapter::default();
        let mut first_event = 1;
        for group in numbered(groups) {
            let last_event = first_event + group.content.len() - 1;
            self.progress
                .chunk_started(Stage::Chapter, group.index, group.total);
            info!(
                "Writing key events {first_event}-{last_event} [chunk {} of {}]",
                group.index, group.total
            );

            let prompt = self
                .prompts
                .chapter_prompt(summary, &chapter.text(), group.content);
            debug!(prompt_bytes = prompt.len(), "Sending chapter prompt");

            let section = call_for_chunk(
                self.generator,
                &prompt,
                Stage::Chapter,
                group.index,
                group.total,
                &self.cancel,
            )
            .await?;

            chapter.push_section(&section);
            self.progress
                .chunk_finished(Stage::Chapter, group.index, group.total);
            first_event = last_event + 1;
        }

        Ok(chapter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ConfigError, GeneratorError, StoryError};
    use crate::testing::MockGenerator;

    fn events(n: usize) -> EventList {
        EventList::new((1..=n).map(|i| format!("event {i}"))).unwrap()
    }

    #[tokio::test]
    async fn test_calls_per_group() {
        let mock = MockGenerator::new();
        let prompts = PromptSet::default();
        let generator = ChapterGenerator::new(&mock, &prompts).with_group_size(4);

        let chapter = generator.generate("summary", &events(11)).await.unwrap();

        assert_eq!(mock.call_count(), 3);
        assert_eq!(chapter.sections().len(), 3);

        let sent = mock.prompts();
        assert!(sent[0].contains("- event 1\n- event 2\n- event 3\n- event 4\nEND OF KEY EVENTS"));
        assert!(sent[1].contains("BEGINNING OF KEY EVENTS\n- event 5\n"));
        assert!(sent[2].contains("- event 9\n- event 10\n- event 11\nEND OF KEY EVENTS"));
        assert!(!sent[2].contains("- event 8\n"));
    }

    #[tokio::test]
    async fn test_sections_accumulate() {
        let mock = MockGenerator::with_responses(["  Bilbo set out.\n", "He met a troll."]);
        let prompts = PromptSet::default();
        let generator = ChapterGenerator::new(&mock, &prompts).with_group_size(1);

        let chapter = generator.generate("summary", &events(2)).await.unwrap();

        assert_eq!(chapter.text(), "Bilbo set out.\n\nHe met a troll.");
        let sent = mock.prompts();
        assert!(!sent[0].contains("CHAPTER SO FAR"));
        assert!(sent[1]
            .contains("BEGINNING OF CHAPTER SO FAR\nBilbo set out.\nEND OF CHAPTER SO FAR"));
        assert!(sent.iter().all(|p| p.contains("BEGINNING OF BACKGROUND\nsummary\n")));
    }

    #[tokio::test]
    async fn test_zero_group_size_rejected_before_calls() {
        let mock = MockGenerator::new();
        let prompts = PromptSet::default();
        let generator = ChapterGenerator::new(&mock, &prompts).with_group_size(0);

        let err = generator.generate("summary", &events(3)).await.unwrap_err();

        assert!(matches!(err, StoryError::Config(ConfigError::ZeroGroupSize)));
        assert_eq!(mock.call_count(), 0);
    }

    #[tokio::test]
    async fn test_blank_section_fails_group() {
        let mock = MockGenerator::with_responses(["Bilbo set out.", " \n\t "]);
        let prompts = PromptSet::default();
        let generator = ChapterGenerator::new(&mock, &prompts).with_group_size(2);

        let err = generator.generate("summary", &events(5)).await.unwrap_err();

        assert_eq!(err.failed_chunk(), Some((Stage::Chapter, 2, 3)));
        assert!(matches!(
            err,
            StoryError::Backend {
                source: GeneratorError::EmptyResponse,
                ..
            }
        ));
        assert_eq!(mock.call_count(), 2);
    }

    #[tokio::test]
    async fn test_failure_names_group() {
        let mock = MockGenerator::new().fail_on_call(3, "model crashed");
        let prompts = PromptSet::default();
        let generator = ChapterGenerator::new(&mock, &prompts).with_group_size(2);

        let err = generator.generate("summary", &events(6)).await.unwrap_err();
        assert_eq!(err.failed_chunk(), Some((Stage::Chapter, 3, 3)));
    }
}
