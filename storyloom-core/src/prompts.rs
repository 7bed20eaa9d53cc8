//! Prompt text for both pipelines.

use std::fmt::Write;

const SUMMARY_INITIAL: &str = "\
You are an expert at creating detailed factual summaries from source material.
Create a comprehensive recap of the following text, focusing on all key plot points, characters, and settings.
Your goal is to be expansive, not concise.
Remove all extra words, padding, repeated descriptions etc.
Retain factual statements about characters, places, events and encounters.
The summary should not be written as a readable story, but as a detailed narrative that captures all essential elements.";

const SUMMARY_REFINE: &str = "\
You are an expert at creating detailed summaries. Your task is to continue the following summary by seamlessly integrating a new chunk of text.
Your goal is to build upon the existing summary.
Do not condense; instead, build upon the existing story with details from the new text.
Avoid adding details that are already present in the existing narrative.";

const CHAPTER_STYLE: &str = "\
You are an expert at writing engaging children's fantasy stories.
Write a detailed, coherent chapter that covers the following key events,
using the previous story as context. Do not repeat content. Use simple language,
short to medium sentences, and references to Tolkien's works where appropriate.
Avoid too complicated new words.
Do not introduce new characters or events unless explicitly requested.
If I describe a character, do not assume they are meeting them.
If I describe a place, do not assume they will travel there.
If I describe a creature or other being, do not assume they will meet, see or encounter them.
Do not take the story line beyond what is described in the key events.
Do not add titles or headers.
ONLY OUTPUT THE NEW STORY, directly related to the key events. Do not repeat anything from the previous story.";

/// The instruction text sent with every model call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptSet {
    summary_initial: String,
    summary_refine: String,
    chapter_style: String,
    summary_length: usize,
}

impl Default for PromptSet {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_SUMMARY_LENGTH)
    }
}

impl PromptSet {
    /// Default instructions asking for a summary of about `summary_length` tokens.
    pub fn new(summary_length: usize) -> Self {
        Self {
            summary_initial: SUMMARY_INITIAL.to_string(),
            summary_refine: SUMMARY_REFINE.to_string(),
            chapter_style: CHAPTER_STYLE.to_string(),
            summary_length,
        }
    }

    /// Replace the chapter style instructions, e.g. from a user-supplied file.
    pub fn with_chapter_style(mut self, style: impl Into<String>) -> Self {
        self.chapter_style = style.into().trim().to_string();
        self
    }

    pub fn summary_length(&self) -> usize {
        self.summary_length
    }

    fn length_constraint(&self) -> String {
        format!(
            "The final narrative should be a detailed, comprehensive retelling of around {} tokens.",
            self.summary_length
        )
    }

    /// Prompt for one summary step. An empty running summary selects the
    /// wording for the first chunk.
    pub fn summary_prompt(&self, running_summary: &str, chunk: &str) -> String {
        if running_summary.trim().is_empty() {
            format!(
                "{}\n{}\n\nText: \"{}\"\n\nDETAILED NARRATIVE:",
                self.summary_initial,
                self.length_constraint(),
                chunk
            )
        } else {
            format!(
                "{}\n{}\n\nCurrent story summary:\n\"{}\"\n\nNew story to integrate:\n\"{}\"\n\nUpdated detailed narrative:",
                self.summary_refine,
                self.length_constraint(),
                running_summary,
                chunk
            )
        }
    }

    /// Prompt for one group of events.
    pub fn chapter_prompt<S: AsRef<str>>(
        &self,
        summary: &str,
        chapter_so_far: &str,
        events: &[S],
    ) -> String {
        let mut prompt = String::with_capacity(
            self.chapter_style.len() + summary.len() + chapter_so_far.len() + 256,
        );

        // Writing to a String cannot fail
        let _ = writeln!(prompt, "INSTRUCTION\n{}", self.chapter_style);
        let _ = writeln!(
            prompt,
            "BEGINNING OF BACKGROUND\n{}\nEND OF BACKGROUND\n",
            summary.trim()
        );
        if !chapter_so_far.trim().is_empty() {
            let _ = writeln!(
                prompt,
                "BEGINNING OF CHAPTER SO FAR\n{}\nEND OF CHAPTER SO FAR\n",
                chapter_so_far.trim()
            );
        }
        prompt.push_str("BEGINNING OF KEY EVENTS\n");
        for event in events {
            let _ = writeln!(prompt, "- {}", event.as_ref());
        }
        prompt.push_str("END OF KEY EVENTS\n");
        prompt
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_summary_prompt() {
        let prompts = PromptSet::new(500);
        let prompt = prompts.summary_prompt("", "Once upon a time");

        assert!(prompt.contains("expansive, not concise"));
        assert!(prompt.contains("around 500 tokens"));
        assert!(prompt.contains("Text: \"Once upon a time\""));
        assert!(prompt.ends_with("DETAILED NARRATIVE:"));
        assert!(!prompt.contains("Current story summary"));
    }

    #[test]
    fn test_refine_summary_prompt() {
        let prompts = PromptSet::new(500);
        let prompt = prompts.summary_prompt("The dragon woke.", "The town burned.");

        assert!(prompt.contains("integrating a new chunk"));
        assert!(prompt.contains("around 500 tokens"));
        assert!(prompt.contains("Current story summary:\n\"The dragon woke.\""));
        assert!(prompt.contains("New story to integrate:\n\"The town burned.\""));
    }

    #[test]
    fn test_chapter_prompt_lists_events_in_order() {
        let prompts = PromptSet::default();
        let events = ["Bilbo packs", "Bilbo leaves", "Bilbo forgets his handkerchief"];
        let prompt = prompts.chapter_prompt("A hobbit lived in a hole.", "", &events);

        assert!(prompt.starts_with("INSTRUCTION\n"));
        assert!(
            prompt.contains("BEGINNING OF BACKGROUND\nA hobbit lived in a hole.\nEND OF BACKGROUND")
        );
        assert!(prompt.contains(
            "BEGINNING OF KEY EVENTS\n- Bilbo packs\n- Bilbo leaves\n- Bilbo forgets his handkerchief\nEND OF KEY EVENTS"
        ));
        assert!(!prompt.contains("CHAPTER SO FAR"));
    }

    #[test]
    fn test_chapter_prompt_includes_progress() {
        let prompts = PromptSet::default();
        let prompt = prompts.chapter_prompt("Summary", "Bilbo ran down the lane.\n\n", &["Rain"]);
        assert!(prompt.contains(
            "BEGINNING OF CHAPTER SO FAR\nBilbo ran down the lane.\nEND OF CHAPTER SO FAR"
        ));
    }

    #[test]
    fn test_custom_style() {
        let prompts = PromptSet::default().with_chapter_style("  Write like a pirate.\n");
        let prompt = prompts.chapter_prompt("s", "", &["e"]);
        assert!(prompt.starts_with("INSTRUCTION\nWrite like a pirate.\n"));
        assert!(!prompt.contains("Tolkien"));
    }
}
