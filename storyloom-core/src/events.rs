//! Key events for the new chapter.
//!
//! An instructions file either lists events one per line, or wraps them in a
//! marked block so it can carry free-form notes around the list:
//!
//! ```text
//! Notes for the author...
//! START OF KEY EVENTS:
//! - Bilbo finds the map
//! - The dwarves argue about the route
//! END OF KEY EVENTS:
//! ```

use crate::error::{ConfigError, InputFormatError};
use crate::splitter::{event_groups, EventGroups};

const START_MARKER: &str = "START OF KEY EVENTS";
const END_MARKER: &str = "END OF KEY EVENTS";

/// An ordered, non-empty list of single-line events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventList {
    events: Vec<String>,
}

impl EventList {
    /// Build from already separated events. Blank entries are dropped and
    /// each event is trimmed.
    pub fn new<I, S>(events: I) -> Result<Self, InputFormatError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let events: Vec<String> = events
            .into_iter()
            .map(|e| e.as_ref().trim().to_string())
            .filter(|e| !e.is_empty())
            .collect();

        if events.is_empty() {
            return Err(InputFormatError::NoEvents);
        }
        Ok(Self { events })
    }

    /// Extract events from the contents of an instructions file.
    pub fn parse(instructions: &str) -> Result<Self, InputFormatError> {
        let lines: Vec<&str> = instructions.lines().collect();

        let start = lines.iter().position(|l| is_marker(l, START_MARKER));
        let end = lines.iter().position(|l| is_marker(l, END_MARKER));

        let body = match (start, end) {
            (Some(s), Some(e)) if e > s => &lines[s + 1..e],
            (Some(s), None) => {
                return Err(InputFormatError::UnterminatedEventBlock { line: s + 1 })
            }
            (_, Some(e)) => return Err(InputFormatError::UnexpectedEndMarker { line: e + 1 }),
            (None, None) => &lines[..],
        };

        Self::new(body.iter().map(|l| strip_bullet(l.trim())))
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Always false for a constructed list.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn as_slice(&self) -> &[String] {
        &self.events
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.events.iter().map(String::as_str)
    }

    /// Split into groups of `group_size` events.
    pub fn groups(&self, group_size: usize) -> Result<EventGroups<'_, String>, ConfigError> {
        event_groups(&self.events, group_size)
    }
}

fn is_marker(line: &str, marker: &str) -> bool {
    line.trim()
        .trim_end_matches(':')
        .trim_end()
        .eq_ignore_ascii_case(marker)
}

/// Remove one leading list bullet. A dash glued to a word ("-5 gold") is
/// content, not a bullet.
fn strip_bullet(line: &str) -> &str {
    match line.strip_prefix(['-', '*', '•']) {
        Some(rest) if rest.is_empty() || rest.starts_with(char::is_whitespace) => {
            rest.trim_start()
        }
        _ => line,
    }
}
