//! Splitting inputs into chunks small enough for one model call.
//!
//! Background text is split by estimated token count, events by whole-event
//! count. Both splitters borrow from their input and are deterministic, so a
//! split can be re-run (or cloned and counted) at no cost beyond iteration.

use crate::error::ConfigError;
use crate::tokens::{TokenEstimator, WordCountEstimator};

/// Default maximum estimated tokens per background chunk.
pub const DEFAULT_MAX_TOKENS: usize = 75_000;

/// Default number of events per chapter-generation call.
pub const DEFAULT_GROUP_SIZE: usize = 5;

/// A piece of a larger input together with its 1-based position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk<T> {
    pub index: usize,
    pub total: usize,
    pub content: T,
}

/// Attach `index`/`total` bookkeeping to every item of a restartable iterator.
pub fn numbered<I>(items: I) -> impl Iterator<Item = Chunk<I::Item>>
where
    I: Iterator + Clone,
{
    let total = items.clone().count();
    items.enumerate().map(move |(i, content)| Chunk {
        index: i + 1,
        total,
        content,
    })
}

/// Splits text into chunks of at most `max_tokens` estimated tokens.
#[derive(Debug, Clone)]
pub struct TextSplitter<E = WordCountEstimator> {
    max_tokens: usize,
    estimator: E,
}

impl TextSplitter<WordCountEstimator> {
    /// Create a splitter using the word-count estimate.
    pub fn new(max_tokens: usize) -> Result<Self, ConfigError> {
        Self::with_estimator(max_tokens, WordCountEstimator)
    }
}

impl<E: TokenEstimator> TextSplitter<E> {
    /// Create a splitter with a custom token estimator.
    pub fn with_estimator(max_tokens: usize, estimator: E) -> Result<Self, ConfigError> {
        if max_tokens == 0 {
            return Err(ConfigError::ZeroTokenLimit);
        }
        Ok(Self {
            max_tokens,
            estimator,
        })
    }

    pub fn max_tokens(&self) -> usize {
        self.max_tokens
    }

    /// Estimate the token cost of `text` with this splitter's estimator.
    pub fn estimate(&self, text: &str) -> usize {
        self.estimator.estimate(text)
    }

    /// Lazily split `text`.
    ///
    /// Chunks are cut between words, never inside one, and concatenate back to
    /// `text` exactly. Empty text yields no chunks.
    pub fn split<'a>(&'a self, text: &'a str) -> TextChunks<'a, E> {
        TextChunks {
            rest: text,
            max_tokens: self.max_tokens,
            estimator: &self.estimator,
        }
    }
}

/// Iterator over the chunks of a text. See [`TextSplitter::split`].
pub struct TextChunks<'a, E> {
    rest: &'a str,
    max_tokens: usize,
    estimator: &'a E,
}

impl<E> Clone for TextChunks<'_, E> {
    fn clone(&self) -> Self {
        Self {
            rest: self.rest,
            max_tokens: self.max_tokens,
            estimator: self.estimator,
        }
    }
}

impl<'a, E: TokenEstimator> Iterator for TextChunks<'a, E> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        if self.rest.is_empty() {
            return None;
        }

        // Subadditive estimators can sum unit costs; any other estimator is
        // asked about the whole candidate chunk.
        let additive = self.estimator.is_subadditive();
        let mut end = 0;
        let mut used = 0;
        for unit in Units::new(self.rest) {
            let next = end + unit.len();
            let cost = if additive {
                used + self.estimator.estimate(unit)
            } else {
                self.estimator.estimate(&self.rest[..next])
            };
            if end > 0 && cost > self.max_tokens {
                break;
            }
            used = cost;
            end = next;
        }

        let (chunk, rest) = self.rest.split_at(end);
        self.rest = rest;
        Some(chunk)
    }
}

/// Atomic pieces of text: one word plus the whitespace that follows it.
/// Whitespace before the first word belongs to the first unit.
struct Units<'a> {
    rest: &'a str,
}

impl<'a> Units<'a> {
    fn new(text: &'a str) -> Self {
        Self { rest: text }
    }
}

impl<'a> Iterator for Units<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        if self.rest.is_empty() {
            return None;
        }

        let mut seen_word = false;
        let mut in_trailing_space = false;
        for (i, c) in self.rest.char_indices() {
            if c.is_whitespace() {
                in_trailing_space = seen_word;
            } else if in_trailing_space {
                let (unit, rest) = self.rest.split_at(i);
                self.rest = rest;
                return Some(unit);
            } else {
                seen_word = true;
            }
        }

        let unit = self.rest;
        self.rest = "";
        Some(unit)
    }
}

/// Ordered groups of borrowed events.
pub type EventGroups<'a, T> = std::slice::Chunks<'a, T>;

/// Split events into groups of `group_size`, keeping order. Only the last
/// group may be short.
pub fn event_groups<T>(
    events: &[T],
    group_size: usize,
) -> Result<EventGroups<'_, T>, ConfigError> {
    if group_size == 0 {
        return Err(ConfigError::ZeroGroupSize);
    }
    Ok(events.chunks(group_size))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokens::CharRatioEstimator;

    fn words(n: usize) -> String {
        (0..n).map(|i| format!("w{i}")).collect::<Vec<_>>().join(" ")
    }

    fn assert_within_limit<E: TokenEstimator>(splitter: &TextSplitter<E>, text: &str) {
        for chunk in splitter.split(text) {
            let single_unit = Units::new(chunk).count() == 1;
            assert!(
                splitter.estimate(chunk) <= splitter.max_tokens() || single_unit,
                "chunk over limit: {chunk:?}"
            );
        }
    }

    #[test]
    fn test_zero_limit_rejected() {
        assert!(matches!(
            TextSplitter::new(0),
            Err(ConfigError::ZeroTokenLimit)
        ));
    }

    #[test]
    fn test_small_text_is_one_chunk() {
        let splitter = TextSplitter::new(100).unwrap();
        let chunks: Vec<_> = splitter.split("A short tale.").collect();
        assert_eq!(chunks, vec!["A short tale."]);
    }

    #[test]
    fn test_empty_text_has_no_chunks() {
        let splitter = TextSplitter::new(10).unwrap();
        assert_eq!(splitter.split("").count(), 0);
    }

    #[test]
    fn test_whitespace_only_text_is_one_chunk() {
        let splitter = TextSplitter::new(10).unwrap();
        let chunks: Vec<_> = splitter.split("  \n\n ").collect();
        assert_eq!(chunks, vec!["  \n\n "]);
    }

    #[test]
    fn test_concatenation_is_lossless() {
        let text = "  Bilbo woke early.\n\nThe kettle sang;  Gandalf knocked twice.\tThen silence.\n";
        for limit in 1..12 {
            let splitter = TextSplitter::new(limit).unwrap();
            let joined: String = splitter.split(text).collect();
            assert_eq!(joined, text, "limit {limit}");
            assert_within_limit(&splitter, text);
        }
    }

    #[test]
    fn test_chunks_fill_up_to_limit() {
        let splitter = TextSplitter::new(3).unwrap();
        let chunks: Vec<_> = splitter.split("one two three four five six seven").collect();
        assert_eq!(chunks, vec!["one two three ", "four five six ", "seven"]);
    }

    #[test]
    fn test_oversized_unit_stands_alone() {
        let splitter = TextSplitter::with_estimator(2, CharRatioEstimator::new(1.0)).unwrap();
        let chunks: Vec<_> = splitter.split("a supercalifragilistic b").collect();
        assert_eq!(chunks, vec!["a ", "supercalifragilistic ", "b"]);
    }

    #[test]
    fn test_split_is_restartable() {
        let text = words(1_000);
        let splitter = TextSplitter::new(75).unwrap();
        let first: Vec<_> = splitter.split(&text).collect();
        let second: Vec<_> = splitter.split(&text).collect();
        assert_eq!(first, second);

        let chunks = splitter.split(&text);
        assert_eq!(chunks.clone().count(), chunks.count());
    }

    #[test]
    fn test_two_hundred_thousand_tokens_make_three_chunks() {
        let text = words(200_000);
        let splitter = TextSplitter::new(DEFAULT_MAX_TOKENS).unwrap();
        let sizes: Vec<_> = splitter
            .split(&text)
            .map(|c| splitter.estimate(c))
            .collect();
        assert_eq!(sizes, vec![75_000, 75_000, 50_000]);
    }

    #[test]
    fn test_injected_estimator_controls_boundaries() {
        let splitter =
            TextSplitter::with_estimator(2, |t: &str| t.split_whitespace().count()).unwrap();
        let chunks: Vec<_> = splitter.split("alpha beta gamma delta epsilon").collect();
        assert_eq!(chunks, vec!["alpha beta ", "gamma delta ", "epsilon"]);
    }

    #[test]
    fn test_rounding_down_estimator_stays_within_limit() {
        // Each "ab " alone rounds down to zero tokens
        let splitter = TextSplitter::with_estimator(1, |t: &str| t.len() / 4).unwrap();
        let text = vec!["ab"; 10].join(" ");

        let chunks: Vec<_> = splitter.split(&text).collect();

        assert_eq!(chunks.len(), 5);
        assert!(chunks.iter().all(|c| splitter.estimate(c) <= 1));
        assert_eq!(chunks.concat(), text);
        assert_within_limit(&splitter, &text);
    }

    #[test]
    fn test_numbered_chunks() {
        let splitter = TextSplitter::new(2).unwrap();
        let chunks: Vec<_> = numbered(splitter.split("a b c d e")).collect();
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].index, 1);
        assert_eq!(chunks[2].index, 3);
        assert!(chunks.iter().all(|c| c.total == 3));
        assert_eq!(chunks[2].content, "e");
    }

    #[test]
    fn test_event_groups_preserve_order() {
        let events: Vec<String> = (1..=11).map(|i| format!("event {i}")).collect();
        let groups: Vec<_> = event_groups(&events, 4).unwrap().collect();

        assert_eq!(groups.len(), 3);
        assert_eq!(groups[0], &events[0..4]);
        assert_eq!(groups[1], &events[4..8]);
        assert_eq!(groups[2], &events[8..11]);
        assert_eq!(groups.concat(), events);
    }

    #[test]
    fn test_event_groups_sizes() {
        let events: Vec<u32> = (0..23).collect();
        for size in 1..30 {
            let groups: Vec<_> = event_groups(&events, size).unwrap().collect();
            assert_eq!(groups.len(), events.len().div_ceil(size));
            let (last, full) = groups.split_last().unwrap();
            assert!(full.iter().all(|g| g.len() == size));
            assert!(last.len() <= size && !last.is_empty());
        }
    }

    #[test]
    fn test_event_groups_reject_zero() {
        let events = vec!["a"];
        assert!(matches!(
            event_groups(&events, 0),
            Err(ConfigError::ZeroGroupSize)
        ));
    }
}
