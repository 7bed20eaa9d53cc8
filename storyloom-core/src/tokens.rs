//! Approximate token counting.
//!
//! Chunk limits only need to keep each request inside the model's context
//! window with some margin, so exact tokenization is never required. The
//! estimator is a trait so tests and callers can swap the heuristic.

/// Estimates how many tokens a piece of text will cost.
pub trait TokenEstimator: Send + Sync {
    fn estimate(&self, text: &str) -> usize;

    /// Whether the estimate of joined pieces never exceeds the sum of the
    /// pieces' estimates. When true, splitters may add up per-word costs
    /// instead of re-estimating a growing chunk.
    fn is_subadditive(&self) -> bool {
        false
    }
}

impl<F> TokenEstimator for F
where
    F: Fn(&str) -> usize + Send + Sync,
{
    fn estimate(&self, text: &str) -> usize {
        self(text)
    }
}

/// One token per whitespace-separated word.
#[derive(Debug, Clone, Copy, Default)]
pub struct WordCountEstimator;

impl TokenEstimator for WordCountEstimator {
    fn estimate(&self, text: &str) -> usize {
        text.split_whitespace().count()
    }

    fn is_subadditive(&self) -> bool {
        true
    }
}

/// A fixed number of characters per token, rounded up.
#[derive(Debug, Clone, Copy)]
pub struct CharRatioEstimator {
    chars_per_token: f32,
}

impl CharRatioEstimator {
    /// Ratios below one character per token are clamped to one.
    pub fn new(chars_per_token: f32) -> Self {
        let chars_per_token = if chars_per_token.is_finite() {
            chars_per_token.max(1.0)
        } else {
            1.0
        };
        Self { chars_per_token }
    }
}

impl Default for CharRatioEstimator {
    fn default() -> Self {
        Self::new(4.0)
    }
}

impl TokenEstimator for CharRatioEstimator {
    fn estimate(&self, text: &str) -> usize {
        let chars = text.chars().count();
        (chars as f32 / self.chars_per_token).ceil() as usize
    }

    // Rounding each piece up can only over-count the whole.
    fn is_subadditive(&self) -> bool {
        true
    }
}
