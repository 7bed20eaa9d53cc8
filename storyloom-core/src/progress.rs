//! Progress reporting for long-running pipelines.
//!
//! Pipelines report "chunk i of N" here; the binary draws a spinner, tests
//! count calls, and library users can ignore it with [`noop_progress`].

use crate::error::Stage;
use std::sync::Arc;

/// Receives progress events. Implementations must never fail the caller.
pub trait ProgressReporter: Send + Sync {
    /// A chunk is about to be sent to the model.
    fn chunk_started(&self, stage: Stage, index: usize, total: usize);

    /// The model answered for this chunk.
    fn chunk_finished(&self, _stage: Stage, _index: usize, _total: usize) {}

    /// Streamed output arrived; `chars` is the size of the new piece.
    fn text_received(&self, _chars: usize) {}
}

/// Reporter that ignores everything.
pub struct NoopProgressReporter;

impl ProgressReporter for NoopProgressReporter {
    fn chunk_started(&self, _stage: Stage, _index: usize, _total: usize) {}
}

/// Shorthand for creating a no-op reporter.
pub fn noop_progress() -> Arc<dyn ProgressReporter> {
    Arc::new(NoopProgressReporter)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingReporter {
        started: AtomicUsize,
        chars: AtomicUsize,
    }

    impl ProgressReporter for CountingReporter {
        fn chunk_started(&self, _stage: Stage, _index: usize, _total: usize) {
            self.started.fetch_add(1, Ordering::Relaxed);
        }

        fn text_received(&self, chars: usize) {
            self.chars.fetch_add(chars, Ordering::Relaxed);
        }
    }

    #[test]
    fn test_noop_reporter_does_nothing() {
        let reporter = noop_progress();
        reporter.chunk_started(Stage::Summary, 1, 3);
        reporter.chunk_finished(Stage::Summary, 1, 3);
        reporter.text_received(42);
    }

    #[test]
    fn test_counting_reporter() {
        let reporter = CountingReporter {
            started: AtomicUsize::new(0),
            chars: AtomicUsize::new(0),
        };
        reporter.chunk_started(Stage::Chapter, 1, 2);
        reporter.chunk_started(Stage::Chapter, 2, 2);
        reporter.text_received(10);
        reporter.text_received(5);
        assert_eq!(reporter.started.load(Ordering::Relaxed), 2);
        assert_eq!(reporter.chars.load(Ordering::Relaxed), 15);
    }
}
