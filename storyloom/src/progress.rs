//! Terminal spinner showing which chunk is being processed.

use indicatif::{ProgressBar, ProgressStyle};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use storyloom_core::{ProgressReporter, Stage};

pub struct SpinnerProgress {
    bar: ProgressBar,
    step: Mutex<String>,
    received: AtomicUsize,
}

impl SpinnerProgress {
    /// A spinner on stderr, or a hidden one when logs are going there instead.
    pub fn new(visible: bool) -> Self {
        let bar = if visible {
            let bar = ProgressBar::new_spinner();
            if let Ok(style) = ProgressStyle::with_template("{spinner} [{elapsed_precise}] {msg}") {
                bar.set_style(style);
            }
            bar.enable_steady_tick(Duration::from_millis(120));
            bar
        } else {
            ProgressBar::hidden()
        };

        Self {
            bar,
            step: Mutex::new(String::new()),
            received: AtomicUsize::new(0),
        }
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }

    fn step(&self) -> String {
        self.step.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

impl ProgressReporter for SpinnerProgress {
    fn chunk_started(&self, stage: Stage, index: usize, total: usize) {
        let step = match stage {
            Stage::Summary => format!("Summarizing background: chunk {index} of {total}"),
            Stage::Chapter => format!("Writing chapter: chunk {index} of {total}"),
        };
        if let Ok(mut current) = self.step.lock() {
            current.clone_from(&step);
        }
        self.received.store(0, Ordering::Relaxed);
        self.bar.set_message(step);
    }

    fn text_received(&self, chars: usize) {
        let total = self.received.fetch_add(chars, Ordering::Relaxed) + chars;
        self.bar
            .set_message(format!("{} ({total} chars received)", self.step()));
    }
}
