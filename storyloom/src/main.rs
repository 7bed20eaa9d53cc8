//! storyloom - summarize a long story and write its next chapter.
//!
//! Usage:
//!   storyloom --story book.txt --instructions events.txt
//!   storyloom --instructions events.txt --prior-summary summary.txt --skip-summary
//!   storyloom --check                  Verify the Ollama server and model
//!   storyloom --help                   Show all options
//!
//! Every option can also be set through a `STORYLOOM_*` environment variable
//! or a `.env` file.

mod cli;
mod progress;

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use std::time::{Duration, Instant};
use storyloom_core::{CancellationToken, OllamaGenerator, StorySession};
use tracing::{info, warn};

use cli::Cli;
use progress::SpinnerProgress;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(cli.log_directive())),
        )
        .init();

    let start = Instant::now();

    let progress = Arc::new(SpinnerProgress::new(cli.verbose == 0));
    let generator = OllamaGenerator::new(cli.generation_config())
        .context("Invalid model settings")?
        .with_progress(progress.clone());

    if cli.check {
        progress.finish();
        generator.check().await.with_context(|| {
            format!(
                "Model '{}' is not available at {}",
                cli.model, cli.ollama_url
            )
        })?;
        println!("Model '{}' is available at {}", cli.model, cli.ollama_url);
        return Ok(());
    }

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted, stopping after the current step");
                cancel.cancel();
            }
        }
    });

    let session = StorySession::new(&generator, cli.session_config())?
        .with_progress(progress.clone())
        .with_cancellation(cancel);

    let result = session.run().await;
    progress.finish();
    let report = result?;

    info!(
        model_calls = report.model_calls(),
        summary_chunks = report.summary_chunks,
        event_groups = report.event_groups,
        "Run complete"
    );

    let rule = "=".repeat(50);
    println!("{rule}\n{}\n{rule}", report.chapter);
    println!("Summary saved to {}", report.summary_path.display());
    println!("New chapter written to {}", report.chapter_path.display());
    println!("Total time taken: {}", format_elapsed(start.elapsed()));

    Ok(())
}

/// Format a duration as `HH:MM:SS`.
fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    format!("{:02}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
}
