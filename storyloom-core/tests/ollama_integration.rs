//! Integration tests that call a real Ollama server.
//!
//! These tests need a running server (`OLLAMA_URL`, default localhost) and a
//! small installed model (`OLLAMA_MODEL`, default `llama3.2`), either in the
//! environment or a .env file.
//! Run with: `cargo test -p storyloom-core --test ollama_integration -- --ignored`
//!
//! These are marked #[ignore] by default because generation is slow and
//! needs local hardware.

use storyloom_core::{
    ChapterGenerator, EventList, GenerationConfig, OllamaGenerator, PromptSet, Summarizer,
    TextSplitter,
};

/// Load environment variables from .env file
fn setup() -> GenerationConfig {
    let _ = dotenvy::dotenv();
    let mut config = GenerationConfig::default()
        .with_model(std::env::var("OLLAMA_MODEL").unwrap_or_else(|_| "llama3.2".to_string()))
        .with_context_window(8_192)
        .with_max_output_tokens(256);
    if let Ok(url) = std::env::var("OLLAMA_URL") {
        config = config.with_endpoint(url);
    }
    config
}

/// Build a generator, or None if the server or model is unavailable
async fn generator() -> Option<OllamaGenerator> {
    let generator = OllamaGenerator::new(setup()).expect("Invalid test configuration");
    match generator.check().await {
        Ok(()) => Some(generator),
        Err(e) => {
            eprintln!("Skipping test: {e}");
            None
        }
    }
}

#[tokio::test]
#[ignore] // Run with: cargo test -p storyloom-core --test ollama_integration -- --ignored
async fn test_live_summary_and_chapter() {
    let Some(generator) = generator().await else {
        return;
    };

    let background = "Pip the hedgehog lived under the old oak. \
        Every autumn she gathered acorns for her grandmother. \
        One year the acorns vanished overnight, and Pip found tiny footprints in the mud.";
    let prompts = PromptSet::new(200);
    let splitter = TextSplitter::new(20).unwrap();

    let summary = Summarizer::new(&generator, &prompts, splitter)
        .summarize(background)
        .await
        .expect("Summarization failed");
    assert!(summary.chunks() >= 2);
    assert!(!summary.is_empty());

    let events =
        EventList::new(["Pip follows the footprints", "Pip meets a shy squirrel"]).unwrap();
    let chapter = ChapterGenerator::new(&generator, &prompts)
        .with_group_size(1)
        .generate(summary.as_str(), &events)
        .await
        .expect("Chapter generation failed");

    println!("Summary:\n{summary}\n\nChapter:\n{chapter}");
    assert_eq!(chapter.sections().len(), 2);
}
