//! Error types for storyloom.
//!
//! Uses thiserror for ergonomic error definition. Everything that can stop a
//! run ends up in [`StoryError`]; the variants mirror the three ways a run can
//! go wrong: bad configuration, bad input, or a failing backend.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// The pipeline a chunk belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Summary,
    Chapter,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Summary => write!(f, "summarization"),
            Stage::Chapter => write!(f, "chapter generation"),
        }
    }
}

/// Main error type for a storyloom run.
#[derive(Debug, Error)]
pub enum StoryError {
    /// Invalid settings or missing inputs, detected before any model call
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Instructions could not be turned into an event list
    #[error("Input format error: {0}")]
    InputFormat(#[from] InputFormatError),

    /// A model call failed; the run is aborted at this chunk
    #[error("Backend failed during {stage} on chunk {chunk} of {total}: {source}")]
    Backend {
        stage: Stage,
        chunk: usize,
        total: usize,
        #[source]
        source: GeneratorError,
    },

    /// The run was cancelled between chunks
    #[error("{stage} cancelled after {completed} of {total} chunks")]
    Cancelled {
        stage: Stage,
        completed: usize,
        total: usize,
    },

    /// Reading an input or writing an output failed
    #[error("IO error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl StoryError {
    /// The 1-based chunk a backend failure happened on.
    pub fn failed_chunk(&self) -> Option<(Stage, usize, usize)> {
        match self {
            StoryError::Backend {
                stage,
                chunk,
                total,
                ..
            } => Some((*stage, *chunk, *total)),
            _ => None,
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StoryError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("token limit per chunk must be greater than zero")]
    ZeroTokenLimit,

    #[error("event group size must be greater than zero")]
    ZeroGroupSize,

    #[error("context window must be greater than zero")]
    ZeroContextWindow,

    #[error("temperature must be a finite value between 0 and 2, got {0}")]
    InvalidTemperature(f32),

    #[error("invalid backend endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("{role} file not found: {}", .path.display())]
    MissingInput { role: &'static str, path: PathBuf },

    #[error("skipping summarization requires a prior summary file")]
    SkipWithoutPriorSummary,
}

/// Problems turning an instructions file into events
#[derive(Debug, Error)]
pub enum InputFormatError {
    #[error("no key events found in instructions")]
    NoEvents,

    #[error("key event block opened on line {line} is never closed")]
    UnterminatedEventBlock { line: usize },

    #[error("key event end marker on line {line} has no matching start marker")]
    UnexpectedEndMarker { line: usize },
}

/// Errors from a text-generation backend
#[derive(Debug, Error)]
pub enum GeneratorError {
    #[error(transparent)]
    Ollama(#[from] ollama::Error),

    #[error("backend returned an empty response")]
    EmptyResponse,

    /// The response stream closed before the server marked it finished
    #[error("response stream ended before completion after {received} characters")]
    IncompleteStream { received: usize },

    #[error("{0}")]
    Other(String),
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, StoryError>;
