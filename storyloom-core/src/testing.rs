//! Testing utilities.
//!
//! This module provides tools for testing without a model server:
//! - `MockGenerator` returns scripted responses and records every prompt
//! - failures can be injected at a chosen call to exercise error paths

use crate::error::GeneratorError;
use crate::generator::TextGenerator;
use async_trait::async_trait;
use std::sync::{Mutex, MutexGuard};

/// A generator that returns scripted responses.
///
/// Responses are handed out in order. Once the script runs out, call `n`
/// answers `"response n"`.
#[derive(Default)]
pub struct MockGenerator {
    responses: Vec<String>,
    fail_on: Option<(usize, String)>,
    prompts: Mutex<Vec<String>>,
}

impl MockGenerator {
    /// A mock with no script.
    pub fn new() -> Self {
        Self::default()
    }

    /// A mock that answers with `responses` in order.
    pub fn with_responses<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            responses: responses.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Fail the `call`-th request (1-based) with `message`.
    pub fn fail_on_call(mut self, call: usize, message: impl Into<String>) -> Self {
        self.fail_on = Some((call, message.into()));
        self
    }

    /// Every prompt received so far, in order.
    pub fn prompts(&self) -> Vec<String> {
        self.recorded().clone()
    }

    pub fn call_count(&self) -> usize {
        self.recorded().len()
    }

    fn recorded(&self) -> MutexGuard<'_, Vec<String>> {
        // A panicking test thread must not hide the prompts from the next assertion
        self.prompts.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl TextGenerator for MockGenerator {
    async fn generate(&self, prompt: &str) -> Result<String, GeneratorError> {
        let call = {
            let mut prompts = self.recorded();
            prompts.push(prompt.to_string());
            prompts.len()
        };

        if let Some((fail_call, message)) = &self.fail_on {
            if *fail_call == call {
                return Err(GeneratorError::Other(message.clone()));
            }
        }

        Ok(self
            .responses
            .get(call - 1)
            .cloned()
            .unwrap_or_else(|| format!("response {call}")))
    }

    fn name(&self) -> &str {
        "mock"
    }
}
