//! Mock provider for tests and offline runs.

use super::{FinishReason, GenerationParams, ProviderError, ProviderResponse, TextProvider};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

/// Mock text provider.
///
/// Replies are served from a queue in order; once it is empty the provider
/// echoes the prompt. A failing mock returns `NetworkError` for every call.
pub struct MockTextProvider {
    replies: Mutex<VecDeque<String>>,
    prompts: Mutex<Vec<String>>,
    failing: bool,
}

impl MockTextProvider {
    pub fn new() -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            prompts: Mutex::new(Vec::new()),
            failing: false,
        }
    }

    pub fn with_replies<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            replies: Mutex::new(replies.into_iter().map(Into::into).collect()),
            ..Self::new()
        }
    }

    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::new()
        }
    }

    /// Prompts received so far, oldest first.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts
            .lock()
            .map(|prompts| prompts.clone())
            .unwrap_or_default()
    }
}

impl Default for MockTextProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TextProvider for MockTextProvider {
    async fn generate(
        &self,
        prompt: &str,
        _params: &GenerationParams,
    ) -> Result<ProviderResponse, ProviderError> {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.to_string());
        }

        if self.failing {
            return Err(ProviderError::NetworkError(
                "mock provider unavailable".to_string(),
            ));
        }

        let text = self
            .replies
            .lock()
            .ok()
            .and_then(|mut replies| replies.pop_front())
            .unwrap_or_else(|| format!("Mock response for: {}", prompt));

        Ok(ProviderResponse {
            input_tokens: prompt.len() as i32 / 4,
            output_tokens: text.len() as i32 / 4,
            text: Some(text),
            finish_reason: FinishReason::Complete,
        })
    }

    async fn health_check(&self) -> Result<(), ProviderError> {
        if self.failing {
            Err(ProviderError::NetworkError(
                "mock provider unavailable".to_string(),
            ))
        } else {
            Ok(())
        }
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}
