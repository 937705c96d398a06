//! GenAI text provider abstraction.
//!
//! The storyteller only depends on [`TextProvider`], so the Gemini backend can
//! be swapped for the mock in tests.

pub mod gemini;
pub mod mock;

use async_trait::async_trait;
use thiserror::Error;

pub use gemini::{GeminiConfig, GeminiTextProvider};
pub use mock::MockTextProvider;

/// Error type for provider operations.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Rate limited")]
    RateLimited,

    #[error("Content filtered")]
    ContentFiltered,

    #[error("Network error: {0}")]
    NetworkError(String),
}

impl ProviderError {
    /// Short label used in metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            ProviderError::NotConfigured(_) => "not_configured",
            ProviderError::ApiError(_) => "api_error",
            ProviderError::InvalidRequest(_) => "invalid_request",
            ProviderError::RateLimited => "rate_limited",
            ProviderError::ContentFiltered => "content_filtered",
            ProviderError::NetworkError(_) => "network_error",
        }
    }
}

/// Result of a provider call.
#[derive(Debug, Clone)]
pub struct ProviderResponse {
    pub text: Option<String>,
    pub input_tokens: i32,
    pub output_tokens: i32,
    pub finish_reason: FinishReason,
}

/// Reason why generation stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishReason {
    Complete,
    Length,
    ContentFilter,
    Error,
}

/// Generation parameters for a single call.
#[derive(Debug, Clone, Default)]
pub struct GenerationParams {
    /// Temperature (0.0 - 2.0).
    pub temperature: Option<f32>,

    /// Maximum output tokens.
    pub max_tokens: Option<i32>,

    /// Ask for `application/json` output.
    pub json_output: bool,
}

#[async_trait]
pub trait TextProvider: Send + Sync {
    /// Generate a text response for a single-turn prompt.
    async fn generate(
        &self,
        prompt: &str,
        params: &GenerationParams,
    ) -> Result<ProviderResponse, ProviderError>;

    /// Verify that the provider is reachable and the credentials work.
    async fn health_check(&self) -> Result<(), ProviderError>;

    /// Name used in logs and metrics.
    fn name(&self) -> &'static str;
}
