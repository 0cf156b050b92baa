use async_trait::async_trait;
use scribe_core::Result;

/// Request to the text-generation backend.
#[derive(Debug, Clone)]
pub struct GenerateRequest {
    /// Provider label copied from the job (e.g. `"openai"`).
    pub provider: String,
    pub model: String,
    pub system: String,
    pub user: String,
}

/// AI collaborator that turns a rendered prompt into article text.
///
/// Implementations report failures as `ScribeError::Generation`.
#[async_trait]
pub trait ContentGenerator: Send + Sync {
    /// Backend name for logging.
    fn name(&self) -> &str;

    async fn generate(&self, req: &GenerateRequest) -> Result<String>;
}
