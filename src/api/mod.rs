mod gemini;
pub mod types;

pub use gemini::GeminiClient;
pub use types::{GenerateContentRequest, GenerateContentResponse, GenerationConfig, ImageConfig};

use crate::error::Result;
use async_trait::async_trait;

/// One round trip to a hosted generative model.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GenerativeModel: Send + Sync {
    async fn generate_content(
        &self,
        model: &str,
        request: GenerateContentRequest,
    ) -> Result<GenerateContentResponse>;
}
