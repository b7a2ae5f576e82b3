pub mod error;
pub mod gemini;
pub mod json;
pub mod sse;

use crate::domain::analysis::Source;
use futures::stream::BoxStream;

pub const JSON_MIME_TYPE: &str = "application/json";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Gemini,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResponseFormat {
    pub mime_type: &'static str,
    pub schema: serde_json::Value,
}

impl ResponseFormat {
    pub fn json(schema: serde_json::Value) -> Self {
        Self {
            mime_type: JSON_MIME_TYPE,
            schema,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerationConfig {
    pub web_search: bool,
    pub temperature: Option<f32>,
    pub response_format: Option<ResponseFormat>,
    pub thinking_budget: Option<u32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GenerateRequest {
    pub model: String,
    pub prompt: String,
    pub system_instruction: Option<String>,
    pub config: GenerationConfig,
}

/// A full response, or one delta of a streamed response.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerateResponse {
    pub text: String,
    pub citations: Vec<Source>,
}

pub type ChunkStream = BoxStream<'static, anyhow::Result<GenerateResponse>>;

#[async_trait::async_trait]
pub trait GenerationClient: Send + Sync {
    fn provider(&self) -> Provider;

    async fn generate(&self, request: GenerateRequest) -> anyhow::Result<GenerateResponse>;

    async fn generate_stream(&self, request: GenerateRequest) -> anyhow::Result<ChunkStream>;
}
