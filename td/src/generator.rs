//! The Generator capability: an opaque LLM call used by jobs of type
//! `prompt` and `tool`.
//!
//! A Generator never sees native tool_use/function-calling - every request
//! goes out with `tools: []`. Anything that looks like a tool invocation in
//! the reply is plain text the Tool-Call Dispatcher parses itself. This
//! keeps the wire contract identical across providers and keeps dispatch
//! logic in one place instead of duplicated per-provider tool schemas.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::llm::{CompletionRequest, LlmClient, LlmError, Message};

/// Input to a generation call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateRequest {
    pub system_prompt: Option<String>,
    pub prompt: String,
}

/// Output of a generation call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateResponse {
    pub text: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, request: GenerateRequest) -> Result<GenerateResponse, LlmError>;
}

/// Default Generator, backed by any LlmClient (Anthropic, OpenAI, ...).
pub struct LlmGenerator {
    client: Arc<dyn LlmClient>,
    max_tokens: u32,
}

impl LlmGenerator {
    pub fn new(client: Arc<dyn LlmClient>, max_tokens: u32) -> Self {
        Self { client, max_tokens }
    }
}

#[async_trait]
impl Generator for LlmGenerator {
    async fn generate(&self, request: GenerateRequest) -> Result<GenerateResponse, LlmError> {
        let completion = CompletionRequest {
            system_prompt: request.system_prompt.unwrap_or_default(),
            messages: vec![Message::user(request.prompt)],
            tools: vec![],
            max_tokens: self.max_tokens,
        };

        let response = self.client.complete(completion).await?;

        Ok(GenerateResponse {
            text: response.content.unwrap_or_default(),
            input_tokens: response.usage.input_tokens,
            output_tokens: response.usage.output_tokens,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::client::mock::MockLlmClient;
    use crate::llm::{StopReason, TokenUsage};

    #[tokio::test]
    async fn generate_strips_tools_and_returns_usage() {
        let client: Arc<dyn LlmClient> = Arc::new(MockLlmClient::new(vec![crate::llm::CompletionResponse {
            content: Some("hello there".to_string()),
            tool_calls: vec![],
            stop_reason: StopReason::EndTurn,
            usage: TokenUsage {
                input_tokens: 12,
                output_tokens: 4,
                cache_read_tokens: 0,
                cache_creation_tokens: 0,
            },
        }]));

        let generator = LlmGenerator::new(client, 4096);
        let response = generator
            .generate(GenerateRequest {
                system_prompt: Some("be terse".to_string()),
                prompt: "say hi".to_string(),
            })
            .await
            .unwrap();

        assert_eq!(response.text, "hello there");
        assert_eq!(response.input_tokens, 12);
        assert_eq!(response.output_tokens, 4);
    }

    #[tokio::test]
    async fn generate_propagates_errors() {
        let client: Arc<dyn LlmClient> = Arc::new(MockLlmClient::new(vec![]));
        let generator = LlmGenerator::new(client, 4096);

        let result = generator
            .generate(GenerateRequest {
                system_prompt: None,
                prompt: "anything".to_string(),
            })
            .await;

        assert!(result.is_err());
    }
}
