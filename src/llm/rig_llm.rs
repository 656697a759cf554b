use super::types::{Llm, LlmError, LlmRequest};
use async_trait::async_trait;
use rig::{client::CompletionClient, completion::Prompt};
use std::time::Duration;
use tracing::debug;

pub struct RigLlm<C: CompletionClient> {
    client: C,
    model: String,
    timeout: Duration,
}

impl<C: CompletionClient> RigLlm<C> {
    pub fn new(client: C, model: &str, timeout: Duration) -> Self {
        Self {
            client,
            model: model.to_string(),
            timeout,
        }
    }
}

#[async_trait]
impl<C> Llm for RigLlm<C>
where
    C: CompletionClient + Send + Sync,
    C::CompletionModel: 'static,
{
    async fn complete(&self, request: LlmRequest) -> Result<String, LlmError> {
        let model = request.model.as_deref().unwrap_or(&self.model);
        let agent = self
            .client
            .agent(model)
            .preamble(&request.system)
            .max_tokens(request.max_tokens)
            .temperature(request.temperature)
            .build();

        let response = tokio::time::timeout(self.timeout, agent.prompt(request.prompt.as_str()))
            .await
            .map_err(|_| LlmError::Timeout(self.timeout.as_secs()))?
            .map_err(|e| LlmError::Provider(e.to_string()))?;

        let text = response.trim();
        if text.is_empty() {
            return Err(LlmError::EmptyContent);
        }
        debug!("LLM call succeeded ({} chars, model: {})", text.len(), model);
        Ok(text.to_string())
    }
}
