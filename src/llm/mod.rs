use crate::config::ApiConfig;
use anyhow::Result;
use rig::providers::{anthropic, gemini, openai};
pub use rig_llm::RigLlm;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
pub use types::{Llm, LlmError, LlmRequest};

mod rig_llm;
mod types;

#[cfg(test)]
pub mod testing;

pub fn create_llm(api: &ApiConfig) -> Result<Arc<dyn Llm>> {
    let timeout = Duration::from_secs(api.timeout_secs);
    match api.provider.as_str() {
        "anthropic" => {
            let client: anthropic::Client = anthropic::Client::builder()
                .api_key(&api.key)
                .base_url(&api.url)
                .build()?;
            Ok(Arc::new(RigLlm::new(client, &api.model, timeout)))
        }
        "gemini" => {
            let client = gemini::Client::new(&api.key)?;
            Ok(Arc::new(RigLlm::new(client, &api.model, timeout)))
        }
        _ => {
            let client: openai::CompletionsClient = openai::CompletionsClient::builder()
                .api_key(&api.key)
                .base_url(&api.url)
                .build()?;
            Ok(Arc::new(RigLlm::new(client, &api.model, timeout)))
        }
    }
}

/// Calls the model and deserializes its reply as JSON. The prompt must ask for JSON.
pub async fn call_json<T: DeserializeOwned>(
    llm: &dyn Llm,
    request: LlmRequest,
) -> Result<T, LlmError> {
    let text = llm.complete(request).await?;
    serde_json::from_str(strip_json_fences(&text)).map_err(LlmError::Parse)
}

/// Strips ```json ... ``` or ``` ... ``` code fences from model output.
pub fn strip_json_fences(text: &str) -> &str {
    let text = text.trim();
    let stripped = text
        .strip_prefix("```json")
        .or_else(|| text.strip_prefix("```"));
    match stripped {
        Some(inner) => inner
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(inner.trim_start()),
        None => text,
    }
}
