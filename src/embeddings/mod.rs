mod local;
mod openai;
mod types;

#[cfg(test)]
pub mod testing;

use crate::config::Config;
use anyhow::Result;
pub use local::LocalEmbedding;
pub use openai::OpenAiEmbedding;
use std::sync::Arc;
pub use types::EmbeddingService;

pub fn create_embedding_service(config: &Config) -> Result<Arc<dyn EmbeddingService>> {
    match config.embedding.provider.as_str() {
        "openai" => Ok(Arc::new(OpenAiEmbedding::new(
            &config.api.url,
            &config.api.key,
            config.embedding.model.as_deref(),
            config.embedding.dimensions,
        ))),
        _ => {
            let local = LocalEmbedding::new(
                &config.storage.data_dir.join("models"),
                config.embedding.model.as_deref(),
            )?;
            local.start_unload_timer();
            Ok(Arc::new(local))
        }
    }
}
