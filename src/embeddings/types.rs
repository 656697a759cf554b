use anyhow::Result;
use async_trait::async_trait;

#[async_trait]
pub trait EmbeddingService: Send + Sync {
    fn dimensions(&self) -> usize;
    /// Identifies the model behind the vectors; a stored index built by a
    /// different model is rebuilt.
    fn model_id(&self) -> String;
    /// Embeds a document chunk for storage in the knowledge index.
    async fn embed_passage(&self, text: &str) -> Result<Vec<f32>>;
    /// Embeds a candidate question for lookup against stored passages.
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>>;
}
