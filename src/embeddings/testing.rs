use super::types::EmbeddingService;
use anyhow::Result;
use async_trait::async_trait;

const DIM: usize = 64;

/// Deterministic bag-of-words embedder: each lowercase word bumps one bucket.
pub struct HashingEmbedding;

impl HashingEmbedding {
    pub fn embed(text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; DIM];
        // Bias bucket keeps every vector non-zero for cosine distance.
        vector[0] = 0.1;
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            let word = word.to_lowercase();
            let bucket = word
                .bytes()
                .fold(7u64, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u64));
            vector[1 + (bucket as usize) % (DIM - 1)] += 1.0;
        }
        vector
    }
}

#[async_trait]
impl EmbeddingService for HashingEmbedding {
    fn dimensions(&self) -> usize {
        DIM
    }

    fn model_id(&self) -> String {
        "hashing-64".into()
    }

    async fn embed_passage(&self, text: &str) -> Result<Vec<f32>> {
        Ok(Self::embed(text))
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        Ok(Self::embed(text))
    }
}
