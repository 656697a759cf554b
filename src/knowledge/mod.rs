mod documents;

use crate::embeddings::EmbeddingService;
use anyhow::{Context, Result};
pub use documents::Chunk;
use documents::{MAX_CHUNK_CHARS, chunk_documents, load_documents};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::info;
use usearch::Index;
use usearch::ffi::{IndexOptions, MetricKind, ScalarKind};

const INDEX_FILE: &str = "knowledge.usearch";
const MANIFEST_FILE: &str = "chunks.json";

#[derive(Debug, Serialize, Deserialize, PartialEq)]
struct Manifest {
    model: String,
    dimensions: usize,
    chunks: Vec<Chunk>,
}

/// Nearest-neighbour lookup over job description chunks. Vector keys are the
/// chunk positions in the manifest, so the same input always yields the same index.
pub struct KnowledgeIndex {
    index: Arc<Mutex<Index>>,
    chunks: Arc<Vec<Chunk>>,
    embeddings: Arc<dyn EmbeddingService>,
}

impl KnowledgeIndex {
    /// Loads the documents under `documents_dir` and opens (or rebuilds) the index in `index_dir`.
    pub async fn open(
        index_dir: &Path,
        documents_dir: &Path,
        embeddings: Arc<dyn EmbeddingService>,
    ) -> Result<Arc<Self>> {
        let documents_dir = documents_dir.to_path_buf();
        let documents =
            tokio::task::spawn_blocking(move || load_documents(&documents_dir)).await??;
        let chunks = chunk_documents(&documents, MAX_CHUNK_CHARS);
        Ok(Arc::new(Self::build(index_dir, chunks, embeddings).await?))
    }

    pub async fn build(
        index_dir: &Path,
        chunks: Vec<Chunk>,
        embeddings: Arc<dyn EmbeddingService>,
    ) -> Result<Self> {
        tokio::fs::create_dir_all(index_dir).await?;
        let index_path = index_dir.join(INDEX_FILE);
        let manifest_path = index_dir.join(MANIFEST_FILE);
        let manifest = Manifest {
            model: embeddings.model_id(),
            dimensions: embeddings.dimensions(),
            chunks,
        };

        let stored: Option<Manifest> = match tokio::fs::read(&manifest_path).await {
            Ok(bytes) => serde_json::from_slice(&bytes).ok(),
            Err(_) => None,
        };

        let index = new_index(manifest.dimensions)?;
        if stored.as_ref() == Some(&manifest) && index_path.exists() {
            index
                .load(path_str(&index_path)?)
                .map_err(|e| anyhow::anyhow!("Failed to load knowledge index: {}", e))?;
            info!("Loaded knowledge index ({} chunks)", index.size());
        } else {
            info!(
                "Building knowledge index from {} chunks with {}",
                manifest.chunks.len(),
                manifest.model
            );
            index
                .reserve(manifest.chunks.len().max(1))
                .map_err(|e| anyhow::anyhow!("Failed to reserve index: {}", e))?;
            for (key, chunk) in manifest.chunks.iter().enumerate() {
                let vector = embeddings.embed_passage(&chunk.text).await?;
                index
                    .add(key as u64, &vector)
                    .map_err(|e| anyhow::anyhow!("Failed to add chunk {}: {}", key, e))?;
            }
            index
                .save(path_str(&index_path)?)
                .map_err(|e| anyhow::anyhow!("Failed to save knowledge index: {}", e))?;
            // Manifest goes last so an interrupted build is redone on next start.
            tokio::fs::write(&manifest_path, serde_json::to_vec_pretty(&manifest)?).await?;
            info!("Knowledge index saved to {}", index_dir.display());
        }

        Ok(Self {
            index: Arc::new(Mutex::new(index)),
            chunks: Arc::new(manifest.chunks),
            embeddings,
        })
    }

    /// Returns up to `k` chunks ordered by cosine similarity, best first.
    pub async fn query(&self, text: &str, k: usize) -> Result<Vec<(Chunk, f32)>> {
        if self.chunks.is_empty() || k == 0 {
            return Ok(Vec::new());
        }
        let vector = self.embeddings.embed_query(text).await?;
        let limit = k.min(self.chunks.len());

        let index = self.index.clone();
        let chunks = self.chunks.clone();
        tokio::task::spawn_blocking(move || -> Result<Vec<(Chunk, f32)>> {
            let matches = {
                let idx = index
                    .lock()
                    .map_err(|e| anyhow::anyhow!("index lock poisoned: {e}"))?;
                idx.search(&vector, limit)
                    .map_err(|e| anyhow::anyhow!("Knowledge search failed: {}", e))?
            };

            let mut results: Vec<(Chunk, f32)> = matches
                .keys
                .iter()
                .zip(matches.distances.iter())
                .filter_map(|(key, distance)| {
                    chunks
                        .get(*key as usize)
                        .map(|chunk| (chunk.clone(), 1.0 - distance))
                })
                .collect();
            results.sort_by(|a, b| b.1.total_cmp(&a.1));
            Ok(results)
        })
        .await?
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    /// Distinct position titles present in the indexed documents.
    pub fn positions(&self) -> Vec<String> {
        let mut positions: Vec<String> = self.chunks.iter().map(|c| c.position.clone()).collect();
        positions.sort();
        positions.dedup();
        positions
    }
}

fn new_index(dimensions: usize) -> Result<Index> {
    let options = IndexOptions {
        dimensions,
        metric: MetricKind::Cos,
        quantization: ScalarKind::F32,
        ..Default::default()
    };
    Index::new(&options).context("Failed to create usearch index")
}

fn path_str(path: &Path) -> Result<&str> {
    path.to_str()
        .with_context(|| format!("Index path is not valid UTF-8: {}", path.display()))
}

pub fn index_dir(data_dir: &Path) -> PathBuf {
    data_dir.join("knowledge")
}
