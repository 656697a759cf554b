use crate::embeddings::types::EmbeddingService;
use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::info;

pub const LOCAL_DEFAULT_MODEL: &str = "multilingual-e5-small";
const IDLE_TIMEOUT: Duration = Duration::from_secs(600);

/// A fastembed model this service knows how to prompt.
#[derive(Debug, Clone)]
struct LocalModel {
    name: &'static str,
    model: EmbeddingModel,
    dimensions: usize,
    passage_prefix: &'static str,
    query_prefix: &'static str,
}

fn lookup_model(name: &str) -> Option<LocalModel> {
    let model = match name.to_ascii_lowercase().as_str() {
        "multilingual-e5-small" => LocalModel {
            name: "multilingual-e5-small",
            model: EmbeddingModel::MultilingualE5Small,
            dimensions: 384,
            passage_prefix: "passage: ",
            query_prefix: "query: ",
        },
        "bge-small-en-v1.5" => LocalModel {
            name: "bge-small-en-v1.5",
            model: EmbeddingModel::BGESmallENV15,
            dimensions: 384,
            passage_prefix: "",
            query_prefix: "Represent this sentence for searching relevant passages: ",
        },
        "bge-base-en-v1.5" => LocalModel {
            name: "bge-base-en-v1.5",
            model: EmbeddingModel::BGEBaseENV15,
            dimensions: 768,
            passage_prefix: "",
            query_prefix: "Represent this sentence for searching relevant passages: ",
        },
        "all-minilm-l6-v2" => LocalModel {
            name: "all-minilm-l6-v2",
            model: EmbeddingModel::AllMiniLML6V2,
            dimensions: 384,
            passage_prefix: "",
            query_prefix: "",
        },
        _ => return None,
    };
    Some(model)
}

/// fastembed-backed embeddings for job descriptions. The model is loaded on
/// first use and dropped again after sitting idle, since documents are only
/// embedded at startup and candidate questions arrive in bursts.
pub struct LocalEmbedding {
    spec: LocalModel,
    model: Arc<Mutex<Option<TextEmbedding>>>,
    cache_dir: PathBuf,
    last_used: Arc<Mutex<Instant>>,
}

impl LocalEmbedding {
    pub fn new(cache_dir: &Path, model: Option<&str>) -> Result<Self> {
        let name = model.unwrap_or(LOCAL_DEFAULT_MODEL);
        let Some(spec) = lookup_model(name) else {
            bail!(
                "Unknown local embedding model {:?} (known: multilingual-e5-small, \
                 bge-small-en-v1.5, bge-base-en-v1.5, all-minilm-l6-v2)",
                name
            );
        };
        info!(
            "Local embedding service initialized (model: {}, dim: {}, {}s idle timeout)",
            spec.name,
            spec.dimensions,
            IDLE_TIMEOUT.as_secs()
        );
        Ok(Self {
            spec,
            model: Arc::new(Mutex::new(None)),
            cache_dir: cache_dir.to_path_buf(),
            last_used: Arc::new(Mutex::new(Instant::now())),
        })
    }

    pub fn start_unload_timer(&self) {
        let model = self.model.clone();
        let last_used = self.last_used.clone();
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(Duration::from_secs(60)).await;
                let Ok(last) = last_used.lock() else { continue };
                let elapsed = last.elapsed();
                drop(last);
                if elapsed < IDLE_TIMEOUT {
                    continue;
                }
                let Ok(mut guard) = model.lock() else {
                    continue;
                };
                if guard.take().is_some() {
                    info!("Embedding model unloaded (idle for {}s)", elapsed.as_secs());
                }
            }
        });
    }

    async fn embed_prefixed(&self, prefix: &str, text: &str) -> Result<Vec<f32>> {
        let text = format!("{}{}", prefix, text);
        let spec = self.spec.clone();
        let model = self.model.clone();
        let cache_dir = self.cache_dir.clone();
        let last_used = self.last_used.clone();
        tokio::task::spawn_blocking(move || {
            let mut guard = model
                .lock()
                .map_err(|e| anyhow::anyhow!("model lock poisoned: {e}"))?;
            if guard.is_none() {
                *guard = Some(load_model(&spec, &cache_dir)?);
            }
            *last_used
                .lock()
                .map_err(|e| anyhow::anyhow!("last_used lock poisoned: {e}"))? = Instant::now();
            guard
                .as_mut()
                .context("embedding model missing after load")?
                .embed(vec![text], None)?
                .into_iter()
                .next()
                .context("embedding model returned empty result")
        })
        .await?
    }
}

#[async_trait]
impl EmbeddingService for LocalEmbedding {
    fn dimensions(&self) -> usize {
        self.spec.dimensions
    }

    fn model_id(&self) -> String {
        format!("fastembed:{}", self.spec.name)
    }

    async fn embed_passage(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_prefixed(self.spec.passage_prefix, text).await
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_prefixed(self.spec.query_prefix, text).await
    }
}

fn load_model(spec: &LocalModel, cache_dir: &Path) -> Result<TextEmbedding> {
    info!("Loading embedding model ({})...", spec.name);
    let model = TextEmbedding::try_new(
        InitOptions::new(spec.model.clone())
            .with_cache_dir(cache_dir.to_path_buf())
            .with_show_download_progress(true),
    )
    .with_context(|| format!("Failed to initialize embedding model {}", spec.name))?;
    info!("Embedding model ready");
    Ok(model)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_choice_sets_dimensions_and_id() {
        let dir = tempfile::tempdir().unwrap();
        let default = LocalEmbedding::new(dir.path(), None).unwrap();
        assert_eq!(default.dimensions(), 384);
        assert_eq!(default.model_id(), "fastembed:multilingual-e5-small");

        let base = LocalEmbedding::new(dir.path(), Some("BGE-Base-EN-v1.5")).unwrap();
        assert_eq!(base.dimensions(), 768);
        assert_eq!(base.model_id(), "fastembed:bge-base-en-v1.5");
        assert!(base.spec.query_prefix.starts_with("Represent"));
    }

    #[test]
    fn test_unknown_model_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let err = LocalEmbedding::new(dir.path(), Some("text-embedding-3-small"))
            .err()
            .unwrap();
        assert!(err.to_string().contains("text-embedding-3-small"));
    }
}
