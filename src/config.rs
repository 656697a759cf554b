use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

const CONFIG_ENV: &str = "SMS_AGENT_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Secret file not found: {0}")]
    MissingSecret(PathBuf),
    #[error("Secret file is empty: {0}")]
    EmptySecret(PathBuf),
    #[error("Failed to read secret file {path}: {source}")]
    Unreadable {
        path: PathBuf,
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, Deserialize)]
struct ConfigFile {
    api: ApiSection,
    #[serde(default)]
    embedding: EmbeddingConfig,
    #[serde(default)]
    storage: StorageSection,
    #[serde(default)]
    scheduling: SchedulingConfig,
    #[serde(default)]
    server: ServerConfig,
}

#[derive(Debug, Clone, Deserialize)]
struct ApiSection {
    #[serde(default = "default_provider")]
    provider: String,
    #[serde(default = "default_api_url")]
    url: String,
    #[serde(default = "default_model")]
    model: String,
    key_file: PathBuf,
    exit_model_file: Option<PathBuf>,
    #[serde(default = "default_timeout")]
    timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
struct StorageSection {
    #[serde(default = "default_data_dir")]
    data_dir: PathBuf,
    documents_dir: Option<PathBuf>,
    mongodb_uri: Option<String>,
    #[serde(default = "default_mongodb_database")]
    mongodb_database: String,
    database_url: Option<String>,
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            documents_dir: None,
            mongodb_uri: None,
            mongodb_database: default_mongodb_database(),
            database_url: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub provider: String,
    pub url: String,
    pub model: String,
    pub key: String,
    pub exit_model: Option<String>,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_provider")]
    pub provider: String,
    pub model: Option<String>,
    pub dimensions: Option<usize>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            model: None,
            dimensions: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
    pub documents_dir: PathBuf,
    pub mongodb_uri: Option<String>,
    pub mongodb_database: String,
    pub database_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SchedulingConfig {
    #[serde(default = "default_recruiter_phone")]
    pub recruiter_phone: String,
    #[serde(default = "default_horizon_days")]
    pub horizon_days: u32,
    pub seed: Option<u64>,
    #[serde(default = "default_max_offer_dates")]
    pub max_offer_dates: usize,
}

impl Default for SchedulingConfig {
    fn default() -> Self {
        Self {
            recruiter_phone: default_recruiter_phone(),
            horizon_days: default_horizon_days(),
            seed: None,
            max_offer_dates: default_max_offer_dates(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub api: ApiConfig,
    pub embedding: EmbeddingConfig,
    pub storage: StorageConfig,
    pub scheduling: SchedulingConfig,
    pub server: ServerConfig,
}

fn default_provider() -> String {
    "openai".into()
}

fn default_api_url() -> String {
    "https://api.openai.com/v1".into()
}

fn default_model() -> String {
    "gpt-4o-mini".into()
}

fn default_timeout() -> u64 {
    30
}

fn default_embedding_provider() -> String {
    "local".into()
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_mongodb_database() -> String {
    "sms_recruiter".into()
}

fn default_recruiter_phone() -> String {
    "+1-555-0000".into()
}

fn default_horizon_days() -> u32 {
    60
}

fn default_max_offer_dates() -> usize {
    5
}

fn default_host() -> String {
    "0.0.0.0".into()
}

fn default_port() -> u16 {
    8080
}

/// Reads a single-value secret file. Absent and blank files are both fatal.
pub fn read_secret(path: &Path) -> Result<String, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| {
        if source.kind() == std::io::ErrorKind::NotFound {
            ConfigError::MissingSecret(path.to_path_buf())
        } else {
            ConfigError::Unreadable {
                path: path.to_path_buf(),
                source,
            }
        }
    })?;

    let value = content.trim();
    if value.is_empty() {
        return Err(ConfigError::EmptySecret(path.to_path_buf()));
    }
    Ok(value.to_string())
}

impl Config {
    pub fn from_toml(content: &str) -> Result<Self> {
        let config_file: ConfigFile =
            toml::from_str(content).context("Failed to parse config file")?;

        let key_file = std::env::var("API_KEY_FILE")
            .map(PathBuf::from)
            .unwrap_or(config_file.api.key_file);
        let key = read_secret(&key_file)?;
        let exit_model = config_file
            .api
            .exit_model_file
            .as_deref()
            .map(read_secret)
            .transpose()?;

        let storage = config_file.storage;
        let documents_dir = storage
            .documents_dir
            .unwrap_or_else(|| storage.data_dir.join("documents"));

        Ok(Self {
            api: ApiConfig {
                provider: config_file.api.provider,
                url: config_file.api.url,
                model: config_file.api.model,
                key,
                exit_model,
                timeout_secs: config_file.api.timeout_secs,
            },
            embedding: config_file.embedding,
            storage: StorageConfig {
                data_dir: storage.data_dir,
                documents_dir,
                mongodb_uri: std::env::var("MONGODB_URI").ok().or(storage.mongodb_uri),
                mongodb_database: storage.mongodb_database,
                database_url: std::env::var("DATABASE_URL").ok().or(storage.database_url),
            },
            scheduling: config_file.scheduling,
            server: config_file.server,
        })
    }

    pub fn from_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path))?;
        Self::from_toml(&content)
    }

    pub fn load() -> Result<Self> {
        let path = std::env::var(CONFIG_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.into());
        Self::from_file(&path)
    }
}
