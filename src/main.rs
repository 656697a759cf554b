mod agent;
mod config;
mod conversation;
mod embeddings;
mod knowledge;
mod llm;
mod positions;
mod schedule;
mod server;
mod utils;

use agent::{AgentSettings, MainAgent};
use anyhow::{Context, Result};
use conversation::Conversations;
use knowledge::KnowledgeIndex;
use schedule::{ScheduleStore, SeedOptions};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            return Err(e).context("Failed to read .env");
        }
    }

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = config::Config::load()?;
    tokio::fs::create_dir_all(&config.storage.data_dir)
        .await
        .with_context(|| format!("Failed to create {}", config.storage.data_dir.display()))?;

    let llm = llm::create_llm(&config.api)?;
    let embeddings = embeddings::create_embedding_service(&config)?;

    let knowledge = KnowledgeIndex::open(
        &knowledge::index_dir(&config.storage.data_dir),
        &config.storage.documents_dir,
        embeddings,
    )
    .await
    .context("Failed to build the knowledge index")?;
    info!(
        "Knowledge index ready: {} chunks covering {:?}",
        knowledge.len(),
        knowledge.positions()
    );

    let conversations = Arc::new(
        Conversations::connect(
            config.storage.mongodb_uri.as_deref(),
            &config.storage.mongodb_database,
        )
        .await,
    );
    let schedule = Arc::new(
        ScheduleStore::connect(
            config.storage.database_url.as_deref(),
            &config.storage.data_dir,
            SeedOptions {
                horizon_days: config.scheduling.horizon_days,
                seed: config.scheduling.seed,
            },
        )
        .await
        .context("Failed to open the schedule database")?,
    );
    info!(
        "Storage ready: conversations in {}, schedule in {}",
        conversations.backend_name().await,
        schedule.backend_name().await
    );

    let agent = Arc::new(MainAgent::new(
        llm,
        conversations,
        schedule,
        knowledge,
        AgentSettings::from(&config),
    ));

    let router = server::create_router(server::AppState::new(agent));
    server::serve(
        router,
        &config.server.host,
        config.server.port,
        async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for shutdown signal: {}", e);
            }
            info!("Shutdown signal received");
        },
    )
    .await?;

    info!("Shutdown complete");
    Ok(())
}
