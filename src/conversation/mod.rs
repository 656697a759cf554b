mod memory;
mod mongo;
mod types;

pub use memory::InMemoryStore;
pub use mongo::MongoStore;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{error, info, warn};
pub use types::{
    ConversationBackend, ConversationError, ConversationStats, Role, Turn, UserRecord,
};

/// Conversation store with a one-way switch to process memory. Once the
/// document database fails, every later call stays in memory until restart.
pub struct Conversations {
    backend: RwLock<Arc<dyn ConversationBackend>>,
    fallback: Arc<dyn ConversationBackend>,
}

impl Conversations {
    pub fn new(backend: Arc<dyn ConversationBackend>) -> Self {
        Self {
            backend: RwLock::new(backend),
            fallback: Arc::new(InMemoryStore::new()),
        }
    }

    pub fn in_memory() -> Self {
        let store: Arc<dyn ConversationBackend> = Arc::new(InMemoryStore::new());
        Self {
            backend: RwLock::new(store.clone()),
            fallback: store,
        }
    }

    pub async fn connect(uri: Option<&str>, database: &str) -> Self {
        let Some(uri) = uri else {
            warn!("No MongoDB URI configured, conversations are kept in memory");
            return Self::in_memory();
        };
        match MongoStore::connect(uri, database).await {
            Ok(store) => Self::new(Arc::new(store)),
            Err(e) => {
                error!("MongoDB unavailable ({}), conversations are kept in memory", e);
                Self::in_memory()
            }
        }
    }

    pub async fn backend_name(&self) -> &'static str {
        self.backend.read().await.name()
    }

    async fn run<T, F, Fut>(&self, op: F) -> Result<T, ConversationError>
    where
        F: Fn(Arc<dyn ConversationBackend>) -> Fut,
        Fut: Future<Output = Result<T, ConversationError>>,
    {
        let backend = self.backend.read().await.clone();
        match op(backend.clone()).await {
            Ok(value) => Ok(value),
            Err(e) if e.is_connection() && !Arc::ptr_eq(&backend, &self.fallback) => {
                error!(
                    "Conversation backend {} failed ({}), switching to memory",
                    backend.name(),
                    e
                );
                *self.backend.write().await = self.fallback.clone();
                op(self.fallback.clone()).await
            }
            Err(e) => Err(e),
        }
    }

    pub async fn find_user(&self, phone_number: &str) -> Result<Option<UserRecord>, ConversationError> {
        self.run(|b| async move { b.find_user(phone_number).await })
            .await
    }

    pub async fn recent_turns(
        &self,
        phone_number: &str,
        limit: usize,
    ) -> Result<Vec<Turn>, ConversationError> {
        self.run(|b| async move { b.recent_turns(phone_number, limit).await })
            .await
    }

    pub async fn all_turns(&self, phone_number: &str) -> Result<Vec<Turn>, ConversationError> {
        self.run(|b| async move { b.all_turns(phone_number).await })
            .await
    }

    pub async fn stats(&self) -> Result<ConversationStats, ConversationError> {
        self.run(|b| async move { b.stats().await }).await
    }

    /// Records one handled exchange: the user record and both turns, on the
    /// same backend even when a switch happens midway.
    pub async fn save_exchange(
        &self,
        user: &UserRecord,
        user_text: &str,
        reply: &str,
    ) -> Result<(), ConversationError> {
        let user_turn = Turn::new(&user.phone_number, Role::User, user_text);
        let mut assistant_turn = Turn::new(&user.phone_number, Role::Assistant, reply);
        // Same-microsecond turns would otherwise rely on insertion order alone.
        assistant_turn.timestamp_us = assistant_turn.timestamp_us.max(user_turn.timestamp_us + 1);

        let turns: &[Turn] = &[user_turn, assistant_turn];
        self.run(|b| async move {
            b.upsert_user(user).await?;
            b.append_turns(turns).await
        })
        .await?;
        info!("Saved exchange for {}", user.phone_number);
        Ok(())
    }
}
