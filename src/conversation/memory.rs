use super::types::{ConversationBackend, ConversationError, ConversationStats, Turn, UserRecord};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Process-lifetime store used when the document database is unreachable.
#[derive(Default)]
pub struct InMemoryStore {
    users: RwLock<HashMap<String, UserRecord>>,
    turns: RwLock<HashMap<String, Vec<Turn>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ConversationBackend for InMemoryStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn find_user(&self, phone_number: &str) -> Result<Option<UserRecord>, ConversationError> {
        Ok(self.users.read().await.get(phone_number).cloned())
    }

    async fn upsert_user(&self, user: &UserRecord) -> Result<(), ConversationError> {
        self.users
            .write()
            .await
            .insert(user.phone_number.clone(), user.clone());
        Ok(())
    }

    async fn append_turns(&self, turns: &[Turn]) -> Result<(), ConversationError> {
        let mut map = self.turns.write().await;
        for turn in turns {
            map.entry(turn.phone_number.clone())
                .or_default()
                .push(turn.clone());
        }
        Ok(())
    }

    async fn recent_turns(
        &self,
        phone_number: &str,
        limit: usize,
    ) -> Result<Vec<Turn>, ConversationError> {
        let map = self.turns.read().await;
        let turns = map.get(phone_number).map(Vec::as_slice).unwrap_or_default();
        Ok(turns[turns.len().saturating_sub(limit)..].to_vec())
    }

    async fn all_turns(&self, phone_number: &str) -> Result<Vec<Turn>, ConversationError> {
        Ok(self
            .turns
            .read()
            .await
            .get(phone_number)
            .cloned()
            .unwrap_or_default())
    }

    async fn stats(&self) -> Result<ConversationStats, ConversationError> {
        Ok(ConversationStats {
            users: self.users.read().await.len() as u64,
            turns: self.turns.read().await.values().map(|t| t.len() as u64).sum(),
        })
    }
}
