use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConversationError {
    #[error("Document store error: {0}")]
    Mongo(#[from] mongodb::error::Error),
    #[error("Conversation backend unavailable: {0}")]
    Unavailable(String),
}

impl ConversationError {
    /// Errors that mean the store is unreachable rather than the request being wrong.
    pub fn is_connection(&self) -> bool {
        use mongodb::error::ErrorKind;
        match self {
            ConversationError::Mongo(e) => matches!(
                e.kind.as_ref(),
                ErrorKind::ServerSelection { .. }
                    | ErrorKind::Io(_)
                    | ErrorKind::ConnectionPoolCleared { .. }
            ),
            ConversationError::Unavailable(_) => true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    pub phone_number: String,
    pub job_interest: Option<String>,
    pub conversation_summary: String,
    /// Slot ids shown in the last scheduling reply, awaiting the candidate's pick.
    #[serde(default)]
    pub offered_slots: Vec<i64>,
    /// Schedule backend the offered ids belong to.
    #[serde(default)]
    pub offered_backend: Option<String>,
    pub created_at_us: i64,
    pub updated_at_us: i64,
}

impl UserRecord {
    pub fn new(phone_number: &str) -> Self {
        let now = chrono::Utc::now().timestamp_micros();
        Self {
            phone_number: phone_number.to_string(),
            job_interest: None,
            conversation_summary: String::new(),
            offered_slots: Vec::new(),
            offered_backend: None,
            created_at_us: now,
            updated_at_us: now,
        }
    }

    pub fn touch(&mut self) {
        self.updated_at_us = chrono::Utc::now().timestamp_micros();
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub id: String,
    pub phone_number: String,
    pub role: Role,
    pub content: String,
    pub timestamp_us: i64,
}

impl Turn {
    pub fn new(phone_number: &str, role: Role, content: &str) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            phone_number: phone_number.to_string(),
            role,
            content: content.to_string(),
            timestamp_us: chrono::Utc::now().timestamp_micros(),
        }
    }

    pub fn format_for_context(&self) -> String {
        format!("{}: {}", self.role.as_str().to_uppercase(), self.content)
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ConversationStats {
    pub users: u64,
    pub turns: u64,
}

#[async_trait]
pub trait ConversationBackend: Send + Sync {
    fn name(&self) -> &'static str;
    async fn find_user(&self, phone_number: &str) -> Result<Option<UserRecord>, ConversationError>;
    async fn upsert_user(&self, user: &UserRecord) -> Result<(), ConversationError>;
    async fn append_turns(&self, turns: &[Turn]) -> Result<(), ConversationError>;
    /// The last `limit` turns for the phone number, oldest first.
    async fn recent_turns(
        &self,
        phone_number: &str,
        limit: usize,
    ) -> Result<Vec<Turn>, ConversationError>;
    async fn all_turns(&self, phone_number: &str) -> Result<Vec<Turn>, ConversationError>;
    async fn stats(&self) -> Result<ConversationStats, ConversationError>;
}
