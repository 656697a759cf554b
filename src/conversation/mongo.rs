use super::types::{ConversationBackend, ConversationError, ConversationStats, Turn, UserRecord};
use async_trait::async_trait;
use futures_util::TryStreamExt;
use mongodb::{Client, Collection, bson::doc, options::ClientOptions};
use std::time::Duration;
use tracing::info;

const USERS: &str = "users";
const CONVERSATIONS: &str = "conversations";
const SERVER_SELECTION_TIMEOUT: Duration = Duration::from_secs(3);

pub struct MongoStore {
    users: Collection<UserRecord>,
    turns: Collection<Turn>,
}

impl MongoStore {
    /// Connects and pings the server so an unreachable database fails here, not mid-conversation.
    pub async fn connect(uri: &str, database: &str) -> Result<Self, ConversationError> {
        let mut options = ClientOptions::parse(uri).await?;
        options.server_selection_timeout = Some(SERVER_SELECTION_TIMEOUT);
        options.app_name = Some(env!("CARGO_PKG_NAME").to_string());
        let client = Client::with_options(options)?;

        let db = client.database(database);
        db.run_command(doc! { "ping": 1 }).await?;

        let users = db.collection::<UserRecord>(USERS);
        let turns = db.collection::<Turn>(CONVERSATIONS);
        info!("Connected to MongoDB database {}", database);
        Ok(Self { users, turns })
    }
}

#[async_trait]
impl ConversationBackend for MongoStore {
    fn name(&self) -> &'static str {
        "mongodb"
    }

    async fn find_user(&self, phone_number: &str) -> Result<Option<UserRecord>, ConversationError> {
        Ok(self
            .users
            .find_one(doc! { "phone_number": phone_number })
            .await?)
    }

    async fn upsert_user(&self, user: &UserRecord) -> Result<(), ConversationError> {
        self.users
            .replace_one(doc! { "phone_number": user.phone_number.as_str() }, user)
            .upsert(true)
            .await?;
        Ok(())
    }

    async fn append_turns(&self, turns: &[Turn]) -> Result<(), ConversationError> {
        if turns.is_empty() {
            return Ok(());
        }
        self.turns.insert_many(turns).ordered(true).await?;
        Ok(())
    }

    async fn recent_turns(
        &self,
        phone_number: &str,
        limit: usize,
    ) -> Result<Vec<Turn>, ConversationError> {
        let mut turns: Vec<Turn> = self
            .turns
            .find(doc! { "phone_number": phone_number })
            .sort(doc! { "timestamp_us": -1, "_id": -1 })
            .limit(limit as i64)
            .await?
            .try_collect()
            .await?;
        turns.reverse();
        Ok(turns)
    }

    async fn all_turns(&self, phone_number: &str) -> Result<Vec<Turn>, ConversationError> {
        Ok(self
            .turns
            .find(doc! { "phone_number": phone_number })
            .sort(doc! { "timestamp_us": 1, "_id": 1 })
            .await?
            .try_collect()
            .await?)
    }

    async fn stats(&self) -> Result<ConversationStats, ConversationError> {
        Ok(ConversationStats {
            users: self.users.count_documents(doc! {}).await?,
            turns: self.turns.count_documents(doc! {}).await?,
        })
    }
}
