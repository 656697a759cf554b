use super::seed::NewSlot;
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error("Slot {0} is no longer available")]
    SlotUnavailable(i64),
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("Failed to prepare fallback database: {0}")]
    Fallback(String),
}

impl ScheduleError {
    /// Errors that mean the server is gone rather than the query being wrong.
    pub fn is_connection(&self) -> bool {
        matches!(
            self,
            ScheduleError::Database(
                sqlx::Error::Io(_)
                    | sqlx::Error::Tls(_)
                    | sqlx::Error::Protocol(_)
                    | sqlx::Error::PoolTimedOut
                    | sqlx::Error::PoolClosed
                    | sqlx::Error::WorkerCrashed
            )
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Slot {
    pub id: i64,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub position: String,
    pub available: bool,
}

impl Slot {
    pub fn label(&self) -> String {
        format!("{} {}", self.date.format("%Y-%m-%d"), self.time.format("%H:%M"))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Booking {
    pub id: i64,
    pub slot: Slot,
    pub candidate_phone: String,
    pub recruiter_phone: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ScheduleStats {
    pub total_slots: i64,
    pub available_slots: i64,
    pub bookings: i64,
}

/// One relational backend. Implementations differ only in SQL dialect.
#[async_trait]
pub trait SlotRepository: Send + Sync {
    fn name(&self) -> &'static str;
    async fn ensure_schema(&self) -> Result<(), ScheduleError>;
    async fn slot_count(&self) -> Result<i64, ScheduleError>;
    async fn insert_slots(&self, slots: &[NewSlot]) -> Result<(), ScheduleError>;
    /// Available slots for a position on or after `from`, ordered by date then time.
    async fn available_slots(
        &self,
        position: &str,
        from: NaiveDate,
    ) -> Result<Vec<Slot>, ScheduleError>;
    async fn get_slot(&self, id: i64) -> Result<Option<Slot>, ScheduleError>;
    /// Books `slot_id` and releases any earlier booking of the candidate, atomically.
    async fn book(
        &self,
        slot_id: i64,
        candidate_phone: &str,
        recruiter_phone: &str,
    ) -> Result<Booking, ScheduleError>;
    async fn cancel(&self, candidate_phone: &str) -> Result<Vec<Slot>, ScheduleError>;
    async fn find_booking(&self, candidate_phone: &str) -> Result<Option<Booking>, ScheduleError>;
    async fn stats(&self) -> Result<ScheduleStats, ScheduleError>;
}
