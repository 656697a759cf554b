use super::seed::NewSlot;
use super::types::{Booking, ScheduleError, ScheduleStats, Slot, SlotRepository};
use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, Sqlite, Transaction};
use std::path::Path;
use tracing::info;

const SCHEMA: [&str; 3] = [
    "CREATE TABLE IF NOT EXISTS schedules (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        slot_date TEXT NOT NULL,
        slot_time TEXT NOT NULL,
        position TEXT NOT NULL,
        available BOOLEAN NOT NULL DEFAULT 1
    )",
    "CREATE INDEX IF NOT EXISTS schedules_lookup
        ON schedules (position, available, slot_date, slot_time)",
    "CREATE TABLE IF NOT EXISTS interviews (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        schedule_id INTEGER NOT NULL UNIQUE REFERENCES schedules(id),
        candidate_phone TEXT NOT NULL,
        recruiter_phone TEXT NOT NULL
    )",
];

const BOOKING_COLUMNS: &str = "i.id AS booking_id, i.candidate_phone, i.recruiter_phone, \
     s.id, s.slot_date, s.slot_time, s.position, s.available";

/// Embedded file database used once the primary server is unreachable.
pub struct SqliteSlots {
    pool: SqlitePool,
}

impl SqliteSlots {
    pub async fn open(path: &Path) -> Result<Self, ScheduleError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| ScheduleError::Fallback(e.to_string()))?;
        }
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await?;
        info!("Opened fallback schedule database at {}", path.display());
        Ok(Self { pool })
    }
}

fn slot_from_row(row: &SqliteRow) -> Result<Slot, sqlx::Error> {
    Ok(Slot {
        id: row.try_get("id")?,
        date: row.try_get("slot_date")?,
        time: row.try_get("slot_time")?,
        position: row.try_get("position")?,
        available: row.try_get("available")?,
    })
}

fn booking_from_row(row: &SqliteRow) -> Result<Booking, sqlx::Error> {
    Ok(Booking {
        id: row.try_get("booking_id")?,
        slot: slot_from_row(row)?,
        candidate_phone: row.try_get("candidate_phone")?,
        recruiter_phone: row.try_get("recruiter_phone")?,
    })
}

async fn release_bookings(
    tx: &mut Transaction<'_, Sqlite>,
    candidate_phone: &str,
    keep_slot: Option<i64>,
) -> Result<Vec<Slot>, sqlx::Error> {
    let rows = sqlx::query(&format!(
        "SELECT {BOOKING_COLUMNS} FROM interviews i JOIN schedules s ON s.id = i.schedule_id \
         WHERE i.candidate_phone = ?"
    ))
    .bind(candidate_phone)
    .fetch_all(&mut **tx)
    .await?;

    let mut released = Vec::new();
    for row in &rows {
        let booking = booking_from_row(row)?;
        if Some(booking.slot.id) == keep_slot {
            continue;
        }
        sqlx::query("DELETE FROM interviews WHERE id = ?")
            .bind(booking.id)
            .execute(&mut **tx)
            .await?;
        sqlx::query("UPDATE schedules SET available = TRUE WHERE id = ?")
            .bind(booking.slot.id)
            .execute(&mut **tx)
            .await?;
        released.push(Slot {
            available: true,
            ..booking.slot
        });
    }
    Ok(released)
}

#[async_trait]
impl SlotRepository for SqliteSlots {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    async fn ensure_schema(&self) -> Result<(), ScheduleError> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    async fn slot_count(&self) -> Result<i64, ScheduleError> {
        Ok(sqlx::query_scalar("SELECT COUNT(*) FROM schedules")
            .fetch_one(&self.pool)
            .await?)
    }

    async fn insert_slots(&self, slots: &[NewSlot]) -> Result<(), ScheduleError> {
        let mut tx = self.pool.begin().await?;
        for slot in slots {
            sqlx::query(
                "INSERT INTO schedules (slot_date, slot_time, position, available) \
                 VALUES (?, ?, ?, ?)",
            )
            .bind(slot.date)
            .bind(slot.time)
            .bind(slot.position)
            .bind(slot.available)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn available_slots(
        &self,
        position: &str,
        from: NaiveDate,
    ) -> Result<Vec<Slot>, ScheduleError> {
        let rows = sqlx::query(
            "SELECT id, slot_date, slot_time, position, available FROM schedules \
             WHERE available = TRUE AND position = ? AND slot_date >= ? \
             ORDER BY slot_date, slot_time, id",
        )
        .bind(position)
        .bind(from)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .iter()
            .map(slot_from_row)
            .collect::<Result<Vec<_>, _>>()?)
    }

    async fn get_slot(&self, id: i64) -> Result<Option<Slot>, ScheduleError> {
        let row = sqlx::query(
            "SELECT id, slot_date, slot_time, position, available FROM schedules WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.as_ref().map(slot_from_row).transpose()?)
    }

    async fn book(
        &self,
        slot_id: i64,
        candidate_phone: &str,
        recruiter_phone: &str,
    ) -> Result<Booking, ScheduleError> {
        let mut tx = self.pool.begin().await?;

        let claimed = sqlx::query(
            "UPDATE schedules SET available = FALSE WHERE id = ? AND available = TRUE",
        )
        .bind(slot_id)
        .execute(&mut *tx)
        .await?;
        if claimed.rows_affected() != 1 {
            tx.rollback().await?;
            return Err(ScheduleError::SlotUnavailable(slot_id));
        }

        let inserted = sqlx::query(
            "INSERT INTO interviews (schedule_id, candidate_phone, recruiter_phone) \
             VALUES (?, ?, ?) RETURNING id",
        )
        .bind(slot_id)
        .bind(candidate_phone)
        .bind(recruiter_phone)
        .fetch_one(&mut *tx)
        .await;
        let booking_id: i64 = match inserted {
            Ok(row) => row.try_get("id")?,
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                tx.rollback().await?;
                return Err(ScheduleError::SlotUnavailable(slot_id));
            }
            Err(e) => return Err(e.into()),
        };

        release_bookings(&mut tx, candidate_phone, Some(slot_id)).await?;

        let row = sqlx::query(
            "SELECT id, slot_date, slot_time, position, available FROM schedules WHERE id = ?",
        )
        .bind(slot_id)
        .fetch_one(&mut *tx)
        .await?;
        let slot = slot_from_row(&row)?;
        tx.commit().await?;

        Ok(Booking {
            id: booking_id,
            slot,
            candidate_phone: candidate_phone.to_string(),
            recruiter_phone: recruiter_phone.to_string(),
        })
    }

    async fn cancel(&self, candidate_phone: &str) -> Result<Vec<Slot>, ScheduleError> {
        let mut tx = self.pool.begin().await?;
        let released = release_bookings(&mut tx, candidate_phone, None).await?;
        tx.commit().await?;
        Ok(released)
    }

    async fn find_booking(&self, candidate_phone: &str) -> Result<Option<Booking>, ScheduleError> {
        let row = sqlx::query(&format!(
            "SELECT {BOOKING_COLUMNS} FROM interviews i JOIN schedules s ON s.id = i.schedule_id \
             WHERE i.candidate_phone = ? ORDER BY s.slot_date, s.slot_time LIMIT 1"
        ))
        .bind(candidate_phone)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.as_ref().map(booking_from_row).transpose()?)
    }

    async fn stats(&self) -> Result<ScheduleStats, ScheduleError> {
        let row = sqlx::query(
            "SELECT \
             (SELECT COUNT(*) FROM schedules) AS total_slots, \
             (SELECT COUNT(*) FROM schedules WHERE available = TRUE) AS available_slots, \
             (SELECT COUNT(*) FROM interviews) AS bookings",
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(ScheduleStats {
            total_slots: row.try_get("total_slots")?,
            available_slots: row.try_get("available_slots")?,
            bookings: row.try_get("bookings")?,
        })
    }
}
