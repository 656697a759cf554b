use super::seed::NewSlot;
use super::types::{Booking, ScheduleError, ScheduleStats, Slot, SlotRepository};
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::{Postgres, Row, Transaction};
use std::time::Duration;
use tracing::info;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

const SCHEMA: [&str; 3] = [
    "CREATE TABLE IF NOT EXISTS schedules (
        id BIGSERIAL PRIMARY KEY,
        slot_date DATE NOT NULL,
        slot_time TIME NOT NULL,
        position TEXT NOT NULL,
        available BOOLEAN NOT NULL DEFAULT TRUE
    )",
    "CREATE INDEX IF NOT EXISTS schedules_lookup
        ON schedules (position, available, slot_date, slot_time)",
    "CREATE TABLE IF NOT EXISTS interviews (
        id BIGSERIAL PRIMARY KEY,
        schedule_id BIGINT NOT NULL UNIQUE REFERENCES schedules(id),
        candidate_phone TEXT NOT NULL,
        recruiter_phone TEXT NOT NULL
    )",
];

const SLOT_COLUMNS: &str = "id, slot_date, slot_time, position, available";
const BOOKING_COLUMNS: &str = "i.id AS booking_id, i.candidate_phone, i.recruiter_phone, \
     s.id, s.slot_date, s.slot_time, s.position, s.available";

pub struct PgSlots {
    pool: PgPool,
}

impl PgSlots {
    pub async fn connect(database_url: &str) -> Result<Self, ScheduleError> {
        Self::connect_with_timeout(database_url, CONNECT_TIMEOUT).await
    }

    pub async fn connect_with_timeout(
        database_url: &str,
        timeout: Duration,
    ) -> Result<Self, ScheduleError> {
        info!("Connecting to PostgreSQL...");
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .acquire_timeout(timeout)
            .connect(database_url)
            .await?;
        info!("PostgreSQL connection pool established");
        Ok(Self { pool })
    }

    /// Pool that only dials the server on first use.
    #[cfg(test)]
    pub fn connect_lazy(database_url: &str, timeout: Duration) -> Result<Self, ScheduleError> {
        let pool = PgPoolOptions::new()
            .max_connections(1)
            .acquire_timeout(timeout)
            .connect_lazy(database_url)?;
        Ok(Self { pool })
    }
}

fn slot_from_row(row: &PgRow) -> Result<Slot, sqlx::Error> {
    Ok(Slot {
        id: row.try_get("id")?,
        date: row.try_get("slot_date")?,
        time: row.try_get("slot_time")?,
        position: row.try_get("position")?,
        available: row.try_get("available")?,
    })
}

fn booking_from_row(row: &PgRow) -> Result<Booking, sqlx::Error> {
    Ok(Booking {
        id: row.try_get("booking_id")?,
        slot: slot_from_row(row)?,
        candidate_phone: row.try_get("candidate_phone")?,
        recruiter_phone: row.try_get("recruiter_phone")?,
    })
}

async fn release_bookings(
    tx: &mut Transaction<'_, Postgres>,
    candidate_phone: &str,
    keep_slot: Option<i64>,
) -> Result<Vec<Slot>, sqlx::Error> {
    let rows = sqlx::query(
        "DELETE FROM interviews WHERE candidate_phone = $1 \
         AND ($2::BIGINT IS NULL OR schedule_id <> $2) RETURNING schedule_id",
    )
    .bind(candidate_phone)
    .bind(keep_slot)
    .fetch_all(&mut **tx)
    .await?;
    let ids: Vec<i64> = rows
        .iter()
        .map(|r| r.try_get("schedule_id"))
        .collect::<Result<_, _>>()?;
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    let released = sqlx::query(&format!(
        "UPDATE schedules SET available = TRUE WHERE id = ANY($1) RETURNING {SLOT_COLUMNS}"
    ))
    .bind(&ids)
    .fetch_all(&mut **tx)
    .await?;
    let mut slots = released
        .iter()
        .map(slot_from_row)
        .collect::<Result<Vec<_>, _>>()?;
    slots.sort_by_key(|s| (s.date, s.time));
    Ok(slots)
}

#[async_trait]
impl SlotRepository for PgSlots {
    fn name(&self) -> &'static str {
        "postgres"
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
        let dates: Vec<NaiveDate> = slots.iter().map(|s| s.date).collect();
        let times: Vec<NaiveTime> = slots.iter().map(|s| s.time).collect();
        let positions: Vec<&str> = slots.iter().map(|s| s.position).collect();
        let available: Vec<bool> = slots.iter().map(|s| s.available).collect();

        sqlx::query(
            "INSERT INTO schedules (slot_date, slot_time, position, available) \
             SELECT * FROM UNNEST($1::DATE[], $2::TIME[], $3::TEXT[], $4::BOOLEAN[])",
        )
        .bind(&dates)
        .bind(&times)
        .bind(&positions)
        .bind(&available)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn available_slots(
        &self,
        position: &str,
        from: NaiveDate,
    ) -> Result<Vec<Slot>, ScheduleError> {
        let rows = sqlx::query(&format!(
            "SELECT {SLOT_COLUMNS} FROM schedules \
             WHERE available AND position = $1 AND slot_date >= $2 \
             ORDER BY slot_date, slot_time, id"
        ))
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
        let row = sqlx::query(&format!("SELECT {SLOT_COLUMNS} FROM schedules WHERE id = $1"))
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

        let claimed = sqlx::query(&format!(
            "UPDATE schedules SET available = FALSE WHERE id = $1 AND available \
             RETURNING {SLOT_COLUMNS}"
        ))
        .bind(slot_id)
        .fetch_optional(&mut *tx)
        .await?;
        let Some(row) = claimed else {
            tx.rollback().await?;
            return Err(ScheduleError::SlotUnavailable(slot_id));
        };
        let slot = slot_from_row(&row)?;

        let inserted = sqlx::query(
            "INSERT INTO interviews (schedule_id, candidate_phone, recruiter_phone) \
             VALUES ($1, $2, $3) RETURNING id",
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
             WHERE i.candidate_phone = $1 ORDER BY s.slot_date, s.slot_time LIMIT 1"
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
             (SELECT COUNT(*) FROM schedules WHERE available) AS available_slots, \
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
