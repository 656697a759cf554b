use crate::positions::SCHEDULED_POSITIONS;
use chrono::{Datelike, Duration, NaiveDate, NaiveTime, Weekday};
use rand::{Rng, SeedableRng, rngs::StdRng};

const INTERVIEW_DAYS: [Weekday; 4] = [Weekday::Tue, Weekday::Wed, Weekday::Thu, Weekday::Sun];
const FIRST_HOUR: u32 = 9;
const LAST_HOUR: u32 = 16;
const AVAILABILITY: f64 = 0.5;

#[derive(Debug, Clone, Copy)]
pub struct SeedOptions {
    pub horizon_days: u32,
    /// Fixed seed for reproducible calendars; a random one is drawn when absent.
    pub seed: Option<u64>,
}

impl SeedOptions {
    pub fn resolve_seed(&self) -> u64 {
        self.seed.unwrap_or_else(|| rand::rng().random())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewSlot {
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub position: &'static str,
    pub available: bool,
}

/// Synthetic calendar from `today` through `today + horizon_days`: hourly
/// slots on interview days, each independently available with p = 0.5.
pub fn seed_slots(today: NaiveDate, horizon_days: u32, seed: u64) -> Vec<NewSlot> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut slots = Vec::new();

    for offset in 0..=i64::from(horizon_days) {
        let date = today + Duration::days(offset);
        if !INTERVIEW_DAYS.contains(&date.weekday()) {
            continue;
        }
        for hour in FIRST_HOUR..=LAST_HOUR {
            let Some(time) = NaiveTime::from_hms_opt(hour, 0, 0) else {
                continue;
            };
            for position in SCHEDULED_POSITIONS {
                slots.push(NewSlot {
                    date,
                    time,
                    position,
                    available: rng.random_bool(AVAILABILITY),
                });
            }
        }
    }
    slots
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 12, 20).unwrap()
    }

    #[test]
    fn test_same_seed_same_calendar() {
        assert_eq!(seed_slots(today(), 60, 42), seed_slots(today(), 60, 42));
    }

    #[test]
    fn test_different_seed_changes_availability() {
        let a: Vec<bool> = seed_slots(today(), 60, 1).iter().map(|s| s.available).collect();
        let b: Vec<bool> = seed_slots(today(), 60, 2).iter().map(|s| s.available).collect();
        assert_eq!(a.len(), b.len());
        assert_ne!(a, b);
    }

    #[test]
    fn test_only_future_interview_days() {
        let slots = seed_slots(today(), 60, 7);
        assert!(!slots.is_empty());
        for slot in &slots {
            assert!(slot.date >= today());
            assert!(slot.date <= today() + Duration::days(60));
            assert!(INTERVIEW_DAYS.contains(&slot.date.weekday()));
            assert!((FIRST_HOUR..=LAST_HOUR).contains(&slot.time.hour()));
        }
    }

    #[test]
    fn test_late_december_still_has_slots() {
        let dec_31 = NaiveDate::from_ymd_opt(2025, 12, 31).unwrap();
        let slots = seed_slots(dec_31, 60, 3);
        assert!(slots.iter().any(|s| s.available && s.date.year() == 2026));
    }

    #[test]
    fn test_every_position_and_hour_present_per_day() {
        let slots = seed_slots(today(), 7, 9);
        let first_day = slots[0].date;
        let per_day = slots.iter().filter(|s| s.date == first_day).count();
        assert_eq!(per_day, 8 * SCHEDULED_POSITIONS.len());
    }
}
