use super::{AdvisorContext, AgentError, prompts, responses};
use crate::conversation::UserRecord;
use crate::llm::{Llm, LlmError, LlmRequest, call_json};
use crate::positions::DEFAULT_POSITION;
use crate::schedule::{Booking, ScheduleError, ScheduleStore, Slot};
use chrono::{NaiveDate, NaiveTime};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, warn};

static CANCEL: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bcancel\w*").expect("cancel pattern"));
static STATUS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(my interview|when is|status)\b").expect("status pattern")
});
static NEW_BOOKING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(re)?schedul\w*|\bbook\w*").expect("booking pattern")
});
static OTHER_TIMES: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(other|another|different|more|later|earlier) (times?|dates?|days?|options?|slots?)\b|\bnone of (these|those|them)\b|\b(doesn'?t|don'?t|does not|do not|won'?t) work\b",
    )
    .expect("other times pattern")
});
static OPTION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\boption\s*#?(\d+)\b|^\s*#?(\d{1,2})\s*$").expect("option pattern")
});
static ORDINAL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bthe (first|second|third|last)( one)?\b").expect("ordinal pattern")
});
static DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d{4}-\d{2}-\d{2})\b").expect("date pattern"));
static TIME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(\d{1,2}):(\d{2})\s*(am|pm)?\b|\b(\d{1,2})\s*(am|pm)\b").expect("time pattern")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
enum Decision {
    Book,
    More,
    Undecided,
}

#[derive(Debug, Deserialize)]
struct SlotDecision {
    decision: Decision,
    #[serde(default)]
    slot_id: Option<i64>,
}

/// Reply text plus the slot ids the candidate is now choosing from. Slot ids
/// only mean something on the schedule backend that issued them.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleOutcome {
    pub reply: String,
    pub offered_slots: Vec<i64>,
    pub offered_backend: Option<String>,
}

impl ScheduleOutcome {
    fn closed(reply: String) -> Self {
        Self {
            reply,
            offered_slots: Vec::new(),
            offered_backend: None,
        }
    }

    fn keeping(reply: String, user: &UserRecord) -> Self {
        Self {
            reply,
            offered_slots: user.offered_slots.clone(),
            offered_backend: user.offered_backend.clone(),
        }
    }
}

pub struct SchedulerAdvisor {
    llm: Arc<dyn Llm>,
    schedule: Arc<ScheduleStore>,
    recruiter_phone: String,
    max_offer_dates: usize,
}

impl SchedulerAdvisor {
    pub fn new(
        llm: Arc<dyn Llm>,
        schedule: Arc<ScheduleStore>,
        recruiter_phone: &str,
        max_offer_dates: usize,
    ) -> Self {
        Self {
            llm,
            schedule,
            recruiter_phone: recruiter_phone.to_string(),
            max_offer_dates,
        }
    }

    pub async fn propose_or_book(&self, ctx: &AdvisorContext<'_>) -> Result<ScheduleOutcome, AgentError> {
        let text = ctx.message;

        if CANCEL.is_match(text) {
            let released = self.schedule.cancel_bookings(ctx.phone_number()).await?;
            let reply = if released.is_empty() {
                responses::NOTHING_TO_CANCEL_RESPONSE.to_string()
            } else {
                responses::cancelled(&released)
            };
            return Ok(ScheduleOutcome::closed(reply));
        }

        if STATUS.is_match(text) && !NEW_BOOKING.is_match(text) {
            if let Some(booking) = self.schedule.get_booking(ctx.phone_number()).await? {
                return Ok(ScheduleOutcome::keeping(
                    responses::booking_status(&booking),
                    ctx.user,
                ));
            }
        }

        if !ctx.user.offered_slots.is_empty() {
            return self.resolve_offer(ctx).await;
        }

        self.propose(ctx).await
    }

    fn position<'a>(&self, ctx: &'a AdvisorContext<'_>) -> &'a str {
        ctx.user.job_interest.as_deref().unwrap_or(DEFAULT_POSITION)
    }

    async fn propose(&self, ctx: &AdvisorContext<'_>) -> Result<ScheduleOutcome, AgentError> {
        let position = self.position(ctx);
        let slots = self
            .schedule
            .available_slots(position, ctx.today, &[], self.max_offer_dates)
            .await?;
        if slots.is_empty() {
            info!("No open slots for {}", position);
            return Ok(ScheduleOutcome::closed(responses::no_slots(position)));
        }

        let mut reply = String::new();
        if let Some(booking) = self.schedule.get_booking(ctx.phone_number()).await? {
            reply.push_str(&responses::existing_booking_note(&booking));
        }
        reply.push_str(&responses::slot_listing(position, &slots));
        Ok(self.offering(reply, &slots).await)
    }

    /// Read after the slot query: a backend switch is permanent, so the name
    /// then matches the store the slots came from.
    async fn offering(&self, reply: String, slots: &[Slot]) -> ScheduleOutcome {
        ScheduleOutcome {
            reply,
            offered_slots: slots.iter().map(|s| s.id).collect(),
            offered_backend: Some(self.schedule.backend_name().await.to_string()),
        }
    }

    async fn resolve_offer(&self, ctx: &AdvisorContext<'_>) -> Result<ScheduleOutcome, AgentError> {
        let offered = self.schedule.get_slots(&ctx.user.offered_slots).await?;
        let backend = self.schedule.backend_name().await;
        if ctx.user.offered_backend.as_deref() != Some(backend) {
            info!(
                "Offer for {} was made on another schedule backend, offering again",
                ctx.phone_number()
            );
            return self.propose(ctx).await;
        }
        if offered.is_empty() {
            return self.propose(ctx).await;
        }

        if OTHER_TIMES.is_match(ctx.message) {
            return self.more(ctx, &offered).await;
        }
        if let Some(slot) = match_offered(ctx.message, &offered) {
            return self.book(ctx, slot).await;
        }

        match self.ask_decision(ctx, &offered).await? {
            SlotDecision {
                decision: Decision::Book,
                slot_id: Some(id),
            } => match offered.iter().find(|s| s.id == id) {
                Some(slot) => self.book(ctx, slot).await,
                None => {
                    warn!("Model picked slot {} which was never offered", id);
                    self.undecided(ctx, &offered).await
                }
            },
            SlotDecision {
                decision: Decision::More,
                ..
            } => self.more(ctx, &offered).await,
            _ => self.undecided(ctx, &offered).await,
        }
    }

    async fn ask_decision(
        &self,
        ctx: &AdvisorContext<'_>,
        offered: &[Slot],
    ) -> Result<SlotDecision, AgentError> {
        let listing = offered
            .iter()
            .enumerate()
            .map(|(i, s)| format!("option {} (slot_id {}): {}", i + 1, s.id, s.label()))
            .collect::<Vec<_>>()
            .join("\n");
        let request = LlmRequest::new(
            prompts::SLOT_DECISION_SYSTEM,
            prompts::slot_decision_prompt(ctx.message, &listing, &ctx.history_text()),
        )
        .max_tokens(60)
        .temperature(0.0);

        match call_json::<SlotDecision>(self.llm.as_ref(), request).await {
            Ok(decision) => Ok(decision),
            Err(LlmError::Parse(e)) => {
                warn!("Unreadable slot decision, asking again: {}", e);
                Ok(SlotDecision {
                    decision: Decision::Undecided,
                    slot_id: None,
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn book(&self, ctx: &AdvisorContext<'_>, slot: &Slot) -> Result<ScheduleOutcome, AgentError> {
        match self
            .schedule
            .book(slot.id, ctx.phone_number(), &self.recruiter_phone)
            .await
        {
            Ok(booking) => Ok(ScheduleOutcome::closed(self.confirmation(&booking).await)),
            Err(ScheduleError::SlotUnavailable(id)) => {
                info!("Slot {} was taken before {} could book it", id, ctx.phone_number());
                let alternatives = self
                    .schedule
                    .available_slots(&slot.position, ctx.today, &[], self.max_offer_dates)
                    .await?;
                if alternatives.is_empty() {
                    let reply = responses::slot_taken(slot, &responses::no_slots(&slot.position));
                    return Ok(ScheduleOutcome::closed(reply));
                }
                let listing = responses::slot_listing(&slot.position, &alternatives);
                Ok(self
                    .offering(responses::slot_taken(slot, &listing), &alternatives)
                    .await)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn confirmation(&self, booking: &Booking) -> String {
        let request = LlmRequest::new(
            prompts::POST_SCHEDULING_SYSTEM,
            prompts::post_scheduling_prompt(
                &booking.slot.position,
                &booking.slot.label(),
                &booking.recruiter_phone,
            ),
        )
        .max_tokens(150);
        match self.llm.complete(request).await {
            Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
            Ok(_) => responses::booking_confirmed(booking),
            Err(e) => {
                warn!("Confirmation message failed, using the standard text: {}", e);
                responses::booking_confirmed(booking)
            }
        }
    }

    async fn more(&self, ctx: &AdvisorContext<'_>, offered: &[Slot]) -> Result<ScheduleOutcome, AgentError> {
        let position = offered
            .first()
            .map(|s| s.position.as_str())
            .unwrap_or_else(|| self.position(ctx));
        let mut seen: Vec<NaiveDate> = offered.iter().map(|s| s.date).collect();
        seen.dedup();

        let slots = self
            .schedule
            .available_slots(position, ctx.today, &seen, self.max_offer_dates)
            .await?;
        if slots.is_empty() {
            return Ok(ScheduleOutcome::keeping(
                responses::no_other_dates(position),
                ctx.user,
            ));
        }
        Ok(self
            .offering(responses::slot_listing(position, &slots), &slots)
            .await)
    }

    async fn undecided(&self, ctx: &AdvisorContext<'_>, offered: &[Slot]) -> Result<ScheduleOutcome, AgentError> {
        let open: Vec<Slot> = offered.iter().filter(|s| s.available).cloned().collect();
        let Some(first) = open.first() else {
            return self.propose(ctx).await;
        };
        let listing = responses::slot_listing(&first.position, &open);
        Ok(self
            .offering(responses::still_deciding(&listing), &open)
            .await)
    }
}

/// Picks an offered slot from an explicit reference: "option N", "the first",
/// a full date and time, or a date or time that only one offered slot has.
fn match_offered<'a>(text: &str, offered: &'a [Slot]) -> Option<&'a Slot> {
    if let Some(caps) = OPTION.captures(text) {
        let n: usize = caps.get(1).or(caps.get(2))?.as_str().parse().ok()?;
        return n.checked_sub(1).and_then(|i| offered.get(i));
    }
    if let Some(caps) = ORDINAL.captures(text) {
        return match caps[1].to_lowercase().as_str() {
            "first" => offered.first(),
            "second" => offered.get(1),
            "third" => offered.get(2),
            _ => offered.last(),
        };
    }

    let date = DATE
        .captures(text)
        .and_then(|c| NaiveDate::parse_from_str(&c[1], "%Y-%m-%d").ok());
    let time = parse_time(text);
    let candidates: Vec<&Slot> = offered
        .iter()
        .filter(|s| date.is_none_or(|d| s.date == d) && time.is_none_or(|t| s.time == t))
        .collect();

    match (date, time, candidates.as_slice()) {
        (None, None, _) => None,
        (_, _, [only]) => Some(*only),
        _ => None,
    }
}

fn parse_time(text: &str) -> Option<NaiveTime> {
    let caps = TIME.captures(text)?;
    let (hour, minute, meridiem) = match caps.get(1) {
        Some(hour) => (hour.as_str(), caps.get(2)?.as_str(), caps.get(3)),
        None => (caps.get(4)?.as_str(), "0", caps.get(5)),
    };
    let mut hour: u32 = hour.parse().ok()?;
    let minute: u32 = minute.parse().ok()?;
    match meridiem.map(|m| m.as_str().to_lowercase()) {
        Some(m) if m == "pm" && hour < 12 => hour += 12,
        Some(m) if m == "am" && hour == 12 => hour = 0,
        _ => {}
    }
    NaiveTime::from_hms_opt(hour, minute, 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slot(id: i64, day: u32, hour: u32) -> Slot {
        Slot {
            id,
            date: NaiveDate::from_ymd_opt(2026, 10, day).unwrap(),
            time: NaiveTime::from_hms_opt(hour, 0, 0).unwrap(),
            position: "Python Developer".into(),
            available: true,
        }
    }

    fn offered() -> Vec<Slot> {
        vec![slot(11, 20, 9), slot(12, 20, 14), slot(13, 21, 9)]
    }

    fn picked(text: &str) -> Option<i64> {
        match_offered(text, &offered()).map(|s| s.id)
    }

    #[test]
    fn test_option_number() {
        assert_eq!(picked("option 2"), Some(12));
        assert_eq!(picked("Option #3 please"), Some(13));
        assert_eq!(picked("1"), Some(11));
        assert_eq!(picked("option 9"), None);
        assert_eq!(picked("option 0"), None);
    }

    #[test]
    fn test_ordinal() {
        assert_eq!(picked("the first one works"), Some(11));
        assert_eq!(picked("I'll take the last one"), Some(13));
    }

    #[test]
    fn test_date_and_time() {
        assert_eq!(picked("2026-10-21 09:00"), Some(13));
        assert_eq!(picked("2026-10-20 at 2pm"), Some(12));
        assert_eq!(picked("2026-10-22 09:00"), None);
    }

    #[test]
    fn test_unique_time_or_date() {
        assert_eq!(picked("14:00 works"), Some(12));
        assert_eq!(picked("2026-10-21 is good"), Some(13));
        // Two slots at 09:00.
        assert_eq!(picked("9am"), None);
        assert_eq!(picked("sounds good"), None);
    }

    #[test]
    fn test_parse_time_meridiem() {
        assert_eq!(parse_time("at 2pm"), NaiveTime::from_hms_opt(14, 0, 0));
        assert_eq!(parse_time("12 am"), NaiveTime::from_hms_opt(0, 0, 0));
        assert_eq!(parse_time("10:30"), NaiveTime::from_hms_opt(10, 30, 0));
        assert_eq!(parse_time("no time here"), None);
    }

    #[test]
    fn test_other_times_phrases() {
        assert!(OTHER_TIMES.is_match("any other times?"));
        assert!(OTHER_TIMES.is_match("none of these work"));
        assert!(OTHER_TIMES.is_match("that doesn't work for me"));
        assert!(!OTHER_TIMES.is_match("option 2"));
    }

    #[test]
    fn test_decision_json() {
        let decision: SlotDecision =
            serde_json::from_str(r#"{"decision": "book", "slot_id": 12}"#).unwrap();
        assert_eq!(decision.decision, Decision::Book);
        assert_eq!(decision.slot_id, Some(12));

        let decision: SlotDecision = serde_json::from_str(r#"{"decision": "more"}"#).unwrap();
        assert_eq!(decision.decision, Decision::More);
        assert!(decision.slot_id.is_none());
    }
}
