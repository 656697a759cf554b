use crate::schedule::{Booking, Slot};
use std::fmt::Write;

pub const ERROR_RESPONSE: &str =
    "I apologize, but I encountered an error. Could you please try again?";

pub const FAREWELL_RESPONSE: &str = "Thank you for your time! If you have any questions later, \
                                     feel free to reach out. Good luck!";

pub const NOTHING_TO_CANCEL_RESPONSE: &str = "You don't have an interview scheduled right now. \
                                              Would you like to see the available times?";

pub fn no_slots(position: &str) -> String {
    format!(
        "I'm sorry, there are no available interview slots for {} right now. \
         Would you like me to check another position, or is there anything else I can help with?",
        position
    )
}

/// Groups slots by date and numbers them across the whole list.
pub fn slot_listing(position: &str, slots: &[Slot]) -> String {
    let mut out = String::with_capacity(64 + slots.len() * 16);
    let _ = writeln!(
        out,
        "Here are the available interview slots for {}:",
        position
    );

    let mut current_date = None;
    for (i, slot) in slots.iter().enumerate() {
        if current_date != Some(slot.date) {
            let _ = write!(out, "\n{}:\n", slot.date.format("%a, %b %-d, %Y"));
            current_date = Some(slot.date);
        }
        let _ = writeln!(out, "  {}. {}", i + 1, slot.time.format("%H:%M"));
    }

    out.push_str(
        "\nReply with the option number (e.g. \"option 2\") or the date and time that works for you.",
    );
    out
}

pub fn no_other_dates(position: &str) -> String {
    format!(
        "I'm sorry, there are no other dates open for {} right now. \
         The times I shared earlier are still available if one of them works for you.",
        position
    )
}

pub fn slot_taken(slot: &Slot, alternatives: &str) -> String {
    format!(
        "Sorry, the {} slot is no longer available.\n\n{}",
        slot.label(),
        alternatives
    )
}

pub fn still_deciding(listing: &str) -> String {
    format!("No problem, take your time. {}", listing)
}

pub fn booking_confirmed(booking: &Booking) -> String {
    format!(
        "You're all set! Your {} interview is booked for {} at {}. \
         The recruiter will follow up from {} with next steps. \
         Is there anything else I can help you with?",
        booking.slot.position,
        booking.slot.date.format("%A, %B %-d, %Y"),
        booking.slot.time.format("%H:%M"),
        booking.recruiter_phone
    )
}

pub fn booking_status(booking: &Booking) -> String {
    format!(
        "Your {} interview is scheduled for {} at {}. \
         Reply \"reschedule\" to pick a new time or \"cancel\" to cancel it.",
        booking.slot.position,
        booking.slot.date.format("%A, %B %-d, %Y"),
        booking.slot.time.format("%H:%M")
    )
}

pub fn existing_booking_note(booking: &Booking) -> String {
    format!(
        "You currently have an interview on {}. Picking a new time will replace it.\n\n",
        booking.slot.label()
    )
}

pub fn cancelled(slots: &[Slot]) -> String {
    let labels: Vec<String> = slots.iter().map(|s| s.label()).collect();
    format!(
        "Your interview ({}) has been cancelled. Let me know if you'd like to pick another time.",
        labels.join(", ")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime};

    fn slot(id: i64, day: u32, hour: u32) -> Slot {
        Slot {
            id,
            date: NaiveDate::from_ymd_opt(2026, 10, day).unwrap(),
            time: NaiveTime::from_hms_opt(hour, 0, 0).unwrap(),
            position: "Python Developer".into(),
            available: true,
        }
    }

    #[test]
    fn test_listing_groups_by_date_and_numbers_globally() {
        let listing = slot_listing(
            "Python Developer",
            &[slot(1, 20, 9), slot(2, 20, 11), slot(3, 21, 10)],
        );
        assert!(listing.contains("Tue, Oct 20, 2026:\n  1. 09:00\n  2. 11:00\n"));
        assert!(listing.contains("Wed, Oct 21, 2026:\n  3. 10:00\n"));
        assert_eq!(listing.matches("2026:").count(), 2);
    }

    #[test]
    fn test_slot_label() {
        assert_eq!(slot(1, 20, 9).label(), "2026-10-20 09:00");
    }
}
