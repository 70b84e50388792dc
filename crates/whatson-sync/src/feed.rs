//! List filters used by the consumer screens.

use chrono::{DateTime, NaiveDate, Utc};

use crate::domain::{Business, EventWithBusiness, Interest};

/// Events from `now` on, earliest first.
pub fn upcoming(events: &[EventWithBusiness], now: DateTime<Utc>) -> Vec<EventWithBusiness> {
    let mut upcoming: Vec<EventWithBusiness> = events
        .iter()
        .filter(|e| e.event.is_upcoming(now))
        .cloned()
        .collect();
    upcoming.sort_by_key(|e| e.event.date);
    upcoming
}

/// Events tagged with at least one of the selected interests. An empty
/// selection keeps everything.
pub fn matching_interests(
    events: &[EventWithBusiness],
    interests: &[Interest],
) -> Vec<EventWithBusiness> {
    if interests.is_empty() {
        return events.to_vec();
    }
    events
        .iter()
        .filter(|e| e.event.tags.iter().any(|t| interests.contains(t)))
        .cloned()
        .collect()
}

pub fn on_day(events: &[EventWithBusiness], day: NaiveDate) -> Vec<EventWithBusiness> {
    events
        .iter()
        .filter(|e| e.event.date.date_naive() == day)
        .cloned()
        .collect()
}

/// Case-insensitive match on name or any tag. Blank text matches nothing.
pub fn search_businesses(businesses: &[Business], text: &str) -> Vec<Business> {
    let needle = text.trim().to_lowercase();
    if needle.is_empty() {
        return Vec::new();
    }
    businesses
        .iter()
        .filter(|b| {
            b.name.to_lowercase().contains(&needle)
                || b.tags.iter().any(|t| t.to_lowercase().contains(&needle))
        })
        .cloned()
        .collect()
}
