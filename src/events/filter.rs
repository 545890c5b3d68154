use serde::Deserialize;
use time::OffsetDateTime;

use crate::model::EventType;

use super::Event;

/// Browse filters for the public event list. All criteria are optional and
/// combine with AND.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventFilter {
    #[serde(rename = "type")]
    pub event_type: Option<EventType>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    #[serde(default)]
    pub upcoming: bool,
}

impl EventFilter {
    pub fn matches(&self, event: &Event, now: OffsetDateTime) -> bool {
        if self.event_type.is_some_and(|t| t != event.event_type) {
            return false;
        }
        if self.min_price.is_some_and(|min| event.ticket_price < min) {
            return false;
        }
        if self.max_price.is_some_and(|max| event.ticket_price > max) {
            return false;
        }
        if self.upcoming && event.start_date < now {
            return false;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use time::{macros::datetime, Duration};
    use uuid::Uuid;

    use super::*;
    use crate::model::EventStatus;

    fn concert(price: f64, start: OffsetDateTime) -> Event {
        Event {
            id: Uuid::now_v7(),
            organizer_id: Uuid::now_v7(),
            title: "Night Show".into(),
            description: "Loud".into(),
            image: None,
            event_type: EventType::Concert,
            start_date: start,
            end_date: start + Duration::hours(3),
            venue_id: Uuid::now_v7(),
            max_capacity: 100,
            ticket_price: price,
            status: EventStatus::Published,
            seats_taken: 0,
            created_at: start - Duration::days(30),
        }
    }

    #[test]
    fn empty_filter_matches_everything() {
        let now = datetime!(2026-06-01 12:00 UTC);
        let past = concert(0.0, now - Duration::days(1));
        assert!(EventFilter::default().matches(&past, now));
    }

    #[test]
    fn type_and_price_bounds_are_inclusive() {
        let now = datetime!(2026-06-01 12:00 UTC);
        let event = concert(25.0, now + Duration::days(1));

        let filter = EventFilter {
            event_type: Some(EventType::Concert),
            min_price: Some(25.0),
            max_price: Some(25.0),
            upcoming: false,
        };
        assert!(filter.matches(&event, now));

        let weddings = EventFilter { event_type: Some(EventType::Wedding), ..filter.clone() };
        assert!(!weddings.matches(&event, now));

        let pricier = EventFilter { min_price: Some(30.0), ..filter };
        assert!(!pricier.matches(&event, now));
    }

    #[test]
    fn upcoming_hides_started_events() {
        let now = datetime!(2026-06-01 12:00 UTC);
        let filter = EventFilter { upcoming: true, ..EventFilter::default() };

        assert!(filter.matches(&concert(0.0, now + Duration::minutes(1)), now));
        assert!(!filter.matches(&concert(0.0, now - Duration::minutes(1)), now));
    }

    #[test]
    fn parses_from_query_string_names() {
        let filter: EventFilter =
            serde_json::from_str(r#"{"type":"wedding","minPrice":10,"upcoming":true}"#).unwrap();
        assert_eq!(filter.event_type, Some(EventType::Wedding));
        assert_eq!(filter.min_price, Some(10.0));
        assert!(filter.upcoming);
    }
}
