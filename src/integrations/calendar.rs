//! Google Calendar REST client and schedule helpers.

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde_json::{json, Value};

use crate::config::IntegrationConfig;

use super::http::ApiClient;
use super::traits::{FetchResult, Integration, Operation};
use super::types::{CalendarEvent, IntegrationId, TimeSlot};

/// Slots shorter than this are not worth reporting as free time.
pub const MIN_FREE_SLOT_MINUTES: i64 = 15;

/// Calendar integration backed by the Google Calendar v3 API.
pub struct GoogleCalendarClient {
    api: ApiClient,
}

impl GoogleCalendarClient {
    pub fn from_config(config: &IntegrationConfig) -> FetchResult<Self> {
        Ok(Self {
            api: ApiClient::from_config(
                IntegrationId::Calendar,
                config,
                IntegrationId::Calendar.token_env(),
            )?,
        })
    }

    async fn events(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> FetchResult<Value> {
        let result = self
            .api
            .get_json(
                "calendars/primary/events",
                &[
                    ("timeMin", start.to_rfc3339()),
                    ("timeMax", end.to_rfc3339()),
                    ("singleEvents", "true".to_string()),
                    ("orderBy", "startTime".to_string()),
                    ("maxResults", "250".to_string()),
                ],
            )
            .await?;

        let events: Vec<CalendarEvent> = result
            .get("items")
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(parse_event).collect())
            .unwrap_or_default();

        Ok(serde_json::to_value(events).unwrap_or_else(|_| json!([])))
    }
}

#[async_trait]
impl Integration for GoogleCalendarClient {
    fn id(&self) -> IntegrationId {
        IntegrationId::Calendar
    }

    async fn authenticate(&self) -> FetchResult<bool> {
        Ok(self.api.has_token())
    }

    async fn test_connection(&self) -> FetchResult<bool> {
        self.api
            .get_json("users/me/calendarList", &[("maxResults", "1".to_string())])
            .await
            .map(|_| true)
    }

    async fn execute(&self, op: &Operation) -> FetchResult<Value> {
        match op {
            Operation::EventsInRange { start, end } => self.events(*start, *end).await,
            other => Err(other.unsupported_by(self.id())),
        }
    }
}

/// Parse one `events.list` item; events without a usable start/end are skipped.
pub(crate) fn parse_event(event: &Value) -> Option<CalendarEvent> {
    let (start, all_day) = parse_event_time(event.get("start")?)?;
    let (end, _) = parse_event_time(event.get("end")?)?;

    let text = |key: &str| {
        event
            .get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(String::from)
    };

    Some(CalendarEvent {
        id: text("id").unwrap_or_default(),
        summary: text("summary").unwrap_or_else(|| "No Title".to_string()),
        start,
        end,
        all_day,
        location: text("location"),
        attendees: event
            .get("attendees")
            .and_then(Value::as_array)
            .map(|list| {
                list.iter()
                    .filter_map(|a| a.get("email").and_then(Value::as_str).map(String::from))
                    .collect()
            })
            .unwrap_or_default(),
        link: text("htmlLink"),
    })
}

/// `{"dateTime": ...}` for timed events, `{"date": ...}` for all-day ones.
fn parse_event_time(value: &Value) -> Option<(DateTime<Utc>, bool)> {
    if let Some(dt) = value.get("dateTime").and_then(Value::as_str) {
        let parsed = DateTime::parse_from_rfc3339(dt).ok()?;
        return Some((parsed.with_timezone(&Utc), false));
    }

    let date = value.get("date").and_then(Value::as_str)?;
    let day = NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()?;
    Some((day.and_hms_opt(0, 0, 0)?.and_utc(), true))
}

/// Gaps between timed events from `max(now, day_start)` to `day_end`.
///
/// All-day events do not block time. Slots shorter than
/// [`MIN_FREE_SLOT_MINUTES`] are dropped.
pub fn free_slots(
    events: &[CalendarEvent],
    day_start: DateTime<Utc>,
    day_end: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Vec<TimeSlot> {
    let mut timed: Vec<&CalendarEvent> = events.iter().filter(|e| !e.all_day).collect();
    timed.sort_by_key(|e| e.start);

    let mut cursor = now.max(day_start);
    let mut slots = Vec::new();

    let mut push_slot = |start: DateTime<Utc>, end: DateTime<Utc>| {
        let minutes = (end - start).num_minutes();
        if minutes >= MIN_FREE_SLOT_MINUTES {
            slots.push(TimeSlot {
                start,
                end,
                duration_minutes: minutes,
            });
        }
    };

    for event in timed {
        if event.start >= day_end {
            break;
        }
        if cursor < event.start {
            push_slot(cursor, event.start);
        }
        cursor = cursor.max(event.end);
    }

    if cursor < day_end {
        push_slot(cursor, day_end);
    }

    slots
}

/// The next upcoming meeting: first event after `now` with more than one
/// attendee, otherwise the first upcoming event.
pub fn next_meeting(events: &[CalendarEvent], now: DateTime<Utc>) -> Option<&CalendarEvent> {
    let mut upcoming: Vec<&CalendarEvent> = events.iter().filter(|e| e.start >= now).collect();
    upcoming.sort_by_key(|e| e.start);

    upcoming
        .iter()
        .find(|e| e.attendees.len() > 1)
        .or_else(|| upcoming.first())
        .copied()
}

/// Window used when looking for the next meeting.
pub fn next_meeting_window() -> Duration {
    Duration::days(7)
}
