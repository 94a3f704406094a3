//! Narrow adapters for out-of-process collaborators.
//!
//! Calls through these traits happen after commit and never affect the
//! outcome of the command that triggered them.

use chrono::{DateTime, Utc};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::Serialize;
use uuid::Uuid;

/// Event descriptor handed to the calendar host.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct CalendarEvent {
    pub source_id: Uuid,
    pub group_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub starts_at: DateTime<Utc>,
    pub duration_minutes: i32,
    pub location: Option<String>,
}

/// Result of a collaborator call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CollaboratorResult<T> {
    Done(T),
    /// Collaborator disabled by configuration.
    Skipped,
    Failed(String),
}

#[async_trait::async_trait]
pub trait CalendarService: Send + Sync {
    /// Creates an event and returns the host's opaque id.
    async fn create_event(&self, event: &CalendarEvent) -> CollaboratorResult<String>;
}

/// Mints room identifiers for virtual and hybrid meetings.
pub trait RoomIdGenerator: Send + Sync {
    /// Called before the meeting row exists, so keyed by its group.
    fn room_id(&self, group_id: Uuid) -> String;
}

/// Random, URL-safe room names prefixed with a short group id fragment.
#[derive(Debug, Clone, Default)]
pub struct RandomRoomIds;

impl RoomIdGenerator for RandomRoomIds {
    fn room_id(&self, group_id: Uuid) -> String {
        let suffix: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(12)
            .map(char::from)
            .collect();
        let simple = group_id.simple().to_string();
        format!("chama-{}-{}", &simple[..8], suffix.to_lowercase())
    }
}

/// Mock calendar for development and testing.
///
/// Logs events but doesn't create them anywhere.
#[derive(Debug, Clone, Default)]
pub struct MockCalendarService {
    /// Whether to simulate failures for testing.
    pub simulate_failure: bool,
}

impl MockCalendarService {
    pub fn new() -> Self {
        Self {
            simulate_failure: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            simulate_failure: true,
        }
    }
}

#[async_trait::async_trait]
impl CalendarService for MockCalendarService {
    async fn create_event(&self, event: &CalendarEvent) -> CollaboratorResult<String> {
        if self.simulate_failure {
            tracing::warn!(
                source_id = %event.source_id,
                "Mock calendar service simulating failure"
            );
            return CollaboratorResult::Failed("Simulated failure".to_string());
        }

        tracing::info!(
            source_id = %event.source_id,
            group_id = %event.group_id,
            starts_at = %event.starts_at,
            "Mock: Would create calendar event"
        );

        CollaboratorResult::Done(format!("mock-event-{}", event.source_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event() -> CalendarEvent {
        CalendarEvent {
            source_id: Uuid::new_v4(),
            group_id: Uuid::new_v4(),
            title: "Monthly meeting".into(),
            description: None,
            starts_at: Utc::now(),
            duration_minutes: 60,
            location: None,
        }
    }

    #[tokio::test]
    async fn test_mock_calendar_returns_event_id() {
        let e = event();
        let result = MockCalendarService::new().create_event(&e).await;
        assert_eq!(
            result,
            CollaboratorResult::Done(format!("mock-event-{}", e.source_id))
        );
    }

    #[tokio::test]
    async fn test_mock_calendar_failure() {
        let result = MockCalendarService::failing().create_event(&event()).await;
        assert!(matches!(result, CollaboratorResult::Failed(_)));
    }

    #[test]
    fn test_room_ids_are_unique_and_tagged() {
        let group = Uuid::new_v4();
        let a = RandomRoomIds.room_id(group);
        let b = RandomRoomIds.room_id(group);
        assert_ne!(a, b);
        assert!(a.starts_with("chama-"));
        assert!(a.contains(&group.simple().to_string()[..8]));
    }
}
