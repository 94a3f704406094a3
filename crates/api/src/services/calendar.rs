//! Calendar host adapter.
//!
//! Posts meeting descriptors to the configured calendar host and returns the
//! id it assigns. Runs after commit only.

use async_trait::async_trait;
use domain::services::{CalendarEvent, CalendarService, CollaboratorResult};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::CalendarConfig;

#[derive(Debug, Deserialize)]
struct CreatedEvent {
    id: String,
}

/// HTTP client for the calendar host.
#[derive(Clone)]
pub struct HttpCalendarService {
    client: reqwest::Client,
    config: CalendarConfig,
}

impl HttpCalendarService {
    pub fn new(config: CalendarConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()?;
        Ok(Self { client, config })
    }

    fn events_url(&self) -> String {
        format!("{}/events", self.config.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl CalendarService for HttpCalendarService {
    async fn create_event(&self, event: &CalendarEvent) -> CollaboratorResult<String> {
        if !self.config.enabled {
            debug!(source_id = %event.source_id, "Calendar disabled, skipping event");
            return CollaboratorResult::Skipped;
        }

        let response = match self.client.post(self.events_url()).json(event).send().await {
            Ok(response) => response,
            Err(e) => {
                warn!(source_id = %event.source_id, error = %e, "Calendar request failed");
                return CollaboratorResult::Failed(e.to_string());
            }
        };

        if !response.status().is_success() {
            let status = response.status();
            return CollaboratorResult::Failed(format!("calendar host returned {}", status));
        }

        match response.json::<CreatedEvent>().await {
            Ok(created) => CollaboratorResult::Done(created.id),
            Err(e) => CollaboratorResult::Failed(format!("invalid calendar response: {}", e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn event() -> CalendarEvent {
        CalendarEvent {
            source_id: Uuid::new_v4(),
            group_id: Uuid::new_v4(),
            title: "AGM".into(),
            description: None,
            starts_at: Utc::now(),
            duration_minutes: 60,
            location: Some("Community hall".into()),
        }
    }

    #[tokio::test]
    async fn test_disabled_calendar_skips() {
        let service = HttpCalendarService::new(CalendarConfig::default()).unwrap();
        assert_eq!(service.create_event(&event()).await, CollaboratorResult::Skipped);
    }

    #[tokio::test]
    async fn test_unreachable_host_fails_without_panicking() {
        let service = HttpCalendarService::new(CalendarConfig {
            enabled: true,
            base_url: "http://127.0.0.1:9".into(),
            timeout_ms: 200,
        })
        .unwrap();
        assert!(matches!(
            service.create_event(&event()).await,
            CollaboratorResult::Failed(_)
        ));
    }

    #[test]
    fn test_events_url_trims_slash() {
        let service = HttpCalendarService::new(CalendarConfig {
            enabled: true,
            base_url: "https://calendar.example.com/".into(),
            timeout_ms: 1000,
        })
        .unwrap();
        assert_eq!(service.events_url(), "https://calendar.example.com/events");
    }
}
