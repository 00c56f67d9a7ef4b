//! Append-only audit event log.
//!
//! Events are recorded through a queued writer so the append never runs
//! inside an engine's locked scope. Appends are fire-and-record: a failed or
//! dropped append is logged and never rolls back the decision it documents.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    TokenRequested,
    TokenConfirmed,
    TokenWaitlisted,
    TokenDisplaced,
    TokenPromoted,
    TokenCancelled,
    TokenNoShow,
    SlotCreated,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TokenRequested => "TOKEN_REQUESTED",
            Self::TokenConfirmed => "TOKEN_CONFIRMED",
            Self::TokenWaitlisted => "TOKEN_WAITLISTED",
            Self::TokenDisplaced => "TOKEN_DISPLACED",
            Self::TokenPromoted => "TOKEN_PROMOTED",
            Self::TokenCancelled => "TOKEN_CANCELLED",
            Self::TokenNoShow => "TOKEN_NO_SHOW",
            Self::SlotCreated => "SLOT_CREATED",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntityType {
    Token,
    Slot,
}

#[derive(Debug, Clone, Serialize)]
pub struct Event {
    pub entity_type: EntityType,
    pub entity_id: String,
    pub event_type: EventType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actor_id: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

impl Event {
    pub fn new(entity_type: EntityType, entity_id: String, event_type: EventType) -> Self {
        Self {
            entity_type,
            entity_id,
            event_type,
            payload: None,
            actor_id: None,
            recorded_at: Utc::now(),
        }
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = Some(payload);
        self
    }

    pub fn with_actor(mut self, actor_id: impl Into<String>) -> Self {
        self.actor_id = Some(actor_id.into());
        self
    }
}

/// Destination for audit events.
#[async_trait::async_trait]
pub trait EventSink: Send + Sync {
    async fn append(&self, event: Event) -> anyhow::Result<()>;
}

/// In-memory sink.
#[derive(Default)]
pub struct MemoryEventSink {
    events: std::sync::Mutex<Vec<Event>>,
}

impl MemoryEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    pub fn count_of(&self, event_type: EventType) -> usize {
        self.events()
            .iter()
            .filter(|e| e.event_type == event_type)
            .count()
    }
}

#[async_trait::async_trait]
impl EventSink for MemoryEventSink {
    async fn append(&self, event: Event) -> anyhow::Result<()> {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
        Ok(())
    }
}

const EVENT_QUEUE_DEPTH: usize = 1024;

/// Queued event writer.
///
/// `record()` is non-blocking; a spawned drain task forwards events to the
/// sink outside any decision's critical section.
#[derive(Clone)]
pub struct EventLog {
    tx: mpsc::Sender<Event>,
}

impl EventLog {
    pub fn new(sink: std::sync::Arc<dyn EventSink>) -> Self {
        let (tx, mut rx) = mpsc::channel::<Event>(EVENT_QUEUE_DEPTH);

        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                if let Err(e) = sink.append(event).await {
                    tracing::warn!(error = %e, "Failed to append audit event");
                }
            }
        });

        Self { tx }
    }

    /// Record an event, best effort. A full queue drops the event with a
    /// warning rather than blocking the caller.
    pub fn record(&self, event: Event) {
        if let Err(e) = self.tx.try_send(event) {
            tracing::warn!(error = %e, "Audit event queue full - event dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn recorded_events_reach_the_sink() {
        let sink = Arc::new(MemoryEventSink::new());
        let log = EventLog::new(Arc::clone(&sink) as Arc<dyn EventSink>);

        log.record(
            Event::new(EntityType::Token, "t-1".to_string(), EventType::TokenRequested)
                .with_actor("emp-1"),
        );
        log.record(Event::new(
            EntityType::Token,
            "t-1".to_string(),
            EventType::TokenConfirmed,
        ));

        // Drain task runs asynchronously.
        tokio::time::timeout(Duration::from_secs(1), async {
            loop {
                if sink.events().len() == 2 {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("events were not drained to the sink");

        let events = sink.events();
        assert_eq!(events[0].event_type, EventType::TokenRequested);
        assert_eq!(events[0].actor_id.as_deref(), Some("emp-1"));
        assert_eq!(events[1].event_type, EventType::TokenConfirmed);
    }

    #[test]
    fn event_type_names_match_the_audit_vocabulary() {
        assert_eq!(EventType::TokenDisplaced.as_str(), "TOKEN_DISPLACED");
        assert_eq!(EventType::TokenNoShow.as_str(), "TOKEN_NO_SHOW");
    }
}
