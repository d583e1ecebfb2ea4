use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::event::Event;

/// Envelope for a committed change: which entity, which event, and the payload.
///
/// `commit_sequence` is the store's commit counter at the time the unit that
/// produced the event committed; envelopes from one unit share it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope<E> {
    event_id: Uuid,
    entity_type: String,
    entity_id: Uuid,
    event_type: String,
    event_version: u32,
    occurred_at: DateTime<Utc>,
    commit_sequence: u64,
    payload: E,
}

impl<E> EventEnvelope<E> {
    pub fn event_id(&self) -> Uuid {
        self.event_id
    }

    pub fn entity_type(&self) -> &str {
        &self.entity_type
    }

    pub fn entity_id(&self) -> Uuid {
        self.entity_id
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn event_version(&self) -> u32 {
        self.event_version
    }

    pub fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }

    pub fn commit_sequence(&self) -> u64 {
        self.commit_sequence
    }

    pub fn payload(&self) -> &E {
        &self.payload
    }

    pub fn into_payload(self) -> E {
        self.payload
    }

    /// Stamp the commit position once the producing unit has committed.
    pub fn with_commit_sequence(mut self, commit_sequence: u64) -> Self {
        self.commit_sequence = commit_sequence;
        self
    }
}

impl EventEnvelope<JsonValue> {
    /// Wrap a typed event, serializing its payload to JSON.
    pub fn from_typed<E>(
        entity_type: impl Into<String>,
        entity_id: Uuid,
        event: &E,
    ) -> Result<Self, serde_json::Error>
    where
        E: Event + Serialize,
    {
        Ok(Self {
            event_id: Uuid::now_v7(),
            entity_type: entity_type.into(),
            entity_id,
            event_type: event.event_type().to_string(),
            event_version: event.version(),
            occurred_at: event.occurred_at(),
            commit_sequence: 0,
            payload: serde_json::to_value(event)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Serialize)]
    struct Touched {
        at: DateTime<Utc>,
    }

    impl Event for Touched {
        fn event_type(&self) -> &'static str {
            "test.touched"
        }

        fn occurred_at(&self) -> DateTime<Utc> {
            self.at
        }
    }

    #[test]
    fn from_typed_captures_event_metadata() {
        let at = Utc::now();
        let entity = Uuid::now_v7();
        let env = EventEnvelope::from_typed("test.entity", entity, &Touched { at })
            .unwrap()
            .with_commit_sequence(7);

        assert_eq!(env.entity_type(), "test.entity");
        assert_eq!(env.entity_id(), entity);
        assert_eq!(env.event_type(), "test.touched");
        assert_eq!(env.event_version(), 1);
        assert_eq!(env.occurred_at(), at);
        assert_eq!(env.commit_sequence(), 7);
        assert!(env.payload().get("at").is_some());
    }
}
