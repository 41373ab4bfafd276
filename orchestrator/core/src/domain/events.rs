// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Event envelope shared by every tier.
//!
//! Events are the only channel between the swarm coordinator and the process
//! navigator: requests go down as `routine.create`, results come back as
//! `routine.progress`, `routine.completed` and `routine.failed`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Well-known event type tags.
pub mod event_types {
    pub const SWARM_STARTED: &str = "swarm.started";
    pub const SWARM_PHASE_CHANGED: &str = "swarm.phase_changed";
    pub const SWARM_COMPLETED: &str = "swarm.completed";
    pub const SWARM_FAILED: &str = "swarm.failed";
    pub const RESOURCE_ALLOCATED: &str = "resource.allocated";
    pub const RESOURCE_REQUEST: &str = "resource.request";
    pub const AGENT_MESSAGE: &str = "agent.message";
    pub const ROUTINE_CREATE: &str = "routine.create";
    pub const ROUTINE_PROGRESS: &str = "routine.progress";
    pub const ROUTINE_COMPLETED: &str = "routine.completed";
    pub const ROUTINE_FAILED: &str = "routine.failed";
}

/// Current envelope schema version.
pub const EVENT_SCHEMA_VERSION: u32 = 1;

/// Execution tier that emitted an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    /// Swarm coordination (tier 1)
    Coordination,
    /// Process navigation (tier 2)
    Process,
    /// Task execution (tier 3)
    Execution,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventSource {
    pub tier: Tier,
    pub component: String,
    pub id: String,
}

impl EventSource {
    pub fn new(tier: Tier, component: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            tier,
            component: component.into(),
            id: id.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventMetadata {
    pub timestamp: DateTime<Utc>,
    pub correlation_id: Uuid,
    pub version: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub event_type: String,
    pub source: EventSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    pub data: Value,
    pub metadata: EventMetadata,
}

impl Event {
    pub fn new(event_type: impl Into<String>, source: EventSource, data: Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            event_type: event_type.into(),
            source,
            target: None,
            data,
            metadata: EventMetadata {
                timestamp: Utc::now(),
                correlation_id: Uuid::new_v4(),
                version: EVENT_SCHEMA_VERSION,
            },
        }
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    pub fn with_correlation(mut self, correlation_id: Uuid) -> Self {
        self.metadata.correlation_id = correlation_id;
        self
    }

    pub fn is(&self, event_type: &str) -> bool {
        self.event_type == event_type
    }

    /// String field of the payload, if present.
    pub fn data_str(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(Value::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_envelope_serializes_wire_names() {
        let event = Event::new(
            event_types::ROUTINE_PROGRESS,
            EventSource::new(Tier::Process, "navigator", "r-1"),
            json!({"swarm_id": "s-1"}),
        )
        .with_target("s-1");

        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "routine.progress");
        assert_eq!(value["source"]["tier"], "process");
        assert_eq!(value["target"], "s-1");
        assert_eq!(value["metadata"]["version"], 1);
        assert!(value["metadata"].get("correlationId").is_some());
        assert_eq!(event.data_str("swarm_id"), Some("s-1"));
    }
}
