// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Inbound swarm events.
//!
//! Typed view of the bus envelopes a coordinator reacts to. Conversion from
//! the generic [`Event`] happens once, at the bridge, so the coordinator never
//! parses payloads itself.

use crate::domain::swarm::AgentId;
use meridian_core::domain::events::{event_types, Event};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutineProgress {
    #[serde(default)]
    pub routine_id: Option<Uuid>,
    #[serde(default)]
    pub node_id: Option<String>,
    #[serde(default)]
    pub tasks_completed: u64,
    #[serde(default)]
    pub tasks_total: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentMessage {
    pub from: AgentId,
    /// Direct recipient; `None` broadcasts to the whole swarm.
    #[serde(default)]
    pub to: Option<AgentId>,
    pub payload: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceRequest {
    pub agent_id: AgentId,
    pub resource: String,
    pub amount: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SwarmEvent {
    RoutineProgress(RoutineProgress),
    RoutineCompleted { routine_id: Option<Uuid>, results: Value },
    RoutineFailed { routine_id: Option<Uuid>, error: String },
    AgentMessage(AgentMessage),
    ResourceRequest(ResourceRequest),
}

impl SwarmEvent {
    /// The bus event type this variant corresponds to.
    pub fn kind(&self) -> &'static str {
        match self {
            SwarmEvent::RoutineProgress(_) => event_types::ROUTINE_PROGRESS,
            SwarmEvent::RoutineCompleted { .. } => event_types::ROUTINE_COMPLETED,
            SwarmEvent::RoutineFailed { .. } => event_types::ROUTINE_FAILED,
            SwarmEvent::AgentMessage(_) => event_types::AGENT_MESSAGE,
            SwarmEvent::ResourceRequest(_) => event_types::RESOURCE_REQUEST,
        }
    }

    /// Whether envelopes of this type are delivered to coordinators.
    pub fn is_inbound(event_type: &str) -> bool {
        matches!(
            event_type,
            event_types::ROUTINE_PROGRESS
                | event_types::ROUTINE_COMPLETED
                | event_types::ROUTINE_FAILED
                | event_types::AGENT_MESSAGE
                | event_types::RESOURCE_REQUEST
        )
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SwarmEventError {
    #[error("Event type '{0}' is not handled by swarm coordinators")]
    Unsupported(String),

    #[error("Malformed '{event_type}' payload: {message}")]
    MalformedPayload { event_type: String, message: String },
}

fn routine_id(data: &Value) -> Option<Uuid> {
    data.get("routine_id")
        .and_then(Value::as_str)
        .and_then(|s| Uuid::parse_str(s).ok())
}

fn payload<T: for<'de> Deserialize<'de>>(event: &Event) -> Result<T, SwarmEventError> {
    serde_json::from_value(event.data.clone()).map_err(|e| SwarmEventError::MalformedPayload {
        event_type: event.event_type.clone(),
        message: e.to_string(),
    })
}

impl TryFrom<&Event> for SwarmEvent {
    type Error = SwarmEventError;

    fn try_from(event: &Event) -> Result<Self, Self::Error> {
        match event.event_type.as_str() {
            event_types::ROUTINE_PROGRESS => Ok(SwarmEvent::RoutineProgress(payload(event)?)),
            event_types::ROUTINE_COMPLETED => Ok(SwarmEvent::RoutineCompleted {
                routine_id: routine_id(&event.data),
                results: event.data.clone(),
            }),
            event_types::ROUTINE_FAILED => Ok(SwarmEvent::RoutineFailed {
                routine_id: routine_id(&event.data),
                error: event
                    .data_str("error")
                    .unwrap_or("routine failed without an error message")
                    .to_string(),
            }),
            event_types::AGENT_MESSAGE => Ok(SwarmEvent::AgentMessage(payload(event)?)),
            event_types::RESOURCE_REQUEST => Ok(SwarmEvent::ResourceRequest(payload(event)?)),
            other => Err(SwarmEventError::Unsupported(other.to_string())),
        }
    }
}
