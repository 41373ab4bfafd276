// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Event Bus Implementation - Pub/Sub for tier events
//
// Provides in-memory event streaming using tokio broadcast channels.
// Carries routine requests/results between the coordination and process
// tiers, plus outward swarm notifications for observers.
//
// In-memory only: a slow subscriber that falls more than `capacity` events
// behind loses the oldest ones and sees `EventBusError::Lagged`.

use crate::domain::events::Event;
use futures::stream::{self, Stream};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Event bus for publishing and subscribing to tier events
#[derive(Clone)]
pub struct EventBus {
    sender: Arc<broadcast::Sender<Event>>,
}

impl EventBus {
    /// Create a new event bus with specified channel capacity
    /// Capacity determines how many events can be buffered before dropping old ones
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Create event bus with default capacity (1000)
    pub fn with_default_capacity() -> Self {
        Self::new(1000)
    }

    /// Publish an event to all subscribers
    pub fn publish(&self, event: Event) {
        debug!(event_type = %event.event_type, event_id = %event.id, "Publishing event");

        // send() fails only when nobody is subscribed
        let receiver_count = self.sender.send(event).unwrap_or(0);

        if receiver_count == 0 {
            debug!("No subscribers listening to event");
        }
    }

    /// Subscribe to all events
    pub fn subscribe(&self) -> EventReceiver {
        EventReceiver {
            receiver: self.sender.subscribe(),
        }
    }

    /// Subscribe and filter for events addressed to one target
    /// (typically a swarm id)
    pub fn subscribe_target(&self, target: impl Into<String>) -> TargetEventReceiver {
        TargetEventReceiver {
            receiver: self.sender.subscribe(),
            target: target.into(),
        }
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

/// Receiver for all events
pub struct EventReceiver {
    receiver: broadcast::Receiver<Event>,
}

impl EventReceiver {
    /// Receive the next event (waits until one is available)
    pub async fn recv(&mut self) -> Result<Event, EventBusError> {
        self.receiver.recv().await.map_err(map_recv_error)
    }

    /// Try to receive an event without waiting
    pub fn try_recv(&mut self) -> Result<Event, EventBusError> {
        self.receiver.try_recv().map_err(|e| match e {
            broadcast::error::TryRecvError::Empty => EventBusError::Empty,
            broadcast::error::TryRecvError::Closed => EventBusError::Closed,
            broadcast::error::TryRecvError::Lagged(n) => {
                warn!("Event receiver lagged by {} events", n);
                EventBusError::Lagged(n)
            }
        })
    }

    /// Adapt into a stream that skips lag notifications and ends when the bus closes.
    pub fn into_stream(self) -> impl Stream<Item = Event> {
        stream::unfold(self, |mut rx| async move {
            loop {
                match rx.recv().await {
                    Ok(event) => return Some((event, rx)),
                    Err(EventBusError::Lagged(_)) => continue,
                    Err(_) => return None,
                }
            }
        })
    }
}

/// Receiver for events addressed to a single target (filtered)
pub struct TargetEventReceiver {
    receiver: broadcast::Receiver<Event>,
    target: String,
}

impl TargetEventReceiver {
    /// Receive the next event whose target matches, dropping the rest
    pub async fn recv(&mut self) -> Result<Event, EventBusError> {
        loop {
            let event = self.receiver.recv().await.map_err(map_recv_error)?;
            if event.target.as_deref() == Some(self.target.as_str()) {
                return Ok(event);
            }
        }
    }

    pub fn target(&self) -> &str {
        &self.target
    }
}

fn map_recv_error(e: broadcast::error::RecvError) -> EventBusError {
    match e {
        broadcast::error::RecvError::Closed => EventBusError::Closed,
        broadcast::error::RecvError::Lagged(n) => {
            warn!("Event receiver lagged by {} events", n);
            EventBusError::Lagged(n)
        }
    }
}

/// Errors that can occur when receiving events
#[derive(Debug, thiserror::Error)]
pub enum EventBusError {
    #[error("Event bus is closed")]
    Closed,

    #[error("No events available")]
    Empty,

    #[error("Receiver lagged by {0} events (events were dropped)")]
    Lagged(u64),
}

impl Default for EventBus {
    fn default() -> Self {
        Self::with_default_capacity()
    }
}
