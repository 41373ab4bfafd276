// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Event bus → coordinator bridge.
//!
//! Subscribes to the [`EventBus`] and forwards inbound envelopes (`routine.*`,
//! `agent.message`, `resource.request`) to the coordinator named by the
//! envelope's `target`. Envelopes for unknown swarms, outbound notifications
//! and malformed payloads are skipped.

use crate::application::coordinator::SwarmCoordinator;
use crate::domain::events::SwarmEvent;
use meridian_core::domain::events::Event;
use meridian_core::infrastructure::event_bus::{EventBus, EventBusError};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

#[derive(Clone)]
pub struct SwarmEventBridge {
    event_bus: EventBus,
    coordinators: Arc<RwLock<HashMap<String, SwarmCoordinator>>>,
    cancel: CancellationToken,
}

impl SwarmEventBridge {
    pub fn new(event_bus: EventBus) -> Self {
        Self {
            event_bus,
            coordinators: Arc::new(RwLock::new(HashMap::new())),
            cancel: CancellationToken::new(),
        }
    }

    /// Route events targeted at this coordinator's swarm to it.
    pub fn register(&self, coordinator: SwarmCoordinator) {
        self.coordinators
            .write()
            .insert(coordinator.id().to_string(), coordinator);
    }

    pub fn unregister(&self, swarm_id: &str) -> Option<SwarmCoordinator> {
        self.coordinators.write().remove(swarm_id)
    }

    pub fn registered(&self) -> usize {
        self.coordinators.read().len()
    }

    /// Start forwarding. The subscription exists before this returns, so no
    /// event published afterwards is missed.
    pub fn spawn(&self) -> JoinHandle<()> {
        let mut receiver = self.event_bus.subscribe();
        let bridge = self.clone();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    _ = bridge.cancel.cancelled() => {
                        debug!("SwarmEventBridge cancelled");
                        break;
                    }
                    received = receiver.recv() => match received {
                        Ok(event) => bridge.forward(&event),
                        Err(EventBusError::Lagged(_)) | Err(EventBusError::Empty) => continue,
                        Err(EventBusError::Closed) => {
                            debug!("SwarmEventBridge: event bus closed");
                            break;
                        }
                    },
                }
            }
        })
    }

    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    fn forward(&self, event: &Event) {
        if !SwarmEvent::is_inbound(&event.event_type) {
            return;
        }
        let Some(target) = event.target.as_deref() else {
            return;
        };
        let Some(coordinator) = self.coordinators.read().get(target).cloned() else {
            debug!(target, event_type = %event.event_type, "No coordinator registered for target");
            return;
        };

        match SwarmEvent::try_from(event) {
            Ok(swarm_event) => coordinator.handle_event(swarm_event),
            Err(e) => warn!(target, error = %e, "Dropping malformed swarm event"),
        }
    }
}
