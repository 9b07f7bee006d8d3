//! Entity lifecycle notifications.
//!
//! The entity-lifecycle collaborator (spawner, network replication) pushes
//! `Spawned`/`Despawned` events from wherever it runs; the tick loop drains
//! them synchronously once per frame.

use crate::error::EnvError;
use crate::types::EntityId;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// A trackable entity appearing in or leaving the world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LifecycleEvent {
    /// Entity became active (spawned, enabled)
    Spawned(EntityId),

    /// Entity became inactive (despawned, disabled, destroyed)
    Despawned(EntityId),
}

impl LifecycleEvent {
    /// Returns the entity this event refers to.
    pub fn entity(&self) -> EntityId {
        match self {
            LifecycleEvent::Spawned(id) | LifecycleEvent::Despawned(id) => *id,
        }
    }
}

/// Producer half, held by the lifecycle collaborator.
#[derive(Debug, Clone)]
pub struct LifecycleSender {
    tx: mpsc::UnboundedSender<LifecycleEvent>,
}

impl LifecycleSender {
    /// Queues an event for the next drain.
    ///
    /// # Returns
    /// * `Err(EnvError::ChannelClosed)` - the receiving tick loop is gone
    pub fn send(&self, event: LifecycleEvent) -> Result<(), EnvError> {
        self.tx
            .send(event)
            .map_err(|e| EnvError::closed(format!("dropped {:?}", e.0)))
    }
}

/// Consumer half, drained by the tick loop.
#[derive(Debug)]
pub struct LifecycleReceiver {
    rx: mpsc::UnboundedReceiver<LifecycleEvent>,
}

impl LifecycleReceiver {
    /// Returns every event queued since the last drain, in send order.
    ///
    /// Never blocks.
    pub fn drain(&mut self) -> Vec<LifecycleEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.rx.try_recv() {
            events.push(event);
        }
        events
    }
}

/// Creates a connected sender/receiver pair.
pub fn lifecycle_channel() -> (LifecycleSender, LifecycleReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (LifecycleSender { tx }, LifecycleReceiver { rx })
}
