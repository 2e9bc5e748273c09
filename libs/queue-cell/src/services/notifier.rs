use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{mpsc, RwLock};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::models::QueueEvent;

pub type EventSender = mpsc::UnboundedSender<QueueEvent>;
pub type EventReceiver = mpsc::UnboundedReceiver<QueueEvent>;

/// Fan-out registry for queue change events. One subscriber per open
/// dashboard connection; created at process start and shared through the
/// router state.
pub struct QueueNotifier {
    subscribers: Arc<RwLock<HashMap<Uuid, EventSender>>>,
}

impl QueueNotifier {
    pub fn new() -> Self {
        Self {
            subscribers: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn subscribe(&self) -> (Uuid, EventReceiver) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let id = Uuid::new_v4();

        let mut subscribers = self.subscribers.write().await;
        subscribers.insert(id, sender);

        debug!("Queue stream subscriber {} added", id);
        (id, receiver)
    }

    /// Subscribe with a guard that removes the subscriber when dropped, so a
    /// disconnecting stream cleans up after itself.
    pub async fn subscribe_guarded(&self) -> (SubscriptionGuard, EventReceiver) {
        let (id, receiver) = self.subscribe().await;
        let guard = SubscriptionGuard {
            id,
            notifier: self.clone(),
        };
        (guard, receiver)
    }

    pub async fn unsubscribe(&self, id: Uuid) {
        let mut subscribers = self.subscribers.write().await;
        subscribers.remove(&id);
        debug!("Queue stream subscriber {} removed", id);
    }

    pub async fn subscriber_count(&self) -> usize {
        let subscribers = self.subscribers.read().await;
        subscribers.len()
    }

    /// Deliver one event to every subscriber, best-effort. A send failure
    /// means the receiving connection is gone; that channel is dropped from
    /// the registry and delivery continues to the rest. Never surfaces an
    /// error to the mutation that published.
    pub async fn publish(&self, event: &QueueEvent) {
        let mut dead = Vec::new();

        {
            let subscribers = self.subscribers.read().await;
            for (id, sender) in subscribers.iter() {
                if sender.send(event.clone()).is_err() {
                    dead.push(*id);
                }
            }
        }

        if !dead.is_empty() {
            let mut subscribers = self.subscribers.write().await;
            for id in &dead {
                subscribers.remove(id);
                warn!("Dropped closed queue stream subscriber {}", id);
            }
        }

        debug!(
            "Published {:?} event for visit {}",
            event.kind, event.visit.id
        );
    }
}

impl Default for QueueNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for QueueNotifier {
    fn clone(&self) -> Self {
        Self {
            subscribers: Arc::clone(&self.subscribers),
        }
    }
}

/// Removes its subscriber from the registry on drop.
pub struct SubscriptionGuard {
    id: Uuid,
    notifier: QueueNotifier,
}

impl SubscriptionGuard {
    pub fn id(&self) -> Uuid {
        self.id
    }
}

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        let notifier = self.notifier.clone();
        let id = self.id;
        tokio::spawn(async move {
            notifier.unsubscribe(id).await;
        });
    }
}
