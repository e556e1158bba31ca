use dashmap::DashMap;
use tokio::sync::broadcast;
use ulid::Ulid;

use crate::model::Event;

const CHANNEL_CAPACITY: usize = 256;

/// Broadcast hub for LISTEN/NOTIFY per item.
pub struct NotifyHub {
    channels: DashMap<Ulid, broadcast::Sender<Event>>,
}

impl NotifyHub {
    pub fn new() -> Self {
        Self {
            channels: DashMap::new(),
        }
    }

    /// Subscribe to notifications for an item. Creates the channel if needed.
    pub fn subscribe(&self, item_id: Ulid) -> broadcast::Receiver<Event> {
        let sender = self
            .channels
            .entry(item_id)
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0);
        sender.subscribe()
    }

    /// Send a notification. No-op if nobody is listening.
    pub fn send(&self, item_id: Ulid, event: &Event) {
        if let Some(sender) = self.channels.get(&item_id) {
            let _ = sender.send(event.clone());
        }
    }

    /// Remove a channel (e.g. when the item goes away).
    #[allow(dead_code)]
    pub fn remove(&self, item_id: &Ulid) {
        self.channels.remove(item_id);
    }
}

impl Default for NotifyHub {
    fn default() -> Self {
        Self::new()
    }
}
