/*!
Sink de notifications enregistreur : garde chaque publication pour assertions
*/

use parking_lot::Mutex;
use serde_json::Value;

use streamfleet_kernel::notify::{Notification, NotificationSink};

#[derive(Default)]
pub struct RecordingSink {
    published: Mutex<Vec<Notification>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn published(&self) -> Vec<Notification> {
        self.published.lock().clone()
    }

    pub fn channels(&self) -> Vec<String> {
        self.published.lock().iter().map(|n| n.channel.clone()).collect()
    }

    /// Charges publiées sur un canal, dans l'ordre
    pub fn on_channel(&self, channel: &str) -> Vec<Value> {
        self.published
            .lock()
            .iter()
            .filter(|n| n.channel == channel)
            .map(|n| n.payload.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.published.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.published.lock().is_empty()
    }

    pub fn clear(&self) {
        self.published.lock().clear();
    }
}

impl NotificationSink for RecordingSink {
    fn publish(&self, channel: &str, payload: &Value) {
        tracing::debug!(channel, "[MOCK] notification recorded");
        self.published.lock().push(Notification {
            channel: channel.to_string(),
            payload: payload.clone(),
        });
    }
}
