/**
 * NOTIFICATIONS - Publication des deltas d'état vers les abonnés
 *
 * RÔLE : Chaque événement part sur un canal `{préfixe}_{nœud}` pour que les
 * abonnés filtrent par nœud. L'implémentation de production publie sur MQTT
 * (voir `mqtt::MqttSink`).
 */

use serde::Serialize;
use serde_json::Value;

pub const STREAM_DATA_CHANGED: &str = "stream_data_changed";
pub const SERVICE_DATA_CHANGED: &str = "service_data_changed";
pub const KERNEL_HEALTH: &str = "kernel_health";

/// Canal propre à un nœud pour un type d'événement
pub fn node_channel(prefix: &str, node_id: &str) -> String {
    format!("{prefix}_{node_id}")
}

pub trait NotificationSink: Send + Sync {
    fn publish(&self, channel: &str, payload: &Value);
}

/// Une publication telle que vue par un abonné
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    pub channel: String,
    pub payload: Value,
}
