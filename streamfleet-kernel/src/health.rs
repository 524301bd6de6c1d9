use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task;
use tracing::{debug, warn};

use crate::notify::{NotificationSink, KERNEL_HEALTH};
use crate::registry::{FleetSnapshot, NodeRegistry};
use crate::state::{new_state, Shared};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KernelHealth {
    pub uptime_seconds: u64,
    pub nodes_tracked: u32,
    pub nodes_active: u32,
    pub streams_tracked: u32,
    pub memory_usage_mb: f32,
    pub mqtt_status: BusStatus,
    pub mqtt_reconnects: u32,
}

/// État de la connexion du kernel au bus d'événements
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BusStatus {
    Connecting,
    Connected,
    Disconnected,
    Reconnecting,
}

#[derive(Clone)]
pub struct HealthTracker {
    start_time: Instant,
    mqtt_reconnects: Arc<AtomicU32>,
    bus: Shared<BusStatus>,
}

impl Default for HealthTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthTracker {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            mqtt_reconnects: Arc::new(AtomicU32::new(0)),
            bus: new_state(BusStatus::Connecting),
        }
    }

    pub fn mark_mqtt_connected(&self) {
        *self.bus.lock() = BusStatus::Connected;
    }

    pub fn mark_mqtt_disconnected(&self) {
        *self.bus.lock() = BusStatus::Disconnected;
    }

    /// Nouvelle tentative de connexion au broker
    pub fn increment_reconnects(&self) {
        self.mqtt_reconnects.fetch_add(1, Ordering::Relaxed);
        *self.bus.lock() = BusStatus::Reconnecting;
    }

    pub fn get_health(&self, fleet: FleetSnapshot) -> KernelHealth {
        KernelHealth {
            uptime_seconds: self.start_time.elapsed().as_secs(),
            nodes_tracked: fleet.nodes,
            nodes_active: fleet.active,
            streams_tracked: fleet.streams,
            memory_usage_mb: get_memory_usage_mb(),
            mqtt_status: *self.bus.lock(),
            mqtt_reconnects: self.mqtt_reconnects.load(Ordering::Relaxed),
        }
    }

    /// Publie la santé du kernel sur le canal `kernel_health` à intervalle fixe
    pub fn spawn_health_publisher(
        &self,
        registry: Arc<NodeRegistry>,
        sink: Arc<dyn NotificationSink>,
        period: Duration,
    ) -> task::JoinHandle<()> {
        let tracker = self.clone();
        task::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                interval.tick().await;
                let health = tracker.get_health(registry.snapshot().await);
                match serde_json::to_value(&health) {
                    Ok(payload) => {
                        sink.publish(KERNEL_HEALTH, &payload);
                        debug!(
                            uptime = health.uptime_seconds,
                            nodes = health.nodes_tracked,
                            active = health.nodes_active,
                            "published kernel health"
                        );
                    }
                    Err(e) => warn!("failed to encode kernel health: {}", e),
                }
            }
        })
    }
}

fn get_memory_usage_mb() -> f32 {
    #[cfg(target_os = "linux")]
    {
        let pid = std::process::id();
        if let Ok(status) = std::fs::read_to_string(format!("/proc/{pid}/status")) {
            let rss_kb = status
                .lines()
                .find(|line| line.starts_with("VmRSS:"))
                .and_then(|line| line.split_whitespace().nth(1))
                .and_then(|kb| kb.parse::<u64>().ok());
            if let Some(kb) = rss_kb {
                return kb as f32 / 1024.0;
            }
        }
    }
    0.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_reflects_fleet_and_bus_state() {
        let tracker = HealthTracker::new();
        tracker.increment_reconnects();
        let health = tracker.get_health(FleetSnapshot { nodes: 3, active: 2, streams: 17 });
        assert_eq!(health.nodes_tracked, 3);
        assert_eq!(health.nodes_active, 2);
        assert_eq!(health.streams_tracked, 17);
        assert_eq!(health.mqtt_status, BusStatus::Reconnecting);
        assert_eq!(health.mqtt_reconnects, 1);

        tracker.mark_mqtt_connected();
        assert_eq!(tracker.get_health(FleetSnapshot::default()).mqtt_status, BusStatus::Connected);
        tracker.mark_mqtt_disconnected();
        let payload = serde_json::to_value(tracker.get_health(FleetSnapshot::default())).unwrap();
        assert_eq!(payload["mqtt_status"], "disconnected");
    }
}
