/**
 * MQTT - Transport des nœuds et publication des événements
 *
 * RÔLE :
 * - `MqttTransport` : une connexion broker par nœud. Requêtes publiées sur
 *   `streamfleet/nodes/{nœud}/request@v1`, messages du nœud reçus sur
 *   `streamfleet/nodes/{nœud}/inbound@v1` et livrés en `TransportEvent`.
 * - `MqttSink` : publie chaque notification sur `{préfixe}/{canal}`.
 *
 * FONCTIONNEMENT :
 * - ConnAck → état Active ; erreur de boucle → Disconnected, pause 2s, Connecting
 * - Les envois sont non bloquants (`try_publish`), une file pleine est un échec d'envoi
 */

use rumqttc::{AsyncClient, Event, Incoming, MqttOptions, QoS};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::client::{Transport, TransportFactory};
use crate::config::MqttConf;
use crate::contracts::{ConnectionState, Inbound, Request, Response, TransportEvent};
use crate::error::TransportError;
use crate::health::HealthTracker;
use crate::models::{NodeId, NodeSettings};
use crate::notify::NotificationSink;

const RETRY_DELAY: Duration = Duration::from_secs(2);
const CLIENT_CAPACITY: usize = 64;

pub fn request_topic(node_id: &str) -> String {
    format!("streamfleet/nodes/{node_id}/request@v1")
}

pub fn inbound_topic(node_id: &str) -> String {
    format!("streamfleet/nodes/{node_id}/inbound@v1")
}

fn mqtt_options(client_id: String, conf: &MqttConf) -> MqttOptions {
    let mut opts = MqttOptions::new(client_id, &conf.host, conf.port);
    opts.set_keep_alive(Duration::from_secs(conf.keep_alive_secs.max(5)));
    opts
}

pub struct MqttTransport {
    node_id: NodeId,
    conf: MqttConf,
    events: mpsc::UnboundedSender<TransportEvent>,
    connected: Arc<AtomicBool>,
    client: Option<AsyncClient>,
    task: Option<JoinHandle<()>>,
}

impl MqttTransport {
    pub fn new(node_id: NodeId, conf: MqttConf, events: mpsc::UnboundedSender<TransportEvent>) -> Self {
        Self {
            node_id,
            conf,
            events,
            connected: Arc::new(AtomicBool::new(false)),
            client: None,
            task: None,
        }
    }

    fn publish(&self, payload: Vec<u8>) -> Result<(), TransportError> {
        let client = match &self.client {
            Some(client) if self.is_connected() => client,
            _ => return Err(TransportError::NotConnected),
        };
        client
            .try_publish(request_topic(&self.node_id), QoS::AtLeastOnce, false, payload)
            .map_err(|e| TransportError::Publish(e.to_string()))
    }
}

impl Transport for MqttTransport {
    fn connect(&mut self) {
        if self.task.is_some() {
            return;
        }
        let opts = mqtt_options(format!("streamfleet-kernel-{}", self.node_id), &self.conf);
        let (client, mut eventloop) = AsyncClient::new(opts, CLIENT_CAPACITY);

        let node_id = self.node_id.clone();
        let inbound = inbound_topic(&node_id);
        let events = self.events.clone();
        let connected = self.connected.clone();
        let subscriber = client.clone();

        let task = tokio::spawn(async move {
            let mut state = ConnectionState::Connecting;
            let _ = events.send(TransportEvent::StateChanged(state));

            loop {
                match eventloop.poll().await {
                    Ok(Event::Incoming(Incoming::ConnAck(_))) => {
                        if let Err(e) = subscriber.try_subscribe(inbound.clone(), QoS::AtLeastOnce) {
                            warn!(node = %node_id, "subscribe failed: {:?}", e);
                        }
                        connected.store(true, Ordering::SeqCst);
                        state = ConnectionState::Active;
                        let _ = events.send(TransportEvent::StateChanged(state));
                        info!(node = %node_id, "node transport connected");
                    }
                    Ok(Event::Incoming(Incoming::Publish(p))) if p.topic == inbound => {
                        match serde_json::from_slice::<Inbound>(&p.payload) {
                            Ok(message) => {
                                let _ = events.send(message.into());
                            }
                            Err(e) => warn!(node = %node_id, "invalid inbound message: {}", e),
                        }
                    }
                    Ok(_) => {}
                    Err(e) => {
                        connected.store(false, Ordering::SeqCst);
                        if state != ConnectionState::Disconnected {
                            warn!(node = %node_id, "node transport error: {:?}", e);
                            state = ConnectionState::Disconnected;
                            let _ = events.send(TransportEvent::StateChanged(state));
                        }
                        tokio::time::sleep(RETRY_DELAY).await;
                        state = ConnectionState::Connecting;
                        let _ = events.send(TransportEvent::StateChanged(state));
                    }
                }
            }
        });

        self.client = Some(client);
        self.task = Some(task);
    }

    fn disconnect(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        if let Some(client) = self.client.take() {
            let _ = client.try_disconnect();
        }
        if self.connected.swap(false, Ordering::SeqCst) {
            debug!(node = %self.node_id, "node transport disconnected");
        }
        let _ = self.events.send(TransportEvent::StateChanged(ConnectionState::Disconnected));
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn send(&mut self, request: &Request) -> Result<(), TransportError> {
        let payload = serde_json::to_vec(request)?;
        self.publish(payload)
    }

    fn send_response(&mut self, response: &Response) -> Result<(), TransportError> {
        let payload = serde_json::to_vec(response)?;
        self.publish(payload)
    }
}

impl Drop for MqttTransport {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

pub struct MqttTransportFactory {
    conf: MqttConf,
}

impl MqttTransportFactory {
    pub fn new(conf: MqttConf) -> Self {
        Self { conf }
    }
}

impl TransportFactory for MqttTransportFactory {
    fn create(
        &self,
        settings: &NodeSettings,
        events: mpsc::UnboundedSender<TransportEvent>,
    ) -> Box<dyn Transport> {
        Box::new(MqttTransport::new(settings.id.clone(), self.conf.clone(), events))
    }
}

/// Publie les notifications sur le broker, sous `{préfixe}/{canal}`
pub struct MqttSink {
    client: AsyncClient,
    topic_prefix: String,
}

impl MqttSink {
    /// Crée le client et lance sa boucle ; l'état du broker alimente `health`
    pub fn connect(conf: &MqttConf, topic_prefix: &str, health: HealthTracker) -> Self {
        let opts = mqtt_options("streamfleet-kernel-events".into(), conf);
        let (client, mut eventloop) = AsyncClient::new(opts, CLIENT_CAPACITY);

        tokio::spawn(async move {
            loop {
                match eventloop.poll().await {
                    Ok(Event::Incoming(Incoming::ConnAck(_))) => {
                        health.mark_mqtt_connected();
                        info!("event bus connected");
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!("event bus error: {:?}", e);
                        health.mark_mqtt_disconnected();
                        tokio::time::sleep(RETRY_DELAY).await;
                        health.increment_reconnects();
                    }
                }
            }
        });

        Self { client, topic_prefix: topic_prefix.trim_end_matches('/').to_string() }
    }

    pub fn topic(&self, channel: &str) -> String {
        event_topic(&self.topic_prefix, channel)
    }
}

pub fn event_topic(prefix: &str, channel: &str) -> String {
    format!("{prefix}/{channel}")
}

impl NotificationSink for MqttSink {
    fn publish(&self, channel: &str, payload: &Value) {
        let body = payload.to_string();
        if let Err(e) = self.client.try_publish(self.topic(channel), QoS::AtLeastOnce, false, body) {
            warn!(channel, "failed to publish notification: {:?}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_topics() {
        assert_eq!(request_topic("n1"), "streamfleet/nodes/n1/request@v1");
        assert_eq!(inbound_topic("n1"), "streamfleet/nodes/n1/inbound@v1");
        assert_eq!(event_topic("streamfleet/events", "stream_data_changed_n1"), "streamfleet/events/stream_data_changed_n1");
    }

    #[tokio::test]
    async fn test_send_without_connection_fails() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut transport = MqttTransport::new("n1".into(), MqttConf::default(), tx);
        assert!(!transport.is_connected());
        let request = Request::new(0, "ping_service", None);
        assert!(matches!(transport.send(&request), Err(TransportError::NotConnected)));
    }
}
