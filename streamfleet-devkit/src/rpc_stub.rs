/*!
Transport RPC simulé pour tester un nœud sans service distant

Enregistre toutes les requêtes et réponses envoyées par le client et permet
d'injecter des messages entrants (notifications, réponses, états de connexion)
sur la file du nœud.
*/

use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;

use streamfleet_kernel::client::{Transport, TransportFactory};
use streamfleet_kernel::contracts::{ConnectionState, Request, Response, TransportEvent};
use streamfleet_kernel::error::TransportError;
use streamfleet_kernel::models::{NodeId, NodeSettings};

#[derive(Default)]
struct WireState {
    requests: Vec<Request>,
    responses: Vec<Response>,
    connected: bool,
    fail_sends: bool,
    events: Option<mpsc::UnboundedSender<TransportEvent>>,
}

/// Vue partagée sur ce qu'un `MockTransport` a émis
#[derive(Clone, Default)]
pub struct MockWire {
    state: Arc<Mutex<WireState>>,
}

impl MockWire {
    pub fn new() -> Self {
        Self::default()
    }

    /// Toutes les requêtes émises, dans l'ordre
    pub fn requests(&self) -> Vec<Request> {
        self.state.lock().requests.clone()
    }

    pub fn methods(&self) -> Vec<String> {
        self.state.lock().requests.iter().map(|r| r.method.clone()).collect()
    }

    pub fn requests_for(&self, method: &str) -> Vec<Request> {
        self.state
            .lock()
            .requests
            .iter()
            .filter(|r| r.method == method)
            .cloned()
            .collect()
    }

    /// Paramètre `id` des requêtes d'une méthode (stop/restart stream)
    pub fn stream_ids_for(&self, method: &str) -> Vec<String> {
        self.requests_for(method)
            .iter()
            .filter_map(|r| r.params.as_ref()?.get("id")?.as_str().map(str::to_string))
            .collect()
    }

    /// Id de la config portée par chaque `start_stream`
    pub fn started_ids(&self) -> Vec<String> {
        self.requests_for("start_stream")
            .iter()
            .filter_map(|r| {
                let config = r.params.as_ref()?.get("config")?;
                config.get("id").and_then(Value::as_str).map(str::to_string)
            })
            .collect()
    }

    pub fn last_request(&self) -> Option<Request> {
        self.state.lock().requests.last().cloned()
    }

    pub fn responses(&self) -> Vec<Response> {
        self.state.lock().responses.clone()
    }

    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.requests.clear();
        state.responses.clear();
    }

    pub fn is_connected(&self) -> bool {
        self.state.lock().connected
    }

    /// Les envois suivants échouent avec `TransportError::Publish`
    pub fn fail_sends(&self, fail: bool) {
        self.state.lock().fail_sends = fail;
    }

    /// Dépose un événement sur la file du nœud ; `false` si aucun transport attaché
    pub fn inject(&self, event: TransportEvent) -> bool {
        match &self.state.lock().events {
            Some(events) => events.send(event).is_ok(),
            None => false,
        }
    }

    pub fn inject_state(&self, state: ConnectionState) -> bool {
        self.inject(TransportEvent::StateChanged(state))
    }

    fn attach(&self, events: mpsc::UnboundedSender<TransportEvent>) {
        self.state.lock().events = Some(events);
    }

    fn set_connected(&self, connected: bool) {
        self.state.lock().connected = connected;
    }

    fn record(&self, request: &Request) -> Result<(), TransportError> {
        let mut state = self.state.lock();
        if !state.connected {
            return Err(TransportError::NotConnected);
        }
        if state.fail_sends {
            return Err(TransportError::Publish("simulated failure".into()));
        }
        state.requests.push(request.clone());
        Ok(())
    }
}

/// Transport simulé : `connect()` passe directement à l'état actif
pub struct MockTransport {
    wire: MockWire,
}

impl MockTransport {
    pub fn new(wire: MockWire, events: mpsc::UnboundedSender<TransportEvent>) -> Self {
        wire.attach(events);
        Self { wire }
    }
}

impl Transport for MockTransport {
    fn connect(&mut self) {
        self.wire.set_connected(true);
        tracing::debug!("[MOCK] transport connected");
        self.wire.inject_state(ConnectionState::Active);
    }

    fn disconnect(&mut self) {
        self.wire.set_connected(false);
        tracing::debug!("[MOCK] transport disconnected");
        self.wire.inject_state(ConnectionState::Disconnected);
    }

    fn is_connected(&self) -> bool {
        self.wire.is_connected()
    }

    fn send(&mut self, request: &Request) -> Result<(), TransportError> {
        self.wire.record(request)?;
        tracing::debug!(method = %request.method, "[MOCK] request sent");
        Ok(())
    }

    fn send_response(&mut self, response: &Response) -> Result<(), TransportError> {
        if !self.wire.is_connected() {
            return Err(TransportError::NotConnected);
        }
        self.wire.state.lock().responses.push(response.clone());
        Ok(())
    }
}

/// Fabrique pour le registre : un `MockWire` par nœud, consultable après coup
#[derive(Clone, Default)]
pub struct MockTransportFactory {
    wires: Arc<Mutex<HashMap<NodeId, MockWire>>>,
}

impl MockTransportFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn wire(&self, node_id: &str) -> Option<MockWire> {
        self.wires.lock().get(node_id).cloned()
    }
}

impl TransportFactory for MockTransportFactory {
    fn create(
        &self,
        settings: &NodeSettings,
        events: mpsc::UnboundedSender<TransportEvent>,
    ) -> Box<dyn Transport> {
        let wire = self.wires.lock().entry(settings.id.clone()).or_default().clone();
        Box::new(MockTransport::new(wire, events))
    }
}
