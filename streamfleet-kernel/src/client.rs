/**
 * CLIENT RPC - Adaptateur entre opérations métier et protocole d'un nœud
 *
 * RÔLE :
 * Un `ServiceClient` par nœud, propriétaire de son unique transport.
 * Chaque appel sortant reçoit un identifiant croissant et reste en attente
 * jusqu'à sa réponse (ou son expiration).
 *
 * FONCTIONNEMENT :
 * - Appels sortants : activate, ping, stop, logs, prepare, sync, start/stop/restart stream
 * - Entrées : `dispatch()` route notifications, réponses et changements d'état
 *   vers des `ClientEvent` typés, consommés par le coordinateur du nœud
 * - Transport non connecté : l'appel renvoie `ClientError::NotConnected`, sans panique
 *
 * CONCURRENCE : appelé uniquement depuis la tâche du nœud (écrivain unique).
 */

use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use time::OffsetDateTime;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::contracts::{
    commands, ConnectionState, METHOD_NOT_FOUND, NodeDescriptor, QuitStatus, Request, RequestId, Response,
    ServiceStatistics, StreamStatistics, TransportEvent,
};
use crate::error::{ClientError, TransportError};
use crate::models::{NodeId, NodeSettings};

/// Configuration sortante d'un stream, telle qu'envoyée au nœud
pub type OutboundConfig = Map<String, Value>;

/// Identifiant de corrélation de la requête émise, ou raison de l'échec
pub type RequestReturn = Result<RequestId, ClientError>;

/// Transport d'un nœud (framing et boucle socket hors de ce module).
/// Les messages entrants arrivent sur le canal fourni à la création.
pub trait Transport: Send {
    fn connect(&mut self);
    fn disconnect(&mut self);
    fn is_connected(&self) -> bool;
    fn send(&mut self, request: &Request) -> Result<(), TransportError>;
    fn send_response(&mut self, response: &Response) -> Result<(), TransportError>;
}

/// Fabrique de transports, injectée dans le registre des nœuds
pub trait TransportFactory: Send + Sync {
    fn create(
        &self,
        settings: &NodeSettings,
        events: mpsc::UnboundedSender<TransportEvent>,
    ) -> Box<dyn Transport>;
}

/// Endpoint HTTP du plan de contrôle où les nœuds déposent logs et pipelines
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogCallback {
    pub host: String,
    pub port: u16,
}

impl LogCallback {
    pub fn service_log_path(&self, node_id: &str) -> String {
        format!("http://{}:{}/service/log/{}", self.host, self.port, node_id)
    }

    pub fn stream_log_path(&self, stream_id: &str) -> String {
        format!("http://{}:{}/stream/log/{}", self.host, self.port, stream_id)
    }

    pub fn pipeline_stream_path(&self, stream_id: &str) -> String {
        format!("http://{}:{}/stream/pipeline/{}", self.host, self.port, stream_id)
    }
}

impl Default for LogCallback {
    fn default() -> Self {
        Self { host: "127.0.0.1".into(), port: 8080 }
    }
}

/// Événements métier issus du trafic entrant d'un nœud
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    StreamStatistics(StreamStatistics),
    StreamSourcesChanged(Value),
    StreamMlNotification(Value),
    ServiceStatistics(ServiceStatistics),
    QuitStatus(QuitStatus),
    Ping(Value),
    StateChanged(ConnectionState),
}

#[derive(Debug)]
struct PendingRequest {
    method: String,
    issued_at: Instant,
}

pub struct ServiceClient {
    node_id: NodeId,
    request_id: RequestId,
    transport: Box<dyn Transport>,
    status: ConnectionState,
    descriptor: Option<NodeDescriptor>,
    pending: HashMap<RequestId, PendingRequest>,
}

impl ServiceClient {
    pub fn new(node_id: impl Into<NodeId>, transport: Box<dyn Transport>) -> Self {
        Self {
            node_id: node_id.into(),
            request_id: 0,
            transport,
            status: ConnectionState::Disconnected,
            descriptor: None,
            pending: HashMap::new(),
        }
    }

    pub fn connect(&mut self) {
        if self.transport.is_connected() {
            return;
        }
        self.transport.connect();
    }

    pub fn disconnect(&mut self) {
        if !self.transport.is_connected() && self.status == ConnectionState::Disconnected {
            return;
        }
        self.transport.disconnect();
    }

    pub fn is_connected(&self) -> bool {
        self.transport.is_connected()
    }

    pub fn status(&self) -> ConnectionState {
        self.status
    }

    /// Descripteur renvoyé par la dernière activation (absent hors état actif)
    pub fn descriptor(&self) -> Option<&NodeDescriptor> {
        self.descriptor.as_ref()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    // ============ APPELS SORTANTS ============

    pub fn activate(&mut self, license_key: &str) -> RequestReturn {
        self.send_request(commands::ACTIVATE, json!({ "license_key": license_key }))
    }

    pub fn ping_service(&mut self) -> RequestReturn {
        let timestamp = (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64;
        self.send_request(commands::PING_SERVICE, json!({ "timestamp": timestamp }))
    }

    pub fn stop_service(&mut self, delay_seconds: u64) -> RequestReturn {
        self.send_request(commands::STOP_SERVICE, json!({ "delay": delay_seconds }))
    }

    pub fn get_log_service(&mut self, callback: &LogCallback) -> RequestReturn {
        let path = callback.service_log_path(&self.node_id);
        self.send_request(commands::GET_LOG_SERVICE, json!({ "path": path }))
    }

    pub fn start_stream(&mut self, config: OutboundConfig) -> RequestReturn {
        self.send_request(commands::START_STREAM, json!({ "config": config }))
    }

    pub fn stop_stream(&mut self, stream_id: &str) -> RequestReturn {
        self.send_request(commands::STOP_STREAM, json!({ "id": stream_id }))
    }

    pub fn restart_stream(&mut self, stream_id: &str) -> RequestReturn {
        self.send_request(commands::RESTART_STREAM, json!({ "id": stream_id }))
    }

    pub fn get_log_stream(
        &mut self,
        callback: &LogCallback,
        stream_id: &str,
        feedback_directory: &str,
    ) -> RequestReturn {
        let params = json!({
            "id": stream_id,
            "feedback_directory": feedback_directory,
            "path": callback.stream_log_path(stream_id),
        });
        self.send_request(commands::GET_LOG_STREAM, params)
    }

    pub fn get_pipeline_stream(
        &mut self,
        callback: &LogCallback,
        stream_id: &str,
        feedback_directory: &str,
    ) -> RequestReturn {
        let params = json!({
            "id": stream_id,
            "feedback_directory": feedback_directory,
            "path": callback.pipeline_stream_path(stream_id),
        });
        self.send_request(commands::GET_PIPELINE_STREAM, params)
    }

    /// Une seule requête portant la configuration de tous les streams
    pub fn sync_service<I>(&mut self, configs: I) -> RequestReturn
    where
        I: IntoIterator<Item = OutboundConfig>,
    {
        let streams: Vec<Value> = configs.into_iter().map(Value::Object).collect();
        self.send_request(commands::SYNC_SERVICE, json!({ "streams": streams }))
    }

    pub fn prepare_service(&mut self, settings: Option<&NodeSettings>) -> RequestReturn {
        let Some(settings) = settings else {
            return Err(ClientError::MissingSettings);
        };
        let params = json!({
            "feedback_directory": settings.feedback_directory,
            "timeshifts_directory": settings.timeshifts_directory,
            "hls_directory": settings.hls_directory,
            "vods_directory": settings.vods_directory,
            "cods_directory": settings.cods_directory,
            "proxy_directory": settings.proxy_directory,
        });
        self.send_request(commands::PREPARE_SERVICE, params)
    }

    // ============ ENTRÉES ============

    /// Route un événement transport ; `None` si rien à remonter au coordinateur
    pub fn dispatch(&mut self, event: TransportEvent) -> Option<ClientEvent> {
        match event {
            TransportEvent::Request(req) => self.process_request(req),
            TransportEvent::Response(resp) => self.process_response(resp),
            TransportEvent::StateChanged(status) => {
                self.on_state_changed(status);
                Some(ClientEvent::StateChanged(status))
            }
        }
    }

    /// Abandonne les corrélations plus vieilles que `timeout`
    pub fn expire_pending(&mut self, timeout: Duration) -> Vec<(RequestId, String)> {
        let now = Instant::now();
        let expired: Vec<RequestId> = self
            .pending
            .iter()
            .filter(|(_, p)| now.duration_since(p.issued_at) >= timeout)
            .map(|(id, _)| *id)
            .collect();

        let mut out = Vec::with_capacity(expired.len());
        for id in expired {
            if let Some(p) = self.pending.remove(&id) {
                warn!(node = %self.node_id, request = id, method = %p.method, "request timed out");
                out.push((id, p.method));
            }
        }
        out
    }

    fn process_request(&mut self, req: Request) -> Option<ClientEvent> {
        let params = req.params.clone().unwrap_or(Value::Null);
        match req.method.as_str() {
            commands::STATISTIC_STREAM => {
                self.parse::<StreamStatistics>(&req.method, params).map(ClientEvent::StreamStatistics)
            }
            commands::CHANGED_SOURCES_STREAM => Some(ClientEvent::StreamSourcesChanged(params)),
            commands::ML_NOTIFICATION_STREAM => Some(ClientEvent::StreamMlNotification(params)),
            commands::STATISTIC_SERVICE => {
                self.parse::<ServiceStatistics>(&req.method, params).map(ClientEvent::ServiceStatistics)
            }
            commands::QUIT_STATUS_STREAM => {
                self.parse::<QuitStatus>(&req.method, params).map(ClientEvent::QuitStatus)
            }
            commands::CLIENT_PING => {
                if let Some(id) = req.id {
                    let pong = Response::ok(id, json!({}));
                    if let Err(e) = self.transport.send_response(&pong) {
                        debug!(node = %self.node_id, "failed to answer ping: {}", e);
                    }
                }
                Some(ClientEvent::Ping(params))
            }
            other => {
                if req.is_notification() {
                    debug!(node = %self.node_id, method = other, "ignoring unknown notification");
                    return None;
                }
                warn!(node = %self.node_id, method = other, "unknown method requested by node");
                if let Some(id) = req.id {
                    let refusal = Response::failed(id, METHOD_NOT_FOUND, format!("unknown method {other}"));
                    if let Err(e) = self.transport.send_response(&refusal) {
                        debug!(node = %self.node_id, "failed to refuse request: {}", e);
                    }
                }
                None
            }
        }
    }

    fn process_response(&mut self, resp: Response) -> Option<ClientEvent> {
        let Some(pending) = self.pending.remove(&resp.id) else {
            debug!(node = %self.node_id, request = resp.id, "response for unknown request");
            return None;
        };

        if let Some(err) = &resp.error {
            warn!(
                node = %self.node_id,
                method = %pending.method,
                code = err.code,
                "request failed: {}",
                err.message
            );
            return None;
        }

        let is_handshake =
            pending.method == commands::ACTIVATE || pending.method == commands::PREPARE_SERVICE;
        if !is_handshake {
            return None;
        }

        let result = resp.result.unwrap_or(Value::Null);
        if let Ok(descriptor) = serde_json::from_value::<NodeDescriptor>(result.clone()) {
            info!(
                node = %self.node_id,
                project = %descriptor.project,
                version = %descriptor.version,
                "node descriptor updated"
            );
            self.descriptor = Some(descriptor);
        }

        match serde_json::from_value::<ServiceStatistics>(result) {
            Ok(stats) => Some(ClientEvent::ServiceStatistics(stats)),
            Err(e) => {
                debug!(node = %self.node_id, method = %pending.method, "no statistics in response: {}", e);
                None
            }
        }
    }

    fn on_state_changed(&mut self, status: ConnectionState) {
        if status != ConnectionState::Active {
            self.descriptor = None;
            if !self.pending.is_empty() {
                debug!(node = %self.node_id, dropped = self.pending.len(), "dropping pending requests");
                self.pending.clear();
            }
        }
        info!(node = %self.node_id, from = ?self.status, to = ?status, "connection state changed");
        self.status = status;
    }

    fn parse<T: serde::de::DeserializeOwned>(&self, method: &str, params: Value) -> Option<T> {
        match serde_json::from_value(params) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(node = %self.node_id, method, "malformed notification: {}", e);
                None
            }
        }
    }

    fn send_request(&mut self, method: &str, params: Value) -> RequestReturn {
        let id = self.gen_request_id();
        if !self.transport.is_connected() {
            debug!(node = %self.node_id, method, "not connected, request dropped");
            return Err(ClientError::NotConnected);
        }

        let request = Request::new(id, method, Some(params));
        self.transport.send(&request)?;
        self.pending.insert(id, PendingRequest { method: method.to_string(), issued_at: Instant::now() });
        debug!(node = %self.node_id, request = id, method, "request sent");
        Ok(id)
    }

    fn gen_request_id(&mut self) -> RequestId {
        let current = self.request_id;
        self.request_id += 1;
        current
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contracts::{OnlineUsers, OperatingSystem};
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[derive(Default)]
    struct Wire {
        connected: bool,
        requests: Vec<Request>,
        responses: Vec<Response>,
    }

    struct LoopbackTransport(Arc<Mutex<Wire>>);

    impl Transport for LoopbackTransport {
        fn connect(&mut self) {
            self.0.lock().connected = true;
        }
        fn disconnect(&mut self) {
            self.0.lock().connected = false;
        }
        fn is_connected(&self) -> bool {
            self.0.lock().connected
        }
        fn send(&mut self, request: &Request) -> Result<(), TransportError> {
            self.0.lock().requests.push(request.clone());
            Ok(())
        }
        fn send_response(&mut self, response: &Response) -> Result<(), TransportError> {
            self.0.lock().responses.push(response.clone());
            Ok(())
        }
    }

    fn client() -> (ServiceClient, Arc<Mutex<Wire>>) {
        let wire = Arc::new(Mutex::new(Wire::default()));
        (ServiceClient::new("node-1", Box::new(LoopbackTransport(wire.clone()))), wire)
    }

    fn stats_json() -> Value {
        serde_json::to_value(ServiceStatistics {
            cpu: 12.5,
            gpu: 0.0,
            load_average: "0.10 0.20 0.30".into(),
            memory_total: 1024,
            memory_free: 512,
            hdd_total: 4096,
            hdd_free: 2048,
            bandwidth_in: 10,
            bandwidth_out: 20,
            uptime: 3600,
            timestamp: 1_700_000_000_000,
            online_users: OnlineUsers { daemon: 1, http: 2, vods: 0, cods: 0, subscribers: None },
        })
        .unwrap()
    }

    #[test]
    fn test_request_ids_increase_monotonically() {
        let (mut client, wire) = client();
        client.connect();
        assert_eq!(client.ping_service().unwrap(), 0);
        assert_eq!(client.stop_stream("s1").unwrap(), 1);
        assert_eq!(client.restart_stream("s1").unwrap(), 2);
        let methods: Vec<_> = wire.lock().requests.iter().map(|r| r.method.clone()).collect();
        assert_eq!(methods, vec!["ping_service", "stop_stream", "restart_stream"]);
    }

    #[test]
    fn test_calls_fail_when_not_connected() {
        let (mut client, wire) = client();
        assert!(matches!(client.start_stream(OutboundConfig::new()), Err(ClientError::NotConnected)));
        assert!(wire.lock().requests.is_empty());
        assert_eq!(client.pending_count(), 0);
    }

    #[test]
    fn test_prepare_without_settings_fails() {
        let (mut client, _) = client();
        client.connect();
        assert!(matches!(client.prepare_service(None), Err(ClientError::MissingSettings)));
    }

    #[test]
    fn test_activate_response_caches_descriptor_and_forwards_statistics() {
        let (mut client, _) = client();
        client.connect();
        client.dispatch(TransportEvent::StateChanged(ConnectionState::Active));
        let id = client.activate("LICENSE").unwrap();

        let mut result = stats_json();
        let descriptor = NodeDescriptor {
            http_host: "10.0.0.5:8000".into(),
            vods_host: "10.0.0.5:7000".into(),
            cods_host: "10.0.0.5:6001".into(),
            project: "streamer".into(),
            version: "1.4.0".into(),
            expiration_time: 1_900_000_000_000,
            os: OperatingSystem { name: "Linux".into(), version: "6.1".into(), arch: "x86_64".into() },
        };
        let extra = serde_json::to_value(&descriptor).unwrap();
        result.as_object_mut().unwrap().extend(extra.as_object().unwrap().clone());

        let event = client.dispatch(TransportEvent::Response(Response::ok(id, result)));
        assert!(matches!(event, Some(ClientEvent::ServiceStatistics(ref s)) if s.cpu == 12.5));
        assert_eq!(client.descriptor(), Some(&descriptor));

        client.dispatch(TransportEvent::StateChanged(ConnectionState::Disconnected));
        assert!(client.descriptor().is_none());
    }

    #[test]
    fn test_disconnect_invalidates_pending_correlations() {
        let (mut client, _) = client();
        client.connect();
        let id = client.ping_service().unwrap();
        assert_eq!(client.pending_count(), 1);
        client.dispatch(TransportEvent::StateChanged(ConnectionState::Connecting));
        assert_eq!(client.pending_count(), 0);
        assert_eq!(client.dispatch(TransportEvent::Response(Response::ok(id, json!({})))), None);
    }

    #[test]
    fn test_notifications_routed_by_method() {
        let (mut client, wire) = client();
        let quit = Request::notification(commands::QUIT_STATUS_STREAM, Some(json!({"id": "s1"})));
        assert!(matches!(client.dispatch(TransportEvent::Request(quit)), Some(ClientEvent::QuitStatus(q)) if q.id == "s1"));

        let malformed = Request::notification(commands::STATISTIC_STREAM, Some(json!({"id": "s1"})));
        assert_eq!(client.dispatch(TransportEvent::Request(malformed)), None);

        client.connect();
        let ping = Request::new(41, commands::CLIENT_PING, None);
        assert!(matches!(client.dispatch(TransportEvent::Request(ping)), Some(ClientEvent::Ping(_))));
        assert_eq!(wire.lock().responses[0].id, 41);
    }

    #[test]
    fn test_unknown_method_refused_only_for_requests() {
        let (mut client, wire) = client();
        client.connect();

        let unknown = Request::notification("reboot_node", None);
        assert_eq!(client.dispatch(TransportEvent::Request(unknown)), None);
        assert!(wire.lock().responses.is_empty());

        let unknown = Request::new(7, "reboot_node", None);
        assert_eq!(client.dispatch(TransportEvent::Request(unknown)), None);
        let responses = wire.lock().responses.clone();
        assert_eq!(responses.len(), 1);
        assert_eq!(responses[0].id, 7);
        assert_eq!(responses[0].error.as_ref().map(|e| e.code), Some(METHOD_NOT_FOUND));
    }

    #[test]
    fn test_expire_pending() {
        let (mut client, _) = client();
        client.connect();
        client.ping_service().unwrap();
        assert!(client.expire_pending(Duration::from_secs(60)).is_empty());
        let expired = client.expire_pending(Duration::ZERO);
        assert_eq!(expired, vec![(0, commands::PING_SERVICE.to_string())]);
    }

    #[test]
    fn test_log_callback_paths() {
        let cb = LogCallback { host: "panel.local".into(), port: 8080 };
        assert_eq!(cb.service_log_path("n1"), "http://panel.local:8080/service/log/n1");
        assert_eq!(cb.pipeline_stream_path("s1"), "http://panel.local:8080/stream/pipeline/s1");
    }
}
