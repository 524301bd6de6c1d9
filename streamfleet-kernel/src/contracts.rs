/**
 * CONTRATS RPC - Formes des messages échangés avec les nœuds de streaming
 *
 * RÔLE :
 * Enveloppes requête/réponse/notification (style JSON-RPC), noms de
 * méthodes et charges utiles entrantes typées (statistiques nœud/stream,
 * fin de stream, descripteur d'activation).
 *
 * FONCTIONNEMENT :
 * - Le transport livre des `TransportEvent` typés sur la file du nœud
 * - Le client RPC corrèle les réponses par `RequestId`
 * - Les notifications sont routées par nom de méthode
 */

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::models::StreamId;

pub type RequestId = u64;

pub const JSONRPC_VERSION: &str = "2.0";

/// Code d'erreur JSON-RPC renvoyé pour une méthode inconnue
pub const METHOD_NOT_FOUND: i64 = -32601;

/// Méthodes sortantes (kernel → nœud) et notifications entrantes (nœud → kernel)
pub mod commands {
    pub const ACTIVATE: &str = "activate_request";
    pub const STOP_SERVICE: &str = "stop_service";
    pub const PING_SERVICE: &str = "ping_service";
    pub const GET_LOG_SERVICE: &str = "get_log_service";
    pub const PREPARE_SERVICE: &str = "prepare_service";
    pub const SYNC_SERVICE: &str = "sync_service";
    pub const START_STREAM: &str = "start_stream";
    pub const STOP_STREAM: &str = "stop_stream";
    pub const RESTART_STREAM: &str = "restart_stream";
    pub const GET_LOG_STREAM: &str = "get_log_stream";
    pub const GET_PIPELINE_STREAM: &str = "get_pipeline_stream";

    pub const STATISTIC_STREAM: &str = "statistic_stream";
    pub const CHANGED_SOURCES_STREAM: &str = "changed_source_stream";
    pub const ML_NOTIFICATION_STREAM: &str = "ml_notification_stream";
    pub const STATISTIC_SERVICE: &str = "statistic_service";
    pub const QUIT_STATUS_STREAM: &str = "quit_status_stream";
    pub const CLIENT_PING: &str = "ping_client";
}

fn jsonrpc_version() -> String {
    JSONRPC_VERSION.to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    #[serde(default = "jsonrpc_version")]
    pub jsonrpc: String,
    /// Absent pour une notification
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<RequestId>,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl Request {
    pub fn new(id: RequestId, method: &str, params: Option<Value>) -> Self {
        Self { jsonrpc: jsonrpc_version(), id: Some(id), method: method.to_string(), params }
    }

    pub fn notification(method: &str, params: Option<Value>) -> Self {
        Self { jsonrpc: jsonrpc_version(), id: None, method: method.to_string(), params }
    }

    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    #[serde(default = "jsonrpc_version")]
    pub jsonrpc: String,
    pub id: RequestId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

impl Response {
    pub fn ok(id: RequestId, result: Value) -> Self {
        Self { jsonrpc: jsonrpc_version(), id, result: Some(result), error: None }
    }

    pub fn failed(id: RequestId, code: i64, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: jsonrpc_version(),
            id,
            result: None,
            error: Some(RpcError { code, message: message.into() }),
        }
    }
}

/// Message brut reçu d'un nœud, avant routage
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Inbound {
    Request(Request),
    Response(Response),
}

/// État de la connexion transport d'un nœud
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum ConnectionState {
    #[default]
    Disconnected = 0,
    Connecting = 1,
    Active = 2,
}

impl From<ConnectionState> for u8 {
    fn from(state: ConnectionState) -> u8 {
        state as u8
    }
}

impl TryFrom<u8> for ConnectionState {
    type Error = String;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(ConnectionState::Disconnected),
            1 => Ok(ConnectionState::Connecting),
            2 => Ok(ConnectionState::Active),
            other => Err(format!("unknown connection state {other}")),
        }
    }
}

/// Événements typés livrés par un transport sur la file de son nœud
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    Request(Request),
    Response(Response),
    StateChanged(ConnectionState),
}

impl From<Inbound> for TransportEvent {
    fn from(inbound: Inbound) -> Self {
        match inbound {
            Inbound::Request(req) => TransportEvent::Request(req),
            Inbound::Response(resp) => TransportEvent::Response(resp),
        }
    }
}

/// Cycle de vie d'un stream, posé uniquement par les statistiques entrantes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum StreamStatus {
    #[default]
    New = 0,
    Init = 1,
    Started = 2,
    Ready = 3,
    Playing = 4,
    Frozen = 5,
    Waiting = 6,
}

impl From<StreamStatus> for u8 {
    fn from(status: StreamStatus) -> u8 {
        status as u8
    }
}

impl TryFrom<u8> for StreamStatus {
    type Error = String;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        Ok(match code {
            0 => StreamStatus::New,
            1 => StreamStatus::Init,
            2 => StreamStatus::Started,
            3 => StreamStatus::Ready,
            4 => StreamStatus::Playing,
            5 => StreamStatus::Frozen,
            6 => StreamStatus::Waiting,
            other => return Err(format!("unknown stream status {other}")),
        })
    }
}

/// `statistic_stream` : tous les champs sont requis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamStatistics {
    pub id: StreamId,
    /// Code brut, comparé au kind de l'objet visé
    #[serde(rename = "type")]
    pub kind: i64,
    pub status: StreamStatus,
    pub cpu: f64,
    pub timestamp: i64,
    pub idle_time: i64,
    pub rss: u64,
    pub loop_start_time: i64,
    pub restarts: u32,
    pub start_time: i64,
    pub input_streams: Value,
    pub output_streams: Value,
}

/// `quit_status_stream`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuitStatus {
    pub id: StreamId,
    #[serde(default)]
    pub exit_status: i32,
    #[serde(default)]
    pub signal: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OnlineUsers {
    pub daemon: u64,
    pub http: u64,
    pub vods: u64,
    pub cods: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subscribers: Option<u64>,
}

impl fmt::Display for OnlineUsers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "daemon:{} http:{} vods:{} cods:{}", self.daemon, self.http, self.vods, self.cods)?;
        if let Some(subscribers) = self.subscribers {
            write!(f, " subscribers:{subscribers}")?;
        }
        Ok(())
    }
}

/// `statistic_service` : télémétrie agrégée d'un nœud
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceStatistics {
    pub cpu: f64,
    pub gpu: f64,
    pub load_average: String,
    pub memory_total: u64,
    pub memory_free: u64,
    pub hdd_total: u64,
    pub hdd_free: u64,
    pub bandwidth_in: u64,
    pub bandwidth_out: u64,
    pub uptime: u64,
    pub timestamp: i64,
    pub online_users: OnlineUsers,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OperatingSystem {
    pub name: String,
    pub version: String,
    pub arch: String,
}

impl fmt::Display for OperatingSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}({})", self.name, self.version, self.arch)
    }
}

/// Champs renvoyés par `activate_request`, mis en cache par le client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeDescriptor {
    pub http_host: String,
    pub vods_host: String,
    pub cods_host: String,
    pub project: String,
    pub version: String,
    pub expiration_time: i64,
    pub os: OperatingSystem,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_inbound_routes_notifications_and_responses() {
        let notification: Inbound = serde_json::from_value(json!({
            "jsonrpc": "2.0",
            "method": "statistic_service",
            "params": {"cpu": 1.0}
        }))
        .unwrap();
        match notification {
            Inbound::Request(req) => {
                assert!(req.is_notification());
                assert_eq!(req.method, commands::STATISTIC_SERVICE);
            }
            other => panic!("expected request, got {other:?}"),
        }

        let response: Inbound =
            serde_json::from_value(json!({"jsonrpc": "2.0", "id": 7, "result": "ok"})).unwrap();
        assert_eq!(response, Inbound::Response(Response::ok(7, json!("ok"))));
    }

    #[test]
    fn test_notification_omits_id_on_the_wire() {
        let wire = serde_json::to_value(Request::notification(commands::CLIENT_PING, None)).unwrap();
        assert_eq!(wire, json!({"jsonrpc": "2.0", "method": "ping_client"}));
    }

    #[test]
    fn test_stream_statistics_requires_every_field() {
        let partial = json!({"id": "s1", "type": 2, "status": 4});
        assert!(serde_json::from_value::<StreamStatistics>(partial).is_err());
    }

    #[test]
    fn test_online_users_display() {
        let mut users = OnlineUsers { daemon: 1, http: 2, vods: 3, cods: 4, subscribers: None };
        assert_eq!(users.to_string(), "daemon:1 http:2 vods:3 cods:4");
        users.subscribers = Some(5);
        assert_eq!(users.to_string(), "daemon:1 http:2 vods:3 cods:4 subscribers:5");
    }
}
