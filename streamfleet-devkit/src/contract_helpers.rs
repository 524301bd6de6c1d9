/*!
Builders pour les messages RPC et les définitions de streams

Facilite l'écriture des tests avec :
- Statistiques de stream/nœud complètes (tous les champs requis remplis)
- Notifications entrantes prêtes à injecter
- Définitions de streams avec sorties HTTP, parties et fenêtres de catchup
*/

use serde::Serialize;
use serde_json::{json, Value};
use time::OffsetDateTime;

use streamfleet_kernel::contracts::{
    commands, OnlineUsers, Request, Response, ServiceStatistics, StreamStatistics, StreamStatus,
    TransportEvent,
};
use streamfleet_kernel::models::{
    CatchupWindow, HostAndPort, NodeSettings, StreamDefinition, StreamId, StreamKind,
    StreamSettings,
};

/// Construit un `statistic_stream` cohérent avec une définition
pub struct StreamStatsBuilder {
    stats: StreamStatistics,
}

impl StreamStatsBuilder {
    /// Stream démarré (start_time non nul) en lecture
    pub fn for_stream(definition: &StreamDefinition) -> Self {
        let kind = definition.kind().map(|k| i64::from(k.code())).unwrap_or(-1);
        Self {
            stats: StreamStatistics {
                id: definition.id.clone(),
                kind,
                status: StreamStatus::Playing,
                cpu: 2.5,
                timestamp: 1_700_000_100,
                idle_time: 10,
                rss: 4096,
                loop_start_time: 1_700_000_000,
                restarts: 0,
                start_time: 1_700_000_000,
                input_streams: json!([]),
                output_streams: json!([]),
            },
        }
    }

    pub fn status(mut self, status: StreamStatus) -> Self {
        self.stats.status = status;
        self
    }

    pub fn kind_code(mut self, kind: i64) -> Self {
        self.stats.kind = kind;
        self
    }

    pub fn cpu(mut self, cpu: f64) -> Self {
        self.stats.cpu = cpu;
        self
    }

    pub fn restarts(mut self, restarts: u32) -> Self {
        self.stats.restarts = restarts;
        self
    }

    pub fn build(self) -> StreamStatistics {
        self.stats
    }

    /// Notification prête à injecter sur la file du nœud
    pub fn notification(self) -> TransportEvent {
        notification(commands::STATISTIC_STREAM, &self.stats)
    }
}

pub fn service_statistics(cpu: f64) -> ServiceStatistics {
    ServiceStatistics {
        cpu,
        gpu: 0.0,
        load_average: "0.42 0.30 0.10".into(),
        memory_total: 16_000,
        memory_free: 8_000,
        hdd_total: 500_000,
        hdd_free: 250_000,
        bandwidth_in: 1_000,
        bandwidth_out: 9_000,
        uptime: 3_600,
        timestamp: 1_700_000_000,
        online_users: OnlineUsers { daemon: 1, http: 12, vods: 3, cods: 0, subscribers: None },
    }
}

/// Notification JSON-RPC (sans id) livrée comme si elle venait du nœud
pub fn notification<T: Serialize>(method: &str, params: &T) -> TransportEvent {
    let params = serde_json::to_value(params).unwrap_or(Value::Null);
    TransportEvent::Request(Request::notification(method, Some(params)))
}

pub fn quit_status(stream_id: &str, exit_status: i32) -> TransportEvent {
    notification(commands::QUIT_STATUS_STREAM, &json!({ "id": stream_id, "exit_status": exit_status, "signal": 0 }))
}

/// Résultat d'`activate_request` : descripteur et statistiques ensemble
pub fn activation_result(project: &str, version: &str) -> Value {
    let mut result = serde_json::to_value(service_statistics(5.0)).unwrap_or_else(|_| json!({}));
    if let Value::Object(map) = &mut result {
        map.insert("http_host".into(), json!("10.0.0.5:8000"));
        map.insert("vods_host".into(), json!("10.0.0.5:7000"));
        map.insert("cods_host".into(), json!("10.0.0.5:6001"));
        map.insert("project".into(), json!(project));
        map.insert("version".into(), json!(version));
        map.insert("expiration_time".into(), json!(1_900_000_000_000i64));
        map.insert("os".into(), json!({ "name": "Linux", "version": "6.1", "arch": "x86_64" }));
    }
    result
}

pub fn response(id: u64, result: Value) -> TransportEvent {
    TransportEvent::Response(Response::ok(id, result))
}

pub fn node_settings(name: &str) -> NodeSettings {
    NodeSettings::new(name, HostAndPort::new("10.0.0.5", 6317))
}

/// Fenêtre de catchup relative à `now`
pub fn window(now: OffsetDateTime, from_secs: i64, to_secs: i64) -> CatchupWindow {
    CatchupWindow {
        start: now + time::Duration::seconds(from_secs),
        stop: now + time::Duration::seconds(to_secs),
    }
}

/// Construit des définitions à partir des modèles par kind
pub struct DefinitionBuilder {
    definition: StreamDefinition,
}

impl DefinitionBuilder {
    pub fn new(kind: StreamKind) -> Self {
        Self { definition: StreamDefinition::template(kind) }
    }

    pub fn id(mut self, id: &str) -> Self {
        self.definition.id = id.to_string();
        self
    }

    pub fn name(mut self, name: &str) -> Self {
        self.definition.name = name.to_string();
        self
    }

    pub fn input(mut self, uri: &str) -> Self {
        if let Some(input) = self.definition.input.first_mut() {
            input.uri = uri.to_string();
        }
        self
    }

    pub fn output(mut self, uri: &str) -> Self {
        if let Some(output) = self.definition.output.first_mut() {
            output.uri = uri.to_string();
        }
        self
    }

    pub fn parts(mut self, parts: &[&str]) -> Self {
        self.definition.parts = parts.iter().map(|p| p.to_string()).collect::<Vec<StreamId>>();
        self
    }

    /// Sans effet hors catchup
    pub fn window(mut self, new_window: CatchupWindow) -> Self {
        if let StreamSettings::Catchup { window, .. } = &mut self.definition.settings {
            *window = new_window;
        }
        self
    }

    pub fn build(self) -> StreamDefinition {
        self.definition
    }
}

/// Relay avec une sortie HTTP publique, le cas le plus courant
pub fn relay(id: &str) -> StreamDefinition {
    DefinitionBuilder::new(StreamKind::Relay)
        .id(id)
        .name(id)
        .input("udp://239.0.0.1:5000")
        .output(&format!("http://cdn.example.com/live/{id}/master.m3u8"))
        .build()
}

pub fn catchup(id: &str, window: CatchupWindow) -> StreamDefinition {
    DefinitionBuilder::new(StreamKind::Catchup).id(id).name(id).window(window).build()
}
