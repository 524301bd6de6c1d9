/**
 * SERVICE NŒUD - Coordinateur d'un nœud de streaming distant
 *
 * RÔLE :
 * Propriétaire unique de l'ensemble des `StreamObject` d'un nœud et de son
 * `ServiceClient`. Réconcilie le catalogue persisté avec le runtime, relaie
 * les intentions de contrôle et republie l'état dérivé aux abonnés.
 *
 * FONCTIONNEMENT :
 * - Rechargement : chaque définition du catalogue est enveloppée selon son kind
 * - Ajout : réécriture des sorties et persistance AVANT l'ajout au runtime
 * - Événements entrants : statistiques, fin de stream, ping, état de connexion
 * - Connexion active : prepare + sync ; toute autre : remise à zéro complète
 *
 * CONCURRENCE : aucune synchronisation interne, la tâche du nœud
 * (`registry::NodeHandle`) est le seul écrivain.
 */

use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use time::OffsetDateTime;
use tracing::{debug, info, warn};

use crate::catalog::Catalog;
use crate::client::{ClientEvent, LogCallback, RequestReturn, ServiceClient, Transport};
use crate::contracts::{
    ConnectionState, NodeDescriptor, OnlineUsers, QuitStatus, RequestId, ServiceStatistics,
    StreamStatistics, TransportEvent,
};
use crate::error::CatalogError;
use crate::models::{NodeSettings, StreamDefinition, StreamId, StreamKind};
use crate::notify::{node_channel, NotificationSink, SERVICE_DATA_CHANGED, STREAM_DATA_CHANGED};
use crate::stream::StreamObject;

/// Télémétrie agrégée d'un nœud. `None` = pas encore observé.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NodeTelemetry {
    pub cpu: f64,
    pub gpu: f64,
    pub load_average: Option<String>,
    pub memory_total: u64,
    pub memory_free: u64,
    pub hdd_total: u64,
    pub hdd_free: u64,
    pub bandwidth_in: u64,
    pub bandwidth_out: u64,
    pub uptime: Option<u64>,
    pub timestamp: Option<i64>,
    pub online_users: Option<OnlineUsers>,
}

impl NodeTelemetry {
    pub fn refresh(&mut self, stats: &ServiceStatistics) {
        self.cpu = stats.cpu;
        self.gpu = stats.gpu;
        self.load_average = Some(stats.load_average.clone());
        self.memory_total = stats.memory_total;
        self.memory_free = stats.memory_free;
        self.hdd_total = stats.hdd_total;
        self.hdd_free = stats.hdd_free;
        self.bandwidth_in = stats.bandwidth_in;
        self.bandwidth_out = stats.bandwidth_out;
        self.uptime = Some(stats.uptime);
        self.timestamp = Some(stats.timestamp);
        self.online_users = Some(stats.online_users.clone());
    }
}

pub struct NodeService {
    settings: NodeSettings,
    client: ServiceClient,
    catalog: Arc<dyn Catalog>,
    sink: Arc<dyn NotificationSink>,
    callback: LogCallback,
    streams: Vec<StreamObject>,
    telemetry: NodeTelemetry,
    sync_time: Option<OffsetDateTime>,
}

impl NodeService {
    /// Construit le coordinateur et charge les streams du catalogue
    pub fn new(
        settings: NodeSettings,
        transport: Box<dyn Transport>,
        catalog: Arc<dyn Catalog>,
        sink: Arc<dyn NotificationSink>,
        callback: LogCallback,
    ) -> Result<Self, CatalogError> {
        let client = ServiceClient::new(settings.id.clone(), transport);
        let mut service = Self {
            settings,
            client,
            catalog,
            sink,
            callback,
            streams: Vec::new(),
            telemetry: NodeTelemetry::default(),
            sync_time: None,
        };
        service.reload_from_catalog()?;
        Ok(service)
    }

    // ============ ACCESSEURS ============

    pub fn id(&self) -> &str {
        &self.settings.id
    }

    pub fn settings(&self) -> &NodeSettings {
        &self.settings
    }

    pub fn status(&self) -> ConnectionState {
        self.client.status()
    }

    pub fn telemetry(&self) -> &NodeTelemetry {
        &self.telemetry
    }

    pub fn sync_time(&self) -> Option<OffsetDateTime> {
        self.sync_time
    }

    pub fn descriptor(&self) -> Option<&NodeDescriptor> {
        self.client.descriptor()
    }

    /// Requêtes émises encore sans réponse
    pub fn pending_requests(&self) -> usize {
        self.client.pending_count()
    }

    pub fn streams(&self) -> &[StreamObject] {
        &self.streams
    }

    pub fn find_stream(&self, stream_id: &str) -> Option<&StreamObject> {
        self.streams.iter().find(|s| s.id() == stream_id)
    }

    fn position(&self, stream_id: &str) -> Option<usize> {
        self.streams.iter().position(|s| s.id() == stream_id)
    }

    // ============ NŒUD ============

    pub fn connect(&mut self) {
        self.client.connect();
    }

    pub fn disconnect(&mut self) {
        self.client.disconnect();
    }

    pub fn is_connected(&self) -> bool {
        self.client.is_connected()
    }

    pub fn activate(&mut self, license_key: &str) -> RequestReturn {
        self.client.activate(license_key)
    }

    pub fn ping(&mut self) -> RequestReturn {
        self.client.ping_service()
    }

    pub fn stop(&mut self, delay_seconds: u64) -> RequestReturn {
        self.client.stop_service(delay_seconds)
    }

    pub fn get_log_service(&mut self) -> RequestReturn {
        self.client.get_log_service(&self.callback)
    }

    /// Pousse la config de tous les streams. Le rafraîchissement des catchups
    /// a lieu même si l'envoi échoue.
    pub fn sync(&mut self, prepare: bool) -> RequestReturn {
        if prepare {
            if let Err(e) = self.client.prepare_service(Some(&self.settings)) {
                warn!(node = %self.settings.id, "prepare failed: {}", e);
            }
        }

        let configs: Vec<_> = self.streams.iter().map(|s| s.config(&self.settings)).collect();
        let result = self.client.sync_service(configs);
        self.refresh_catchups();

        match &result {
            Ok(_) => {
                self.sync_time = Some(OffsetDateTime::now_utc());
                info!(node = %self.settings.id, streams = self.streams.len(), "sync sent");
            }
            Err(e) => warn!(node = %self.settings.id, "sync failed: {}", e),
        }
        result
    }

    pub fn expire_pending(&mut self, timeout: Duration) -> Vec<(RequestId, String)> {
        self.client.expire_pending(timeout)
    }

    // ============ STREAMS PAR ID ============

    pub fn start_stream(&mut self, stream_id: &str) -> Option<RequestReturn> {
        let stream = self.streams.iter().find(|s| s.id() == stream_id)?;
        stream.start_request(&mut self.client, &self.settings)
    }

    pub fn stop_stream(&mut self, stream_id: &str) -> Option<RequestReturn> {
        let stream = self.streams.iter().find(|s| s.id() == stream_id)?;
        stream.stop_request(&mut self.client)
    }

    pub fn restart_stream(&mut self, stream_id: &str) -> Option<RequestReturn> {
        let stream = self.streams.iter().find(|s| s.id() == stream_id)?;
        stream.restart_request(&mut self.client)
    }

    pub fn get_log_stream(&mut self, stream_id: &str) -> Option<RequestReturn> {
        let stream = self.streams.iter().find(|s| s.id() == stream_id)?;
        stream.get_log_request(&mut self.client, &self.callback, &self.settings)
    }

    pub fn get_pipeline_stream(&mut self, stream_id: &str) -> Option<RequestReturn> {
        let stream = self.streams.iter().find(|s| s.id() == stream_id)?;
        stream.get_pipeline_request(&mut self.client, &self.callback, &self.settings)
    }

    // ============ RÉCONCILIATION ============

    pub fn reload_from_catalog(&mut self) -> Result<(), CatalogError> {
        let definitions = self.catalog.load_streams(&self.settings.id)?;
        self.streams.clear();
        for definition in definitions {
            self.push_wrapped(definition);
        }
        info!(node = %self.settings.id, streams = self.streams.len(), "streams reloaded from catalog");
        Ok(())
    }

    pub fn add_stream(&mut self, definition: StreamDefinition) -> Result<(), CatalogError> {
        if self.position(&definition.id).is_some() {
            return self.update_stream(definition);
        }
        let Some(mut stream) = self.wrap(definition) else {
            return Ok(());
        };

        stream.stable(&self.settings, self.catalog.as_ref())?;
        self.catalog.add_stream_associations(&self.settings.id, &[stream.id().to_string()])?;
        info!(node = %self.settings.id, stream = %stream.id(), kind = ?stream.kind(), "stream added");
        self.streams.push(stream);
        Ok(())
    }

    /// Persiste chaque définition, puis une seule écriture d'association
    pub fn add_streams(&mut self, definitions: Vec<StreamDefinition>) -> Result<(), CatalogError> {
        let mut stabled: Vec<StreamObject> = Vec::with_capacity(definitions.len());
        for definition in definitions {
            let duplicate = self.position(&definition.id).is_some()
                || stabled.iter().any(|s| s.id() == definition.id);
            if duplicate {
                warn!(node = %self.settings.id, stream = %definition.id, "stream already present, skipped");
                continue;
            }
            let Some(mut stream) = self.wrap(definition) else {
                continue;
            };
            stream.stable(&self.settings, self.catalog.as_ref())?;
            stabled.push(stream);
        }

        let ids: Vec<StreamId> = stabled.iter().map(|s| s.id().to_string()).collect();
        self.catalog.add_stream_associations(&self.settings.id, &ids)?;
        info!(node = %self.settings.id, added = ids.len(), "streams added");
        self.streams.extend(stabled);
        Ok(())
    }

    pub fn update_stream(&mut self, definition: StreamDefinition) -> Result<(), CatalogError> {
        self.catalog.save_stream(&definition)?;
        let Some(pos) = self.position(&definition.id) else {
            return Ok(());
        };

        if self.streams[pos].replace_definition(definition.clone()) {
            return self.streams[pos].stable(&self.settings, self.catalog.as_ref());
        }

        // kind modifié : nouvel objet, runtime repart de zéro, placé après persistance
        match self.wrap(definition) {
            Some(mut stream) => {
                stream.stable(&self.settings, self.catalog.as_ref())?;
                self.streams[pos] = stream;
            }
            None => {
                self.streams.remove(pos);
            }
        }
        Ok(())
    }

    /// Supprime les parties d'abord, puis le stream lui-même
    pub fn remove_stream(&mut self, stream_id: &str) -> Result<(), CatalogError> {
        let mut visited = HashSet::new();
        self.remove_stream_recursive(stream_id, &mut visited)
    }

    fn remove_stream_recursive(
        &mut self,
        stream_id: &str,
        visited: &mut HashSet<StreamId>,
    ) -> Result<(), CatalogError> {
        if !visited.insert(stream_id.to_string()) {
            return Ok(());
        }
        let Some(pos) = self.position(stream_id) else {
            return Ok(());
        };

        let parts = self.streams[pos].parts().to_vec();
        for part in &parts {
            self.remove_stream_recursive(part, visited)?;
        }

        let Some(pos) = self.position(stream_id) else {
            return Ok(());
        };
        if let Some(Err(e)) = self.streams[pos].stop_request(&mut self.client) {
            debug!(node = %self.settings.id, stream = stream_id, "stop before removal failed: {}", e);
        }

        self.catalog.remove_stream_association(&self.settings.id, stream_id)?;
        self.catalog.delete_stream(stream_id)?;
        self.streams.remove(pos);
        info!(node = %self.settings.id, stream = stream_id, parts = parts.len(), "stream removed");
        Ok(())
    }

    pub fn remove_all_streams(&mut self) -> Result<(), CatalogError> {
        self.stop_all_streams();
        let ids: Vec<StreamId> = self.streams.iter().map(|s| s.id().to_string()).collect();

        self.catalog.remove_all_associations(&self.settings.id)?;
        for id in &ids {
            self.catalog.delete_stream(id)?;
        }
        self.streams.clear();
        info!(node = %self.settings.id, removed = ids.len(), "all streams removed");
        Ok(())
    }

    /// Arrêt inconditionnel, sans vérifier l'état runtime
    pub fn stop_all_streams(&mut self) {
        for stream in &self.streams {
            if let Err(e) = self.client.stop_stream(stream.id()) {
                debug!(node = %self.settings.id, stream = %stream.id(), "stop failed: {}", e);
            }
        }
    }

    /// Démarrage inconditionnel, sans vérifier l'état runtime
    pub fn start_all_streams(&mut self) {
        for stream in &self.streams {
            if let Err(e) = self.client.start_stream(stream.config(&self.settings)) {
                debug!(node = %self.settings.id, stream = %stream.id(), "start failed: {}", e);
            }
        }
    }

    /// Relit le catalogue, ajoute les catchups créés hors de ce nœud, puis
    /// tente de démarrer chaque catchup (la fenêtre de chacun décide)
    fn refresh_catchups(&mut self) {
        match self.catalog.load_streams(&self.settings.id) {
            Ok(definitions) => {
                for definition in definitions {
                    if definition.kind() == Some(StreamKind::Catchup) && self.position(&definition.id).is_none() {
                        debug!(node = %self.settings.id, stream = %definition.id, "picking up catchup from catalog");
                        self.push_wrapped(definition);
                    }
                }
            }
            Err(e) => warn!(node = %self.settings.id, "catchup refresh failed: {}", e),
        }

        for stream in self.streams.iter().filter(|s| s.kind() == StreamKind::Catchup) {
            if let Some(Err(e)) = stream.start_request(&mut self.client, &self.settings) {
                debug!(node = %self.settings.id, stream = %stream.id(), "catchup start failed: {}", e);
            }
        }
    }

    fn wrap(&self, definition: StreamDefinition) -> Option<StreamObject> {
        let id = definition.id.clone();
        let wrapped = StreamObject::wrap(definition);
        if wrapped.is_none() {
            warn!(node = %self.settings.id, stream = %id, "unknown stream kind, dropped");
        }
        wrapped
    }

    fn push_wrapped(&mut self, definition: StreamDefinition) {
        if self.position(&definition.id).is_some() {
            warn!(node = %self.settings.id, stream = %definition.id, "duplicate stream in catalog, skipped");
            return;
        }
        if let Some(stream) = self.wrap(definition) {
            self.streams.push(stream);
        }
    }

    // ============ ÉVÉNEMENTS ENTRANTS ============

    pub fn handle_transport_event(&mut self, event: TransportEvent) {
        if let Some(event) = self.client.dispatch(event) {
            self.handle_event(event);
        }
    }

    pub fn handle_event(&mut self, event: ClientEvent) {
        match event {
            ClientEvent::StreamStatistics(stats) => self.on_stream_statistics(&stats),
            ClientEvent::ServiceStatistics(stats) => self.on_service_statistics(&stats),
            ClientEvent::QuitStatus(quit) => self.on_quit_status(&quit),
            ClientEvent::StreamSourcesChanged(params) => {
                debug!(node = %self.settings.id, "stream sources changed: {}", params);
            }
            ClientEvent::StreamMlNotification(params) => {
                debug!(node = %self.settings.id, "stream ml notification: {}", params);
            }
            ClientEvent::Ping(_) => {
                let _ = self.sync(false);
            }
            ClientEvent::StateChanged(ConnectionState::Active) => {
                let _ = self.sync(true);
            }
            ClientEvent::StateChanged(_) => self.reset(),
        }
    }

    fn on_stream_statistics(&mut self, stats: &StreamStatistics) {
        let Some(pos) = self.position(&stats.id) else {
            debug!(node = %self.settings.id, stream = %stats.id, "statistics for unknown stream");
            return;
        };
        if let Err(e) = self.streams[pos].update_runtime_fields(stats) {
            warn!(node = %self.settings.id, "{}", e);
            return;
        }
        self.publish_stream(pos);
    }

    fn on_service_statistics(&mut self, stats: &ServiceStatistics) {
        self.telemetry.refresh(stats);
        let view = self.node_view();
        self.sink.publish(&node_channel(SERVICE_DATA_CHANGED, &self.settings.id), &view);
    }

    fn on_quit_status(&mut self, quit: &QuitStatus) {
        let Some(pos) = self.position(&quit.id) else {
            return;
        };
        info!(
            node = %self.settings.id,
            stream = %quit.id,
            exit_status = quit.exit_status,
            signal = quit.signal,
            "stream exited"
        );
        self.streams[pos].reset();
        self.publish_stream(pos);
    }

    fn reset(&mut self) {
        self.telemetry = NodeTelemetry::default();
        self.sync_time = None;
        for stream in &mut self.streams {
            stream.reset();
        }
        debug!(node = %self.settings.id, "runtime state reset");
    }

    fn publish_stream(&self, pos: usize) {
        let view = self.streams[pos].front_view();
        self.sink.publish(&node_channel(STREAM_DATA_CHANGED, &self.settings.id), &view);
    }

    /// Vue publiée aux abonnés (`service_data_changed_*`)
    pub fn node_view(&self) -> Value {
        let t = &self.telemetry;
        let descriptor = self.client.descriptor();
        let sync_time_ms = self.sync_time.map(|ts| (ts.unix_timestamp_nanos() / 1_000_000) as i64);
        json!({
            "id": self.settings.id,
            "cpu": t.cpu,
            "gpu": t.gpu,
            "load_average": t.load_average,
            "memory_total": t.memory_total,
            "memory_free": t.memory_free,
            "hdd_total": t.hdd_total,
            "hdd_free": t.hdd_free,
            "bandwidth_in": t.bandwidth_in,
            "bandwidth_out": t.bandwidth_out,
            "project": descriptor.map(|d| d.project.clone()),
            "version": descriptor.map(|d| d.version.clone()),
            "exp_time": descriptor.map(|d| d.expiration_time),
            "uptime": t.uptime,
            "synctime": sync_time_ms,
            "timestamp": t.timestamp,
            "status": u8::from(self.client.status()),
            "online_users": t.online_users.as_ref().map(|u| u.to_string()),
            "os": descriptor.map(|d| d.os.to_string()),
        })
    }
}
