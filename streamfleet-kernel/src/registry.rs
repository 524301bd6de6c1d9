/**
 * REGISTRE DES NŒUDS - Une tâche par nœud, écrivain unique de son état
 *
 * RÔLE :
 * Charge les réglages de nœuds du catalogue, crée pour chacun un transport
 * et un `NodeService`, puis les confie à une tâche tokio dédiée.
 * Toute interaction passe par un `NodeHandle` (commande + réponse oneshot).
 *
 * FONCTIONNEMENT :
 * - Événements transport : file non bornée propre au nœud
 * - Commandes : closures exécutées sur le `NodeService` dans la tâche
 * - Tick périodique : expiration des corrélations en attente
 * - Nœuds indépendants entre eux, exécutés en parallèle
 */

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::catalog::Catalog;
use crate::client::{LogCallback, TransportFactory};
use crate::contracts::{ConnectionState, TransportEvent};
use crate::error::KernelError;
use crate::models::{NodeId, NodeSettings};
use crate::notify::NotificationSink;
use crate::service::NodeService;
use crate::state::{new_rw_state, SharedRw};

const COMMAND_QUEUE: usize = 64;

type Command = Box<dyn FnOnce(&mut NodeService) + Send>;

#[derive(Debug, Clone)]
pub struct RegistryOptions {
    pub callback: LogCallback,
    /// Âge au-delà duquel une requête sans réponse est abandonnée
    pub request_timeout: Duration,
    pub expiry_tick: Duration,
}

impl Default for RegistryOptions {
    fn default() -> Self {
        Self {
            callback: LogCallback::default(),
            request_timeout: Duration::from_secs(30),
            expiry_tick: Duration::from_secs(1),
        }
    }
}

/// Accès à la tâche d'un nœud
#[derive(Clone)]
pub struct NodeHandle {
    id: NodeId,
    commands: mpsc::Sender<Command>,
}

impl NodeHandle {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Exécute `f` dans la tâche du nœud et renvoie son résultat
    pub async fn with<R, F>(&self, f: F) -> Result<R, KernelError>
    where
        F: FnOnce(&mut NodeService) -> R + Send + 'static,
        R: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let command: Command = Box::new(move |service: &mut NodeService| {
            let _ = tx.send(f(service));
        });
        self.commands
            .send(command)
            .await
            .map_err(|_| KernelError::NodeGone(self.id.clone()))?;
        rx.await.map_err(|_| KernelError::NodeGone(self.id.clone()))
    }
}

struct NodeEntry {
    handle: NodeHandle,
    task: JoinHandle<()>,
}

/// Vue agrégée de la flotte, pour la santé du kernel
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FleetSnapshot {
    pub nodes: u32,
    pub active: u32,
    pub streams: u32,
}

pub struct NodeRegistry {
    catalog: Arc<dyn Catalog>,
    sink: Arc<dyn NotificationSink>,
    transports: Arc<dyn TransportFactory>,
    options: RegistryOptions,
    nodes: SharedRw<HashMap<NodeId, NodeEntry>>,
}

impl NodeRegistry {
    pub fn new(
        catalog: Arc<dyn Catalog>,
        sink: Arc<dyn NotificationSink>,
        transports: Arc<dyn TransportFactory>,
        options: RegistryOptions,
    ) -> Self {
        Self { catalog, sink, transports, options, nodes: new_rw_state(HashMap::new()) }
    }

    /// Démarre une tâche pour chaque nœud connu du catalogue
    pub fn load_all(&self) -> Result<usize, KernelError> {
        let settings = self.catalog.list_node_settings()?;
        let mut started = 0;
        for node in settings {
            if self.nodes.read().contains_key(&node.id) {
                continue;
            }
            let id = node.id.clone();
            match self.spawn_node(node) {
                Ok(_) => started += 1,
                Err(e) => warn!(node = %id, "failed to start node: {}", e),
            }
        }
        info!(nodes = started, "node registry loaded");
        Ok(started)
    }

    /// Enregistre (persiste) un nœud et démarre sa tâche
    pub fn register(&self, settings: NodeSettings) -> Result<NodeHandle, KernelError> {
        self.catalog.save_node_settings(&settings)?;
        if let Some(existing) = self.get(&settings.id) {
            return Ok(existing);
        }
        info!(node = %settings.id, name = %settings.name, host = %settings.host, "node registered");
        self.spawn_node(settings)
    }

    /// Déconnecte, arrête la tâche et supprime les réglages du nœud
    pub async fn unregister(&self, node_id: &str) -> Result<(), KernelError> {
        let entry = self.nodes.write().remove(node_id);
        let Some(entry) = entry else {
            return Err(KernelError::UnknownNode(node_id.to_string()));
        };

        if let Err(e) = entry.handle.with(|service| service.disconnect()).await {
            debug!(node = node_id, "disconnect before removal failed: {}", e);
        }
        entry.task.abort();
        self.catalog.delete_node_settings(node_id)?;
        info!(node = node_id, "node unregistered");
        Ok(())
    }

    pub fn get(&self, node_id: &str) -> Option<NodeHandle> {
        self.nodes.read().get(node_id).map(|entry| entry.handle.clone())
    }

    pub fn handle(&self, node_id: &str) -> Result<NodeHandle, KernelError> {
        self.get(node_id).ok_or_else(|| KernelError::UnknownNode(node_id.to_string()))
    }

    pub fn node_ids(&self) -> Vec<NodeId> {
        self.nodes.read().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.nodes.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.read().is_empty()
    }

    fn handles(&self) -> Vec<NodeHandle> {
        self.nodes.read().values().map(|entry| entry.handle.clone()).collect()
    }

    pub async fn connect_all(&self) {
        for handle in self.handles() {
            if let Err(e) = handle.with(|service| service.connect()).await {
                warn!(node = %handle.id(), "connect failed: {}", e);
            }
        }
    }

    pub async fn snapshot(&self) -> FleetSnapshot {
        let mut snapshot = FleetSnapshot::default();
        for handle in self.handles() {
            let state = handle
                .with(|service| (service.status(), service.streams().len()))
                .await;
            if let Ok((status, streams)) = state {
                snapshot.nodes += 1;
                snapshot.streams += streams as u32;
                if status == ConnectionState::Active {
                    snapshot.active += 1;
                }
            }
        }
        snapshot
    }

    pub async fn shutdown(&self) {
        let entries: Vec<NodeEntry> = self.nodes.write().drain().map(|(_, entry)| entry).collect();
        for entry in entries {
            let _ = entry.handle.with(|service| service.disconnect()).await;
            entry.task.abort();
        }
        info!("node registry shut down");
    }

    fn spawn_node(&self, settings: NodeSettings) -> Result<NodeHandle, KernelError> {
        let id = settings.id.clone();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let transport = self.transports.create(&settings, event_tx);
        let service = NodeService::new(
            settings,
            transport,
            self.catalog.clone(),
            self.sink.clone(),
            self.options.callback.clone(),
        )?;

        let (command_tx, command_rx) = mpsc::channel(COMMAND_QUEUE);
        let handle = NodeHandle { id: id.clone(), commands: command_tx };
        let task = tokio::spawn(run_node(service, event_rx, command_rx, self.options.clone()));

        self.nodes.write().insert(id, NodeEntry { handle: handle.clone(), task });
        Ok(handle)
    }
}

async fn run_node(
    mut service: NodeService,
    mut events: mpsc::UnboundedReceiver<TransportEvent>,
    mut commands: mpsc::Receiver<Command>,
    options: RegistryOptions,
) {
    let mut tick = tokio::time::interval(options.expiry_tick);
    tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
    debug!(node = %service.id(), "node task started");

    loop {
        tokio::select! {
            Some(event) = events.recv() => service.handle_transport_event(event),
            command = commands.recv() => match command {
                Some(command) => command(&mut service),
                None => break,
            },
            _ = tick.tick() => {
                service.expire_pending(options.request_timeout);
            }
        }
    }

    service.disconnect();
    debug!(node = %service.id(), "node task stopped");
}
