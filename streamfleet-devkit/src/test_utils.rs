/*!
Test Harness pour le coordinateur d'un nœud

Assemble un `NodeService` sur le transport simulé, le catalogue en mémoire
et le sink enregistreur. Les événements émis par le transport sont livrés
au service par `pump()`, comme le ferait la tâche du nœud.
*/

use anyhow::Result;
use std::sync::Arc;
use tokio::sync::mpsc;

use streamfleet_kernel::client::LogCallback;
use streamfleet_kernel::contracts::TransportEvent;
use streamfleet_kernel::models::{NodeSettings, StreamDefinition};
use streamfleet_kernel::service::NodeService;

use crate::catalog_stub::MemoryCatalog;
use crate::contract_helpers::node_settings;
use crate::rpc_stub::{MockTransport, MockWire};
use crate::sink_stub::RecordingSink;

pub struct TestHarness {
    pub service: NodeService,
    pub wire: MockWire,
    pub catalog: Arc<MemoryCatalog>,
    pub sink: Arc<RecordingSink>,
    events: mpsc::UnboundedReceiver<TransportEvent>,
}

pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init()
        .ok();
}

impl TestHarness {
    /// Nœud sans stream
    pub fn new() -> Result<Self> {
        Self::with_streams(&[])
    }

    /// Nœud dont le catalogue contient déjà `definitions`
    pub fn with_streams(definitions: &[StreamDefinition]) -> Result<Self> {
        Self::build(node_settings("edge-test"), definitions)
    }

    pub fn build(settings: NodeSettings, definitions: &[StreamDefinition]) -> Result<Self> {
        init_tracing();

        let catalog = Arc::new(MemoryCatalog::new());
        catalog.seed(&settings, definitions);
        let sink = Arc::new(RecordingSink::new());
        let wire = MockWire::new();
        let (tx, events) = mpsc::unbounded_channel();
        let transport = MockTransport::new(wire.clone(), tx);

        let service = NodeService::new(
            settings,
            Box::new(transport),
            catalog.clone(),
            sink.clone(),
            LogCallback::default(),
        )?;
        Ok(Self { service, wire, catalog, sink, events })
    }

    pub fn node_id(&self) -> String {
        self.service.id().to_string()
    }

    /// Livre au service tous les événements en file ; renvoie leur nombre
    pub fn pump(&mut self) -> usize {
        let mut delivered = 0;
        while let Ok(event) = self.events.try_recv() {
            self.service.handle_transport_event(event);
            delivered += 1;
        }
        delivered
    }

    /// Connexion + traitement de l'état actif (prepare, sync)
    pub fn go_active(&mut self) {
        self.service.connect();
        self.pump();
    }

    /// Injecte un événement puis le livre immédiatement
    pub fn deliver(&mut self, event: TransportEvent) {
        self.wire.inject(event);
        self.pump();
    }
}
