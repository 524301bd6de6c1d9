use std::sync::Arc;
use std::time::Duration;

use streamfleet_devkit::contract_helpers::{node_settings, relay, StreamStatsBuilder};
use streamfleet_devkit::test_utils::init_tracing;
use streamfleet_devkit::{MemoryCatalog, MockTransportFactory, RecordingSink};
use streamfleet_kernel::catalog::Catalog;
use streamfleet_kernel::contracts::{commands, ConnectionState};
use streamfleet_kernel::error::KernelError;
use streamfleet_kernel::health::HealthTracker;
use streamfleet_kernel::registry::{NodeHandle, NodeRegistry, RegistryOptions};

struct Fleet {
    registry: NodeRegistry,
    catalog: Arc<MemoryCatalog>,
    sink: Arc<RecordingSink>,
    factory: MockTransportFactory,
}

fn fleet(options: RegistryOptions) -> Fleet {
    init_tracing();
    let catalog = Arc::new(MemoryCatalog::new());
    let sink = Arc::new(RecordingSink::new());
    let factory = MockTransportFactory::new();
    let registry = NodeRegistry::new(catalog.clone(), sink.clone(), Arc::new(factory.clone()), options);
    Fleet { registry, catalog, sink, factory }
}

async fn wait_for_status(handle: &NodeHandle, expected: ConnectionState) {
    for _ in 0..100 {
        if handle.with(|service| service.status()).await.unwrap() == expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("node {} never reached {:?}", handle.id(), expected);
}

#[tokio::test]
async fn test_register_connect_and_snapshot() {
    let fleet = fleet(RegistryOptions::default());
    let settings = node_settings("edge-1");
    let node_id = settings.id.clone();

    let handle = fleet.registry.register(settings).unwrap();
    assert_eq!(fleet.registry.len(), 1);
    assert_eq!(fleet.catalog.list_node_settings().unwrap().len(), 1);

    handle.with(|service| service.add_stream(relay("a"))).await.unwrap().unwrap();
    fleet.registry.connect_all().await;
    wait_for_status(&handle, ConnectionState::Active).await;

    let wire = fleet.factory.wire(&node_id).unwrap();
    assert_eq!(wire.methods(), vec![commands::PREPARE_SERVICE, commands::SYNC_SERVICE]);

    let snapshot = fleet.registry.snapshot().await;
    assert_eq!((snapshot.nodes, snapshot.active, snapshot.streams), (1, 1, 1));

    let health = HealthTracker::new().get_health(snapshot);
    assert_eq!(health.nodes_active, 1);
    assert_eq!(health.streams_tracked, 1);
}

#[tokio::test]
async fn test_transport_events_reach_the_node_task() {
    let fleet = fleet(RegistryOptions::default());
    let settings = node_settings("edge-1");
    let node_id = settings.id.clone();
    let def = relay("a");
    fleet.catalog.seed(&settings, &[def.clone()]);

    assert_eq!(fleet.registry.load_all().unwrap(), 1);
    assert_eq!(fleet.registry.load_all().unwrap(), 0);

    let handle = fleet.registry.handle(&node_id).unwrap();
    handle.with(|service| service.connect()).await.unwrap();
    wait_for_status(&handle, ConnectionState::Active).await;

    let wire = fleet.factory.wire(&node_id).unwrap();
    assert!(wire.inject(StreamStatsBuilder::for_stream(&def).notification()));

    let channel = format!("stream_data_changed_{node_id}");
    for _ in 0..100 {
        if !fleet.sink.on_channel(&channel).is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(fleet.sink.on_channel(&channel).len(), 1);
    let started = handle.with(|service| service.find_stream("a").map(|s| s.is_started())).await.unwrap();
    assert_eq!(started, Some(true));
}

#[tokio::test]
async fn test_pending_requests_expire_on_tick() {
    let fleet = fleet(RegistryOptions {
        request_timeout: Duration::from_millis(20),
        expiry_tick: Duration::from_millis(10),
        ..RegistryOptions::default()
    });
    let handle = fleet.registry.register(node_settings("edge-1")).unwrap();
    handle.with(|service| service.connect()).await.unwrap();
    wait_for_status(&handle, ConnectionState::Active).await;

    handle.with(|service| service.ping()).await.unwrap().unwrap();

    assert_eq!(handle.with(|service| service.pending_requests()).await.unwrap(), 1);

    let mut remaining = 1;
    for _ in 0..100 {
        tokio::time::sleep(Duration::from_millis(10)).await;
        remaining = handle.with(|service| service.pending_requests()).await.unwrap();
        if remaining == 0 {
            break;
        }
    }
    assert_eq!(remaining, 0);
}

#[tokio::test]
async fn test_unregister_removes_node_and_settings() {
    let fleet = fleet(RegistryOptions::default());
    let settings = node_settings("edge-1");
    let node_id = settings.id.clone();
    let handle = fleet.registry.register(settings).unwrap();

    fleet.registry.unregister(&node_id).await.unwrap();

    assert!(fleet.registry.is_empty());
    assert!(fleet.catalog.list_node_settings().unwrap().is_empty());
    assert!(matches!(fleet.registry.unregister(&node_id).await, Err(KernelError::UnknownNode(_))));
    assert!(matches!(fleet.registry.handle(&node_id), Err(KernelError::UnknownNode(_))));
    assert!(matches!(handle.with(|service| service.status()).await, Err(KernelError::NodeGone(_))));
}
