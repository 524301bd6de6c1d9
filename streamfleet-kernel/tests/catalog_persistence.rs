use std::sync::Arc;
use tokio::sync::mpsc;

use streamfleet_devkit::contract_helpers::{node_settings, relay};
use streamfleet_devkit::{MockTransport, MockWire, RecordingSink};
use streamfleet_kernel::catalog::{Catalog, JsonCatalog};
use streamfleet_kernel::client::LogCallback;
use streamfleet_kernel::models::NodeSettings;
use streamfleet_kernel::service::NodeService;

fn service(settings: &NodeSettings, catalog: Arc<JsonCatalog>) -> NodeService {
    let (tx, _rx) = mpsc::unbounded_channel();
    let transport = MockTransport::new(MockWire::new(), tx);
    NodeService::new(
        settings.clone(),
        Box::new(transport),
        catalog,
        Arc::new(RecordingSink::new()),
        LogCallback::default(),
    )
    .unwrap()
}

#[test]
fn test_streams_reload_after_restart_in_catalog_order() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state/catalog.json");
    let settings = node_settings("edge-1");

    {
        let catalog = Arc::new(JsonCatalog::open(&path).unwrap());
        catalog.save_node_settings(&settings).unwrap();
        let mut node = service(&settings, catalog);
        node.add_streams(vec![relay("c"), relay("a"), relay("b")]).unwrap();
        node.remove_stream("a").unwrap();
    }

    let catalog = Arc::new(JsonCatalog::open(&path).unwrap());
    assert_eq!(catalog.load_node_settings(&settings.id).unwrap(), settings);
    let node = service(&settings, catalog);
    let ids: Vec<&str> = node.streams().iter().map(|s| s.id()).collect();
    assert_eq!(ids, vec!["c", "b"]);

    let output = &node.find_stream("c").unwrap().definition().output[0];
    assert!(output.uri.starts_with("http://10.0.0.5:8000/fastocloud/hls/2/c/"));
}

#[test]
fn test_deleting_node_keeps_definitions_but_drops_associations() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = Arc::new(JsonCatalog::open(dir.path().join("catalog.json")).unwrap());
    let settings = node_settings("edge-1");
    catalog.save_node_settings(&settings).unwrap();
    let mut node = service(&settings, catalog.clone());
    node.add_stream(relay("a")).unwrap();

    catalog.delete_node_settings(&settings.id).unwrap();

    assert!(catalog.load_streams(&settings.id).unwrap().is_empty());
    assert!(catalog.load_node_settings(&settings.id).is_err());
}
