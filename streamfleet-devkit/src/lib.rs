/*!
# StreamFleet DevKit - Stubs et utilitaires de test du plan de contrôle

Bibliothèque facilitant les tests du kernel sans nœud ni broker réels :
- Transport RPC simulé (requêtes enregistrées, événements injectés)
- Catalogue en mémoire avec compteurs d'écritures et pannes simulées
- Sink de notifications enregistreur
- Builders de statistiques et de définitions de streams
*/

pub mod rpc_stub;
pub mod catalog_stub;
pub mod sink_stub;
pub mod contract_helpers;
pub mod test_utils;

pub use rpc_stub::{MockTransport, MockTransportFactory, MockWire};
pub use catalog_stub::MemoryCatalog;
pub use sink_stub::RecordingSink;
pub use contract_helpers::{StreamStatsBuilder, DefinitionBuilder};
pub use test_utils::TestHarness;
