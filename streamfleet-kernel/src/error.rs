/**
 * ERREURS KERNEL - Taxonomie des échecs du plan de contrôle
 *
 * RÔLE : Une enum `thiserror` par couche (transport, client RPC, objets
 * stream, catalogue, kernel). Aucune n'est fatale : chaque échec devient
 * un résultat rapporté ou un état remis à zéro.
 */

use crate::models::{StreamId, StreamKind};

/// Défauts du transport (connexion, publication, sérialisation)
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("transport not connected")]
    NotConnected,
    #[error("publish failed: {0}")]
    Publish(String),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Échecs renvoyés par le client RPC d'un nœud, jamais propagés au-delà
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("node not connected")]
    NotConnected,
    #[error("node settings missing")]
    MissingSettings,
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Incohérence entre une mise à jour entrante et l'objet stream visé
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    #[error("runtime update for {got_id} (kind {got_kind}) does not match stream {expected_id} (kind {expected_kind:?})")]
    Mismatch {
        expected_id: StreamId,
        expected_kind: StreamKind,
        got_id: StreamId,
        got_kind: i64,
    },
}

/// Échecs de persistance du catalogue
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("node not found: {0}")]
    NodeNotFound(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("catalog unavailable: {0}")]
    Unavailable(String),
}

/// Erreurs de haut niveau (registre de nœuds, acteurs)
#[derive(Debug, thiserror::Error)]
pub enum KernelError {
    #[error("node not registered: {0}")]
    UnknownNode(String),
    #[error("node task stopped: {0}")]
    NodeGone(String),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
}
