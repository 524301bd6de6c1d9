/**
 * CATALOGUE - Persistance des réglages de nœuds et des définitions de streams
 *
 * RÔLE :
 * Le trait `Catalog` est la seule porte du coordinateur vers le stockage.
 * `JsonCatalog` en est l'implémentation fichier : un document JSON unique,
 * réécrit à chaque mutation.
 *
 * FONCTIONNEMENT :
 * - Nœuds : réglages indexés par id
 * - Streams : enregistrements bruts (les kinds inconnus survivent sur disque)
 * - Associations : liste ordonnée des streams de chaque nœud (ordre = ordre catalogue)
 * - Toutes les opérations sont idempotentes
 */

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::error::CatalogError;
use crate::models::{NodeId, NodeSettings, StreamDefinition, StreamId};

pub trait Catalog: Send + Sync {
    fn load_node_settings(&self, node_id: &str) -> Result<NodeSettings, CatalogError>;
    fn list_node_settings(&self) -> Result<Vec<NodeSettings>, CatalogError>;
    fn save_node_settings(&self, settings: &NodeSettings) -> Result<(), CatalogError>;
    /// Supprime aussi les associations du nœud, pas les définitions
    fn delete_node_settings(&self, node_id: &str) -> Result<(), CatalogError>;

    /// Définitions associées au nœud, dans l'ordre du catalogue
    fn load_streams(&self, node_id: &str) -> Result<Vec<StreamDefinition>, CatalogError>;
    fn save_stream(&self, definition: &StreamDefinition) -> Result<(), CatalogError>;
    fn delete_stream(&self, stream_id: &str) -> Result<(), CatalogError>;

    fn add_stream_associations(&self, node_id: &str, stream_ids: &[StreamId]) -> Result<(), CatalogError>;
    fn remove_stream_association(&self, node_id: &str, stream_id: &str) -> Result<(), CatalogError>;
    fn remove_all_associations(&self, node_id: &str) -> Result<(), CatalogError>;
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct CatalogDocument {
    #[serde(default)]
    nodes: BTreeMap<NodeId, NodeSettings>,
    #[serde(default)]
    streams: BTreeMap<StreamId, Value>,
    #[serde(default)]
    associations: BTreeMap<NodeId, Vec<StreamId>>,
}

pub struct JsonCatalog {
    path: PathBuf,
    document: Mutex<CatalogDocument>,
}

impl JsonCatalog {
    /// Ouvre le catalogue ; un fichier absent donne un catalogue vide
    pub fn open(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let path = path.as_ref().to_path_buf();
        let document = if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            if content.trim().is_empty() {
                CatalogDocument::default()
            } else {
                serde_json::from_str(&content)?
            }
        } else {
            info!(path = %path.display(), "no catalog file, starting fresh");
            CatalogDocument::default()
        };

        info!(
            path = %path.display(),
            nodes = document.nodes.len(),
            streams = document.streams.len(),
            "catalog loaded"
        );
        Ok(Self { path, document: Mutex::new(document) })
    }

    fn mutate<F>(&self, f: F) -> Result<(), CatalogError>
    where
        F: FnOnce(&mut CatalogDocument),
    {
        let mut document = self.document.lock();
        let mut next = document.clone();
        f(&mut next);
        // mémoire inchangée si l'écriture échoue
        self.persist(&next)?;
        *document = next;
        Ok(())
    }

    fn persist(&self, document: &CatalogDocument) -> Result<(), CatalogError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(document)?;
        std::fs::write(&self.path, content)?;
        Ok(())
    }
}

impl Catalog for JsonCatalog {
    fn load_node_settings(&self, node_id: &str) -> Result<NodeSettings, CatalogError> {
        self.document
            .lock()
            .nodes
            .get(node_id)
            .cloned()
            .ok_or_else(|| CatalogError::NodeNotFound(node_id.to_string()))
    }

    fn list_node_settings(&self) -> Result<Vec<NodeSettings>, CatalogError> {
        Ok(self.document.lock().nodes.values().cloned().collect())
    }

    fn save_node_settings(&self, settings: &NodeSettings) -> Result<(), CatalogError> {
        self.mutate(|doc| {
            doc.nodes.insert(settings.id.clone(), settings.clone());
        })
    }

    fn delete_node_settings(&self, node_id: &str) -> Result<(), CatalogError> {
        self.mutate(|doc| {
            doc.nodes.remove(node_id);
            doc.associations.remove(node_id);
        })
    }

    fn load_streams(&self, node_id: &str) -> Result<Vec<StreamDefinition>, CatalogError> {
        let document = self.document.lock();
        let Some(ids) = document.associations.get(node_id) else {
            return Ok(Vec::new());
        };

        let mut definitions = Vec::with_capacity(ids.len());
        for id in ids {
            let Some(raw) = document.streams.get(id) else {
                warn!(node = node_id, stream = %id, "associated stream has no record");
                continue;
            };
            match serde_json::from_value::<StreamDefinition>(raw.clone()) {
                Ok(def) => definitions.push(def),
                Err(e) => warn!(node = node_id, stream = %id, "unreadable stream record: {}", e),
            }
        }
        Ok(definitions)
    }

    fn save_stream(&self, definition: &StreamDefinition) -> Result<(), CatalogError> {
        let raw = serde_json::to_value(definition)?;
        self.mutate(|doc| {
            doc.streams.insert(definition.id.clone(), raw);
        })
    }

    fn delete_stream(&self, stream_id: &str) -> Result<(), CatalogError> {
        self.mutate(|doc| {
            doc.streams.remove(stream_id);
        })
    }

    fn add_stream_associations(&self, node_id: &str, stream_ids: &[StreamId]) -> Result<(), CatalogError> {
        self.mutate(|doc| {
            let associated = doc.associations.entry(node_id.to_string()).or_default();
            for id in stream_ids {
                if !associated.contains(id) {
                    associated.push(id.clone());
                }
            }
        })
    }

    fn remove_stream_association(&self, node_id: &str, stream_id: &str) -> Result<(), CatalogError> {
        self.mutate(|doc| {
            if let Some(associated) = doc.associations.get_mut(node_id) {
                associated.retain(|id| id != stream_id);
            }
        })
    }

    fn remove_all_associations(&self, node_id: &str) -> Result<(), CatalogError> {
        self.mutate(|doc| {
            doc.associations.remove(node_id);
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{HostAndPort, StreamKind};
    use tempfile::tempdir;

    #[test]
    fn test_streams_survive_reopen_in_order() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("catalog.json");
        let node = NodeSettings::new("edge", HostAndPort::new("127.0.0.1", 6317));

        let first = StreamDefinition::template(StreamKind::Relay);
        let second = StreamDefinition::template(StreamKind::Encode);
        {
            let catalog = JsonCatalog::open(&path).unwrap();
            catalog.save_node_settings(&node).unwrap();
            catalog.save_stream(&second).unwrap();
            catalog.save_stream(&first).unwrap();
            catalog
                .add_stream_associations(&node.id, &[first.id.clone(), second.id.clone()])
                .unwrap();
            catalog.add_stream_associations(&node.id, &[first.id.clone()]).unwrap();
        }

        let catalog = JsonCatalog::open(&path).unwrap();
        assert_eq!(catalog.load_node_settings(&node.id).unwrap(), node);
        let loaded = catalog.load_streams(&node.id).unwrap();
        assert_eq!(loaded, vec![first.clone(), second]);

        catalog.remove_stream_association(&node.id, &first.id).unwrap();
        catalog.remove_stream_association(&node.id, &first.id).unwrap();
        assert_eq!(catalog.load_streams(&node.id).unwrap().len(), 1);
    }

    #[test]
    fn test_unknown_kind_record_kept_on_disk() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("catalog.json");
        let raw = serde_json::json!({
            "associations": {"n1": ["s1"]},
            "streams": {"s1": {"id": "s1", "name": "legacy", "settings": {"kind": "hologram"}}}
        });
        std::fs::write(&path, raw.to_string()).unwrap();

        let catalog = JsonCatalog::open(&path).unwrap();
        let loaded = catalog.load_streams("n1").unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].kind(), None);

        catalog.remove_all_associations("n1").unwrap();
        let on_disk: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(on_disk["streams"]["s1"]["settings"]["kind"], "hologram");
    }

    #[test]
    fn test_failed_write_leaves_memory_unchanged() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("catalog.json");
        let kept = NodeSettings::new("edge", HostAndPort::new("127.0.0.1", 6317));
        let lost = NodeSettings::new("core", HostAndPort::new("127.0.0.1", 6318));

        let catalog = JsonCatalog::open(&path).unwrap();
        catalog.save_node_settings(&kept).unwrap();

        // un répertoire à la place du fichier fait échouer l'écriture
        std::fs::remove_file(&path).unwrap();
        std::fs::create_dir(&path).unwrap();

        assert!(matches!(catalog.save_node_settings(&lost), Err(CatalogError::Io(_))));
        assert_eq!(catalog.list_node_settings().unwrap(), vec![kept]);
        assert!(matches!(catalog.load_node_settings(&lost.id), Err(CatalogError::NodeNotFound(_))));
    }

    #[test]
    fn test_missing_node_reported() {
        let dir = tempdir().unwrap();
        let catalog = JsonCatalog::open(dir.path().join("nested/catalog.json")).unwrap();
        assert!(matches!(catalog.load_node_settings("ghost"), Err(CatalogError::NodeNotFound(_))));
        catalog.delete_stream("ghost").unwrap();
        assert!(dir.path().join("nested/catalog.json").exists());
    }
}
