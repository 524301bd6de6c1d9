/*!
Catalogue en mémoire pour tests

Même contrat que `JsonCatalog`, sans fichier. Compte les écritures
d'associations et peut simuler une panne de stockage.
*/

use parking_lot::Mutex;
use std::collections::HashMap;

use streamfleet_kernel::catalog::Catalog;
use streamfleet_kernel::error::CatalogError;
use streamfleet_kernel::models::{NodeId, NodeSettings, StreamDefinition, StreamId};

#[derive(Default)]
struct CatalogState {
    nodes: HashMap<NodeId, NodeSettings>,
    streams: HashMap<StreamId, StreamDefinition>,
    associations: HashMap<NodeId, Vec<StreamId>>,
    association_writes: usize,
    stream_saves: usize,
    save_limit: Option<usize>,
    failing: bool,
}

#[derive(Default)]
pub struct MemoryCatalog {
    state: Mutex<CatalogState>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insère réglages et streams d'un nœud sans toucher aux compteurs
    pub fn seed(&self, settings: &NodeSettings, definitions: &[StreamDefinition]) {
        let mut state = self.state.lock();
        state.nodes.insert(settings.id.clone(), settings.clone());
        for definition in definitions {
            state.streams.insert(definition.id.clone(), definition.clone());
            let ids = state.associations.entry(settings.id.clone()).or_default();
            if !ids.contains(&definition.id) {
                ids.push(definition.id.clone());
            }
        }
    }

    /// Toute opération suivante échoue avec `CatalogError::Unavailable`
    pub fn set_failing(&self, failing: bool) {
        self.state.lock().failing = failing;
    }

    /// `save_stream` échoue dès que `limit` sauvegardes ont réussi
    pub fn limit_stream_saves(&self, limit: Option<usize>) {
        self.state.lock().save_limit = limit;
    }

    pub fn association_writes(&self) -> usize {
        self.state.lock().association_writes
    }

    pub fn stream_saves(&self) -> usize {
        self.state.lock().stream_saves
    }

    pub fn stream(&self, stream_id: &str) -> Option<StreamDefinition> {
        self.state.lock().streams.get(stream_id).cloned()
    }

    pub fn associated_ids(&self, node_id: &str) -> Vec<StreamId> {
        self.state.lock().associations.get(node_id).cloned().unwrap_or_default()
    }

    fn check(state: &CatalogState) -> Result<(), CatalogError> {
        if state.failing {
            return Err(CatalogError::Unavailable("simulated outage".into()));
        }
        Ok(())
    }
}

impl Catalog for MemoryCatalog {
    fn load_node_settings(&self, node_id: &str) -> Result<NodeSettings, CatalogError> {
        let state = self.state.lock();
        Self::check(&state)?;
        state
            .nodes
            .get(node_id)
            .cloned()
            .ok_or_else(|| CatalogError::NodeNotFound(node_id.to_string()))
    }

    fn list_node_settings(&self) -> Result<Vec<NodeSettings>, CatalogError> {
        let state = self.state.lock();
        Self::check(&state)?;
        let mut nodes: Vec<NodeSettings> = state.nodes.values().cloned().collect();
        nodes.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(nodes)
    }

    fn save_node_settings(&self, settings: &NodeSettings) -> Result<(), CatalogError> {
        let mut state = self.state.lock();
        Self::check(&state)?;
        state.nodes.insert(settings.id.clone(), settings.clone());
        Ok(())
    }

    fn delete_node_settings(&self, node_id: &str) -> Result<(), CatalogError> {
        let mut state = self.state.lock();
        Self::check(&state)?;
        state.nodes.remove(node_id);
        state.associations.remove(node_id);
        Ok(())
    }

    fn load_streams(&self, node_id: &str) -> Result<Vec<StreamDefinition>, CatalogError> {
        let state = self.state.lock();
        Self::check(&state)?;
        let ids = state.associations.get(node_id).cloned().unwrap_or_default();
        Ok(ids.iter().filter_map(|id| state.streams.get(id).cloned()).collect())
    }

    fn save_stream(&self, definition: &StreamDefinition) -> Result<(), CatalogError> {
        let mut state = self.state.lock();
        Self::check(&state)?;
        if state.save_limit.is_some_and(|limit| state.stream_saves >= limit) {
            return Err(CatalogError::Unavailable("stream save limit reached".into()));
        }
        state.streams.insert(definition.id.clone(), definition.clone());
        state.stream_saves += 1;
        Ok(())
    }

    fn delete_stream(&self, stream_id: &str) -> Result<(), CatalogError> {
        let mut state = self.state.lock();
        Self::check(&state)?;
        state.streams.remove(stream_id);
        Ok(())
    }

    fn add_stream_associations(&self, node_id: &str, stream_ids: &[StreamId]) -> Result<(), CatalogError> {
        let mut state = self.state.lock();
        Self::check(&state)?;
        state.association_writes += 1;
        let ids = state.associations.entry(node_id.to_string()).or_default();
        for id in stream_ids {
            if !ids.contains(id) {
                ids.push(id.clone());
            }
        }
        Ok(())
    }

    fn remove_stream_association(&self, node_id: &str, stream_id: &str) -> Result<(), CatalogError> {
        let mut state = self.state.lock();
        Self::check(&state)?;
        if let Some(ids) = state.associations.get_mut(node_id) {
            ids.retain(|id| id != stream_id);
        }
        Ok(())
    }

    fn remove_all_associations(&self, node_id: &str) -> Result<(), CatalogError> {
        let mut state = self.state.lock();
        Self::check(&state)?;
        state.associations.remove(node_id);
        Ok(())
    }
}
