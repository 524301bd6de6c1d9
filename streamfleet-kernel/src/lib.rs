/**
 * STREAMFLEET KERNEL - Plan de contrôle d'une flotte de nœuds de streaming
 *
 * RÔLE : Modèle runtime de chaque nœud distant et de ses streams, poussée
 * de configuration par RPC, ingestion des notifications et réconciliation
 * avec le catalogue persisté.
 *
 * ARCHITECTURE : une tâche par nœud (`registry`) possède son `NodeService`
 * (`service`), lequel possède son `ServiceClient` (`client`) et ses
 * `StreamObject` (`stream`). Catalogue, transport et sink sont injectés.
 */

pub mod catalog;
pub mod client;
pub mod config;
pub mod contracts;
pub mod error;
pub mod health;
pub mod models;
pub mod mqtt;
pub mod notify;
pub mod registry;
pub mod service;
pub mod state;
pub mod stream;
