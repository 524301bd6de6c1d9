/**
 * STREAMFLEET KERNEL - Point d'entrée du plan de contrôle
 *
 * RÔLE : Bootstrap : logs, config, catalogue, bus d'événements MQTT,
 * registre des nœuds et publication périodique de la santé.
 * Tourne jusqu'à Ctrl-C puis déconnecte proprement chaque nœud.
 */

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use streamfleet_kernel::catalog::{Catalog, JsonCatalog};
use streamfleet_kernel::config::load_config;
use streamfleet_kernel::health::HealthTracker;
use streamfleet_kernel::mqtt::{MqttSink, MqttTransportFactory};
use streamfleet_kernel::notify::NotificationSink;
use streamfleet_kernel::registry::NodeRegistry;

#[tokio::main]
async fn main() -> Result<()> {
    // .env optionnel
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cfg = load_config().await;
    info!(broker = %format!("{}:{}", cfg.mqtt.host, cfg.mqtt.port), "streamfleet kernel starting");

    let catalog: Arc<dyn Catalog> = Arc::new(
        JsonCatalog::open(&cfg.catalog.path)
            .with_context(|| format!("failed to open catalog {}", cfg.catalog.path))?,
    );

    let health = HealthTracker::new();
    let sink: Arc<dyn NotificationSink> =
        Arc::new(MqttSink::connect(&cfg.mqtt, &cfg.events.topic_prefix, health.clone()));
    let transports = Arc::new(MqttTransportFactory::new(cfg.mqtt.clone()));

    let registry = Arc::new(NodeRegistry::new(
        catalog,
        sink.clone(),
        transports,
        cfg.registry_options(),
    ));
    let loaded = registry.load_all().context("failed to load nodes")?;
    registry.connect_all().await;
    info!(nodes = loaded, "nodes connecting");

    let publisher = health.spawn_health_publisher(registry.clone(), sink, cfg.health_interval());

    tokio::signal::ctrl_c().await.context("failed to listen for shutdown signal")?;
    info!("shutdown requested");

    publisher.abort();
    registry.shutdown().await;
    Ok(())
}
