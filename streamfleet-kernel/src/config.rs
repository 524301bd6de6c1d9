use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tokio::fs;
use tracing::warn;

use crate::client::LogCallback;
use crate::registry::RegistryOptions;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct KernelConfig {
    pub mqtt: MqttConf,
    pub catalog: CatalogConf,
    /// Endpoint HTTP où les nœuds déposent logs et pipelines
    pub callback: CallbackConf,
    pub events: EventsConf,
    pub request_timeout_secs: u64,
    pub health_interval_secs: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct MqttConf {
    pub host: String,
    pub port: u16,
    pub keep_alive_secs: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct CatalogConf {
    pub path: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct CallbackConf {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct EventsConf {
    pub topic_prefix: String,
}

impl Default for MqttConf {
    fn default() -> Self {
        Self { host: "localhost".into(), port: 1883, keep_alive_secs: 15 }
    }
}

impl Default for CatalogConf {
    fn default() -> Self {
        Self { path: "./data/catalog.json".into() }
    }
}

impl Default for CallbackConf {
    fn default() -> Self {
        Self { host: "127.0.0.1".into(), port: 8080 }
    }
}

impl Default for EventsConf {
    fn default() -> Self {
        Self { topic_prefix: "streamfleet/events".into() }
    }
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            mqtt: MqttConf::default(),
            catalog: CatalogConf::default(),
            callback: CallbackConf::default(),
            events: EventsConf::default(),
            request_timeout_secs: 30,
            health_interval_secs: 30,
        }
    }
}

impl KernelConfig {
    pub fn registry_options(&self) -> RegistryOptions {
        RegistryOptions {
            callback: LogCallback { host: self.callback.host.clone(), port: self.callback.port },
            request_timeout: Duration::from_secs(self.request_timeout_secs.max(1)),
            ..RegistryOptions::default()
        }
    }

    pub fn health_interval(&self) -> Duration {
        Duration::from_secs(self.health_interval_secs.max(1))
    }
}

/// YAML invalide ou vide : config par défaut
pub fn parse_config(txt: &str) -> KernelConfig {
    if txt.trim().is_empty() {
        return KernelConfig::default();
    }
    serde_yaml::from_str(txt).unwrap_or_else(|e| {
        warn!("invalid config, using defaults: {}", e);
        KernelConfig::default()
    })
}

pub async fn load_config() -> KernelConfig {
    let path = std::env::var("STREAMFLEET_KERNEL_CONFIG").unwrap_or_else(|_| "kernel.yaml".into());
    if Path::new(&path).exists() {
        let txt = fs::read_to_string(&path).await.unwrap_or_default();
        parse_config(&txt)
    } else {
        warn!(path = %path, "no config file, using defaults");
        KernelConfig::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let cfg = parse_config("mqtt:\n  host: broker.lan\ncallback:\n  port: 9090\nrequest_timeout_secs: 5\n");
        assert_eq!(cfg.mqtt.host, "broker.lan");
        assert_eq!(cfg.mqtt.port, 1883);
        assert_eq!(cfg.callback.host, "127.0.0.1");
        assert_eq!(cfg.callback.port, 9090);

        let options = cfg.registry_options();
        assert_eq!(options.request_timeout, Duration::from_secs(5));
        assert_eq!(options.callback.port, 9090);
    }

    #[test]
    fn test_invalid_yaml_falls_back() {
        assert_eq!(parse_config("mqtt: [not, a, map"), KernelConfig::default());
        assert_eq!(parse_config("   "), KernelConfig::default());
    }
}
