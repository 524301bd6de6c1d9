use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

pub type NodeId = String;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostAndPort {
    pub host: String,
    pub port: u16,
}

impl HostAndPort {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self { host: host.into(), port }
    }
}

impl fmt::Display for HostAndPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Réglages d'un nœud enregistrés par un administrateur
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSettings {
    pub id: NodeId,
    pub name: String,
    /// Endpoint RPC du service distant
    pub host: HostAndPort,
    /// Hôtes publics servant les sorties hls / vods / cods
    pub http_host: HostAndPort,
    pub vods_host: HostAndPort,
    pub cods_host: HostAndPort,
    #[serde(default = "default_feedback_directory")]
    pub feedback_directory: String,
    #[serde(default = "default_timeshifts_directory")]
    pub timeshifts_directory: String,
    #[serde(default = "default_hls_directory")]
    pub hls_directory: String,
    #[serde(default = "default_vods_directory")]
    pub vods_directory: String,
    #[serde(default = "default_cods_directory")]
    pub cods_directory: String,
    #[serde(default = "default_proxy_directory")]
    pub proxy_directory: String,
}

fn default_feedback_directory() -> String {
    "~/streamer/feedback".into()
}
fn default_timeshifts_directory() -> String {
    "~/streamer/timeshifts".into()
}
fn default_hls_directory() -> String {
    "~/streamer/hls".into()
}
fn default_vods_directory() -> String {
    "~/streamer/vods".into()
}
fn default_cods_directory() -> String {
    "~/streamer/cods".into()
}
fn default_proxy_directory() -> String {
    "~/streamer/proxy".into()
}

impl NodeSettings {
    /// Nouveaux réglages avec répertoires par défaut et hôtes publics sur la même machine
    pub fn new(name: impl Into<String>, host: HostAndPort) -> Self {
        let public = |port| HostAndPort::new(host.host.clone(), port);
        Self {
            id: Uuid::new_v4().simple().to_string(),
            name: name.into(),
            http_host: public(8000),
            vods_host: public(7000),
            cods_host: public(6001),
            host,
            feedback_directory: default_feedback_directory(),
            timeshifts_directory: default_timeshifts_directory(),
            hls_directory: default_hls_directory(),
            vods_directory: default_vods_directory(),
            cods_directory: default_cods_directory(),
            proxy_directory: default_proxy_directory(),
        }
    }

    pub fn generate_http_link(&self, path: &str) -> String {
        public_link(&self.http_host, "hls", &self.hls_directory, path)
    }

    pub fn generate_vods_link(&self, path: &str) -> String {
        public_link(&self.vods_host, "vods", &self.vods_directory, path)
    }

    pub fn generate_cods_link(&self, path: &str) -> String {
        public_link(&self.cods_host, "cods", &self.cods_directory, path)
    }
}

/// Traduit un chemin sous `root` en lien public servi par `host`
fn public_link(host: &HostAndPort, segment: &str, root: &str, path: &str) -> String {
    let rest = path.strip_prefix(root).unwrap_or(path).trim_start_matches('/');
    format!("http://{host}/fastocloud/{segment}/{rest}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_links_strip_managed_root() {
        let settings = NodeSettings::new("edge-1", HostAndPort::new("10.0.0.5", 6317));
        assert_eq!(
            settings.generate_http_link("~/streamer/hls/2/abc/7/master.m3u8"),
            "http://10.0.0.5:8000/fastocloud/hls/2/abc/7/master.m3u8"
        );
        assert_eq!(
            settings.generate_vods_link("~/streamer/vods/8/abc/7/master.m3u8"),
            "http://10.0.0.5:7000/fastocloud/vods/8/abc/7/master.m3u8"
        );
    }

    #[test]
    fn test_directories_default_when_absent() {
        let raw = serde_json::json!({
            "id": "n1",
            "name": "edge",
            "host": {"host": "127.0.0.1", "port": 6317},
            "http_host": {"host": "127.0.0.1", "port": 8000},
            "vods_host": {"host": "127.0.0.1", "port": 7000},
            "cods_host": {"host": "127.0.0.1", "port": 6001}
        });
        let settings: NodeSettings = serde_json::from_value(raw).unwrap();
        assert_eq!(settings.feedback_directory, "~/streamer/feedback");
        assert_eq!(settings.proxy_directory, "~/streamer/proxy");
    }
}
