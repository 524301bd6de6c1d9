use serde::{Deserialize, Serialize};
use std::fmt;
use time::OffsetDateTime;
use uuid::Uuid;

pub type StreamId = String;

/// URL réservée des streams de test (jamais réécrite)
pub const DEFAULT_TEST_URL: &str = "test";
/// Nom de playlist utilisé quand l'URL de sortie n'en porte pas
pub const DEFAULT_HLS_PLAYLIST: &str = "master.m3u8";

/// Catégorie fonctionnelle d'un stream, fixée à la création.
/// Sérialisée en entier sur le fil (`type`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum StreamKind {
    Proxy = 0,
    ProxyVod = 1,
    Relay = 2,
    Encode = 3,
    TimeshiftPlayer = 4,
    TimeshiftRecorder = 5,
    Catchup = 6,
    TestLife = 7,
    VodRelay = 8,
    VodEncode = 9,
    CodRelay = 10,
    CodEncode = 11,
    Event = 12,
}

impl StreamKind {
    pub const ALL: [StreamKind; 13] = [
        StreamKind::Proxy,
        StreamKind::ProxyVod,
        StreamKind::Relay,
        StreamKind::Encode,
        StreamKind::TimeshiftPlayer,
        StreamKind::TimeshiftRecorder,
        StreamKind::Catchup,
        StreamKind::TestLife,
        StreamKind::VodRelay,
        StreamKind::VodEncode,
        StreamKind::CodRelay,
        StreamKind::CodEncode,
        StreamKind::Event,
    ];

    pub fn code(self) -> u8 {
        self as u8
    }

    /// Tout sauf les proxys purs passe par un pipeline matériel sur le nœud
    pub fn is_hardware(self) -> bool {
        !matches!(self, StreamKind::Proxy | StreamKind::ProxyVod)
    }

    pub fn is_vod(self) -> bool {
        matches!(
            self,
            StreamKind::ProxyVod | StreamKind::VodRelay | StreamKind::VodEncode | StreamKind::Event
        )
    }
}

impl From<StreamKind> for u8 {
    fn from(kind: StreamKind) -> u8 {
        kind.code()
    }
}

impl TryFrom<u8> for StreamKind {
    type Error = String;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        StreamKind::ALL
            .into_iter()
            .find(|k| k.code() == code)
            .ok_or_else(|| format!("unknown stream type {code}"))
    }
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum LogLevel {
    Emerg = 0,
    Alert = 1,
    Crit = 2,
    Err = 3,
    Warning = 4,
    Notice = 5,
    #[default]
    Info = 6,
    Debug = 7,
}

impl From<LogLevel> for u8 {
    fn from(level: LogLevel) -> u8 {
        level as u8
    }
}

impl TryFrom<u8> for LogLevel {
    type Error = String;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        Ok(match code {
            0 => LogLevel::Emerg,
            1 => LogLevel::Alert,
            2 => LogLevel::Crit,
            3 => LogLevel::Err,
            4 => LogLevel::Warning,
            5 => LogLevel::Notice,
            6 => LogLevel::Info,
            7 => LogLevel::Debug,
            other => return Err(format!("unknown log level {other}")),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum HlsType {
    #[default]
    Pull = 0,
    Push = 1,
}

impl From<HlsType> for u8 {
    fn from(hls: HlsType) -> u8 {
        hls as u8
    }
}

impl TryFrom<u8> for HlsType {
    type Error = String;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(HlsType::Pull),
            1 => Ok(HlsType::Push),
            other => Err(format!("unknown hls type {other}")),
        }
    }
}

/// Identifiant court d'une entrée/sortie, unique dans son stream
fn generate_url_id() -> u64 {
    (Uuid::new_v4().as_u128() as u64) & 0x7fff_ffff
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputUrl {
    pub id: u64,
    #[serde(default)]
    pub uri: String,
}

impl InputUrl {
    pub fn generate() -> Self {
        Self { id: generate_url_id(), uri: String::new() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputUrl {
    pub id: u64,
    #[serde(default)]
    pub uri: String,
    /// Répertoire géré sur le nœud, posé par la réécriture des sorties
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_root: Option<String>,
    #[serde(default)]
    pub hls_type: HlsType,
}

impl OutputUrl {
    pub fn generate() -> Self {
        Self { id: generate_url_id(), uri: String::new(), http_root: None, hls_type: HlsType::Pull }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub fn is_valid(&self) -> bool {
        self.width > 0 && self.height > 0
    }
}

impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Logo {
    pub path: String,
    pub position: Point,
    pub alpha: f64,
    pub size: Size,
}

impl Default for Logo {
    fn default() -> Self {
        Self { path: String::new(), position: Point::default(), alpha: 1.0, size: Size::default() }
    }
}

impl Logo {
    pub fn is_valid(&self) -> bool {
        !self.path.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Rational {
    pub num: u32,
    pub den: u32,
}

impl Rational {
    pub fn is_valid(&self) -> bool {
        self.num > 0 && self.den > 0
    }
}

impl fmt::Display for Rational {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.num, self.den)
    }
}

/// Champs communs aux streams exécutés par un pipeline sur le nœud
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HardwareSettings {
    pub log_level: LogLevel,
    /// Secondes avant arrêt automatique, 0 = jamais
    pub auto_exit_time: u64,
    #[serde(rename = "loop")]
    pub loop_: bool,
    pub avformat: bool,
    pub have_video: bool,
    pub have_audio: bool,
    pub restart_attempts: u32,
    pub audio_select: Option<u32>,
    /// JSON libre fusionné dans la config sortante (best effort)
    pub extra_config_fields: String,
}

impl Default for HardwareSettings {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            auto_exit_time: 0,
            loop_: false,
            avformat: false,
            have_video: true,
            have_audio: true,
            restart_attempts: 10,
            audio_select: None,
            extra_config_fields: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelaySettings {
    pub video_parser: String,
    pub audio_parser: String,
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self { video_parser: "h264parse".into(), audio_parser: "aacparse".into() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncodeSettings {
    pub relay_video: bool,
    pub relay_audio: bool,
    pub deinterlace: bool,
    pub frame_rate: Option<u32>,
    pub volume: f64,
    pub video_codec: String,
    pub audio_codec: String,
    pub audio_channels: Option<u32>,
    pub size: Size,
    pub video_bitrate: Option<u32>,
    pub audio_bitrate: Option<u32>,
    pub logo: Logo,
    pub rsvg_logo: Logo,
    pub aspect_ratio: Rational,
}

impl Default for EncodeSettings {
    fn default() -> Self {
        Self {
            relay_video: false,
            relay_audio: false,
            deinterlace: false,
            frame_rate: None,
            volume: 1.0,
            video_codec: "x264enc".into(),
            audio_codec: "faac".into(),
            audio_channels: None,
            size: Size::default(),
            video_bitrate: None,
            audio_bitrate: None,
            logo: Logo::default(),
            rsvg_logo: Logo::default(),
            aspect_ratio: Rational::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeshiftRecorderSettings {
    pub chunk_duration: u64,
    pub chunk_life_time: u64,
}

impl Default for TimeshiftRecorderSettings {
    fn default() -> Self {
        Self { chunk_duration: 120, chunk_life_time: 12 * 3600 }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeshiftPlayerSettings {
    pub timeshift_dir: String,
    pub timeshift_delay: u64,
}

/// Fenêtre `[start, stop)` pendant laquelle un catchup peut tourner
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CatchupWindow {
    #[serde(with = "time::serde::rfc3339")]
    pub start: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub stop: OffsetDateTime,
}

impl CatchupWindow {
    pub fn contains(&self, now: OffsetDateTime) -> bool {
        now >= self.start && now < self.stop
    }

    pub fn whole_seconds(&self) -> i64 {
        (self.stop - self.start).whole_seconds()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VodMeta {
    pub description: String,
    pub trailer_url: String,
    pub user_score: f64,
    #[serde(with = "time::serde::rfc3339")]
    pub prime_date: OffsetDateTime,
    pub country: String,
    /// Durée en millisecondes
    pub duration: u64,
}

impl Default for VodMeta {
    fn default() -> Self {
        Self {
            description: String::new(),
            trailer_url: String::new(),
            user_score: 0.0,
            prime_date: OffsetDateTime::UNIX_EPOCH,
            country: String::new(),
            duration: 0,
        }
    }
}

/// Champs propres à chaque catégorie. Les kinds inconnus du catalogue
/// tombent dans `Unknown` et sont écartés à l'enveloppement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StreamSettings {
    Proxy,
    ProxyVod {
        #[serde(default)]
        vod: VodMeta,
    },
    Relay {
        #[serde(default)]
        hardware: HardwareSettings,
        #[serde(default)]
        relay: RelaySettings,
    },
    Encode {
        #[serde(default)]
        hardware: HardwareSettings,
        #[serde(default)]
        encode: EncodeSettings,
    },
    TimeshiftPlayer {
        #[serde(default)]
        hardware: HardwareSettings,
        #[serde(default)]
        relay: RelaySettings,
        #[serde(default)]
        player: TimeshiftPlayerSettings,
    },
    TimeshiftRecorder {
        #[serde(default)]
        hardware: HardwareSettings,
        #[serde(default)]
        relay: RelaySettings,
        #[serde(default)]
        timeshift: TimeshiftRecorderSettings,
    },
    Catchup {
        #[serde(default)]
        hardware: HardwareSettings,
        #[serde(default)]
        relay: RelaySettings,
        #[serde(default)]
        timeshift: TimeshiftRecorderSettings,
        window: CatchupWindow,
    },
    TestLife {
        #[serde(default)]
        hardware: HardwareSettings,
        #[serde(default)]
        relay: RelaySettings,
    },
    VodRelay {
        #[serde(default)]
        hardware: HardwareSettings,
        #[serde(default)]
        relay: RelaySettings,
        #[serde(default)]
        vod: VodMeta,
    },
    VodEncode {
        #[serde(default)]
        hardware: HardwareSettings,
        #[serde(default)]
        encode: EncodeSettings,
        #[serde(default)]
        vod: VodMeta,
    },
    CodRelay {
        #[serde(default)]
        hardware: HardwareSettings,
        #[serde(default)]
        relay: RelaySettings,
    },
    CodEncode {
        #[serde(default)]
        hardware: HardwareSettings,
        #[serde(default)]
        encode: EncodeSettings,
    },
    Event {
        #[serde(default)]
        hardware: HardwareSettings,
        #[serde(default)]
        encode: EncodeSettings,
        #[serde(default)]
        vod: VodMeta,
    },
    #[serde(other)]
    Unknown,
}

impl StreamSettings {
    /// Réglages par défaut d'une catégorie
    pub fn for_kind(kind: StreamKind) -> Self {
        let hardware = HardwareSettings::default();
        let relay = RelaySettings::default();
        let encode = EncodeSettings::default();
        let vod = VodMeta::default();
        let timeshift = TimeshiftRecorderSettings::default();
        match kind {
            StreamKind::Proxy => StreamSettings::Proxy,
            StreamKind::ProxyVod => StreamSettings::ProxyVod { vod },
            StreamKind::Relay => StreamSettings::Relay { hardware, relay },
            StreamKind::Encode => StreamSettings::Encode { hardware, encode },
            StreamKind::TimeshiftPlayer => StreamSettings::TimeshiftPlayer {
                hardware,
                relay,
                player: TimeshiftPlayerSettings::default(),
            },
            StreamKind::TimeshiftRecorder => {
                StreamSettings::TimeshiftRecorder { hardware, relay, timeshift }
            }
            StreamKind::Catchup => {
                let start = OffsetDateTime::now_utc();
                StreamSettings::Catchup {
                    hardware,
                    relay,
                    timeshift,
                    window: CatchupWindow { start, stop: start + time::Duration::hours(1) },
                }
            }
            StreamKind::TestLife => StreamSettings::TestLife { hardware, relay },
            StreamKind::VodRelay => StreamSettings::VodRelay { hardware, relay, vod },
            StreamKind::VodEncode => StreamSettings::VodEncode { hardware, encode, vod },
            StreamKind::CodRelay => StreamSettings::CodRelay { hardware, relay },
            StreamKind::CodEncode => StreamSettings::CodEncode { hardware, encode },
            StreamKind::Event => StreamSettings::Event { hardware, encode, vod },
        }
    }

    pub fn kind(&self) -> Option<StreamKind> {
        Some(match self {
            StreamSettings::Proxy => StreamKind::Proxy,
            StreamSettings::ProxyVod { .. } => StreamKind::ProxyVod,
            StreamSettings::Relay { .. } => StreamKind::Relay,
            StreamSettings::Encode { .. } => StreamKind::Encode,
            StreamSettings::TimeshiftPlayer { .. } => StreamKind::TimeshiftPlayer,
            StreamSettings::TimeshiftRecorder { .. } => StreamKind::TimeshiftRecorder,
            StreamSettings::Catchup { .. } => StreamKind::Catchup,
            StreamSettings::TestLife { .. } => StreamKind::TestLife,
            StreamSettings::VodRelay { .. } => StreamKind::VodRelay,
            StreamSettings::VodEncode { .. } => StreamKind::VodEncode,
            StreamSettings::CodRelay { .. } => StreamKind::CodRelay,
            StreamSettings::CodEncode { .. } => StreamKind::CodEncode,
            StreamSettings::Event { .. } => StreamKind::Event,
            StreamSettings::Unknown => return None,
        })
    }

    pub fn hardware(&self) -> Option<&HardwareSettings> {
        match self {
            StreamSettings::Relay { hardware, .. }
            | StreamSettings::Encode { hardware, .. }
            | StreamSettings::TimeshiftPlayer { hardware, .. }
            | StreamSettings::TimeshiftRecorder { hardware, .. }
            | StreamSettings::Catchup { hardware, .. }
            | StreamSettings::TestLife { hardware, .. }
            | StreamSettings::VodRelay { hardware, .. }
            | StreamSettings::VodEncode { hardware, .. }
            | StreamSettings::CodRelay { hardware, .. }
            | StreamSettings::CodEncode { hardware, .. }
            | StreamSettings::Event { hardware, .. } => Some(hardware),
            StreamSettings::Proxy | StreamSettings::ProxyVod { .. } | StreamSettings::Unknown => None,
        }
    }

    pub fn hardware_mut(&mut self) -> Option<&mut HardwareSettings> {
        match self {
            StreamSettings::Relay { hardware, .. }
            | StreamSettings::Encode { hardware, .. }
            | StreamSettings::TimeshiftPlayer { hardware, .. }
            | StreamSettings::TimeshiftRecorder { hardware, .. }
            | StreamSettings::Catchup { hardware, .. }
            | StreamSettings::TestLife { hardware, .. }
            | StreamSettings::VodRelay { hardware, .. }
            | StreamSettings::VodEncode { hardware, .. }
            | StreamSettings::CodRelay { hardware, .. }
            | StreamSettings::CodEncode { hardware, .. }
            | StreamSettings::Event { hardware, .. } => Some(hardware),
            StreamSettings::Proxy | StreamSettings::ProxyVod { .. } | StreamSettings::Unknown => None,
        }
    }

    pub fn relay(&self) -> Option<&RelaySettings> {
        match self {
            StreamSettings::Relay { relay, .. }
            | StreamSettings::TimeshiftPlayer { relay, .. }
            | StreamSettings::TimeshiftRecorder { relay, .. }
            | StreamSettings::Catchup { relay, .. }
            | StreamSettings::TestLife { relay, .. }
            | StreamSettings::VodRelay { relay, .. }
            | StreamSettings::CodRelay { relay, .. } => Some(relay),
            _ => None,
        }
    }

    pub fn encode(&self) -> Option<&EncodeSettings> {
        match self {
            StreamSettings::Encode { encode, .. }
            | StreamSettings::VodEncode { encode, .. }
            | StreamSettings::CodEncode { encode, .. }
            | StreamSettings::Event { encode, .. } => Some(encode),
            _ => None,
        }
    }

    pub fn vod(&self) -> Option<&VodMeta> {
        match self {
            StreamSettings::ProxyVod { vod }
            | StreamSettings::VodRelay { vod, .. }
            | StreamSettings::VodEncode { vod, .. }
            | StreamSettings::Event { vod, .. } => Some(vod),
            _ => None,
        }
    }
}

/// Définition persistée d'un stream, source de vérité du catalogue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamDefinition {
    pub id: StreamId,
    pub name: String,
    #[serde(default)]
    pub tvg_logo: String,
    #[serde(default)]
    pub group: String,
    #[serde(default = "default_visible")]
    pub visible: bool,
    #[serde(default)]
    pub price: f64,
    #[serde(default)]
    pub iarc: u32,
    #[serde(default)]
    pub input: Vec<InputUrl>,
    #[serde(default)]
    pub output: Vec<OutputUrl>,
    /// Sous-streams constitutifs, supprimés avec leur parent
    #[serde(default)]
    pub parts: Vec<StreamId>,
    pub settings: StreamSettings,
}

fn default_visible() -> bool {
    true
}

impl StreamDefinition {
    pub fn generate_id() -> StreamId {
        Uuid::new_v4().simple().to_string()
    }

    pub fn kind(&self) -> Option<StreamKind> {
        self.settings.kind()
    }

    /// Nouvelle définition prête à éditer, avec une entrée et une sortie générées
    pub fn template(kind: StreamKind) -> Self {
        let mut settings = StreamSettings::for_kind(kind);
        if kind.is_vod() {
            if let Some(hardware) = settings.hardware_mut() {
                hardware.loop_ = false;
            }
        }

        let (input, output, visible) = match kind {
            StreamKind::Proxy => (vec![], vec![OutputUrl::generate()], true),
            StreamKind::TimeshiftRecorder => (vec![InputUrl::generate()], vec![], false),
            StreamKind::TestLife => {
                let mut test = OutputUrl::generate();
                test.uri = DEFAULT_TEST_URL.to_string();
                (vec![InputUrl::generate()], vec![test], false)
            }
            _ => (vec![InputUrl::generate()], vec![OutputUrl::generate()], true),
        };

        Self {
            id: Self::generate_id(),
            name: "Stream".into(),
            tvg_logo: String::new(),
            group: String::new(),
            visible,
            price: 0.0,
            iarc: 0,
            input,
            output,
            parts: vec![],
            settings,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_codes_roundtrip_through_wire_integer() {
        for kind in StreamKind::ALL {
            let wire = serde_json::to_value(kind).unwrap();
            assert_eq!(wire, serde_json::json!(kind.code()));
            assert_eq!(serde_json::from_value::<StreamKind>(wire).unwrap(), kind);
        }
        assert!(StreamKind::try_from(42).is_err());
    }

    #[test]
    fn test_unknown_kind_parses_to_unknown_settings() {
        let raw = serde_json::json!({
            "id": "s1",
            "name": "legacy",
            "settings": {"kind": "hologram", "depth": 3}
        });
        let def: StreamDefinition = serde_json::from_value(raw).unwrap();
        assert_eq!(def.settings, StreamSettings::Unknown);
        assert_eq!(def.kind(), None);
    }

    #[test]
    fn test_partial_record_takes_defaults() {
        let raw = serde_json::json!({
            "id": "s2",
            "name": "news",
            "output": [{"id": 1, "uri": "http://example.com/news/master.m3u8"}],
            "settings": {"kind": "relay", "hardware": {"loop": true}}
        });
        let def: StreamDefinition = serde_json::from_value(raw).unwrap();
        let hardware = def.settings.hardware().unwrap();
        assert!(hardware.loop_);
        assert!(hardware.have_video);
        assert_eq!(def.settings.relay().unwrap().video_parser, "h264parse");
        assert!(def.visible);
    }

    #[test]
    fn test_templates() {
        let recorder = StreamDefinition::template(StreamKind::TimeshiftRecorder);
        assert!(recorder.output.is_empty());
        assert!(!recorder.visible);

        let test = StreamDefinition::template(StreamKind::TestLife);
        assert_eq!(test.output[0].uri, DEFAULT_TEST_URL);

        for kind in [StreamKind::VodRelay, StreamKind::VodEncode, StreamKind::Event] {
            let vod = StreamDefinition::template(kind);
            assert!(!vod.settings.hardware().unwrap().loop_);
            assert_eq!(vod.kind(), Some(kind));
        }
    }

    #[test]
    fn test_catchup_window_bounds() {
        let start = OffsetDateTime::from_unix_timestamp(1_000).unwrap();
        let window = CatchupWindow { start, stop: start + time::Duration::seconds(90) };
        assert!(window.contains(start));
        assert!(!window.contains(start - time::Duration::seconds(1)));
        assert!(!window.contains(window.stop));
        assert_eq!(window.whole_seconds(), 90);
    }
}
