/**
 * OBJETS STREAM - Enveloppe runtime d'une définition persistée
 *
 * RÔLE :
 * Un `StreamObject` lie une `StreamDefinition` du catalogue aux champs
 * vivants reçus du nœud. Le comportement propre à chaque kind découle de
 * la variante de `StreamSettings` : config sortante, réécriture des
 * sorties, garde de démarrage des catchups.
 *
 * FONCTIONNEMENT :
 * - Config sortante additive : base (id, type, output) puis bloc matériel,
 *   relay, encode, timeshift, catchup, vod selon la variante
 * - start/stop/restart passent par le `ServiceClient` du nœud et ne partent
 *   que si la précondition tient (pas démarré / démarré)
 * - `stable()` réécrit les sorties puis persiste, dans cet ordre
 * - Mise à jour runtime refusée si id ou kind ne correspondent pas
 */

pub mod fields;
pub mod output;
pub mod runtime;

use serde_json::{json, Map, Value};
use time::OffsetDateTime;
use tracing::debug;

use crate::catalog::Catalog;
use crate::client::{LogCallback, OutboundConfig, RequestReturn, ServiceClient};
use crate::contracts::StreamStatistics;
use crate::error::{CatalogError, StreamError};
use crate::models::{
    EncodeSettings, HardwareSettings, HlsType, InputUrl, Logo, NodeSettings, OutputUrl,
    RelaySettings, StreamDefinition, StreamId, StreamKind, StreamSettings,
    TimeshiftRecorderSettings,
};

pub use output::{fixup_output_urls, OutputFamily};
pub use runtime::RuntimeStats;

#[derive(Debug, Clone)]
pub struct StreamObject {
    definition: StreamDefinition,
    kind: StreamKind,
    runtime: RuntimeStats,
}

impl StreamObject {
    /// `None` si la définition porte un kind inconnu
    pub fn wrap(definition: StreamDefinition) -> Option<Self> {
        let kind = definition.kind()?;
        Some(Self { definition, kind, runtime: RuntimeStats::default() })
    }

    pub fn id(&self) -> &str {
        &self.definition.id
    }

    pub fn kind(&self) -> StreamKind {
        self.kind
    }

    pub fn definition(&self) -> &StreamDefinition {
        &self.definition
    }

    pub fn runtime(&self) -> &RuntimeStats {
        &self.runtime
    }

    pub fn parts(&self) -> &[StreamId] {
        &self.definition.parts
    }

    /// Les proxys n'ont pas de pipeline : toujours considérés démarrés
    pub fn is_started(&self) -> bool {
        !self.kind.is_hardware() || self.runtime.is_started()
    }

    /// Remplace la définition enveloppée. Refusé si l'id ou le kind change.
    pub fn replace_definition(&mut self, definition: StreamDefinition) -> bool {
        if definition.id != self.definition.id || definition.kind() != Some(self.kind) {
            return false;
        }
        self.definition = definition;
        true
    }

    pub fn feedback_dir(&self, settings: &NodeSettings) -> String {
        format!("{}/{}/{}", settings.feedback_directory, self.kind, self.definition.id)
    }

    pub fn timeshift_dir(&self, settings: &NodeSettings) -> String {
        format!("{}/{}", settings.timeshifts_directory, self.definition.id)
    }

    /// Réécrit les sorties puis persiste la définition
    pub fn stable(&mut self, settings: &NodeSettings, catalog: &dyn Catalog) -> Result<(), CatalogError> {
        fixup_output_urls(&mut self.definition, settings);
        catalog.save_stream(&self.definition)
    }

    // ============ LIENS ============

    pub fn generate_http_link(&self, settings: &NodeSettings, hls_type: HlsType, playlist: &str, oid: u64) -> OutputUrl {
        self.generate_link(OutputFamily::Http, settings, hls_type, playlist, oid)
    }

    pub fn generate_vod_link(&self, settings: &NodeSettings, hls_type: HlsType, playlist: &str, oid: u64) -> OutputUrl {
        self.generate_link(OutputFamily::Vod, settings, hls_type, playlist, oid)
    }

    pub fn generate_cod_link(&self, settings: &NodeSettings, hls_type: HlsType, playlist: &str, oid: u64) -> OutputUrl {
        self.generate_link(OutputFamily::Cod, settings, hls_type, playlist, oid)
    }

    fn generate_link(
        &self,
        family: OutputFamily,
        settings: &NodeSettings,
        hls_type: HlsType,
        playlist: &str,
        oid: u64,
    ) -> OutputUrl {
        output::generate_link(family, settings, self.kind, &self.definition.id, oid, hls_type, playlist)
    }

    // ============ INTENTIONS ============

    pub fn start_request(&self, client: &mut ServiceClient, settings: &NodeSettings) -> Option<RequestReturn> {
        self.start_request_at(client, settings, OffsetDateTime::now_utc())
    }

    /// Démarrage si pas déjà démarré ; un catchup exige `now` dans sa fenêtre
    pub fn start_request_at(
        &self,
        client: &mut ServiceClient,
        settings: &NodeSettings,
        now: OffsetDateTime,
    ) -> Option<RequestReturn> {
        if !self.kind.is_hardware() || self.is_started() {
            return None;
        }
        if let StreamSettings::Catchup { window, .. } = &self.definition.settings {
            if !window.contains(now) {
                debug!(stream = %self.definition.id, "catchup outside its window, not started");
                return None;
            }
        }
        Some(client.start_stream(self.config(settings)))
    }

    pub fn stop_request(&self, client: &mut ServiceClient) -> Option<RequestReturn> {
        if !self.kind.is_hardware() || !self.is_started() {
            return None;
        }
        Some(client.stop_stream(&self.definition.id))
    }

    pub fn restart_request(&self, client: &mut ServiceClient) -> Option<RequestReturn> {
        if !self.kind.is_hardware() || !self.is_started() {
            return None;
        }
        Some(client.restart_stream(&self.definition.id))
    }

    pub fn get_log_request(
        &self,
        client: &mut ServiceClient,
        callback: &LogCallback,
        settings: &NodeSettings,
    ) -> Option<RequestReturn> {
        if !self.kind.is_hardware() {
            return None;
        }
        Some(client.get_log_stream(callback, &self.definition.id, &self.feedback_dir(settings)))
    }

    pub fn get_pipeline_request(
        &self,
        client: &mut ServiceClient,
        callback: &LogCallback,
        settings: &NodeSettings,
    ) -> Option<RequestReturn> {
        if !self.kind.is_hardware() {
            return None;
        }
        Some(client.get_pipeline_stream(callback, &self.definition.id, &self.feedback_dir(settings)))
    }

    // ============ RUNTIME ============

    pub fn update_runtime_fields(&mut self, stats: &StreamStatistics) -> Result<(), StreamError> {
        if stats.id != self.definition.id || stats.kind != i64::from(self.kind.code()) {
            return Err(StreamError::Mismatch {
                expected_id: self.definition.id.clone(),
                expected_kind: self.kind,
                got_id: stats.id.clone(),
                got_kind: stats.kind,
            });
        }
        if self.kind.is_hardware() {
            self.runtime.apply(stats);
        }
        Ok(())
    }

    pub fn reset(&mut self) {
        self.runtime.reset();
    }

    // ============ CONFIG SORTANTE ============

    pub fn config(&self, settings: &NodeSettings) -> OutboundConfig {
        let def = &self.definition;
        let mut conf = Map::new();
        conf.insert(fields::ID.into(), json!(def.id));
        conf.insert(fields::TYPE.into(), json!(self.kind.code()));
        conf.insert(fields::OUTPUT.into(), Value::Array(def.output.iter().map(output_value).collect()));

        let Some(hardware) = def.settings.hardware() else {
            return conf;
        };
        self.hardware_config(&mut conf, hardware, settings);

        if let Some(relay) = def.settings.relay() {
            relay_config(&mut conf, relay);
        }
        if let Some(encode) = def.settings.encode() {
            encode_config(&mut conf, encode);
        }

        match &def.settings {
            StreamSettings::TimeshiftRecorder { timeshift, .. } => {
                self.recorder_config(&mut conf, timeshift, settings);
            }
            StreamSettings::Catchup { timeshift, window, .. } => {
                self.recorder_config(&mut conf, timeshift, settings);
                if let Some(first) = def.output.first() {
                    let dir = format!("{}/{}/{}/{}", settings.hls_directory, self.kind, def.id, first.id);
                    conf.insert(fields::TIMESHIFT_DIR.into(), json!(dir));
                }
                conf.insert(fields::AUTO_EXIT_TIME.into(), json!(window.whole_seconds()));
            }
            StreamSettings::TimeshiftPlayer { player, .. } => {
                conf.insert(fields::TIMESHIFT_DIR.into(), json!(player.timeshift_dir));
                conf.insert(fields::TIMESHIFT_DELAY.into(), json!(player.timeshift_delay));
            }
            _ => {}
        }

        if self.kind.is_vod() {
            conf.insert(fields::CLEANUP_TS.into(), json!(true));
        }
        conf
    }

    fn hardware_config(&self, conf: &mut OutboundConfig, hardware: &HardwareSettings, settings: &NodeSettings) {
        conf.insert(fields::FEEDBACK_DIR.into(), json!(self.feedback_dir(settings)));
        conf.insert(fields::LOG_LEVEL.into(), json!(u8::from(hardware.log_level)));
        conf.insert(fields::AUTO_EXIT_TIME.into(), json!(hardware.auto_exit_time));
        conf.insert(fields::LOOP.into(), json!(hardware.loop_));
        conf.insert(fields::AVFORMAT.into(), json!(hardware.avformat));
        conf.insert(fields::HAVE_VIDEO.into(), json!(hardware.have_video));
        conf.insert(fields::HAVE_AUDIO.into(), json!(hardware.have_audio));
        conf.insert(fields::RESTART_ATTEMPTS.into(), json!(hardware.restart_attempts));
        conf.insert(
            fields::INPUT.into(),
            Value::Array(self.definition.input.iter().map(input_value).collect()),
        );
        if let Some(audio_select) = hardware.audio_select {
            conf.insert(fields::AUDIO_SELECT.into(), json!(audio_select));
        }

        if hardware.extra_config_fields.trim().is_empty() {
            return;
        }
        match serde_json::from_str::<Map<String, Value>>(&hardware.extra_config_fields) {
            Ok(extra) => conf.extend(extra),
            Err(e) => debug!(stream = %self.definition.id, "ignoring extra config fields: {}", e),
        }
    }

    fn recorder_config(&self, conf: &mut OutboundConfig, timeshift: &TimeshiftRecorderSettings, settings: &NodeSettings) {
        conf.insert(fields::TIMESHIFT_CHUNK_DURATION.into(), json!(timeshift.chunk_duration));
        conf.insert(fields::TIMESHIFT_CHUNK_LIFE_TIME.into(), json!(timeshift.chunk_life_time));
        conf.insert(fields::TIMESHIFT_DIR.into(), json!(self.timeshift_dir(settings)));
    }

    // ============ VUE FRONT ============

    /// Vue publiée aux abonnés (`stream_data_changed_*`)
    pub fn front_view(&self) -> Value {
        let def = &self.definition;
        let mut front = Map::new();
        front.insert(fields::NAME.into(), json!(def.name));
        front.insert(fields::ID.into(), json!(def.id));
        front.insert(fields::TYPE.into(), json!(self.kind.code()));
        front.insert(fields::ICON.into(), json!(def.tvg_logo));
        front.insert(fields::PRICE.into(), json!(def.price));
        front.insert(fields::VISIBLE.into(), json!(def.visible));
        front.insert(fields::IARC.into(), json!(def.iarc));
        front.insert(fields::GROUP.into(), json!(def.group));

        if self.kind.is_hardware() {
            let rt = &self.runtime;
            front.insert(fields::STATUS.into(), json!(u8::from(rt.status)));
            front.insert(fields::CPU.into(), json!(rt.cpu));
            front.insert(fields::TIMESTAMP.into(), json!(rt.timestamp));
            front.insert(fields::IDLE_TIME.into(), json!(rt.idle_time));
            front.insert(fields::RSS.into(), json!(rt.rss));
            front.insert(fields::LOOP_START_TIME.into(), json!(rt.loop_start_time));
            front.insert(fields::RESTARTS.into(), json!(rt.restarts));
            front.insert(fields::START_TIME.into(), json!(rt.start_time));
            front.insert(fields::INPUT_STREAMS.into(), rt.input_streams.clone());
            front.insert(fields::OUTPUT_STREAMS.into(), rt.output_streams.clone());
            front.insert(fields::QUALITY.into(), json!(rt.quality()));
        }

        if let Some(vod) = def.settings.vod() {
            let prime_date_ms = (vod.prime_date.unix_timestamp_nanos() / 1_000_000) as i64;
            front.insert(fields::DESCRIPTION.into(), json!(vod.description));
            front.insert(fields::TRAILER_URL.into(), json!(vod.trailer_url));
            front.insert(fields::USER_SCORE.into(), json!(vod.user_score));
            front.insert(fields::PRIME_DATE.into(), json!(prime_date_ms));
            front.insert(fields::COUNTRY.into(), json!(vod.country));
            front.insert(fields::DURATION.into(), json!(vod.duration));
        }

        Value::Object(front)
    }
}

fn relay_config(conf: &mut OutboundConfig, relay: &RelaySettings) {
    conf.insert(fields::VIDEO_PARSER.into(), json!(relay.video_parser));
    conf.insert(fields::AUDIO_PARSER.into(), json!(relay.audio_parser));
}

fn encode_config(conf: &mut OutboundConfig, encode: &EncodeSettings) {
    conf.insert(fields::RELAY_VIDEO.into(), json!(encode.relay_video));
    conf.insert(fields::RELAY_AUDIO.into(), json!(encode.relay_audio));
    conf.insert(fields::DEINTERLACE.into(), json!(encode.deinterlace));
    if let Some(frame_rate) = encode.frame_rate {
        conf.insert(fields::FRAME_RATE.into(), json!(frame_rate));
    }
    conf.insert(fields::VOLUME.into(), json!(encode.volume));
    conf.insert(fields::VIDEO_CODEC.into(), json!(encode.video_codec));
    conf.insert(fields::AUDIO_CODEC.into(), json!(encode.audio_codec));
    if let Some(channels) = encode.audio_channels {
        conf.insert(fields::AUDIO_CHANNELS.into(), json!(channels));
    }
    if encode.size.is_valid() {
        conf.insert(fields::SIZE.into(), json!(encode.size.to_string()));
    }
    if let Some(bitrate) = encode.video_bitrate {
        conf.insert(fields::VIDEO_BITRATE.into(), json!(bitrate));
    }
    if let Some(bitrate) = encode.audio_bitrate {
        conf.insert(fields::AUDIO_BITRATE.into(), json!(bitrate));
    }
    if encode.logo.is_valid() {
        conf.insert(fields::LOGO.into(), logo_value(&encode.logo));
    }
    if encode.rsvg_logo.is_valid() {
        conf.insert(fields::RSVG_LOGO.into(), logo_value(&encode.rsvg_logo));
    }
    if encode.aspect_ratio.is_valid() {
        conf.insert(fields::ASPECT_RATIO.into(), json!(encode.aspect_ratio.to_string()));
    }
}

fn input_value(input: &InputUrl) -> Value {
    json!({ "id": input.id, "uri": input.uri })
}

fn output_value(output: &OutputUrl) -> Value {
    let mut value = json!({
        "id": output.id,
        "uri": output.uri,
        "hls_type": u8::from(output.hls_type),
    });
    if let (Some(root), Some(obj)) = (&output.http_root, value.as_object_mut()) {
        obj.insert("http_root".into(), json!(root));
    }
    value
}

fn logo_value(logo: &Logo) -> Value {
    let mut value = json!({
        "path": logo.path,
        "position": format!("{},{}", logo.position.x, logo.position.y),
        "alpha": logo.alpha,
    });
    if let (true, Some(obj)) = (logo.size.is_valid(), value.as_object_mut()) {
        obj.insert("size".into(), json!(logo.size.to_string()));
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contracts::{Request, Response, StreamStatus};
    use crate::client::Transport;
    use crate::error::TransportError;
    use crate::models::{CatchupWindow, HostAndPort, Size};
    use parking_lot::Mutex;
    use std::sync::Arc;

    struct CountingTransport(Arc<Mutex<Vec<Request>>>);

    impl Transport for CountingTransport {
        fn connect(&mut self) {}
        fn disconnect(&mut self) {}
        fn is_connected(&self) -> bool {
            true
        }
        fn send(&mut self, request: &Request) -> Result<(), TransportError> {
            self.0.lock().push(request.clone());
            Ok(())
        }
        fn send_response(&mut self, _: &Response) -> Result<(), TransportError> {
            Ok(())
        }
    }

    fn client() -> (ServiceClient, Arc<Mutex<Vec<Request>>>) {
        let sent = Arc::new(Mutex::new(Vec::new()));
        (ServiceClient::new("n1", Box::new(CountingTransport(sent.clone()))), sent)
    }

    fn settings() -> NodeSettings {
        NodeSettings::new("edge", HostAndPort::new("10.0.0.5", 6317))
    }

    fn object(kind: StreamKind) -> StreamObject {
        StreamObject::wrap(StreamDefinition::template(kind)).unwrap()
    }

    fn stats_for(obj: &StreamObject, start_time: i64) -> StreamStatistics {
        StreamStatistics {
            id: obj.id().to_string(),
            kind: i64::from(obj.kind().code()),
            status: StreamStatus::Playing,
            cpu: 3.5,
            timestamp: start_time + 100,
            idle_time: 25,
            rss: 2048,
            loop_start_time: start_time,
            restarts: 1,
            start_time,
            input_streams: json!([]),
            output_streams: json!([]),
        }
    }

    #[test]
    fn test_config_always_carries_base_keys() {
        let settings = settings();
        for kind in StreamKind::ALL {
            let conf = object(kind).config(&settings);
            for key in [fields::ID, fields::TYPE, fields::OUTPUT] {
                assert!(conf.contains_key(key), "{kind:?} missing {key}");
            }
            assert_eq!(conf[fields::TYPE], json!(kind.code()));
            assert_eq!(conf.contains_key(fields::FEEDBACK_DIR), kind.is_hardware(), "{kind:?}");
        }
    }

    #[test]
    fn test_hardware_config_and_extra_fields() {
        let settings = settings();
        let mut def = StreamDefinition::template(StreamKind::Relay);
        if let Some(hw) = def.settings.hardware_mut() {
            hw.audio_select = Some(2);
            hw.extra_config_fields = r#"{"gpu_id": 1, "loop": true}"#.into();
        }
        let obj = StreamObject::wrap(def).unwrap();
        let conf = obj.config(&settings);
        assert_eq!(conf[fields::FEEDBACK_DIR], json!(format!("~/streamer/feedback/2/{}", obj.id())));
        assert_eq!(conf[fields::AUDIO_SELECT], json!(2));
        assert_eq!(conf["gpu_id"], json!(1));
        assert_eq!(conf[fields::LOOP], json!(true));
        assert_eq!(conf[fields::VIDEO_PARSER], json!("h264parse"));

        let mut broken = StreamDefinition::template(StreamKind::Relay);
        if let Some(hw) = broken.settings.hardware_mut() {
            hw.extra_config_fields = "{not json".into();
        }
        let conf = StreamObject::wrap(broken).unwrap().config(&settings);
        assert!(!conf.contains_key(fields::AUDIO_SELECT));
        assert_eq!(conf[fields::HAVE_VIDEO], json!(true));
    }

    #[test]
    fn test_encode_optional_keys() {
        let settings = settings();
        let plain = object(StreamKind::Encode).config(&settings);
        for key in [fields::FRAME_RATE, fields::AUDIO_CHANNELS, fields::SIZE, fields::VIDEO_BITRATE, fields::LOGO, fields::ASPECT_RATIO] {
            assert!(!plain.contains_key(key), "unexpected {key}");
        }

        let mut def = StreamDefinition::template(StreamKind::Encode);
        if let StreamSettings::Encode { encode, .. } = &mut def.settings {
            encode.frame_rate = Some(25);
            encode.size = Size { width: 1280, height: 720 };
            encode.logo.path = "file:///logo.png".into();
        }
        let conf = StreamObject::wrap(def).unwrap().config(&settings);
        assert_eq!(conf[fields::FRAME_RATE], json!(25));
        assert_eq!(conf[fields::SIZE], json!("1280x720"));
        assert_eq!(conf[fields::LOGO]["path"], json!("file:///logo.png"));
    }

    #[test]
    fn test_recorder_catchup_and_vod_config() {
        let settings = settings();
        let recorder = object(StreamKind::TimeshiftRecorder);
        let conf = recorder.config(&settings);
        assert_eq!(conf[fields::TIMESHIFT_DIR], json!(format!("~/streamer/timeshifts/{}", recorder.id())));
        assert_eq!(conf[fields::TIMESHIFT_CHUNK_DURATION], json!(120));

        let mut def = StreamDefinition::template(StreamKind::Catchup);
        let start = OffsetDateTime::from_unix_timestamp(1_700_000_000).unwrap();
        if let StreamSettings::Catchup { window, .. } = &mut def.settings {
            *window = CatchupWindow { start, stop: start + time::Duration::minutes(30) };
        }
        let catchup = StreamObject::wrap(def).unwrap();
        let conf = catchup.config(&settings);
        let oid = catchup.definition().output[0].id;
        assert_eq!(conf[fields::TIMESHIFT_DIR], json!(format!("~/streamer/hls/6/{}/{}", catchup.id(), oid)));
        assert_eq!(conf[fields::AUTO_EXIT_TIME], json!(1800));

        let event = object(StreamKind::Event).config(&settings);
        assert_eq!(event[fields::CLEANUP_TS], json!(true));
        assert_eq!(event[fields::LOOP], json!(false));
        assert!(!object(StreamKind::Relay).config(&settings).contains_key(fields::CLEANUP_TS));
    }

    #[test]
    fn test_mismatched_update_rejected_without_mutation() {
        let mut obj = object(StreamKind::Encode);
        let mut wrong_id = stats_for(&obj, 10);
        wrong_id.id = "other".into();
        assert!(obj.update_runtime_fields(&wrong_id).is_err());

        let mut wrong_kind = stats_for(&obj, 10);
        wrong_kind.kind = i64::from(StreamKind::Relay.code());
        assert!(matches!(obj.update_runtime_fields(&wrong_kind), Err(StreamError::Mismatch { .. })));
        assert_eq!(obj.runtime(), &RuntimeStats::default());

        obj.update_runtime_fields(&stats_for(&obj, 10)).unwrap();
        assert_eq!(obj.runtime().status, StreamStatus::Playing);
        assert_eq!(obj.runtime().quality(), 75.0);
        obj.reset();
        assert_eq!(obj.runtime().status, StreamStatus::New);
    }

    #[test]
    fn test_start_stop_preconditions() {
        let settings = settings();
        let (mut client, sent) = client();
        let mut obj = object(StreamKind::Relay);

        assert!(obj.stop_request(&mut client).is_none());
        assert!(obj.restart_request(&mut client).is_none());
        assert!(obj.start_request(&mut client, &settings).is_some());

        obj.update_runtime_fields(&stats_for(&obj, 10)).unwrap();
        assert!(obj.start_request(&mut client, &settings).is_none());
        assert!(obj.stop_request(&mut client).is_some());

        let methods: Vec<_> = sent.lock().iter().map(|r| r.method.clone()).collect();
        assert_eq!(methods, vec!["start_stream", "stop_stream"]);

        let proxy = object(StreamKind::Proxy);
        assert!(proxy.start_request(&mut client, &settings).is_none());
        assert!(proxy.stop_request(&mut client).is_none());
    }

    #[test]
    fn test_catchup_start_guard() {
        let settings = settings();
        let (mut client, sent) = client();
        let start = OffsetDateTime::from_unix_timestamp(1_700_000_000).unwrap();
        let stop = start + time::Duration::hours(1);
        let mut def = StreamDefinition::template(StreamKind::Catchup);
        if let StreamSettings::Catchup { window, .. } = &mut def.settings {
            *window = CatchupWindow { start, stop };
        }
        let catchup = StreamObject::wrap(def).unwrap();

        assert!(catchup.start_request_at(&mut client, &settings, start - time::Duration::seconds(1)).is_none());
        assert!(catchup.start_request_at(&mut client, &settings, stop).is_none());
        assert!(sent.lock().is_empty());

        assert!(catchup.start_request_at(&mut client, &settings, start).is_some());
        assert_eq!(sent.lock().len(), 1);
    }

    #[test]
    fn test_front_view_vod_metadata() {
        let mut def = StreamDefinition::template(StreamKind::VodRelay);
        if let StreamSettings::VodRelay { vod, .. } = &mut def.settings {
            vod.description = "Documentary".into();
            vod.prime_date = OffsetDateTime::from_unix_timestamp(1_000).unwrap();
        }
        let view = StreamObject::wrap(def).unwrap().front_view();
        assert_eq!(view[fields::DESCRIPTION], json!("Documentary"));
        assert_eq!(view[fields::PRIME_DATE], json!(1_000_000));
        assert_eq!(view[fields::QUALITY], json!(100.0));

        let proxy = object(StreamKind::Proxy).front_view();
        assert!(proxy.get(fields::STATUS).is_none());
    }

    #[test]
    fn test_generated_links_and_replace_definition() {
        let settings = settings();
        let mut obj = object(StreamKind::CodEncode);
        let link = obj.generate_cod_link(&settings, HlsType::Push, "master.m3u8", 5);
        assert_eq!(link.http_root, Some(format!("~/streamer/cods/11/{}/5", obj.id())));
        assert!(link.uri.starts_with("http://10.0.0.5:6001/fastocloud/cods/11/"));

        let mut renamed = obj.definition().clone();
        renamed.name = "renamed".into();
        assert!(obj.replace_definition(renamed));
        let mut other_kind = StreamDefinition::template(StreamKind::Relay);
        other_kind.id = obj.id().to_string();
        assert!(!obj.replace_definition(other_kind));
        assert_eq!(obj.definition().name, "renamed");
    }
}
