/**
 * SORTIES GÉRÉES - Réécriture des URLs de sortie vers l'arborescence du nœud
 *
 * RÔLE :
 * Chaque famille de streams publie sous sa propre racine (hls, vods, cods).
 * Une sortie `http` déclarée par l'utilisateur devient
 * `{racine}/{kind}/{stream}/{sortie}/{playlist}` côté nœud, exposée par son
 * lien public.
 *
 * FONCTIONNEMENT :
 * - Seul le schéma `http` est réécrit, l'URL de test réservée jamais
 * - Réécrire une sortie déjà réécrite redonne la même sortie
 */

use tracing::debug;
use url::Url;

use crate::models::{
    HlsType, NodeSettings, OutputUrl, StreamDefinition, StreamKind, DEFAULT_HLS_PLAYLIST,
    DEFAULT_TEST_URL,
};

/// Racine sous laquelle une famille de streams publie ses sorties
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFamily {
    Http,
    Vod,
    Cod,
}

impl OutputFamily {
    /// `None` pour les kinds dont les sorties ne sont jamais réécrites
    pub fn of(kind: StreamKind) -> Option<Self> {
        match kind {
            StreamKind::Relay | StreamKind::Encode | StreamKind::TimeshiftPlayer => {
                Some(OutputFamily::Http)
            }
            StreamKind::VodRelay | StreamKind::VodEncode | StreamKind::Event => Some(OutputFamily::Vod),
            StreamKind::CodRelay | StreamKind::CodEncode => Some(OutputFamily::Cod),
            StreamKind::Proxy
            | StreamKind::ProxyVod
            | StreamKind::TimeshiftRecorder
            | StreamKind::Catchup
            | StreamKind::TestLife => None,
        }
    }

    fn directory(self, settings: &NodeSettings) -> &str {
        match self {
            OutputFamily::Http => &settings.hls_directory,
            OutputFamily::Vod => &settings.vods_directory,
            OutputFamily::Cod => &settings.cods_directory,
        }
    }

    fn public_link(self, settings: &NodeSettings, path: &str) -> String {
        match self {
            OutputFamily::Http => settings.generate_http_link(path),
            OutputFamily::Vod => settings.generate_vods_link(path),
            OutputFamily::Cod => settings.generate_cods_link(path),
        }
    }
}

/// `{racine famille}/{kind}/{stream}/{sortie}`
pub fn root_dir(
    family: OutputFamily,
    settings: &NodeSettings,
    kind: StreamKind,
    stream_id: &str,
    output_id: u64,
) -> String {
    format!("{}/{}/{}/{}", family.directory(settings), kind, stream_id, output_id)
}

/// Sortie gérée pointant sur `playlist` sous la racine de la famille
pub fn generate_link(
    family: OutputFamily,
    settings: &NodeSettings,
    kind: StreamKind,
    stream_id: &str,
    output_id: u64,
    hls_type: HlsType,
    playlist: &str,
) -> OutputUrl {
    let root = root_dir(family, settings, kind, stream_id, output_id);
    let link = format!("{root}/{playlist}");
    OutputUrl {
        id: output_id,
        uri: family.public_link(settings, &link),
        http_root: Some(root),
        hls_type,
    }
}

/// Réécrit en place les sorties `http` de la définition. Renvoie le nombre de sorties touchées.
pub fn fixup_output_urls(definition: &mut StreamDefinition, settings: &NodeSettings) -> usize {
    let Some(kind) = definition.kind() else {
        return 0;
    };
    let Some(family) = OutputFamily::of(kind) else {
        return 0;
    };

    let mut rewritten = 0;
    for output in definition.output.iter_mut() {
        if output.uri == DEFAULT_TEST_URL {
            continue;
        }
        let Some(playlist) = http_playlist_name(&output.uri) else {
            continue;
        };

        let fixed = generate_link(
            family,
            settings,
            kind,
            &definition.id,
            output.id,
            output.hls_type,
            &playlist,
        );
        if *output != fixed {
            debug!(stream = %definition.id, output = output.id, uri = %fixed.uri, "output rewritten");
            *output = fixed;
            rewritten += 1;
        }
    }
    rewritten
}

/// Nom de fichier d'une URL `http`, playlist par défaut si le chemin n'en porte pas
fn http_playlist_name(uri: &str) -> Option<String> {
    let parsed = Url::parse(uri).ok()?;
    if parsed.scheme() != "http" {
        return None;
    }
    let name = parsed
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|last| !last.is_empty())
        .unwrap_or(DEFAULT_HLS_PLAYLIST);
    Some(name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::HostAndPort;

    fn settings() -> NodeSettings {
        let mut settings = NodeSettings::new("edge", HostAndPort::new("10.0.0.5", 6317));
        settings.hls_directory = "/srv/hls".into();
        settings.vods_directory = "/srv/vods".into();
        settings.cods_directory = "/srv/cods".into();
        settings
    }

    fn with_output(kind: StreamKind, uri: &str) -> StreamDefinition {
        let mut def = StreamDefinition::template(kind);
        def.id = "abc".into();
        def.output = vec![OutputUrl { id: 7, uri: uri.into(), http_root: None, hls_type: HlsType::Pull }];
        def
    }

    #[test]
    fn test_relay_output_moves_under_hls_root() {
        let settings = settings();
        let mut def = with_output(StreamKind::Relay, "http://example.com/live/index.m3u8");
        assert_eq!(fixup_output_urls(&mut def, &settings), 1);
        assert_eq!(def.output[0].http_root.as_deref(), Some("/srv/hls/2/abc/7"));
        assert_eq!(def.output[0].uri, "http://10.0.0.5:8000/fastocloud/hls/2/abc/7/index.m3u8");
    }

    #[test]
    fn test_fixup_is_idempotent() {
        let settings = settings();
        let mut def = with_output(StreamKind::VodEncode, "http://example.com/movie/");
        fixup_output_urls(&mut def, &settings);
        let once = def.output.clone();
        assert_eq!(once[0].uri, "http://10.0.0.5:7000/fastocloud/vods/9/abc/7/master.m3u8");

        assert_eq!(fixup_output_urls(&mut def, &settings), 0);
        assert_eq!(def.output, once);
    }

    #[test]
    fn test_non_http_and_test_urls_untouched() {
        let settings = settings();
        let mut def = with_output(StreamKind::CodRelay, "rtmp://example.com/app/key");
        def.output.push(OutputUrl {
            id: 8,
            uri: DEFAULT_TEST_URL.into(),
            http_root: None,
            hls_type: HlsType::Pull,
        });
        def.output.push(OutputUrl {
            id: 9,
            uri: "http://example.com/cod/master.m3u8".into(),
            http_root: None,
            hls_type: HlsType::Push,
        });

        assert_eq!(fixup_output_urls(&mut def, &settings), 1);
        assert_eq!(def.output[0].uri, "rtmp://example.com/app/key");
        assert_eq!(def.output[1].uri, DEFAULT_TEST_URL);
        assert_eq!(def.output[2].uri, "http://10.0.0.5:6001/fastocloud/cods/10/abc/9/master.m3u8");
        assert_eq!(def.output[2].hls_type, HlsType::Push);
    }

    #[test]
    fn test_recorder_catchup_and_test_life_never_rewrite() {
        let settings = settings();
        for kind in [StreamKind::TimeshiftRecorder, StreamKind::Catchup, StreamKind::TestLife, StreamKind::Proxy] {
            let mut def = with_output(kind, "http://example.com/x/master.m3u8");
            assert_eq!(fixup_output_urls(&mut def, &settings), 0, "{kind:?}");
        }
    }
}
