/**
 * MODÈLE DE DONNÉES - Réglages de nœud et définitions de streams persistées
 *
 * RÔLE : Types sérialisés dans le catalogue. Une définition de stream est
 * l'enregistrement faisant autorité ; les objets runtime (`crate::stream`)
 * ne font que l'envelopper.
 */

mod node;
mod stream;

pub use node::{HostAndPort, NodeId, NodeSettings};
pub use stream::{
    CatchupWindow, EncodeSettings, HardwareSettings, HlsType, InputUrl, LogLevel, Logo,
    OutputUrl, Point, Rational, RelaySettings, Size, StreamDefinition, StreamId, StreamKind,
    StreamSettings, TimeshiftPlayerSettings, TimeshiftRecorderSettings, VodMeta,
    DEFAULT_HLS_PLAYLIST, DEFAULT_TEST_URL,
};
