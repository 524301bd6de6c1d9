//! Clés des payloads échangés avec les nœuds (config sortante, vue front)

pub const ID: &str = "id";
pub const TYPE: &str = "type";
pub const INPUT: &str = "input";
pub const OUTPUT: &str = "output";

pub const FEEDBACK_DIR: &str = "feedback_directory";
pub const LOG_LEVEL: &str = "log_level";
pub const AUTO_EXIT_TIME: &str = "auto_exit_time";
pub const LOOP: &str = "loop";
pub const AVFORMAT: &str = "avformat";
pub const HAVE_VIDEO: &str = "have_video";
pub const HAVE_AUDIO: &str = "have_audio";
pub const RESTART_ATTEMPTS: &str = "restart_attempts";
pub const AUDIO_SELECT: &str = "audio_select";

pub const VIDEO_PARSER: &str = "video_parser";
pub const AUDIO_PARSER: &str = "audio_parser";

pub const RELAY_VIDEO: &str = "relay_video";
pub const RELAY_AUDIO: &str = "relay_audio";
pub const DEINTERLACE: &str = "deinterlace";
pub const FRAME_RATE: &str = "frame_rate";
pub const VOLUME: &str = "volume";
pub const VIDEO_CODEC: &str = "video_codec";
pub const AUDIO_CODEC: &str = "audio_codec";
pub const AUDIO_CHANNELS: &str = "audio_channels";
pub const SIZE: &str = "size";
pub const VIDEO_BITRATE: &str = "video_bitrate";
pub const AUDIO_BITRATE: &str = "audio_bitrate";
pub const LOGO: &str = "logo";
pub const RSVG_LOGO: &str = "rsvg_logo";
pub const ASPECT_RATIO: &str = "aspect_ratio";

pub const TIMESHIFT_DIR: &str = "timeshift_dir";
pub const TIMESHIFT_DELAY: &str = "timeshift_delay";
pub const TIMESHIFT_CHUNK_DURATION: &str = "timeshift_chunk_duration";
pub const TIMESHIFT_CHUNK_LIFE_TIME: &str = "timeshift_chunk_life_time";

pub const CLEANUP_TS: &str = "cleanup_ts";

// Vue front
pub const NAME: &str = "name";
pub const ICON: &str = "icon";
pub const PRICE: &str = "price";
pub const VISIBLE: &str = "visible";
pub const IARC: &str = "iarc";
pub const GROUP: &str = "group";
pub const STATUS: &str = "status";
pub const CPU: &str = "cpu";
pub const TIMESTAMP: &str = "timestamp";
pub const IDLE_TIME: &str = "idle_time";
pub const RSS: &str = "rss";
pub const LOOP_START_TIME: &str = "loop_start_time";
pub const RESTARTS: &str = "restarts";
pub const START_TIME: &str = "start_time";
pub const INPUT_STREAMS: &str = "input_streams";
pub const OUTPUT_STREAMS: &str = "output_streams";
pub const QUALITY: &str = "quality";

pub const DESCRIPTION: &str = "description";
pub const TRAILER_URL: &str = "trailer_url";
pub const USER_SCORE: &str = "user_score";
pub const PRIME_DATE: &str = "prime_date";
pub const COUNTRY: &str = "country";
pub const DURATION: &str = "duration";
