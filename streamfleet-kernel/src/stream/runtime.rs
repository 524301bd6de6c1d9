use serde::Serialize;
use serde_json::Value;

use crate::contracts::{StreamStatistics, StreamStatus};

/// Champs vivants d'un stream, jamais persistés.
/// `start_time == 0` signifie « pas encore démarré ».
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuntimeStats {
    pub status: StreamStatus,
    pub cpu: f64,
    pub timestamp: i64,
    pub idle_time: i64,
    pub rss: u64,
    pub loop_start_time: i64,
    pub restarts: u32,
    pub start_time: i64,
    pub input_streams: Value,
    pub output_streams: Value,
}

impl Default for RuntimeStats {
    fn default() -> Self {
        Self {
            status: StreamStatus::New,
            cpu: 0.0,
            timestamp: 0,
            idle_time: 0,
            rss: 0,
            loop_start_time: 0,
            restarts: 0,
            start_time: 0,
            input_streams: Value::Null,
            output_streams: Value::Null,
        }
    }
}

impl RuntimeStats {
    pub fn is_started(&self) -> bool {
        self.start_time != 0
    }

    /// Écrase tous les champs ; l'appelant a déjà vérifié identité et kind
    pub fn apply(&mut self, stats: &StreamStatistics) {
        self.status = stats.status;
        self.cpu = stats.cpu;
        self.timestamp = stats.timestamp;
        self.idle_time = stats.idle_time;
        self.rss = stats.rss;
        self.loop_start_time = stats.loop_start_time;
        self.restarts = stats.restarts;
        self.start_time = stats.start_time;
        self.input_streams = stats.input_streams.clone();
        self.output_streams = stats.output_streams.clone();
    }

    /// `100 - 100 * idle / (timestamp - start_time)`, 100 quand la durée est nulle
    pub fn quality(&self) -> f64 {
        let work_time = self.timestamp - self.start_time;
        if work_time == 0 {
            return 100.0;
        }
        100.0 - (100.0 * self.idle_time as f64 / work_time as f64)
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
