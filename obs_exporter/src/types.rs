//! Typed views of the two OBS responses, and the metric line they map to.
//! Field names follow the obs-websocket v5 JSON schema.

use std::fmt;

use serde::Deserialize;
use serde_json::Number;

/// `GetStats` response data.
///
/// Float fields keep the `Number` as received so `60.0` renders as `60.0`
/// and `107374182400` as `107374182400`.
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StatsSnapshot {
    pub active_fps: Number,
    pub available_disk_space: Number,
    pub average_frame_render_time: Number,
    pub cpu_usage: Number,
    pub memory_usage: Number,
    pub output_skipped_frames: u64,
    pub output_total_frames: u64,
    pub render_skipped_frames: u64,
    pub render_total_frames: u64,
    pub web_socket_session_incoming_messages: u64,
    pub web_socket_session_outgoing_messages: u64,
}

/// `GetStreamStatus` response data.
// outputReconnecting and outputTimecode are present upstream but not exported.
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StreamStatusSnapshot {
    pub output_active: bool,
    pub output_bytes: u64,
    pub output_congestion: Number,
    pub output_duration: u64,
    pub output_skipped_frames: u64,
    pub output_total_frames: u64,
}

/// One `name value` pair of the exposition text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricLine {
    pub name: &'static str,
    pub value: String,
}

impl MetricLine {
    pub fn new(name: &'static str, value: impl fmt::Display) -> Self {
        Self {
            name,
            value: value.to_string(),
        }
    }
}

impl fmt::Display for MetricLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.name, self.value)
    }
}
