//! Maps OBS response payloads to metric lines and serializes them.

use serde::Deserialize;
use serde_json::Value;

use crate::error::{ExporterError, Result};
use crate::types::{MetricLine, StatsSnapshot, StreamStatusSnapshot};
use crate::ws::Snapshots;

impl StatsSnapshot {
    pub fn decode(payload: &Value) -> Result<Self> {
        Self::deserialize(payload)
            .map_err(|e| ExporterError::mapping(format!("GetStats response: {e}")))
    }

    pub fn metric_lines(&self) -> Vec<MetricLine> {
        vec![
            // Current FPS being rendered
            MetricLine::new("obs_active_fps", &self.active_fps),
            // Bytes free on the recording drive
            MetricLine::new("obs_available_disk_space", &self.available_disk_space),
            // Milliseconds
            MetricLine::new("obs_average_frame_render_time", &self.average_frame_render_time),
            // Percent
            MetricLine::new("obs_cpu_usage", &self.cpu_usage),
            MetricLine::new("obs_memory_usage", &self.memory_usage),
            // Output thread
            MetricLine::new("obs_output_skipped_frames", self.output_skipped_frames),
            MetricLine::new("obs_output_total_frames", self.output_total_frames),
            // Render thread
            MetricLine::new("obs_render_skipped_frames", self.render_skipped_frames),
            MetricLine::new("obs_render_total_frames", self.render_total_frames),
            // Counted over the current websocket session, i.e. this scrape
            MetricLine::new(
                "obs_websocket_session_incoming_messages",
                self.web_socket_session_incoming_messages,
            ),
            MetricLine::new(
                "obs_websocket_session_outgoing_messages",
                self.web_socket_session_outgoing_messages,
            ),
        ]
    }
}

impl StreamStatusSnapshot {
    pub fn decode(payload: &Value) -> Result<Self> {
        Self::deserialize(payload)
            .map_err(|e| ExporterError::mapping(format!("GetStreamStatus response: {e}")))
    }

    pub fn metric_lines(&self) -> Vec<MetricLine> {
        vec![
            MetricLine::new("obs_stream_status_output_active", u8::from(self.output_active)),
            MetricLine::new("obs_stream_status_output_bytes", self.output_bytes),
            MetricLine::new("obs_stream_status_output_congestion", &self.output_congestion),
            // Milliseconds
            MetricLine::new("obs_stream_status_output_duration", self.output_duration),
            MetricLine::new("obs_stream_status_output_skipped_frames", self.output_skipped_frames),
            MetricLine::new("obs_stream_status_output_total_frames", self.output_total_frames),
        ]
    }
}

/// Decode a `GetStats` payload and map it. Nothing is emitted if decoding fails.
pub fn map_stats(payload: &Value) -> Result<Vec<MetricLine>> {
    Ok(StatsSnapshot::decode(payload)?.metric_lines())
}

/// Decode a `GetStreamStatus` payload and map it.
pub fn map_stream_status(payload: &Value) -> Result<Vec<MetricLine>> {
    Ok(StreamStatusSnapshot::decode(payload)?.metric_lines())
}

/// One `name value` per line, each terminated by `\n`.
pub fn serialize(lines: &[MetricLine]) -> String {
    let mut out = String::with_capacity(lines.len() * 48);
    for line in lines {
        out.push_str(line.name);
        out.push(' ');
        out.push_str(&line.value);
        out.push('\n');
    }
    out
}

/// Stats block followed by the stream-status block.
pub fn render(snapshots: &Snapshots) -> Result<String> {
    let stats = map_stats(&snapshots.stats)?;
    let stream = map_stream_status(&snapshots.stream_status)?;
    let mut body = serialize(&stats);
    body.push_str(&serialize(&stream));
    Ok(body)
}
