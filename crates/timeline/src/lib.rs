/// Unified-timeline math for two independently-recorded streams of the same
/// real-world event. Each peer's recording starts at a different wall-clock
/// instant; this crate maps both local media timelines into one shared
/// coordinate space.
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

mod recording;
pub use recording::*;
mod unified;
pub use unified::*;

#[derive(Debug, Error)]
pub enum TimelineError {
    #[error("invalid stream config: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, TimelineError>;

/// Which of the two recordings a media time refers to, from this peer's
/// point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Local,
    Remote,
}

/// Stream configuration exchanged during the connection handshake.
///
/// `start_timestamp` is the absolute wall-clock instant the recording began,
/// as an ISO-8601 string. It is kept as a string on the wire and parsed on
/// demand so a malformed value surfaces as `InvalidConfig` at unification
/// time rather than as a transport decode failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamConfig {
    #[serde(rename = "streamId")]
    pub stream_id: String,

    #[serde(rename = "startTimestamp")]
    pub start_timestamp: String,

    #[serde(rename = "durationHint", skip_serializing_if = "Option::is_none", default)]
    pub duration_hint: Option<f64>,
}

impl StreamConfig {
    pub fn new(stream_id: impl Into<String>, start_timestamp: impl Into<String>) -> Self {
        Self {
            stream_id: stream_id.into(),
            start_timestamp: start_timestamp.into(),
            duration_hint: None,
        }
    }

    pub fn with_duration_hint(mut self, seconds: f64) -> Self {
        self.duration_hint = Some(seconds);
        self
    }

    /// Parse the configured start timestamp.
    ///
    /// Accepts RFC 3339 as well as the offset-less ISO form some capture
    /// backends emit (`2022-03-12T21:35:40.123`), which is taken as UTC.
    pub fn start_instant(&self) -> Result<DateTime<Utc>> {
        if self.stream_id.is_empty() {
            return Err(TimelineError::InvalidConfig("empty stream id".to_string()));
        }

        if let Ok(ts) = DateTime::parse_from_rfc3339(&self.start_timestamp) {
            return Ok(ts.with_timezone(&Utc));
        }

        NaiveDateTime::parse_from_str(&self.start_timestamp, "%Y-%m-%dT%H:%M:%S%.f")
            .map(|naive| naive.and_utc())
            .map_err(|e| {
                TimelineError::InvalidConfig(format!(
                    "unparsable start timestamp {:?}: {}",
                    self.start_timestamp, e
                ))
            })
    }
}

/// A stream whose media metadata has loaded: the handshake config plus the
/// duration the playback engine reported for it.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamSource {
    pub config: StreamConfig,
    pub duration: f64,
}

impl StreamSource {
    /// Couple a config with the engine-reported duration, falling back to
    /// the config's own hint when the engine has none.
    pub fn from_metadata(config: StreamConfig, reported_duration: Option<f64>) -> Self {
        let duration = reported_duration
            .filter(|d| *d > 0.0)
            .or(config.duration_hint)
            .unwrap_or(0.0);
        Self { config, duration }
    }
}
