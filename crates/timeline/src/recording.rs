/// Start-instant extraction from capture-software file names.
///
/// Instant-replay captures carry their wall-clock start in the file name
/// (`<title> YYYY.MM.DD - HH.MM.SS.mmm.mp4`, with a 2- or 3-digit
/// millisecond field depending on the capture version). That timestamp is
/// what anchors a recording on the unified timeline.
use chrono::{DateTime, NaiveDate, Utc};
use regex::Regex;
use std::sync::OnceLock;

use crate::{Result, StreamConfig, TimelineError};

fn filename_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"(?P<year>\d{4})\.(?P<month>\d{2})\.(?P<day>\d{2}) - (?P<hour>\d{2})\.(?P<minute>\d{2})\.(?P<second>\d{2})\.(?P<millis>\d{2,3})\.mp4$",
        )
        .expect("recording filename pattern is valid")
    })
}

/// Extract the recording's wall-clock start from its file name.
/// Returns `None` for names that do not follow the capture convention.
pub fn recording_timestamp(file_name: &str) -> Option<DateTime<Utc>> {
    let captures = filename_pattern().captures(file_name)?;
    let field = |name: &str| captures.name(name)?.as_str().parse::<u32>().ok();

    let millis_raw = captures.name("millis")?.as_str();
    let mut millis = millis_raw.parse::<u32>().ok()?;
    if millis_raw.len() == 2 {
        // older capture versions write centiseconds
        millis *= 10;
    }

    let date = NaiveDate::from_ymd_opt(field("year")? as i32, field("month")?, field("day")?)?;
    let time = date.and_hms_milli_opt(field("hour")?, field("minute")?, field("second")?, millis)?;
    Some(time.and_utc())
}

/// Pick the most recent recognizable recording from a set of file names.
/// The session always shares the newest capture.
pub fn latest_recording<'a, I>(names: I) -> Option<(&'a str, DateTime<Utc>)>
where
    I: IntoIterator<Item = &'a str>,
{
    names
        .into_iter()
        .filter_map(|name| recording_timestamp(name).map(|ts| (name, ts)))
        .max_by_key(|(_, ts)| *ts)
}

impl StreamConfig {
    /// Build a handshake config for a recognized recording file.
    pub fn for_recording(stream_id: impl Into<String>, file_name: &str) -> Result<Self> {
        let timestamp = recording_timestamp(file_name).ok_or_else(|| {
            TimelineError::InvalidConfig(format!(
                "file name {file_name:?} carries no recognizable start timestamp"
            ))
        })?;
        Ok(Self::new(stream_id, timestamp.to_rfc3339()))
    }
}
