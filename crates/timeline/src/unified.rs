/// The shared coordinate space spanning both recordings.
use serde::{Deserialize, Serialize};

use crate::{Result, Source, StreamSource};

/// Both recordings mapped onto one axis. Position 0 is the start of the
/// earlier recording; `timeline_end` is the latest instant either recording
/// still has footage for. Derived once both sources have loaded media
/// metadata, immutable for the rest of the session.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UnifiedTimeline {
    start_local: f64,
    start_remote: f64,
    duration_local: f64,
    duration_remote: f64,
    timeline_start: f64,
    timeline_end: f64,
}

impl UnifiedTimeline {
    /// Build the unified timeline from the two handshaked sources.
    pub fn unify(local: &StreamSource, remote: &StreamSource) -> Result<Self> {
        let start_local = epoch_seconds(local)?;
        let start_remote = epoch_seconds(remote)?;
        let duration_local = local.duration.max(0.0);
        let duration_remote = remote.duration.max(0.0);

        let timeline_start = start_local.min(start_remote);
        let timeline_end =
            (start_local + duration_local).max(start_remote + duration_remote);

        Ok(Self {
            start_local,
            start_remote,
            duration_local,
            duration_remote,
            timeline_start,
            timeline_end,
        })
    }

    fn source_start(&self, source: Source) -> f64 {
        match source {
            Source::Local => self.start_local,
            Source::Remote => self.start_remote,
        }
    }

    pub fn source_duration(&self, source: Source) -> f64 {
        match source {
            Source::Local => self.duration_local,
            Source::Remote => self.duration_remote,
        }
    }

    pub fn total_duration(&self) -> f64 {
        self.timeline_end - self.timeline_start
    }

    /// First unified position at which both recordings have footage.
    pub fn first_shared_frame(&self) -> f64 {
        self.start_local.max(self.start_remote) - self.timeline_start
    }

    /// Map a source-local media time onto the unified axis.
    pub fn to_unified(&self, local_time: f64, source: Source) -> f64 {
        (self.source_start(source) + local_time) - self.timeline_start
    }

    /// Map a unified position back into a source's local media time.
    ///
    /// Exact inverse of [`to_unified`](Self::to_unified); performs no
    /// clamping. Callers that hand the result to a decoder clamp it with
    /// [`clamp_local`](Self::clamp_local).
    pub fn to_local(&self, unified_time: f64, target: Source) -> f64 {
        (self.timeline_start + unified_time) - self.source_start(target)
    }

    pub fn clamp_local(&self, local_time: f64, source: Source) -> f64 {
        local_time.clamp(0.0, self.source_duration(source))
    }

    pub fn clamp_unified(&self, unified_time: f64) -> f64 {
        unified_time.clamp(0.0, self.total_duration())
    }
}

fn epoch_seconds(source: &StreamSource) -> Result<f64> {
    Ok(source.config.start_instant()?.timestamp_millis() as f64 / 1000.0)
}
