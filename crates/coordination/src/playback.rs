/// Playback Engine collaborator contract.
///
/// Frame rendering, HLS manifests and buffer management live outside this
/// crate. The coordinator owns the engine exclusively; UI layers never call
/// it directly, only through [`UserIntent`](crate::UserIntent) values.
use timeline::Source;

use crate::{AudioTrack, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackStatus {
    Paused,
    Ready,
    Playing,
}

/// Engine-reported position, in unified-timeline seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaybackState {
    pub status: PlaybackStatus,
    pub playhead: f64,
    pub duration: f64,
}

pub trait PlaybackEngine: Send {
    fn play(&mut self) -> Result<()>;
    fn pause(&mut self) -> Result<()>;
    fn seek(&mut self, unified_time: f64) -> Result<()>;
    fn switch_audio(&mut self, track: AudioTrack) -> Result<()>;
    fn state(&self) -> PlaybackState;

    /// True readiness verified against actual buffered ranges, beyond the
    /// coarse status flag.
    fn is_actually_ready(&self) -> bool;
}

/// Notifications the engine feeds back into the coordinator's event queue.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    StateChanged(PlaybackStatus),
    BufferingStarted { sources: Vec<Source> },
    BufferingComplete,
    /// Both media sources have loaded metadata; durations are in seconds.
    PlayersReady {
        local_duration: f64,
        remote_duration: f64,
    },
}
