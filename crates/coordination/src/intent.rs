/// The single in-flight coordination operation and the sync state derived
/// from it.
use serde::{Deserialize, Serialize};

use crate::{AudioTrack, VectorClock};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntentKind {
    None,
    Play,
    Pause,
    Seek,
    AudioChange,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Initiator {
    Local,
    Remote,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntentStatus {
    Idle,
    Coordinating,
    Waiting,
    Buffering,
    Complete,
}

/// What the engine is currently resolving. At most one non-idle intent
/// exists; starting a new one unconditionally replaces the old. There is no
/// queue and no merge, superseding is implicit and total.
#[derive(Debug, Clone, PartialEq)]
pub struct Intent {
    pub kind: IntentKind,
    pub initiator: Initiator,
    pub target_playhead: Option<f64>,
    pub track: Option<AudioTrack>,
    pub clock_stamp: Option<VectorClock>,
    pub status: IntentStatus,
}

impl Intent {
    pub fn idle() -> Self {
        Self {
            kind: IntentKind::None,
            initiator: Initiator::Local,
            target_playhead: None,
            track: None,
            clock_stamp: None,
            status: IntentStatus::Idle,
        }
    }

    pub fn new(kind: IntentKind, initiator: Initiator, status: IntentStatus) -> Self {
        Self {
            kind,
            initiator,
            target_playhead: None,
            track: None,
            clock_stamp: None,
            status,
        }
    }

    pub fn with_target(mut self, playhead: f64) -> Self {
        self.target_playhead = Some(playhead);
        self
    }

    pub fn with_track(mut self, track: AudioTrack) -> Self {
        self.track = Some(track);
        self
    }

    pub fn with_clock(mut self, clock: Option<VectorClock>) -> Self {
        self.clock_stamp = clock;
        self
    }

    pub fn is_idle(&self) -> bool {
        self.kind == IntentKind::None && self.status == IntentStatus::Idle
    }

    /// Still coordinating with the peer, i.e. not yet resolved either way.
    pub fn is_pending(&self) -> bool {
        matches!(
            self.status,
            IntentStatus::Coordinating | IntentStatus::Waiting
        )
    }

    /// Deterministic mapping from intent kind and status to the UI-facing
    /// sync state.
    pub fn sync_state(&self) -> SyncState {
        use IntentKind::*;
        use IntentStatus::*;

        match (self.kind, self.status) {
            (_, Buffering) => SyncState::Buffering,
            (Play, Coordinating | Waiting) => SyncState::PendingPlay,
            (Play, _) => SyncState::Playing,
            (Seek, Coordinating | Waiting) => SyncState::PendingSeek,
            // a settled seek leaves playback paused until play is re-issued,
            // and an audio switch on its own never starts playback
            (None | Pause | Seek | AudioChange, _) => SyncState::Paused,
        }
    }
}

impl Default for Intent {
    fn default() -> Self {
        Self::idle()
    }
}

/// Derived, read-only playback state both peers converge on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SyncState {
    Paused,
    Playing,
    Buffering,
    PendingPlay,
    PendingSeek,
}
