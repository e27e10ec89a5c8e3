/// The closed cross-peer command vocabulary.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{PeerId, VectorClock};

/// Audio routing. Peer-relative: each side's `local` track is the other
/// side's `remote` track, so a received audio command applies flipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioTrack {
    Local,
    Remote,
}

impl AudioTrack {
    pub fn flipped(self) -> Self {
        match self {
            AudioTrack::Local => AudioTrack::Remote,
            AudioTrack::Remote => AudioTrack::Local,
        }
    }
}

/// Every command a peer can send. Playheads are unified-timeline seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum CommandKind {
    #[serde(rename = "playIntent")]
    PlayIntent { playhead: f64 },

    #[serde(rename = "playReady")]
    PlayReady { playhead: f64 },

    #[serde(rename = "playNotReady")]
    PlayNotReady,

    #[serde(rename = "pauseIntent")]
    PauseIntent { playhead: f64 },

    #[serde(rename = "seekIntent")]
    SeekIntent { playhead: f64 },

    #[serde(rename = "seekComplete")]
    SeekComplete { playhead: f64 },

    #[serde(rename = "audioChange")]
    AudioChange { track: AudioTrack },
}

impl CommandKind {
    /// Whether this command initiates a new intent, as opposed to replying
    /// within one. Only intent commands compete in conflict resolution;
    /// replies are guarded by the intent state machine, which ignores them
    /// unless a matching intent is pending.
    pub fn initiates_intent(&self) -> bool {
        matches!(
            self,
            CommandKind::PlayIntent { .. }
                | CommandKind::PauseIntent { .. }
                | CommandKind::SeekIntent { .. }
                | CommandKind::AudioChange { .. }
        )
    }
}

/// A stamped command as it travels over the peer channel. Stamping happens
/// in the connection layer at send time; received copies are immutable.
///
/// `clock` stays optional on the wire: a command that arrives without one is
/// unorderable and gets dropped by the gate, never applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    #[serde(flatten)]
    pub kind: CommandKind,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub clock: Option<VectorClock>,

    #[serde(rename = "senderId")]
    pub sender_id: PeerId,

    #[serde(rename = "sendTimestamp")]
    pub send_timestamp: DateTime<Utc>,
}
