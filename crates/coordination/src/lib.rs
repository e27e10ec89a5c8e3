/// Intent-driven playback synchronization between two peers.
/// Causal command ordering, the single in-flight intent state machine, and
/// the coordinator loop that drives the playback engine.
use serde::{Deserialize, Serialize};
use thiserror::Error;

mod clock;
pub use clock::*;

mod command;
pub use command::*;

mod playback;
pub use playback::*;

mod intent;
pub use intent::*;

mod coordinator;
pub use coordinator::*;

#[derive(Debug, Error)]
pub enum CoordinationError {
    #[error("playback engine error: {0}")]
    Playback(String),

    #[error(transparent)]
    Timeline(#[from] timeline::TimelineError),
}

pub type Result<T> = std::result::Result<T, CoordinationError>;

/// Peer identity, valid for one connection's lifetime. A fresh identity is
/// generated per connection so a reconnect also resets causal state.
///
/// Kept as a string rather than a raw UUID: the concurrent-command tie-break
/// is lexicographic on exactly the bytes both peers see on the wire.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PeerId(pub String);

impl PeerId {
    pub fn random() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string())
    }
}

impl std::fmt::Display for PeerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for PeerId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}
