/// Peer link establishment and the causally-gated command channel.
/// Role negotiation, stream-config exchange, command stamping and
/// reconnection policy live here; the sync semantics live in `coordination`.
use serde::{Deserialize, Serialize};
use thiserror::Error;

mod wire;
pub use wire::*;

mod negotiate;
pub use negotiate::*;

mod transport;
pub use transport::*;

mod ws;
pub use ws::*;

mod manager;
pub use manager::*;

#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("guest connect timed out after {0:?}")]
    ConnectionTimeout(std::time::Duration),

    #[error("session identifier already claimed")]
    IdentifierTaken,

    #[error("peer link terminated: {0}")]
    PeerTerminated(String),

    #[error("malformed message: {0}")]
    InvalidMessage(#[from] serde_json::Error),

    #[error("invalid session identifier: {0}")]
    InvalidSession(String),

    #[error("transport error: {0}")]
    Transport(String),
}

pub type Result<T> = std::result::Result<T, ConnectionError>;

/// The well-known rendezvous identifier both parties share for one session.
/// Whoever successfully claims it becomes the host; the other side connects
/// to it as the guest.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}
