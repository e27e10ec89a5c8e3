/// The message-delivery contract role negotiation runs over.
///
/// Anything that can connect by identifier, move structured messages, and
/// distinguish a graceful close from an error close can back a session:
/// the production implementation is [`WsTransport`](crate::WsTransport),
/// tests use an in-memory pair.
use async_trait::async_trait;
use std::time::Duration;

use crate::{Envelope, Result, SessionId};

#[async_trait]
pub trait Channel: Send {
    async fn send(&mut self, envelope: Envelope) -> Result<()>;

    /// `Ok(None)` is a graceful close by the peer; `Err` is an ungraceful
    /// termination of the link.
    async fn recv(&mut self) -> Result<Option<Envelope>>;
}

#[async_trait]
pub trait Transport: Send + Sync {
    type Channel: Channel;

    /// Guest side: dial the well-known identifier, bounded by `timeout`.
    async fn connect(&self, session: &SessionId, timeout: Duration) -> Result<Self::Channel>;

    /// Host side: claim the identifier and wait for the peer to arrive.
    /// Fails with `IdentifierTaken` when a concurrent host won the race.
    async fn claim(&self, session: &SessionId) -> Result<Self::Channel>;
}
