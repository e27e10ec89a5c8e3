/// Connection lifecycle: drives role negotiation over a transport, exchanges
/// stream configs, stamps outbound commands and gates inbound ones.
use chrono::Utc;
use coordination::{Command, CommandGate, CommandKind, CoordinatorEvent, PeerId, VectorClock};
use timeline::StreamConfig;
use tokio::sync::{mpsc, watch};
use tokio::time;
use tracing::{debug, error, info, warn};

use crate::{
    next_state, Channel, ConnectionError, Envelope, NegotiationEvent, NegotiationState, Result,
    Role, SessionId, Transport, GUEST_CONNECT_TIMEOUT, RECONNECT_SETTLE_DELAY,
};

/// UI-facing link state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Negotiating,
    Connected { role: Role },
    Disconnected,
    Terminated,
}

/// How one served connection ended.
enum Served {
    PeerClosed,
    LocalShutdown,
}

pub struct ConnectionManager<T: Transport> {
    transport: T,
    session: SessionId,
    local_config: StreamConfig,
    events: mpsc::UnboundedSender<CoordinatorEvent>,
    outbound: mpsc::UnboundedReceiver<CommandKind>,
    status_tx: watch::Sender<ConnectionStatus>,
}

impl<T: Transport> ConnectionManager<T> {
    pub fn new(
        transport: T,
        session: SessionId,
        local_config: StreamConfig,
        events: mpsc::UnboundedSender<CoordinatorEvent>,
        outbound: mpsc::UnboundedReceiver<CommandKind>,
    ) -> (Self, watch::Receiver<ConnectionStatus>) {
        let (status_tx, status_rx) = watch::channel(ConnectionStatus::Negotiating);
        let manager = Self {
            transport,
            session,
            local_config,
            events,
            outbound,
            status_tx,
        };
        (manager, status_rx)
    }

    /// Establish, serve and re-establish the peer link until the local side
    /// shuts down or the transport fails ungracefully.
    pub async fn run(mut self) -> Result<()> {
        loop {
            let (mut channel, role) = self.negotiate().await?;
            self.status_tx
                .send_replace(ConnectionStatus::Connected { role });

            match self.serve(&mut channel).await {
                Ok(Served::LocalShutdown) => {
                    debug!("local side shut down, closing link");
                    return Ok(());
                }
                Ok(Served::PeerClosed) => {
                    info!(
                        "peer disconnected gracefully, renegotiating in {:?}",
                        RECONNECT_SETTLE_DELAY
                    );
                    self.status_tx.send_replace(ConnectionStatus::Disconnected);
                    time::sleep(RECONNECT_SETTLE_DELAY).await;
                }
                Err(e) => {
                    error!(error = %e, "peer link terminated");
                    self.status_tx.send_replace(ConnectionStatus::Terminated);
                    return Err(e);
                }
            }
        }
    }

    /// Walk the negotiation FSM until a channel is live. Only the transport
    /// outcomes feed it events, so the convergence logic stays identical on
    /// both peers.
    async fn negotiate(&mut self) -> Result<(T::Channel, Role)> {
        self.status_tx.send_replace(ConnectionStatus::Negotiating);
        let mut state = NegotiationState::AttemptGuest;

        loop {
            state = match state {
                NegotiationState::AttemptGuest => {
                    debug!(session = %self.session, "attempting guest connect");
                    match self
                        .transport
                        .connect(&self.session, GUEST_CONNECT_TIMEOUT)
                        .await
                    {
                        Ok(channel) => return Ok((channel, Role::Guest)),
                        Err(e) => {
                            debug!(error = %e, "guest attempt failed, trying host role");
                            next_state(state, NegotiationEvent::GuestTimedOut)
                        }
                    }
                }
                NegotiationState::AttemptHost => match self.transport.claim(&self.session).await {
                    Ok(channel) => return Ok((channel, Role::Host)),
                    Err(ConnectionError::IdentifierTaken) => {
                        debug!("identifier already claimed, returning to guest role");
                        next_state(state, NegotiationEvent::IdentifierTaken)
                    }
                    Err(e) => return Err(e),
                },
                // negotiate() only ever runs the two attempt states
                other => {
                    warn!(?other, "negotiation left its attempt states, restarting");
                    NegotiationState::AttemptGuest
                }
            };
        }
    }

    /// One connection's lifetime: fresh identity and causal state, config
    /// exchange, then the stamped/gated message loop.
    async fn serve(&mut self, channel: &mut T::Channel) -> Result<Served> {
        let local_id = PeerId::random();
        let mut clock = VectorClock::new();
        let mut gate = CommandGate::new();

        info!(peer_id = %local_id, "channel open, sending stream config");
        channel
            .send(Envelope::Config {
                config: self.local_config.clone(),
            })
            .await?;

        loop {
            tokio::select! {
                command = self.outbound.recv() => {
                    let Some(kind) = command else {
                        return Ok(Served::LocalShutdown);
                    };
                    let stamped = stamp(&mut clock, &local_id, kind);
                    if let Some(snapshot) = &stamped.clock {
                        if stamped.kind.initiates_intent() {
                            gate.record_applied(snapshot, &local_id);
                        }
                    }
                    channel.send(Envelope::Command { command: stamped }).await?;
                }
                inbound = channel.recv() => {
                    match inbound? {
                        None => return Ok(Served::PeerClosed),
                        Some(Envelope::Config { config }) => {
                            info!(stream = %config.stream_id, "received remote stream config");
                            self.forward(CoordinatorEvent::RemoteConfig(config));
                        }
                        Some(Envelope::Command { command }) => {
                            if let Some(incoming) = &command.clock {
                                clock.merge(incoming);
                            }
                            if gate.admit(&command) {
                                self.forward(CoordinatorEvent::Remote(command));
                            }
                        }
                    }
                }
            }
        }
    }

    fn forward(&self, event: CoordinatorEvent) {
        if self.events.send(event).is_err() {
            // the coordinator is gone; shutdown follows via the outbound side
            debug!("coordinator event channel closed");
        }
    }
}

/// Attach a fresh clock snapshot, the local identity and a send timestamp.
/// Every outbound command is stamped exactly once, at send time.
fn stamp(clock: &mut VectorClock, local_id: &PeerId, kind: CommandKind) -> Command {
    Command {
        kind,
        clock: Some(clock.tick(local_id)),
        sender_id: local_id.clone(),
        send_timestamp: Utc::now(),
    }
}
