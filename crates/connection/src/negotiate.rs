/// Role negotiation: try the guest role first, fall back to claiming the
/// session identifier as host.
///
/// Both peers run this identical logic and converge into exactly one
/// host/guest pairing, because only one side can ever hold the identifier;
/// no external rendezvous decision is needed.
use std::time::Duration;

/// How long a guest attempt waits before falling back to the host role.
pub const GUEST_CONNECT_TIMEOUT: Duration = Duration::from_millis(3500);

/// Pause before renegotiating after a graceful close, so two peers tearing
/// down at once don't race each other straight back into a failed connect.
pub const RECONNECT_SETTLE_DELAY: Duration = Duration::from_millis(350);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Host,
    Guest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NegotiationState {
    AttemptGuest,
    AttemptHost,
    Connected(Role),
    Disconnected,
    Terminated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NegotiationEvent {
    GuestConnected,
    GuestTimedOut,
    IdentifierTaken,
    PeerArrived,
    PeerClosed,
    SettleElapsed,
    TransportFailed,
}

/// Closed transition function. Timing and I/O live in the manager; this is
/// the part that is unit-testable independent of real network behavior.
pub fn next_state(state: NegotiationState, event: NegotiationEvent) -> NegotiationState {
    use NegotiationEvent::*;
    use NegotiationState::*;

    match (state, event) {
        (AttemptGuest, GuestConnected) => Connected(Role::Guest),
        (AttemptGuest, GuestTimedOut) => AttemptHost,
        (AttemptHost, PeerArrived) => Connected(Role::Host),
        // a concurrent host won the race for the identifier
        (AttemptHost, IdentifierTaken) => AttemptGuest,
        (Connected(_), PeerClosed) => Disconnected,
        (Disconnected, SettleElapsed) => AttemptGuest,
        (_, TransportFailed) => Terminated,
        (state, _) => state,
    }
}
