/// Vector-clock ordering for commands from two senders without a shared
/// wall clock.
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

use crate::{Command, PeerId};

/// Per-peer counters. A peer only ever increments its own counter; merging
/// takes the pointwise maximum.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VectorClock {
    counters: HashMap<PeerId, u64>,
}

/// Outcome of comparing two clocks over the union of their keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockOrdering {
    Before,
    After,
    Concurrent,
}

impl VectorClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, peer: &PeerId) -> u64 {
        self.counters.get(peer).copied().unwrap_or(0)
    }

    /// Increment our own counter and return a snapshot for stamping an
    /// outgoing command.
    pub fn tick(&mut self, own: &PeerId) -> VectorClock {
        *self.counters.entry(own.clone()).or_insert(0) += 1;
        self.clone()
    }

    /// Pointwise maximum with an incoming clock.
    pub fn merge(&mut self, incoming: &VectorClock) {
        for (peer, &count) in &incoming.counters {
            let entry = self.counters.entry(peer.clone()).or_insert(0);
            *entry = (*entry).max(count);
        }
    }

    /// Componentwise comparison. `Before` iff every component is `<=` with
    /// at least one strictly less; symmetric for `After`. Identical clocks
    /// compare `Concurrent`; the sender-id tie-break decides those.
    pub fn compare(&self, other: &VectorClock) -> ClockOrdering {
        let peers: HashSet<_> = self.counters.keys().chain(other.counters.keys()).collect();

        let mut less = false;
        let mut greater = false;
        for peer in peers {
            let ours = self.get(peer);
            let theirs = other.get(peer);
            if ours < theirs {
                less = true;
            }
            if ours > theirs {
                greater = true;
            }
        }

        match (less, greater) {
            (true, false) => ClockOrdering::Before,
            (false, true) => ClockOrdering::After,
            _ => ClockOrdering::Concurrent,
        }
    }
}

/// Whether an incoming command supersedes the last applied one.
///
/// Accepts when nothing has been applied yet or the incoming clock dominates.
/// A causally older command is rejected outright. Concurrent commands break
/// the tie on the lexicographically smaller sender id, which both peers
/// resolve identically regardless of arrival order.
pub fn should_accept(
    incoming: &VectorClock,
    sender: &PeerId,
    last_applied: Option<(&VectorClock, &PeerId)>,
) -> bool {
    let Some((applied_clock, applied_sender)) = last_applied else {
        return true;
    };

    match incoming.compare(applied_clock) {
        ClockOrdering::After => true,
        ClockOrdering::Before => false,
        ClockOrdering::Concurrent => sender < applied_sender,
    }
}

/// Admission check applied to every inbound command before the coordinator
/// sees it. Locally sent intent commands are recorded here as applied too,
/// so the concurrent tie-break is symmetric on both peers.
#[derive(Debug, Default)]
pub struct CommandGate {
    last_applied: Option<(VectorClock, PeerId)>,
}

impl CommandGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decide whether a received command may be applied, and if so record it
    /// as the new last-applied command.
    ///
    /// Rendezvous replies (`playReady`, `playNotReady`, `seekComplete`) pass
    /// through without updating the applied clock: they resolve an intent
    /// rather than compete with one, and the coordinator already ignores
    /// them unless a matching intent is pending.
    pub fn admit(&mut self, command: &Command) -> bool {
        let Some(clock) = &command.clock else {
            warn!(sender = %command.sender_id, "dropping unorderable command without clock");
            return false;
        };

        if !command.kind.initiates_intent() {
            return true;
        }

        let last = self.last_applied.as_ref().map(|(c, p)| (c, p));
        if should_accept(clock, &command.sender_id, last) {
            self.record_applied(clock, &command.sender_id);
            true
        } else {
            debug!(sender = %command.sender_id, kind = ?command.kind, "dropping causally stale command");
            false
        }
    }

    pub fn record_applied(&mut self, clock: &VectorClock, sender: &PeerId) {
        self.last_applied = Some((clock.clone(), sender.clone()));
    }

    pub fn reset(&mut self) {
        self.last_applied = None;
    }
}
