/// The synchronization engine. Owns the intent, the unified timeline and the
/// playback engine, and turns local intents, remote commands and engine
/// feedback into one coherent playback state for both peers.
///
/// All state transitions happen on one event queue, processed one event to
/// completion at a time, so no two intent mutations can race.
use std::time::Duration;

use timeline::{StreamConfig, StreamSource, UnifiedTimeline};
use tokio::sync::{mpsc, watch};
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::{
    AudioTrack, Command, CommandKind, EngineEvent, Initiator, Intent, IntentKind, IntentStatus,
    PlaybackEngine, PlaybackState, PlaybackStatus, Result, SyncState,
};

/// Playhead divergence beyond which a remote pause triggers a corrective
/// re-seek.
pub const OUT_OF_SYNC_THRESHOLD: f64 = 0.5;

/// How close a settled playhead must be to a seek target to count as arrived.
pub const SEEK_SETTLE_TOLERANCE: f64 = 0.1;

/// How long a play intent may sit waiting on peer readiness before it fails
/// back to idle.
pub const PLAY_READY_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Cadence of the in-flight seek settle re-check. The engine's own events
/// remain the primary signal; this bounds the wait instead of blocking on it.
pub const SETTLE_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// A user action arriving from the UI layer.
#[derive(Debug, Clone, PartialEq)]
pub enum UserIntent {
    Play,
    Pause,
    Seek { target: f64 },
    Audio { track: AudioTrack },
}

/// Everything the coordinator reacts to, delivered through one queue.
#[derive(Debug)]
pub enum CoordinatorEvent {
    /// A local user action.
    Local(UserIntent),
    /// A remote command that already passed the causal acceptance gate.
    Remote(Command),
    /// Playback engine feedback.
    Engine(EngineEvent),
    /// The peer's stream config, surfaced by the connection layer.
    RemoteConfig(StreamConfig),
}

pub struct IntentCoordinator<P: PlaybackEngine> {
    playback: P,
    intent: Intent,
    timeline: Option<UnifiedTimeline>,
    local_config: StreamConfig,
    remote_config: Option<StreamConfig>,
    durations: Option<(f64, f64)>,
    state_before_buffering: Option<SyncState>,
    deferred_remote_play: Option<f64>,
    pending_deadline: Option<Instant>,
    outbound: mpsc::UnboundedSender<CommandKind>,
    state_tx: watch::Sender<SyncState>,
}

impl<P: PlaybackEngine> IntentCoordinator<P> {
    pub fn new(
        local_config: StreamConfig,
        playback: P,
        outbound: mpsc::UnboundedSender<CommandKind>,
    ) -> (Self, watch::Receiver<SyncState>) {
        let (state_tx, state_rx) = watch::channel(SyncState::Paused);
        let coordinator = Self {
            playback,
            intent: Intent::idle(),
            timeline: None,
            local_config,
            remote_config: None,
            durations: None,
            state_before_buffering: None,
            deferred_remote_play: None,
            pending_deadline: None,
            outbound,
            state_tx,
        };
        (coordinator, state_rx)
    }

    pub fn sync_state(&self) -> SyncState {
        self.intent.sync_state()
    }

    pub fn timeline(&self) -> Option<&UnifiedTimeline> {
        self.timeline.as_ref()
    }

    /// Process events until every producer hangs up. One event runs to
    /// completion before the next is dispatched.
    pub async fn run(mut self, mut events: mpsc::UnboundedReceiver<CoordinatorEvent>) {
        let mut settle = time::interval(SETTLE_POLL_INTERVAL);
        settle.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            let deadline = self
                .pending_deadline
                .unwrap_or_else(|| Instant::now() + PLAY_READY_TIMEOUT);

            tokio::select! {
                event = events.recv() => {
                    let Some(event) = event else { break };
                    if let Err(e) = self.handle(event) {
                        warn!(error = %e, "event handling failed, resetting intent");
                        self.reset_intent();
                    }
                }
                _ = settle.tick() => {
                    if let Err(e) = self.check_seek_settle() {
                        warn!(error = %e, "seek settle check failed");
                    }
                }
                _ = time::sleep_until(deadline), if self.pending_deadline.is_some() => {
                    self.on_play_ready_timeout();
                }
            }
        }
        debug!("coordinator event queue closed");
    }

    /// Single-event entry point; also what the tests drive directly.
    pub fn handle(&mut self, event: CoordinatorEvent) -> Result<()> {
        match event {
            CoordinatorEvent::Local(intent) => self.handle_local(intent),
            CoordinatorEvent::Remote(command) => self.handle_remote(command),
            CoordinatorEvent::Engine(event) => self.handle_engine(event),
            CoordinatorEvent::RemoteConfig(config) => {
                info!(stream = %config.stream_id, "remote stream config received");
                self.remote_config = Some(config);
                self.try_establish_timeline()
            }
        }
    }

    // ---- local user intents ----

    fn handle_local(&mut self, intent: UserIntent) -> Result<()> {
        match intent {
            UserIntent::Play => self.local_play(),
            UserIntent::Pause => self.local_pause(),
            UserIntent::Seek { target } => self.local_seek(target),
            UserIntent::Audio { track } => self.local_audio(track),
        }
    }

    fn local_play(&mut self) -> Result<()> {
        let playhead = self.playback.state().playhead;
        if self.playback.is_actually_ready() {
            // don't play yet: both sides rendezvous on readiness first
            self.start_intent(
                Intent::new(IntentKind::Play, Initiator::Local, IntentStatus::Coordinating)
                    .with_target(playhead),
            );
            self.send(CommandKind::PlayIntent { playhead });
        } else {
            self.start_intent(
                Intent::new(IntentKind::Play, Initiator::Local, IntentStatus::Buffering)
                    .with_target(playhead),
            );
            self.send(CommandKind::PlayNotReady);
        }
        Ok(())
    }

    fn local_pause(&mut self) -> Result<()> {
        if self.sync_state() == SyncState::Paused {
            debug!("pause ignored, already paused");
            return Ok(());
        }
        // pausing is unilaterally safe: no coordination wait
        self.playback.pause()?;
        let playhead = self.playback.state().playhead;
        self.start_intent(
            Intent::new(IntentKind::Pause, Initiator::Local, IntentStatus::Complete)
                .with_target(playhead),
        );
        self.send(CommandKind::PauseIntent { playhead });
        Ok(())
    }

    fn local_seek(&mut self, target: f64) -> Result<()> {
        let target = match &self.timeline {
            Some(timeline) => timeline.clamp_unified(target),
            None => target.max(0.0),
        };
        self.start_intent(
            Intent::new(IntentKind::Seek, Initiator::Local, IntentStatus::Coordinating)
                .with_target(target),
        );
        self.send(CommandKind::SeekIntent { playhead: target });
        // pause before seeking so playback cannot drift while we settle
        self.playback.pause()?;
        self.playback.seek(target)?;
        Ok(())
    }

    fn local_audio(&mut self, track: AudioTrack) -> Result<()> {
        let prior = self.intent.clone();
        self.playback.switch_audio(track)?;
        self.start_intent(
            Intent::new(
                IntentKind::AudioChange,
                Initiator::Local,
                IntentStatus::Complete,
            )
            .with_track(track),
        );
        self.send(CommandKind::AudioChange { track });
        self.restore_after_audio(prior);
        Ok(())
    }

    // ---- remote commands (post gate acceptance) ----

    fn handle_remote(&mut self, command: Command) -> Result<()> {
        debug!(sender = %command.sender_id, kind = ?command.kind, "applying remote command");
        let clock = command.clock;
        match command.kind {
            CommandKind::PlayIntent { playhead } => self.remote_play_intent(playhead, clock),
            CommandKind::PlayReady { .. } => self.remote_play_ready(),
            CommandKind::PlayNotReady => self.remote_play_not_ready(),
            CommandKind::PauseIntent { playhead } => self.remote_pause_intent(playhead, clock),
            CommandKind::SeekIntent { playhead } => self.remote_seek_intent(playhead, clock),
            CommandKind::SeekComplete { playhead } => self.remote_seek_complete(playhead),
            CommandKind::AudioChange { track } => self.remote_audio_change(track),
        }
    }

    fn remote_play_intent(
        &mut self,
        playhead: f64,
        clock: Option<crate::VectorClock>,
    ) -> Result<()> {
        if self.playback.is_actually_ready() {
            self.send(CommandKind::PlayReady { playhead });
            self.playback.play()?;
            self.start_intent(
                Intent::new(IntentKind::Play, Initiator::Remote, IntentStatus::Complete)
                    .with_target(playhead)
                    .with_clock(clock),
            );
        } else {
            self.send(CommandKind::PlayNotReady);
            self.deferred_remote_play = Some(playhead);
            self.start_intent(
                Intent::new(IntentKind::Play, Initiator::Remote, IntentStatus::Buffering)
                    .with_target(playhead)
                    .with_clock(clock),
            );
        }
        Ok(())
    }

    fn remote_play_ready(&mut self) -> Result<()> {
        // the rendezvous point: only a pending local play intent may act
        if self.intent.kind == IntentKind::Play
            && self.intent.initiator == Initiator::Local
            && self.intent.is_pending()
        {
            self.playback.play()?;
            self.complete_intent();
        } else {
            debug!("playReady without a pending local play intent, ignoring");
        }
        Ok(())
    }

    fn remote_play_not_ready(&mut self) -> Result<()> {
        if self.intent.kind == IntentKind::Play
            && self.intent.initiator == Initiator::Local
            && self.intent.is_pending()
        {
            self.update_status(IntentStatus::Waiting);
        }
        Ok(())
    }

    fn remote_pause_intent(
        &mut self,
        playhead: f64,
        clock: Option<crate::VectorClock>,
    ) -> Result<()> {
        self.playback.pause()?;
        let local_playhead = self.playback.state().playhead;
        if (local_playhead - playhead).abs() > OUT_OF_SYNC_THRESHOLD {
            info!(
                local = local_playhead,
                announced = playhead,
                "correcting drift after remote pause"
            );
            self.playback.seek(playhead)?;
        }
        // pause never coordinates a wait
        self.start_intent(
            Intent::new(IntentKind::Pause, Initiator::Remote, IntentStatus::Complete)
                .with_target(playhead)
                .with_clock(clock),
        );
        Ok(())
    }

    fn remote_seek_intent(
        &mut self,
        playhead: f64,
        clock: Option<crate::VectorClock>,
    ) -> Result<()> {
        self.start_intent(
            Intent::new(IntentKind::Seek, Initiator::Remote, IntentStatus::Coordinating)
                .with_target(playhead)
                .with_clock(clock),
        );
        self.playback.pause()?;
        self.playback.seek(playhead)?;
        Ok(())
    }

    fn remote_seek_complete(&mut self, playhead: f64) -> Result<()> {
        if self.intent.kind == IntentKind::Seek && self.intent.is_pending() {
            let matches_target = self
                .intent
                .target_playhead
                .is_some_and(|target| (target - playhead).abs() <= SEEK_SETTLE_TOLERANCE);
            if matches_target {
                self.complete_intent();
            } else {
                debug!(
                    announced = playhead,
                    target = ?self.intent.target_playhead,
                    "seekComplete for a different target, ignoring"
                );
            }
        }
        Ok(())
    }

    fn remote_audio_change(&mut self, track: AudioTrack) -> Result<()> {
        let prior = self.intent.clone();
        // peer-relative naming: their local track is our remote track
        let local_view = track.flipped();
        self.playback.switch_audio(local_view)?;
        self.start_intent(
            Intent::new(
                IntentKind::AudioChange,
                Initiator::Remote,
                IntentStatus::Complete,
            )
            .with_track(local_view),
        );
        self.restore_after_audio(prior);
        Ok(())
    }

    // ---- playback engine feedback ----

    fn handle_engine(&mut self, event: EngineEvent) -> Result<()> {
        match event {
            EngineEvent::StateChanged(status) => {
                if status == PlaybackStatus::Ready {
                    self.check_seek_settle()?;
                }
                Ok(())
            }
            EngineEvent::BufferingStarted { sources } => self.buffering_started(&sources),
            EngineEvent::BufferingComplete => self.buffering_complete(),
            EngineEvent::PlayersReady {
                local_duration,
                remote_duration,
            } => {
                self.durations = Some((local_duration, remote_duration));
                self.try_establish_timeline()
            }
        }
    }

    fn check_seek_settle(&mut self) -> Result<()> {
        if self.intent.kind != IntentKind::Seek || !self.intent.is_pending() {
            return Ok(());
        }
        let Some(target) = self.intent.target_playhead else {
            return Ok(());
        };
        let state = self.playback.state();
        if (state.playhead - target).abs() <= SEEK_SETTLE_TOLERANCE
            && self.playback.is_actually_ready()
        {
            self.send(CommandKind::SeekComplete {
                playhead: state.playhead,
            });
            if self.intent.initiator == Initiator::Remote {
                // nothing further to wait for on this side
                self.complete_intent();
            }
            // local-initiated seeks stay pending until the peer's own
            // seekComplete arrives
        }
        Ok(())
    }

    fn buffering_started(&mut self, sources: &[timeline::Source]) -> Result<()> {
        info!(?sources, "buffering started");
        self.state_before_buffering = Some(self.sync_state());
        self.update_status(IntentStatus::Buffering);
        self.send(CommandKind::PlayNotReady);
        Ok(())
    }

    fn buffering_complete(&mut self) -> Result<()> {
        let before = self.state_before_buffering.take();
        if let Some(playhead) = self.deferred_remote_play.take() {
            // the peer asked to play while we were starved; honor it now
            self.send(CommandKind::PlayReady { playhead });
            self.playback.play()?;
            self.start_intent(
                Intent::new(IntentKind::Play, Initiator::Remote, IntentStatus::Complete)
                    .with_target(playhead),
            );
        } else if before == Some(SyncState::Playing) {
            // we were playing before the stall: re-enter coordination
            let playhead = self.playback.state().playhead;
            self.start_intent(
                Intent::new(IntentKind::Play, Initiator::Local, IntentStatus::Coordinating)
                    .with_target(playhead),
            );
            self.send(CommandKind::PlayIntent { playhead });
        } else {
            self.reset_intent();
        }
        Ok(())
    }

    fn try_establish_timeline(&mut self) -> Result<()> {
        if self.timeline.is_some() {
            return Ok(());
        }
        let (Some((local_duration, remote_duration)), Some(remote_config)) =
            (self.durations, self.remote_config.clone())
        else {
            return Ok(());
        };

        let local = StreamSource::from_metadata(self.local_config.clone(), Some(local_duration));
        let remote = StreamSource::from_metadata(remote_config, Some(remote_duration));
        let timeline = UnifiedTimeline::unify(&local, &remote)?;

        let start = timeline.first_shared_frame();
        info!(
            first_shared_frame = start,
            total_duration = timeline.total_duration(),
            "unified timeline established"
        );
        self.timeline = Some(timeline);

        // both peers align on the first mutually covered instant; position 0
        // may only have footage from one side
        self.start_intent(
            Intent::new(IntentKind::Seek, Initiator::Local, IntentStatus::Coordinating)
                .with_target(start),
        );
        self.send(CommandKind::SeekIntent { playhead: start });
        self.playback.pause()?;
        self.playback.seek(start)?;
        Ok(())
    }

    // ---- intent bookkeeping ----

    fn start_intent(&mut self, intent: Intent) {
        self.intent = intent;
        self.refresh_deadline();
        self.emit_state();
    }

    fn update_status(&mut self, status: IntentStatus) {
        self.intent.status = status;
        self.refresh_deadline();
        self.emit_state();
    }

    fn complete_intent(&mut self) {
        self.update_status(IntentStatus::Complete);
    }

    fn reset_intent(&mut self) {
        self.intent = Intent::idle();
        self.pending_deadline = None;
        self.emit_state();
    }

    /// After an instantaneous audio switch, fall back to whatever transport
    /// state was in effect: audio routing is orthogonal to play/pause/seek.
    fn restore_after_audio(&mut self, prior: Intent) {
        if prior.kind != IntentKind::AudioChange {
            self.intent = prior;
        }
        self.refresh_deadline();
        self.emit_state();
    }

    fn refresh_deadline(&mut self) {
        if self.intent.kind == IntentKind::Play && self.intent.is_pending() {
            if self.pending_deadline.is_none() {
                self.pending_deadline = Some(Instant::now() + PLAY_READY_TIMEOUT);
            }
        } else {
            self.pending_deadline = None;
        }
    }

    fn on_play_ready_timeout(&mut self) {
        if self.intent.kind == IntentKind::Play && self.intent.is_pending() {
            warn!(
                "peer never reached readiness within {:?}, abandoning play intent",
                PLAY_READY_TIMEOUT
            );
            self.reset_intent();
        } else {
            self.pending_deadline = None;
        }
    }

    fn emit_state(&mut self) {
        let state = self.intent.sync_state();
        self.state_tx.send_if_modified(|current| {
            if *current != state {
                debug!(?state, "sync state changed");
                *current = state;
                true
            } else {
                false
            }
        });
    }

    fn send(&self, kind: CommandKind) {
        if self.outbound.send(kind).is_err() {
            // connection layer is down; commands are dropped until the link
            // is re-established
            debug!("outbound command channel closed");
        }
    }
}

impl<P: PlaybackEngine> std::fmt::Debug for IntentCoordinator<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IntentCoordinator")
            .field("intent", &self.intent)
            .field("timeline", &self.timeline)
            .field("sync_state", &self.intent.sync_state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::VectorClock;
    use std::sync::{Arc, Mutex};

    #[derive(Debug, Clone, PartialEq)]
    enum EngineCall {
        Play,
        Pause,
        Seek(f64),
        Audio(AudioTrack),
    }

    #[derive(Clone, Default)]
    struct MockEngine {
        inner: Arc<Mutex<MockEngineState>>,
    }

    #[derive(Default)]
    struct MockEngineState {
        calls: Vec<EngineCall>,
        playhead: f64,
        duration: f64,
        status: Option<PlaybackStatus>,
        ready: bool,
    }

    impl MockEngine {
        fn ready_at(playhead: f64) -> Self {
            let engine = Self::default();
            {
                let mut state = engine.inner.lock().unwrap();
                state.playhead = playhead;
                state.duration = 120.0;
                state.ready = true;
            }
            engine
        }

        fn set_ready(&self, ready: bool) {
            self.inner.lock().unwrap().ready = ready;
        }

        fn calls(&self) -> Vec<EngineCall> {
            self.inner.lock().unwrap().calls.clone()
        }
    }

    impl PlaybackEngine for MockEngine {
        fn play(&mut self) -> Result<()> {
            let mut state = self.inner.lock().unwrap();
            state.calls.push(EngineCall::Play);
            state.status = Some(PlaybackStatus::Playing);
            Ok(())
        }

        fn pause(&mut self) -> Result<()> {
            let mut state = self.inner.lock().unwrap();
            state.calls.push(EngineCall::Pause);
            state.status = Some(PlaybackStatus::Paused);
            Ok(())
        }

        fn seek(&mut self, unified_time: f64) -> Result<()> {
            let mut state = self.inner.lock().unwrap();
            state.calls.push(EngineCall::Seek(unified_time));
            state.playhead = unified_time;
            Ok(())
        }

        fn switch_audio(&mut self, track: AudioTrack) -> Result<()> {
            self.inner.lock().unwrap().calls.push(EngineCall::Audio(track));
            Ok(())
        }

        fn state(&self) -> PlaybackState {
            let state = self.inner.lock().unwrap();
            PlaybackState {
                status: state.status.unwrap_or(PlaybackStatus::Ready),
                playhead: state.playhead,
                duration: state.duration,
            }
        }

        fn is_actually_ready(&self) -> bool {
            self.inner.lock().unwrap().ready
        }
    }

    fn coordinator(
        engine: MockEngine,
    ) -> (
        IntentCoordinator<MockEngine>,
        mpsc::UnboundedReceiver<CommandKind>,
        watch::Receiver<SyncState>,
    ) {
        let (tx, rx) = mpsc::unbounded_channel();
        let config = StreamConfig::new("local-vod", "1970-01-01T00:00:00Z");
        let (coordinator, state_rx) = IntentCoordinator::new(config, engine, tx);
        (coordinator, rx, state_rx)
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<CommandKind>) -> Vec<CommandKind> {
        let mut out = Vec::new();
        while let Ok(kind) = rx.try_recv() {
            out.push(kind);
        }
        out
    }

    fn remote(kind: CommandKind) -> CoordinatorEvent {
        CoordinatorEvent::Remote(Command {
            kind,
            clock: Some(VectorClock::new()),
            sender_id: crate::PeerId::from("peer"),
            send_timestamp: chrono::Utc::now(),
        })
    }

    #[test]
    fn local_play_when_ready_coordinates_without_playing() {
        let engine = MockEngine::ready_at(10.0);
        let (mut coordinator, mut rx, _state) = coordinator(engine.clone());

        coordinator.handle(CoordinatorEvent::Local(UserIntent::Play)).unwrap();

        assert_eq!(coordinator.sync_state(), SyncState::PendingPlay);
        assert_eq!(drain(&mut rx), vec![CommandKind::PlayIntent { playhead: 10.0 }]);
        assert!(engine.calls().is_empty(), "must not play before rendezvous");
    }

    #[test]
    fn local_play_when_not_ready_reports_buffering() {
        let engine = MockEngine::ready_at(10.0);
        engine.set_ready(false);
        let (mut coordinator, mut rx, _state) = coordinator(engine);

        coordinator.handle(CoordinatorEvent::Local(UserIntent::Play)).unwrap();

        assert_eq!(coordinator.sync_state(), SyncState::Buffering);
        assert_eq!(drain(&mut rx), vec![CommandKind::PlayNotReady]);
    }

    #[test]
    fn pause_is_idempotent() {
        let engine = MockEngine::ready_at(10.0);
        let (mut coordinator, mut rx, _state) = coordinator(engine.clone());

        coordinator.handle(CoordinatorEvent::Local(UserIntent::Pause)).unwrap();

        assert_eq!(coordinator.sync_state(), SyncState::Paused);
        assert!(drain(&mut rx).is_empty(), "no outbound command");
        assert!(engine.calls().is_empty(), "no engine call");
    }

    #[test]
    fn pause_while_playing_pauses_and_notifies() {
        let engine = MockEngine::ready_at(42.0);
        let (mut coordinator, mut rx, _state) = coordinator(engine.clone());

        // get into playing state via a completed remote play
        coordinator
            .handle(remote(CommandKind::PlayIntent { playhead: 42.0 }))
            .unwrap();
        drain(&mut rx);

        coordinator.handle(CoordinatorEvent::Local(UserIntent::Pause)).unwrap();

        assert_eq!(coordinator.sync_state(), SyncState::Paused);
        assert_eq!(drain(&mut rx), vec![CommandKind::PauseIntent { playhead: 42.0 }]);
        assert!(engine.calls().contains(&EngineCall::Pause));
    }

    #[test]
    fn remote_pause_corrects_drift_beyond_threshold() {
        let engine = MockEngine::ready_at(50.6);
        let (mut coordinator, _rx, _state) = coordinator(engine.clone());

        coordinator
            .handle(remote(CommandKind::PauseIntent { playhead: 50.0 }))
            .unwrap();

        assert_eq!(
            engine.calls(),
            vec![EngineCall::Pause, EngineCall::Seek(50.0)]
        );
    }

    #[test]
    fn remote_pause_within_threshold_does_not_reseek() {
        let engine = MockEngine::ready_at(50.3);
        let (mut coordinator, _rx, _state) = coordinator(engine.clone());

        coordinator
            .handle(remote(CommandKind::PauseIntent { playhead: 50.0 }))
            .unwrap();

        assert_eq!(engine.calls(), vec![EngineCall::Pause]);
    }

    #[test]
    fn starting_an_intent_replaces_the_previous_one() {
        let engine = MockEngine::ready_at(10.0);
        let (mut coordinator, mut rx, _state) = coordinator(engine);

        coordinator.handle(CoordinatorEvent::Local(UserIntent::Play)).unwrap();
        assert_eq!(coordinator.sync_state(), SyncState::PendingPlay);

        coordinator
            .handle(CoordinatorEvent::Local(UserIntent::Seek { target: 33.0 }))
            .unwrap();

        // the play intent is gone without a trace; only the seek remains
        assert_eq!(coordinator.sync_state(), SyncState::PendingSeek);
        let sent = drain(&mut rx);
        assert_eq!(
            sent,
            vec![
                CommandKind::PlayIntent { playhead: 10.0 },
                CommandKind::SeekIntent { playhead: 33.0 },
            ]
        );
    }

    #[test]
    fn play_ready_only_acts_on_pending_local_play() {
        let engine = MockEngine::ready_at(10.0);
        let (mut coordinator, _rx, _state) = coordinator(engine.clone());

        // no pending intent: ignored
        coordinator
            .handle(remote(CommandKind::PlayReady { playhead: 10.0 }))
            .unwrap();
        assert!(engine.calls().is_empty());

        coordinator.handle(CoordinatorEvent::Local(UserIntent::Play)).unwrap();
        coordinator
            .handle(remote(CommandKind::PlayReady { playhead: 10.0 }))
            .unwrap();
        assert_eq!(coordinator.sync_state(), SyncState::Playing);
        assert!(engine.calls().contains(&EngineCall::Play));
    }

    #[test]
    fn play_not_ready_moves_local_play_to_waiting() {
        let engine = MockEngine::ready_at(10.0);
        let (mut coordinator, _rx, mut state) = coordinator(engine);

        coordinator.handle(CoordinatorEvent::Local(UserIntent::Play)).unwrap();
        coordinator.handle(remote(CommandKind::PlayNotReady)).unwrap();

        assert_eq!(coordinator.sync_state(), SyncState::PendingPlay);
        assert_eq!(*state.borrow_and_update(), SyncState::PendingPlay);
    }

    #[test]
    fn remote_seek_completes_after_settling() {
        let engine = MockEngine::ready_at(5.0);
        let (mut coordinator, mut rx, _state) = coordinator(engine.clone());

        coordinator
            .handle(remote(CommandKind::SeekIntent { playhead: 60.0 }))
            .unwrap();
        assert_eq!(coordinator.sync_state(), SyncState::PendingSeek);
        assert!(engine.calls().contains(&EngineCall::Seek(60.0)));

        coordinator
            .handle(CoordinatorEvent::Engine(EngineEvent::StateChanged(
                PlaybackStatus::Ready,
            )))
            .unwrap();

        // the reached playhead is announced and the remote-initiated intent
        // completes locally
        assert_eq!(drain(&mut rx), vec![CommandKind::SeekComplete { playhead: 60.0 }]);
        assert_eq!(coordinator.sync_state(), SyncState::Paused);
    }

    #[test]
    fn local_seek_waits_for_peer_seek_complete() {
        let engine = MockEngine::ready_at(5.0);
        let (mut coordinator, mut rx, _state) = coordinator(engine);

        coordinator
            .handle(CoordinatorEvent::Local(UserIntent::Seek { target: 60.0 }))
            .unwrap();
        coordinator
            .handle(CoordinatorEvent::Engine(EngineEvent::StateChanged(
                PlaybackStatus::Ready,
            )))
            .unwrap();

        // still pending: our side settled, the peer's confirmation is missing
        assert_eq!(coordinator.sync_state(), SyncState::PendingSeek);

        coordinator
            .handle(remote(CommandKind::SeekComplete { playhead: 60.02 }))
            .unwrap();
        assert_eq!(coordinator.sync_state(), SyncState::Paused);

        let sent = drain(&mut rx);
        assert!(sent.contains(&CommandKind::SeekIntent { playhead: 60.0 }));
        assert!(sent.contains(&CommandKind::SeekComplete { playhead: 60.0 }));
    }

    #[test]
    fn audio_change_keeps_the_transport_state() {
        let engine = MockEngine::ready_at(10.0);
        let (mut coordinator, mut rx, _state) = coordinator(engine.clone());

        coordinator
            .handle(remote(CommandKind::PlayIntent { playhead: 10.0 }))
            .unwrap();
        assert_eq!(coordinator.sync_state(), SyncState::Playing);
        drain(&mut rx);

        coordinator
            .handle(CoordinatorEvent::Local(UserIntent::Audio {
                track: AudioTrack::Remote,
            }))
            .unwrap();

        assert_eq!(coordinator.sync_state(), SyncState::Playing);
        assert_eq!(
            drain(&mut rx),
            vec![CommandKind::AudioChange {
                track: AudioTrack::Remote
            }]
        );
        assert!(engine.calls().contains(&EngineCall::Audio(AudioTrack::Remote)));
    }

    #[test]
    fn remote_audio_change_applies_the_inverse_track() {
        let engine = MockEngine::ready_at(10.0);
        let (mut coordinator, mut rx, _state) = coordinator(engine.clone());

        coordinator
            .handle(remote(CommandKind::AudioChange {
                track: AudioTrack::Local,
            }))
            .unwrap();

        // their local audio is our remote track
        assert!(engine.calls().contains(&EngineCall::Audio(AudioTrack::Remote)));
        assert!(drain(&mut rx).is_empty(), "no echo back to the peer");
    }

    #[test]
    fn buffering_interrupts_and_resumes_playback_coordination() {
        let engine = MockEngine::ready_at(10.0);
        let (mut coordinator, mut rx, _state) = coordinator(engine.clone());

        coordinator
            .handle(remote(CommandKind::PlayIntent { playhead: 10.0 }))
            .unwrap();
        assert_eq!(coordinator.sync_state(), SyncState::Playing);
        drain(&mut rx);

        coordinator
            .handle(CoordinatorEvent::Engine(EngineEvent::BufferingStarted {
                sources: vec![timeline::Source::Remote],
            }))
            .unwrap();
        assert_eq!(coordinator.sync_state(), SyncState::Buffering);
        assert_eq!(drain(&mut rx), vec![CommandKind::PlayNotReady]);

        coordinator
            .handle(CoordinatorEvent::Engine(EngineEvent::BufferingComplete))
            .unwrap();

        // we were playing before the stall: a fresh coordination round starts
        assert_eq!(coordinator.sync_state(), SyncState::PendingPlay);
        assert_eq!(drain(&mut rx), vec![CommandKind::PlayIntent { playhead: 10.0 }]);
    }

    #[test]
    fn deferred_remote_play_resolves_on_buffering_complete() {
        let engine = MockEngine::ready_at(10.0);
        engine.set_ready(false);
        let (mut coordinator, mut rx, _state) = coordinator(engine.clone());

        coordinator
            .handle(remote(CommandKind::PlayIntent { playhead: 10.0 }))
            .unwrap();
        assert_eq!(coordinator.sync_state(), SyncState::Buffering);
        assert_eq!(drain(&mut rx), vec![CommandKind::PlayNotReady]);

        engine.set_ready(true);
        coordinator
            .handle(CoordinatorEvent::Engine(EngineEvent::BufferingComplete))
            .unwrap();

        assert_eq!(coordinator.sync_state(), SyncState::Playing);
        assert_eq!(drain(&mut rx), vec![CommandKind::PlayReady { playhead: 10.0 }]);
        assert!(engine.calls().contains(&EngineCall::Play));
    }

    #[test]
    fn play_ready_timeout_resets_a_pending_play() {
        let engine = MockEngine::ready_at(10.0);
        let (mut coordinator, _rx, _state) = coordinator(engine);

        coordinator.handle(CoordinatorEvent::Local(UserIntent::Play)).unwrap();
        assert_eq!(coordinator.sync_state(), SyncState::PendingPlay);

        coordinator.on_play_ready_timeout();
        assert_eq!(coordinator.sync_state(), SyncState::Paused);
    }

    #[test]
    fn players_ready_aligns_on_the_first_shared_frame() {
        let engine = MockEngine::ready_at(0.0);
        let (mut coordinator, mut rx, _state) = coordinator(engine.clone());

        let remote_config = StreamConfig::new("remote-vod", "1970-01-01T00:00:20Z");
        coordinator
            .handle(CoordinatorEvent::RemoteConfig(remote_config))
            .unwrap();
        assert!(coordinator.timeline().is_none(), "durations still missing");

        coordinator
            .handle(CoordinatorEvent::Engine(EngineEvent::PlayersReady {
                local_duration: 100.0,
                remote_duration: 100.0,
            }))
            .unwrap();

        let timeline = coordinator.timeline().expect("timeline established");
        assert!((timeline.first_shared_frame() - 20.0).abs() < 1e-9);
        assert_eq!(coordinator.sync_state(), SyncState::PendingSeek);
        assert_eq!(drain(&mut rx), vec![CommandKind::SeekIntent { playhead: 20.0 }]);
        assert!(engine.calls().contains(&EngineCall::Seek(20.0)));
    }

    #[test]
    fn seek_targets_clamp_to_the_unified_timeline() {
        let engine = MockEngine::ready_at(0.0);
        let (mut coordinator, mut rx, _state) = coordinator(engine);

        coordinator
            .handle(CoordinatorEvent::RemoteConfig(StreamConfig::new(
                "remote-vod",
                "1970-01-01T00:00:20Z",
            )))
            .unwrap();
        coordinator
            .handle(CoordinatorEvent::Engine(EngineEvent::PlayersReady {
                local_duration: 100.0,
                remote_duration: 100.0,
            }))
            .unwrap();
        drain(&mut rx);

        coordinator
            .handle(CoordinatorEvent::Local(UserIntent::Seek { target: 1e9 }))
            .unwrap();
        assert_eq!(
            drain(&mut rx),
            vec![CommandKind::SeekIntent { playhead: 120.0 }]
        );
    }
}
