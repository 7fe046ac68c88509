//! Call orchestrator: decides who dials whom and owns every call.
//!
//! [`CallOrchestrator`] is a single-writer state machine. Presence
//! changes, incoming calls, connection signals, expired dial timers and
//! user commands all arrive as [`OrchestratorInput`] and are applied one
//! at a time. [`spawn`] runs it as a background task behind an
//! [`OrchestratorHandle`]; tests drive the core directly.

mod actor;
mod scheduler;


pub use actor::{spawn, OrchestratorHandle};
pub use scheduler::{DialScheduler, ScheduledDial};

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use huddle_common::{CallError, MediaError};
use huddle_config::{CallsConfig, GlarePolicy, HuddleConfig};
use rand::Rng;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::call::{
    transition, CallEvent, CallHandle, CallSignal, CallSignals, CallState, IncomingCall, PeerConnector,
    PeerId, SignalEnvelope, Transition,
};
use crate::media::{AudioOutput, CaptureConstraints, CaptureDevice, MediaSessionManager};

// ---------------------------------------------------------------------------
// Inputs and outputs
// ---------------------------------------------------------------------------

/// Everything that can change the orchestrator's state.
pub enum OrchestratorInput {
    // Presence
    Snapshot { users: Vec<PeerId> },
    PeerJoined(PeerId),
    PeerLeft(PeerId),
    PresenceLost,

    // Peer-connection library
    ConnectorOpen(PeerId),
    ConnectorError(String),
    IncomingCall(Box<dyn IncomingCall>),
    Signal(SignalEnvelope),

    // Timers
    ScheduledDial(ScheduledDial),

    // User commands
    StartAudio,
    StopAudio,
    ToggleMute,
    Call(PeerId),
    ReconnectAll,
}

impl fmt::Debug for OrchestratorInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Snapshot { users } => f.debug_struct("Snapshot").field("users", users).finish(),
            Self::PeerJoined(p) => f.debug_tuple("PeerJoined").field(p).finish(),
            Self::PeerLeft(p) => f.debug_tuple("PeerLeft").field(p).finish(),
            Self::PresenceLost => f.write_str("PresenceLost"),
            Self::ConnectorOpen(id) => f.debug_tuple("ConnectorOpen").field(id).finish(),
            Self::ConnectorError(kind) => f.debug_tuple("ConnectorError").field(kind).finish(),
            Self::IncomingCall(call) => f.debug_tuple("IncomingCall").field(call.peer()).finish(),
            Self::Signal(env) => f.debug_tuple("Signal").field(env).finish(),
            Self::ScheduledDial(d) => f.debug_tuple("ScheduledDial").field(d).finish(),
            Self::StartAudio => f.write_str("StartAudio"),
            Self::StopAudio => f.write_str("StopAudio"),
            Self::ToggleMute => f.write_str("ToggleMute"),
            Self::Call(p) => f.debug_tuple("Call").field(p).finish(),
            Self::ReconnectAll => f.write_str("ReconnectAll"),
        }
    }
}

/// What the orchestrator reports to the outside.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrchestratorEvent {
    CallStateChanged { peer: PeerId, state: CallState },
    /// Human-readable status line.
    Status(String),
    PeersChanged(Vec<PeerId>),
}

/// Receivers the orchestrator feeds. The actor merges `signals` and
/// `dials` back into the input stream.
pub struct OrchestratorChannels {
    pub events: mpsc::UnboundedReceiver<OrchestratorEvent>,
    pub signals: mpsc::UnboundedReceiver<SignalEnvelope>,
    pub dials: mpsc::UnboundedReceiver<ScheduledDial>,
}

// ---------------------------------------------------------------------------
// Per-peer entry
// ---------------------------------------------------------------------------

#[derive(Default)]
struct PeerEntry {
    state: CallState,
    handle: Option<Box<dyn CallHandle>>,
    /// Generation of the current connection attempt.
    generation: u64,
    last_error: Option<String>,
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

pub struct CallOrchestrator {
    self_id: PeerId,
    config: CallsConfig,
    constraints: CaptureConstraints,
    media: MediaSessionManager,
    connector: Arc<dyn PeerConnector>,
    connector_ready: bool,
    known: BTreeSet<PeerId>,
    calls: HashMap<PeerId, PeerEntry>,
    scheduler: DialScheduler,
    signal_tx: mpsc::UnboundedSender<SignalEnvelope>,
    events: mpsc::UnboundedSender<OrchestratorEvent>,
    next_generation: u64,
}

impl CallOrchestrator {
    pub fn new(
        self_id: PeerId,
        config: &HuddleConfig,
        device: Arc<dyn CaptureDevice>,
        output: Arc<dyn AudioOutput>,
        connector: Arc<dyn PeerConnector>,
    ) -> (Self, OrchestratorChannels) {
        let (event_tx, events) = mpsc::unbounded_channel();
        let (signal_tx, signals) = mpsc::unbounded_channel();
        let (dial_tx, dials) = mpsc::unbounded_channel();

        let orchestrator = Self {
            self_id,
            config: config.calls.clone(),
            constraints: CaptureConstraints::from(&config.capture),
            media: MediaSessionManager::new(device, output),
            connector,
            connector_ready: false,
            known: BTreeSet::new(),
            calls: HashMap::new(),
            scheduler: DialScheduler::new(dial_tx),
            signal_tx,
            events: event_tx,
            next_generation: 1,
        };
        (
            orchestrator,
            OrchestratorChannels {
                events,
                signals,
                dials,
            },
        )
    }

    /// Apply one input.
    pub async fn handle(&mut self, input: OrchestratorInput) {
        match input {
            OrchestratorInput::Snapshot { users } => self.on_snapshot(users),
            OrchestratorInput::PeerJoined(peer) => self.on_peer_joined(peer),
            OrchestratorInput::PeerLeft(peer) => self.on_peer_left(&peer),
            OrchestratorInput::PresenceLost => self.on_presence_lost(),
            OrchestratorInput::ConnectorOpen(id) => self.on_connector_open(id),
            OrchestratorInput::ConnectorError(kind) => {
                warn!(kind = %kind, "Peer connector error");
                self.status(format!("Call service error: {kind}"));
            }
            OrchestratorInput::IncomingCall(call) => self.on_incoming(call),
            OrchestratorInput::Signal(envelope) => self.on_signal(envelope),
            OrchestratorInput::ScheduledDial(fired) => self.on_scheduled_dial(fired),
            OrchestratorInput::StartAudio => self.start_audio().await,
            OrchestratorInput::StopAudio => self.stop_audio(),
            OrchestratorInput::ToggleMute => self.toggle_mute(),
            OrchestratorInput::Call(peer) => self.manual_call(&peer),
            OrchestratorInput::ReconnectAll => self.reconnect_all(),
        }
    }

    // -- Reads --------------------------------------------------------------

    pub fn self_id(&self) -> &PeerId {
        &self.self_id
    }

    pub fn state_of(&self, peer: &PeerId) -> CallState {
        self.calls.get(peer).map(|e| e.state).unwrap_or_default()
    }

    pub fn last_error(&self, peer: &PeerId) -> Option<&str> {
        self.calls.get(peer).and_then(|e| e.last_error.as_deref())
    }

    pub fn known_peers(&self) -> Vec<PeerId> {
        self.known.iter().cloned().collect()
    }

    pub fn media(&self) -> &MediaSessionManager {
        &self.media
    }

    pub fn is_dial_pending(&self, peer: &PeerId) -> bool {
        self.scheduler.is_pending(peer)
    }

    // -- Presence -----------------------------------------------------------

    fn on_snapshot(&mut self, users: Vec<PeerId>) {
        let fresh: BTreeSet<PeerId> = users.into_iter().filter(|u| u != &self.self_id).collect();
        let gone: Vec<PeerId> = self.known.difference(&fresh).cloned().collect();
        for peer in &gone {
            self.forget_peer(peer);
        }
        self.known = fresh;
        self.peers_changed();

        let peers = self.known_peers();
        self.schedule_auto_dial(&peers);
    }

    fn on_peer_joined(&mut self, peer: PeerId) {
        if peer == self.self_id {
            return;
        }
        if self.known.insert(peer.clone()) {
            self.peers_changed();
        }
        self.schedule_auto_dial(std::slice::from_ref(&peer));
    }

    fn on_peer_left(&mut self, peer: &PeerId) {
        if self.known.remove(peer) {
            self.peers_changed();
        }
        self.forget_peer(peer);
    }

    /// Drop every peer and every call, including calls answered from
    /// users the room never listed.
    fn on_presence_lost(&mut self) {
        let known = std::mem::take(&mut self.known);
        let peers: BTreeSet<PeerId> = known.iter().chain(self.calls.keys()).cloned().collect();
        for peer in &peers {
            self.forget_peer(peer);
        }
        if !known.is_empty() {
            self.peers_changed();
        }
    }

    /// Cancel, hang up and detach everything for `peer`.
    fn forget_peer(&mut self, peer: &PeerId) {
        self.scheduler.cancel(peer);
        self.hang_up(peer);
        self.calls.remove(peer);
    }

    // -- Connector ----------------------------------------------------------

    fn on_connector_open(&mut self, id: PeerId) {
        if id != self.self_id {
            warn!(expected = %self.self_id, got = %id, "Peer connector opened under another id");
        }
        self.connector_ready = true;
        info!(id = %id, "Peer connector ready");
        self.status("Call service ready");

        let peers = self.known_peers();
        self.schedule_auto_dial(&peers);
    }

    fn on_incoming(&mut self, call: Box<dyn IncomingCall>) {
        let peer = call.peer().clone();
        if peer == self.self_id {
            call.decline();
            return;
        }
        let Some(local) = self.media.local().cloned() else {
            info!(peer = %peer, "Declining incoming call, audio not started");
            call.decline();
            return;
        };

        match transition(self.state_of(&peer), CallEvent::Incoming) {
            Transition::Apply(_) => {}
            Transition::Supersede => {
                info!(peer = %peer, "Incoming call supersedes existing call");
                self.hang_up(&peer);
            }
            Transition::Suppress | Transition::Ignore => {
                call.decline();
                return;
            }
        }
        self.scheduler.cancel(&peer);

        let generation = self.begin_attempt(&peer);
        let signals = CallSignals::new(peer.clone(), generation, self.signal_tx.clone());
        match call.answer(&local, signals) {
            Ok(handle) => {
                info!(peer = %peer, generation, "Answered incoming call");
                self.attach_handle(&peer, handle);
            }
            Err(e) => self.fail(&peer, e),
        }
    }

    fn on_signal(&mut self, envelope: SignalEnvelope) {
        let SignalEnvelope {
            peer,
            generation,
            signal,
        } = envelope;
        let current = self.calls.get(&peer).map(|e| (e.state, e.generation));
        let Some((state, current_generation)) = current else {
            debug!(peer = %peer, "Signal for unknown call dropped");
            return;
        };
        if generation != current_generation {
            debug!(peer = %peer, generation, current_generation, "Stale call signal dropped");
            return;
        }

        let event = match &signal {
            CallSignal::Stream(_) => CallEvent::RemoteStream,
            CallSignal::Closed => CallEvent::Closed,
            CallSignal::Error(_) => CallEvent::Failure,
        };
        match (transition(state, event), signal) {
            (Transition::Apply(CallState::Connected), CallSignal::Stream(stream)) => {
                self.media.attach_remote(&peer, &stream);
                if state != CallState::Connected {
                    info!(peer = %peer, "Call connected");
                }
                self.set_state(&peer, CallState::Connected);
            }
            (Transition::Apply(CallState::Idle), CallSignal::Closed) => {
                info!(peer = %peer, "Call closed by remote");
                self.hang_up(&peer);
            }
            (Transition::Apply(CallState::Error), CallSignal::Error(kind)) => {
                self.fail(&peer, CallError::PeerError { peer: peer.clone(), kind });
            }
            (outcome, _) => debug!(peer = %peer, ?outcome, "Call signal ignored"),
        }
    }

    // -- Dialing ------------------------------------------------------------

    fn schedule_auto_dial(&mut self, peers: &[PeerId]) {
        if !self.config.auto_dial || !self.ready_to_dial() {
            return;
        }
        for peer in peers {
            if self.state_of(peer).is_active()
                || self.scheduler.is_pending(peer)
                || !self.glare_allows_dial(peer)
            {
                continue;
            }
            let delay = self.auto_dial_delay();
            self.scheduler.schedule(peer, delay);
        }
    }

    /// Whether the glare policy lets us be the caller for `peer`.
    fn glare_allows_dial(&self, peer: &PeerId) -> bool {
        match self.config.glare_policy {
            GlarePolicy::IncomingWins => true,
            // The smaller id answers, so only the larger id dials.
            GlarePolicy::LowerIdAnswers => peer < &self.self_id,
        }
    }

    fn auto_dial_delay(&self) -> Duration {
        let min = self.config.auto_dial_min_delay_ms;
        let max = self.config.auto_dial_max_delay_ms.max(min);
        Duration::from_millis(rand::thread_rng().gen_range(min..=max))
    }

    fn on_scheduled_dial(&mut self, fired: ScheduledDial) {
        if !self.scheduler.take_if_current(&fired) {
            debug!(peer = %fired.peer, ticket = fired.ticket, "Stale dial timer ignored");
            return;
        }
        // The world may have moved on since the timer was armed.
        if !self.known.contains(&fired.peer) || !self.ready_to_dial() {
            debug!(peer = %fired.peer, "Scheduled dial no longer applies");
            return;
        }
        self.dial(&fired.peer);
    }

    fn manual_call(&mut self, peer: &PeerId) {
        if peer == &self.self_id {
            return;
        }
        if !self.ready_to_dial() {
            self.status("Please start audio first");
            return;
        }
        self.scheduler.cancel(peer);
        self.dial(peer);
    }

    fn dial(&mut self, peer: &PeerId) {
        match transition(self.state_of(peer), CallEvent::Dial) {
            Transition::Apply(_) => {}
            Transition::Suppress | Transition::Supersede | Transition::Ignore => {
                debug!(peer = %peer, "Dial suppressed, call already in progress");
                return;
            }
        }
        let Some(local) = self.media.local().cloned() else {
            return;
        };

        let generation = self.begin_attempt(peer);
        let signals = CallSignals::new(peer.clone(), generation, self.signal_tx.clone());
        match self.connector.dial(peer, &local, signals) {
            Ok(handle) => {
                info!(peer = %peer, generation, "Dialing");
                self.attach_handle(peer, handle);
            }
            Err(e) => self.fail(peer, e),
        }
    }

    fn ready_to_dial(&self) -> bool {
        self.connector_ready && self.media.has_local()
    }

    // -- User commands ------------------------------------------------------

    async fn start_audio(&mut self) {
        self.status("Requesting microphone access...");
        match self.media.acquire_local(&self.constraints).await {
            Ok(_) => {
                self.status("Microphone access granted");
                let peers = self.known_peers();
                self.schedule_auto_dial(&peers);
            }
            Err(e) => {
                warn!(error = %e, "Microphone unavailable");
                let message = match e {
                    MediaError::PermissionDenied(_) => "Microphone access denied".to_string(),
                    MediaError::DeviceUnavailable(reason) => format!("Microphone unavailable: {reason}"),
                };
                self.status(message);
            }
        }
    }

    fn stop_audio(&mut self) {
        self.status("Stopping audio and closing connections...");
        self.scheduler.cancel_all();
        let peers: Vec<PeerId> = self.calls.keys().cloned().collect();
        for peer in &peers {
            self.hang_up(peer);
        }
        self.media.release_all();
        info!("Audio stopped");
        self.status("Audio stopped");
    }

    fn toggle_mute(&mut self) {
        match self.media.toggle_mute() {
            Some(true) => self.status("Muted"),
            Some(false) => self.status("Unmuted"),
            None => {}
        }
    }

    fn reconnect_all(&mut self) {
        if !self.ready_to_dial() {
            return;
        }
        self.status("Reconnecting to all users...");
        let strangers: Vec<PeerId> = self
            .calls
            .keys()
            .filter(|p| !self.known.contains(*p))
            .cloned()
            .collect();
        for peer in &strangers {
            self.hang_up(peer);
        }

        let jitter = self.config.reconnect_jitter_ms;
        for peer in self.known_peers() {
            self.hang_up(&peer);
            let delay = if jitter == 0 {
                0
            } else {
                rand::thread_rng().gen_range(0..jitter)
            };
            self.scheduler.schedule(&peer, Duration::from_millis(delay));
        }
    }

    /// Release everything. Used when the actor stops.
    pub fn shutdown(&mut self) {
        self.scheduler.cancel_all();
        let peers: Vec<PeerId> = self.calls.keys().cloned().collect();
        for peer in &peers {
            self.hang_up(peer);
        }
        self.media.release_all();
    }

    // -- Entry bookkeeping --------------------------------------------------

    /// Start a new connection attempt: fresh generation, `connecting`.
    fn begin_attempt(&mut self, peer: &PeerId) -> u64 {
        let generation = self.next_generation;
        self.next_generation += 1;
        let entry = self.calls.entry(peer.clone()).or_default();
        entry.generation = generation;
        entry.handle = None;
        self.set_state(peer, CallState::Connecting);
        generation
    }

    fn attach_handle(&mut self, peer: &PeerId, handle: Box<dyn CallHandle>) {
        if let Some(entry) = self.calls.get_mut(peer) {
            entry.handle = Some(handle);
        }
    }

    /// Close the connection, drop the sink, go `idle`.
    fn hang_up(&mut self, peer: &PeerId) {
        if let Some(entry) = self.calls.get_mut(peer) {
            if let Some(mut handle) = entry.handle.take() {
                handle.close();
            }
        }
        self.media.detach_remote(peer);
        self.set_state(peer, CallState::Idle);
    }

    /// Record a failure, pass through `error`, clean up, settle on `idle`.
    fn fail(&mut self, peer: &PeerId, error: CallError) {
        warn!(peer = %peer, error = %error, "Call failed");
        self.set_state(peer, CallState::Error);
        if let Some(entry) = self.calls.get_mut(peer) {
            entry.last_error = Some(error.to_string());
        }
        self.status(format!("Call with {peer} failed: {error}"));
        self.hang_up(peer);
    }

    fn set_state(&mut self, peer: &PeerId, state: CallState) {
        let Some(entry) = self.calls.get_mut(peer) else {
            return;
        };
        if entry.state == state {
            return;
        }
        entry.state = state;
        self.emit(OrchestratorEvent::CallStateChanged {
            peer: peer.clone(),
            state,
        });
    }

    fn peers_changed(&self) {
        self.emit(OrchestratorEvent::PeersChanged(self.known_peers()));
    }

    fn status(&self, message: impl Into<String>) {
        self.emit(OrchestratorEvent::Status(message.into()));
    }

    fn emit(&self, event: OrchestratorEvent) {
        let _ = self.events.send(event);
    }
}
