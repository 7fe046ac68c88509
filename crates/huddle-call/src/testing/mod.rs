//! In-memory stand-ins for audio hardware and the peer-connection layer.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use huddle_common::{CallError, MediaError};

use crate::call::{CallHandle, CallSignals, IncomingCall, PeerConnector, PeerId};
use crate::media::{
    AudioOutput, AudioSink, AudioTrack, CaptureConstraints, CaptureDevice, LocalMediaStream,
    RemoteStream,
};
use crate::orchestrator::OrchestratorHandle;

// ---------------------------------------------------------------------------
// Capture
// ---------------------------------------------------------------------------

pub struct FakeTrack {
    id: String,
    enabled: AtomicBool,
    stopped: AtomicBool,
}

impl AudioTrack for FakeTrack {
    fn id(&self) -> &str {
        &self.id
    }

    fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }
}

#[derive(Default)]
pub struct FakeCapture {
    denied: AtomicBool,
    opens: AtomicUsize,
    last: Mutex<Option<CaptureConstraints>>,
    tracks: Mutex<Vec<Arc<FakeTrack>>>,
}

impl FakeCapture {
    pub fn deny(&self, denied: bool) {
        self.denied.store(denied, Ordering::SeqCst);
    }

    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn last_constraints(&self) -> Option<CaptureConstraints> {
        self.last.lock().unwrap().clone()
    }

    pub fn all_tracks_stopped(&self) -> bool {
        self.tracks
            .lock()
            .unwrap()
            .iter()
            .all(|t| t.stopped.load(Ordering::SeqCst))
    }
}

#[async_trait]
impl CaptureDevice for FakeCapture {
    async fn open(
        &self,
        constraints: &CaptureConstraints,
    ) -> Result<Vec<Arc<dyn AudioTrack>>, MediaError> {
        if self.denied.load(Ordering::SeqCst) {
            return Err(MediaError::PermissionDenied("user dismissed prompt".into()));
        }
        let n = self.opens.fetch_add(1, Ordering::SeqCst);
        *self.last.lock().unwrap() = Some(constraints.clone());
        let track = Arc::new(FakeTrack {
            id: format!("mic-{n}"),
            enabled: AtomicBool::new(true),
            stopped: AtomicBool::new(false),
        });
        self.tracks.lock().unwrap().push(Arc::clone(&track));
        Ok(vec![track as Arc<dyn AudioTrack>])
    }
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

#[derive(Default)]
struct OutputLog {
    created: HashMap<PeerId, usize>,
    playing: HashMap<PeerId, String>,
    live: usize,
}

#[derive(Default)]
pub struct FakeOutput {
    log: Arc<Mutex<OutputLog>>,
}

impl FakeOutput {
    pub fn sinks_created(&self, peer: &PeerId) -> usize {
        self.log.lock().unwrap().created.get(peer).copied().unwrap_or(0)
    }

    /// Stream id currently playing for `peer`.
    pub fn playing(&self, peer: &PeerId) -> Option<String> {
        self.log.lock().unwrap().playing.get(peer).cloned()
    }

    pub fn live_sinks(&self) -> usize {
        self.log.lock().unwrap().live
    }
}

struct FakeSink {
    peer: PeerId,
    log: Arc<Mutex<OutputLog>>,
    released: bool,
}

impl AudioSink for FakeSink {
    fn play(&mut self, stream: &RemoteStream) {
        self.log
            .lock()
            .unwrap()
            .playing
            .insert(self.peer.clone(), stream.id.clone());
    }

    fn release(&mut self) {
        if !self.released {
            self.released = true;
            let mut log = self.log.lock().unwrap();
            log.playing.remove(&self.peer);
            log.live -= 1;
        }
    }
}

impl AudioOutput for FakeOutput {
    fn create_sink(&self, peer: &PeerId) -> Box<dyn AudioSink> {
        let mut log = self.log.lock().unwrap();
        *log.created.entry(peer.clone()).or_default() += 1;
        log.live += 1;
        Box::new(FakeSink {
            peer: peer.clone(),
            log: Arc::clone(&self.log),
            released: false,
        })
    }
}

// ---------------------------------------------------------------------------
// Scripted connector: records dials, the test plays the remote side
// ---------------------------------------------------------------------------

type CloseLog = Arc<Mutex<Vec<(PeerId, u64)>>>;

pub struct ScriptedHandle {
    peer: PeerId,
    generation: u64,
    closes: CloseLog,
}

impl CallHandle for ScriptedHandle {
    fn peer(&self) -> &PeerId {
        &self.peer
    }

    fn close(&mut self) {
        self.closes
            .lock()
            .unwrap()
            .push((self.peer.clone(), self.generation));
    }
}

#[derive(Default)]
pub struct ScriptedConnector {
    dials: Mutex<Vec<CallSignals>>,
    fail_next: Mutex<Option<String>>,
    closes: CloseLog,
}

impl ScriptedConnector {
    pub fn fail_next(&self, reason: &str) {
        *self.fail_next.lock().unwrap() = Some(reason.to_string());
    }

    pub fn dials_to(&self, peer: &PeerId) -> usize {
        self.dials
            .lock()
            .unwrap()
            .iter()
            .filter(|s| s.peer() == peer)
            .count()
    }

    pub fn total_dials(&self) -> usize {
        self.dials.lock().unwrap().len()
    }

    /// Signals of the most recent dial to `peer`, to play the remote side.
    pub fn last_dial(&self, peer: &PeerId) -> Option<CallSignals> {
        self.dials
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|s| s.peer() == peer)
            .cloned()
    }

    /// Every (peer, generation) whose handle was closed, in order.
    pub fn closes(&self) -> Vec<(PeerId, u64)> {
        self.closes.lock().unwrap().clone()
    }
}

impl PeerConnector for ScriptedConnector {
    fn dial(
        &self,
        peer: &PeerId,
        _local: &LocalMediaStream,
        signals: CallSignals,
    ) -> Result<Box<dyn CallHandle>, CallError> {
        if let Some(reason) = self.fail_next.lock().unwrap().take() {
            return Err(CallError::DialFailed {
                peer: peer.clone(),
                reason,
            });
        }
        let generation = signals.generation();
        self.dials.lock().unwrap().push(signals);
        Ok(Box::new(ScriptedHandle {
            peer: peer.clone(),
            generation,
            closes: Arc::clone(&self.closes),
        }))
    }
}

/// What happened to a [`ScriptedIncoming`] after it was handed over.
#[derive(Clone, Default)]
pub struct IncomingOutcome {
    answered: Arc<Mutex<Option<CallSignals>>>,
    declined: Arc<AtomicBool>,
    closes: CloseLog,
}

impl IncomingOutcome {
    pub fn signals(&self) -> Option<CallSignals> {
        self.answered.lock().unwrap().clone()
    }

    pub fn declined(&self) -> bool {
        self.declined.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> bool {
        !self.closes.lock().unwrap().is_empty()
    }
}

pub struct ScriptedIncoming {
    peer: PeerId,
    outcome: IncomingOutcome,
}

impl ScriptedIncoming {
    pub fn new(peer: &str) -> (Box<Self>, IncomingOutcome) {
        let outcome = IncomingOutcome::default();
        let call = Box::new(Self {
            peer: PeerId::from(peer),
            outcome: outcome.clone(),
        });
        (call, outcome)
    }
}

impl IncomingCall for ScriptedIncoming {
    fn peer(&self) -> &PeerId {
        &self.peer
    }

    fn answer(
        self: Box<Self>,
        _local: &LocalMediaStream,
        signals: CallSignals,
    ) -> Result<Box<dyn CallHandle>, CallError> {
        let generation = signals.generation();
        *self.outcome.answered.lock().unwrap() = Some(signals);
        Ok(Box::new(ScriptedHandle {
            peer: self.peer.clone(),
            generation,
            closes: Arc::clone(&self.outcome.closes),
        }))
    }

    fn decline(self: Box<Self>) {
        self.outcome.declined.store(true, Ordering::SeqCst);
    }
}

// ---------------------------------------------------------------------------
// Fake network: connects running orchestrators to each other
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, PartialEq, Eq)]
enum Side {
    Caller,
    Callee,
}

struct Link {
    caller: CallSignals,
    caller_stream: String,
    callee: Option<CallSignals>,
    closed: bool,
}

impl Link {
    fn hang_up(&mut self, from: Side) {
        if self.closed {
            return;
        }
        self.closed = true;
        match from {
            Side::Caller => {
                if let Some(callee) = &self.callee {
                    callee.closed();
                }
            }
            Side::Callee => self.caller.closed(),
        }
    }
}

struct NetHandle {
    peer: PeerId,
    side: Side,
    link: Arc<Mutex<Link>>,
}

impl CallHandle for NetHandle {
    fn peer(&self) -> &PeerId {
        &self.peer
    }

    fn close(&mut self) {
        self.link.lock().unwrap().hang_up(self.side);
    }
}

struct NetIncoming {
    from: PeerId,
    link: Arc<Mutex<Link>>,
}

impl IncomingCall for NetIncoming {
    fn peer(&self) -> &PeerId {
        &self.from
    }

    fn answer(
        self: Box<Self>,
        local: &LocalMediaStream,
        signals: CallSignals,
    ) -> Result<Box<dyn CallHandle>, CallError> {
        let mut link = self.link.lock().unwrap();
        if link.closed {
            return Err(CallError::PeerError {
                peer: self.from.clone(),
                kind: "caller hung up".into(),
            });
        }
        signals.stream(RemoteStream {
            id: link.caller_stream.clone(),
        });
        link.caller.stream(RemoteStream {
            id: local.id().to_string(),
        });
        link.callee = Some(signals);
        drop(link);
        Ok(Box::new(NetHandle {
            peer: self.from.clone(),
            side: Side::Callee,
            link: Arc::clone(&self.link),
        }))
    }

    fn decline(self: Box<Self>) {
        self.link.lock().unwrap().hang_up(Side::Callee);
    }
}

/// Routes dials between orchestrators registered under their ids.
#[derive(Clone, Default)]
pub struct FakeNetwork {
    peers: Arc<Mutex<HashMap<PeerId, OrchestratorHandle>>>,
}

impl FakeNetwork {
    pub fn register(&self, id: &PeerId, handle: OrchestratorHandle) {
        self.peers.lock().unwrap().insert(id.clone(), handle);
    }

    pub fn connector(&self, self_id: &str) -> Arc<NetConnector> {
        Arc::new(NetConnector {
            self_id: PeerId::from(self_id),
            network: self.clone(),
        })
    }
}

pub struct NetConnector {
    self_id: PeerId,
    network: FakeNetwork,
}

impl PeerConnector for NetConnector {
    fn dial(
        &self,
        peer: &PeerId,
        local: &LocalMediaStream,
        signals: CallSignals,
    ) -> Result<Box<dyn CallHandle>, CallError> {
        let remote = self.network.peers.lock().unwrap().get(peer).cloned();
        let Some(remote) = remote else {
            return Err(CallError::DialFailed {
                peer: peer.clone(),
                reason: "peer unavailable".into(),
            });
        };

        let link = Arc::new(Mutex::new(Link {
            caller: signals,
            caller_stream: local.id().to_string(),
            callee: None,
            closed: false,
        }));
        remote.incoming(Box::new(NetIncoming {
            from: self.self_id.clone(),
            link: Arc::clone(&link),
        }));
        Ok(Box::new(NetHandle {
            peer: peer.clone(),
            side: Side::Caller,
            link,
        }))
    }
}
