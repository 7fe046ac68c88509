//! Seam to the peer-connection library that carries the actual audio.

use huddle_common::CallError;
use tokio::sync::mpsc;

use super::PeerId;
use crate::media::{LocalMediaStream, RemoteStream};

/// What a live connection can report back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallSignal {
    Stream(RemoteStream),
    Closed,
    Error(String),
}

/// A signal tagged with the connection attempt it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignalEnvelope {
    pub peer: PeerId,
    pub generation: u64,
    pub signal: CallSignal,
}

/// Callback side handed to a connection when it is created.
///
/// Every attempt gets its own generation, so signals from a connection
/// that has since been replaced are recognised and dropped.
#[derive(Debug, Clone)]
pub struct CallSignals {
    peer: PeerId,
    generation: u64,
    tx: mpsc::UnboundedSender<SignalEnvelope>,
}

impl CallSignals {
    pub fn new(peer: PeerId, generation: u64, tx: mpsc::UnboundedSender<SignalEnvelope>) -> Self {
        Self { peer, generation, tx }
    }

    pub fn peer(&self) -> &PeerId {
        &self.peer
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn stream(&self, stream: RemoteStream) {
        self.emit(CallSignal::Stream(stream));
    }

    pub fn closed(&self) {
        self.emit(CallSignal::Closed);
    }

    pub fn error(&self, kind: impl Into<String>) {
        self.emit(CallSignal::Error(kind.into()));
    }

    fn emit(&self, signal: CallSignal) {
        // The orchestrator may already be gone; nothing left to tell.
        let _ = self.tx.send(SignalEnvelope {
            peer: self.peer.clone(),
            generation: self.generation,
            signal,
        });
    }
}

/// An established or in-progress connection we own.
pub trait CallHandle: Send {
    fn peer(&self) -> &PeerId;
    /// Hang up. Must be safe to call more than once.
    fn close(&mut self);
}

/// A call offered to us by a remote peer.
pub trait IncomingCall: Send {
    fn peer(&self) -> &PeerId;

    fn answer(
        self: Box<Self>,
        local: &LocalMediaStream,
        signals: CallSignals,
    ) -> Result<Box<dyn CallHandle>, CallError>;

    /// Refuse the call.
    fn decline(self: Box<Self>);
}

/// Outbound side of the peer-connection library.
pub trait PeerConnector: Send + Sync {
    fn dial(
        &self,
        peer: &PeerId,
        local: &LocalMediaStream,
        signals: CallSignals,
    ) -> Result<Box<dyn CallHandle>, CallError>;
}
