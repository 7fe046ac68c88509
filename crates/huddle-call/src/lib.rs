//! huddle-call: the client side of a huddle.
//!
//! Owns the microphone and speaker sinks ([`media`]), tracks one call per
//! remote peer ([`call`]), decides who dials whom ([`orchestrator`]) and
//! keeps the user in their room on the presence gateway ([`presence`]).
//! The peer-connection library and audio hardware plug in through the
//! traits in [`call`] and [`media`].

pub mod call;
pub mod media;
pub mod orchestrator;
pub mod presence;

#[cfg(test)]
pub(crate) mod testing;

pub use call::{CallSignal, CallSignals, CallState, PeerConnector, PeerId};
pub use media::{CaptureConstraints, LocalMediaStream, MediaSessionManager};
pub use orchestrator::{
    spawn, CallOrchestrator, OrchestratorEvent, OrchestratorHandle, OrchestratorInput,
};
pub use presence::{PresenceClient, PresenceEvent};
