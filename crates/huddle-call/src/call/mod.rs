//! Per-peer call lifecycle.
//!
//! [`transition`] is the whole state machine: every (state, event) pair
//! has exactly one outcome, and the orchestrator applies those outcomes
//! without second-guessing them.

mod connector;

pub use connector::{CallHandle, CallSignal, CallSignals, IncomingCall, PeerConnector, SignalEnvelope};

use std::fmt;

/// Remote participant, as seen from the call layer.
pub type PeerId = huddle_common::UserId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CallState {
    #[default]
    Idle,
    Connecting,
    Connected,
    Error,
}

impl CallState {
    pub fn is_active(self) -> bool {
        matches!(self, CallState::Connecting | CallState::Connected)
    }
}

impl fmt::Display for CallState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CallState::Idle => "idle",
            CallState::Connecting => "connecting",
            CallState::Connected => "connected",
            CallState::Error => "error",
        };
        f.write_str(s)
    }
}

/// Things that can happen to a peer's call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallEvent {
    /// We want to call them.
    Dial,
    /// They are calling us.
    Incoming,
    /// The connection produced usable remote audio.
    RemoteStream,
    /// The connection reported an error.
    Failure,
    /// Either side hung up.
    Closed,
}

/// What the orchestrator should do with an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Apply(CallState),
    /// A local dial while a call already exists: drop the dial.
    Suppress,
    /// An incoming call while a call already exists: tear the old one
    /// down, then accept the new one.
    Supersede,
    /// Nothing to do in this state.
    Ignore,
}

pub fn transition(state: CallState, event: CallEvent) -> Transition {
    use CallEvent as E;
    use CallState as S;

    match (state, event) {
        (S::Idle | S::Error, E::Dial | E::Incoming) => Transition::Apply(S::Connecting),
        (S::Connecting | S::Connected, E::Dial) => Transition::Suppress,
        (S::Connecting | S::Connected, E::Incoming) => Transition::Supersede,

        (S::Connecting | S::Connected, E::RemoteStream) => Transition::Apply(S::Connected),
        (S::Connecting | S::Connected, E::Failure) => Transition::Apply(S::Error),
        (S::Connecting | S::Connected, E::Closed) => Transition::Apply(S::Idle),

        (S::Idle | S::Error, E::RemoteStream | E::Failure | E::Closed) => Transition::Ignore,
    }
}
