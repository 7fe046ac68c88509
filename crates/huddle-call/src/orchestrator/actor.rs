//! Background task wrapper around [`CallOrchestrator`].

use tokio::sync::mpsc;
use tracing::{debug, info};

use super::{CallOrchestrator, OrchestratorChannels, OrchestratorEvent, OrchestratorInput};
use crate::call::{IncomingCall, PeerId};

/// Cloneable sender side of a running orchestrator.
#[derive(Clone)]
pub struct OrchestratorHandle {
    tx: mpsc::UnboundedSender<OrchestratorInput>,
}

impl OrchestratorHandle {
    /// Queue an input. Returns false once the orchestrator has stopped.
    pub fn send(&self, input: OrchestratorInput) -> bool {
        self.tx.send(input).is_ok()
    }

    pub fn start_audio(&self) -> bool {
        self.send(OrchestratorInput::StartAudio)
    }

    pub fn stop_audio(&self) -> bool {
        self.send(OrchestratorInput::StopAudio)
    }

    pub fn toggle_mute(&self) -> bool {
        self.send(OrchestratorInput::ToggleMute)
    }

    pub fn call(&self, peer: PeerId) -> bool {
        self.send(OrchestratorInput::Call(peer))
    }

    pub fn reconnect_all(&self) -> bool {
        self.send(OrchestratorInput::ReconnectAll)
    }

    pub fn connector_open(&self, id: PeerId) -> bool {
        self.send(OrchestratorInput::ConnectorOpen(id))
    }

    pub fn connector_error(&self, kind: impl Into<String>) -> bool {
        self.send(OrchestratorInput::ConnectorError(kind.into()))
    }

    pub fn incoming(&self, call: Box<dyn IncomingCall>) -> bool {
        self.send(OrchestratorInput::IncomingCall(call))
    }
}

/// Run `orchestrator` on its own task. The task stops, releasing all
/// media and calls, once every handle is dropped.
pub fn spawn(
    mut orchestrator: CallOrchestrator,
    channels: OrchestratorChannels,
) -> (OrchestratorHandle, mpsc::UnboundedReceiver<OrchestratorEvent>) {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let OrchestratorChannels {
        events,
        mut signals,
        mut dials,
    } = channels;

    tokio::spawn(async move {
        info!(self_id = %orchestrator.self_id(), "Call orchestrator started");
        loop {
            let input = tokio::select! {
                input = rx.recv() => match input {
                    Some(input) => input,
                    None => break,
                },
                Some(envelope) = signals.recv() => OrchestratorInput::Signal(envelope),
                Some(fired) = dials.recv() => OrchestratorInput::ScheduledDial(fired),
            };
            debug!(?input, "Orchestrator input");
            orchestrator.handle(input).await;
        }
        orchestrator.shutdown();
        info!(self_id = %orchestrator.self_id(), "Call orchestrator stopped");
    });

    (OrchestratorHandle { tx }, events)
}
