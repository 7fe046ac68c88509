//! Cancellable per-peer dial timers.
//!
//! A timer does not dial. When it expires it sends a [`ScheduledDial`]
//! back to the orchestrator, which checks the ticket and the peer's
//! current state before acting.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::call::PeerId;

/// An expired dial timer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledDial {
    pub peer: PeerId,
    pub ticket: u64,
}

struct Pending {
    ticket: u64,
    task: JoinHandle<()>,
}

/// At most one pending dial per peer. Scheduling again replaces it.
pub struct DialScheduler {
    tx: mpsc::UnboundedSender<ScheduledDial>,
    pending: HashMap<PeerId, Pending>,
    next_ticket: u64,
}

impl DialScheduler {
    pub fn new(tx: mpsc::UnboundedSender<ScheduledDial>) -> Self {
        Self {
            tx,
            pending: HashMap::new(),
            next_ticket: 1,
        }
    }

    /// Arm a timer for `peer`, cancelling any earlier one. Must be called
    /// from within a tokio runtime.
    pub fn schedule(&mut self, peer: &PeerId, delay: Duration) -> u64 {
        self.cancel(peer);

        let ticket = self.next_ticket;
        self.next_ticket += 1;

        let tx = self.tx.clone();
        let fired = ScheduledDial {
            peer: peer.clone(),
            ticket,
        };
        let deadline = tokio::time::Instant::now() + delay;
        let task = tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            let _ = tx.send(fired);
        });
        debug!(peer = %peer, ticket, delay_ms = delay.as_millis() as u64, "Dial scheduled");
        self.pending.insert(peer.clone(), Pending { ticket, task });
        ticket
    }

    pub fn cancel(&mut self, peer: &PeerId) -> bool {
        match self.pending.remove(peer) {
            Some(p) => {
                p.task.abort();
                true
            }
            None => false,
        }
    }

    pub fn cancel_all(&mut self) {
        for (_, p) in self.pending.drain() {
            p.task.abort();
        }
    }

    pub fn is_pending(&self, peer: &PeerId) -> bool {
        self.pending.contains_key(peer)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Consume the pending entry if `fired` is the timer currently armed
    /// for its peer. A false return means the timer was cancelled or
    /// replaced after it expired.
    pub fn take_if_current(&mut self, fired: &ScheduledDial) -> bool {
        match self.pending.get(&fired.peer) {
            Some(p) if p.ticket == fired.ticket => {
                self.pending.remove(&fired.peer);
                true
            }
            _ => false,
        }
    }
}

impl Drop for DialScheduler {
    fn drop(&mut self) {
        self.cancel_all();
    }
}
