//! Media session manager: one local stream, one sink per remote peer.

use std::collections::HashMap;
use std::sync::Arc;

use huddle_common::{MediaError, UserId};
use tracing::{debug, info};

use super::device::{AudioOutput, AudioSink, CaptureConstraints, CaptureDevice, LocalMediaStream, RemoteStream};

pub struct MediaSessionManager {
    device: Arc<dyn CaptureDevice>,
    output: Arc<dyn AudioOutput>,
    local: Option<LocalMediaStream>,
    sinks: HashMap<UserId, Box<dyn AudioSink>>,
}

impl MediaSessionManager {
    pub fn new(device: Arc<dyn CaptureDevice>, output: Arc<dyn AudioOutput>) -> Self {
        Self {
            device,
            output,
            local: None,
            sinks: HashMap::new(),
        }
    }

    /// Open the microphone, or hand back the stream that is already open.
    pub async fn acquire_local(
        &mut self,
        constraints: &CaptureConstraints,
    ) -> Result<LocalMediaStream, MediaError> {
        if let Some(stream) = self.local.as_ref().filter(|s| s.is_active()) {
            return Ok(stream.clone());
        }

        let tracks = self.device.open(constraints).await?;
        if tracks.is_empty() {
            return Err(MediaError::DeviceUnavailable("no audio tracks".into()));
        }
        let stream = LocalMediaStream::new(tracks);
        info!(stream = %stream.id(), tracks = stream.tracks().len(), "Local audio acquired");
        self.local = Some(stream.clone());
        Ok(stream)
    }

    pub fn local(&self) -> Option<&LocalMediaStream> {
        self.local.as_ref().filter(|s| s.is_active())
    }

    pub fn has_local(&self) -> bool {
        self.local().is_some()
    }

    /// Flip the outbound tracks. Returns the new muted state, or `None`
    /// when there is nothing to mute.
    pub fn toggle_mute(&mut self) -> Option<bool> {
        let stream = self.local()?;
        let muted = stream.is_enabled();
        stream.set_enabled(!muted);
        debug!(muted, "Local audio mute toggled");
        Some(muted)
    }

    /// Play `stream` for `peer`, creating the sink on first use.
    pub fn attach_remote(&mut self, peer: &UserId, stream: &RemoteStream) {
        let output = &self.output;
        let sink = self
            .sinks
            .entry(peer.clone())
            .or_insert_with(|| output.create_sink(peer));
        sink.play(stream);
        debug!(peer = %peer, stream = %stream.id, "Remote audio attached");
    }

    /// Release the sink for `peer`. Returns false if there was none.
    pub fn detach_remote(&mut self, peer: &UserId) -> bool {
        match self.sinks.remove(peer) {
            Some(mut sink) => {
                sink.release();
                debug!(peer = %peer, "Remote audio detached");
                true
            }
            None => false,
        }
    }

    pub fn has_sink(&self, peer: &UserId) -> bool {
        self.sinks.contains_key(peer)
    }

    pub fn sink_count(&self) -> usize {
        self.sinks.len()
    }

    /// Stop every captured track and release every sink.
    pub fn release_all(&mut self) {
        if let Some(stream) = self.local.take() {
            stream.stop();
            info!(stream = %stream.id(), "Local audio released");
        }
        for (_, mut sink) in self.sinks.drain() {
            sink.release();
        }
    }
}

impl Drop for MediaSessionManager {
    fn drop(&mut self) {
        self.release_all();
    }
}
